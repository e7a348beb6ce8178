use log::{debug, warn};

use crate::model::{Edge, EdgeStyle, Node, ViewGraph, CONTAINS_RELATION};

/// Deterministic id for an edge synthesized by flattening, keyed on the
/// parent-child relation it stands in for.
pub fn generated_edge_id(parent: &str, child: &str) -> String {
    format!("contains:{parent}:{child}")
}

fn generated_edge(parent: &str, child: &str) -> Edge {
    Edge {
        id: generated_edge_id(parent, child),
        from_guid: parent.to_string(),
        to_guid: child.to_string(),
        label: None,
        relation_type: CONTAINS_RELATION.to_string(),
        style: EdgeStyle::Dashed,
    }
}

/// Flattens one node: the entire subtree is captured into the node's
/// metadata, every descendant is re-inserted as a sibling of the node,
/// and each removed parent-child relation is replaced by a synthesized
/// `CONTAINS` edge so containment stays visible in the flat presentation.
///
/// Idempotent: flattening an already-flattened node changes nothing.
/// Returns whether the graph changed.
pub fn flatten(graph: &mut ViewGraph, guid: &str) -> bool {
    let Some(target) = graph.get_node(guid) else {
        warn!("flatten: unknown node '{guid}'");
        return false;
    };
    if target.metadata.per_node_flattened {
        debug!("flatten: '{guid}' already flattened");
        return false;
    }
    let new_parent = target.parent_guid.clone();

    let descendant_guids = graph.descendants(guid);
    let snapshot: Vec<Node> = descendant_guids
        .iter()
        .filter_map(|descendant| graph.get_node(descendant).cloned())
        .collect();

    // One edge per severed parent-child relation, using the hierarchy as
    // it stands right now.
    let generated: Vec<Edge> = snapshot
        .iter()
        .filter_map(|node| {
            let parent = node.parent_guid.as_deref()?;
            Some(generated_edge(parent, &node.guid))
        })
        .collect();

    for descendant in &descendant_guids {
        if let Some(node) = graph.get_node_mut(descendant) {
            node.parent_guid = new_parent.clone();
            node.children.clear();
        }
        if let Some(parent) = new_parent.as_deref()
            && let Some(parent_node) = graph.get_node_mut(parent)
        {
            parent_node.children.push(descendant.clone());
        }
    }

    for edge in &generated {
        if graph.add_edge(edge.clone()).is_err() {
            warn!("flatten: dropped synthesized edge '{}'", edge.id);
        }
    }

    let node = graph.get_node_mut(guid).expect("target resolved above");
    node.children.clear();
    node.metadata.per_node_flattened = true;
    node.metadata.flattened_children = snapshot;
    node.metadata.generated_edges = generated;
    graph.bump_version();
    true
}

/// Restores the pre-flatten subtree exactly: positions, hierarchy, and
/// child order all come back from the captured snapshot, and every edge
/// the flatten synthesized is removed. Inverse of `flatten`.
pub fn unflatten(graph: &mut ViewGraph, guid: &str) -> bool {
    let Some(target) = graph.get_node(guid) else {
        warn!("unflatten: unknown node '{guid}'");
        return false;
    };
    if !target.metadata.per_node_flattened {
        debug!("unflatten: '{guid}' is not flattened");
        return false;
    }
    let flattened_parent = target.parent_guid.clone();

    let (snapshot, generated) = {
        let node = graph.get_node_mut(guid).expect("target resolved above");
        (
            std::mem::take(&mut node.metadata.flattened_children),
            std::mem::take(&mut node.metadata.generated_edges),
        )
    };

    for edge in &generated {
        graph.remove_edge(&edge.id);
    }

    // The restored nodes stop being siblings of the target.
    if let Some(parent) = flattened_parent.as_deref()
        && let Some(parent_node) = graph.get_node_mut(parent)
    {
        let restored: Vec<&str> = snapshot.iter().map(|node| node.guid.as_str()).collect();
        parent_node
            .children
            .retain(|child| !restored.contains(&child.as_str()));
    }

    // Snapshot entries carry their original parent_guid, children order
    // and positions; reinserting them wholesale is the exact restore.
    let direct_children: Vec<String> = snapshot
        .iter()
        .filter(|node| node.parent_guid.as_deref() == Some(guid))
        .map(|node| node.guid.clone())
        .collect();
    for node in snapshot {
        graph.nodes.insert(node.guid.clone(), node);
    }

    let node = graph.get_node_mut(guid).expect("target resolved above");
    node.children = direct_children;
    node.metadata.per_node_flattened = false;
    graph.bump_version();
    true
}

/// Collapse/expand. Distinct from flatten: only the `expanded` flag moves,
/// and edges synthesized by a prior flatten are left exactly as they are.
pub fn set_expanded(graph: &mut ViewGraph, guid: &str, expanded: bool) -> bool {
    let Some(node) = graph.get_node_mut(guid) else {
        warn!("set_expanded: unknown node '{guid}'");
        return false;
    };
    if node.expanded == expanded {
        return false;
    }
    node.expanded = expanded;
    graph.bump_version();
    true
}

/// Read path for the renderer: nodes whose every ancestor is expanded.
/// A collapsed container is itself visible; its subtree is not.
pub fn visible_nodes(graph: &ViewGraph) -> Vec<&Node> {
    let mut visible = Vec::new();
    let mut stack: Vec<&Node> = graph.roots();
    stack.reverse();
    while let Some(node) = stack.pop() {
        visible.push(node);
        if node.expanded {
            for child in node.children.iter().rev() {
                if let Some(child_node) = graph.get_node(child) {
                    stack.push(child_node);
                }
            }
        }
    }
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DisplayMode, GroupType, Point};

    fn node_at(guid: &str, parent: Option<&str>, x: f32, y: f32) -> Node {
        let mut node = Node::new(guid, GroupType::Item);
        node.parent_guid = parent.map(str::to_string);
        node.position = Point::new(x, y);
        node
    }

    fn two_child_graph() -> ViewGraph {
        let mut graph = ViewGraph::new(DisplayMode::Containment);
        let mut parent = Node::new("parent", GroupType::Container);
        parent.position = Point::new(24.0, 24.0);
        graph.insert_node(parent);
        graph.insert_node(node_at("child-a", Some("parent"), 48.0, 48.0));
        graph.insert_node(node_at("child-b", Some("parent"), 48.0, 320.0));
        graph
    }

    fn contains_edges(graph: &ViewGraph) -> Vec<(&str, &str)> {
        graph
            .edges
            .iter()
            .filter(|edge| edge.is_containment())
            .map(|edge| (edge.from_guid.as_str(), edge.to_guid.as_str()))
            .collect()
    }

    #[test]
    fn flatten_synthesizes_one_edge_per_severed_relation() {
        let mut graph = two_child_graph();
        assert!(flatten(&mut graph, "parent"));

        let edges = contains_edges(&graph);
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&("parent", "child-a")));
        assert!(edges.contains(&("parent", "child-b")));

        for guid in ["child-a", "child-b"] {
            let node = graph.get_node(guid).unwrap();
            assert_eq!(node.parent_guid, None, "{guid} should join the root plane");
        }
        assert!(graph.get_node("parent").unwrap().metadata.per_node_flattened);
    }

    #[test]
    fn flatten_is_idempotent() {
        let mut graph = two_child_graph();
        assert!(flatten(&mut graph, "parent"));
        let version = graph.version;
        let edges = graph.edges.clone();

        assert!(!flatten(&mut graph, "parent"));
        assert_eq!(graph.version, version);
        assert_eq!(graph.edges, edges);
    }

    #[test]
    fn unflatten_restores_the_subtree_exactly() {
        let mut graph = two_child_graph();
        let before = graph.clone();

        assert!(flatten(&mut graph, "parent"));
        assert!(unflatten(&mut graph, "parent"));

        assert_eq!(graph.nodes, before.nodes);
        assert_eq!(graph.edges, before.edges);
    }

    #[test]
    fn unflatten_reverts_positions_dragged_while_flat() {
        let mut graph = two_child_graph();
        flatten(&mut graph, "parent");
        graph.get_node_mut("child-a").unwrap().position = Point::new(800.0, 400.0);

        unflatten(&mut graph, "parent");

        assert_eq!(
            graph.get_node("child-a").unwrap().position,
            Point::new(48.0, 48.0)
        );
    }

    #[test]
    fn deep_subtrees_get_edges_from_their_own_parent() {
        let mut graph = ViewGraph::new(DisplayMode::Containment);
        graph.insert_node(Node::new("root", GroupType::Container));
        let mut mid = node_at("mid", Some("root"), 10.0, 10.0);
        mid.group_type = GroupType::Container;
        graph.insert_node(mid);
        graph.insert_node(node_at("leaf", Some("mid"), 20.0, 20.0));

        flatten(&mut graph, "root");

        let edges = contains_edges(&graph);
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&("root", "mid")));
        assert!(edges.contains(&("mid", "leaf")));
        assert_eq!(graph.get_node("leaf").unwrap().parent_guid, None);
    }

    #[test]
    fn collapse_expand_preserves_generated_edge_set() {
        let mut graph = two_child_graph();
        let mut sibling = Node::new("sibling", GroupType::Container);
        sibling.position = Point::new(500.0, 24.0);
        graph.insert_node(sibling);

        flatten(&mut graph, "parent");
        let edges_after_flatten = contains_edges(&graph)
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect::<Vec<_>>();

        set_expanded(&mut graph, "sibling", false);
        set_expanded(&mut graph, "sibling", true);

        let edges_now = contains_edges(&graph)
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect::<Vec<_>>();
        assert_eq!(edges_now, edges_after_flatten);
    }

    #[test]
    fn collapsed_subtree_is_hidden_but_container_stays_visible() {
        let mut graph = two_child_graph();
        set_expanded(&mut graph, "parent", false);

        let visible: Vec<&str> = visible_nodes(&graph)
            .iter()
            .map(|node| node.guid.as_str())
            .collect();
        assert!(visible.contains(&"parent"));
        assert!(!visible.contains(&"child-a"));
        assert!(!visible.contains(&"child-b"));
    }

    #[test]
    fn non_generated_edges_survive_the_round_trip() {
        let mut graph = two_child_graph();
        graph
            .add_edge(Edge {
                id: "dep-1".to_string(),
                from_guid: "child-a".to_string(),
                to_guid: "child-b".to_string(),
                label: Some("calls".to_string()),
                relation_type: "depends_on".to_string(),
                style: EdgeStyle::Solid,
            })
            .unwrap();

        flatten(&mut graph, "parent");
        assert!(graph.edges.iter().any(|edge| edge.id == "dep-1"));
        unflatten(&mut graph, "parent");
        assert!(graph.edges.iter().any(|edge| edge.id == "dep-1"));
    }
}
