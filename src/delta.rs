use std::collections::BTreeSet;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::{FlattenedAddPolicy, LayoutConfig};
use crate::error::GraphError;
use crate::flatten::generated_edge_id;
use crate::layout::place_new_node;
use crate::model::{
    Edge, EdgeStyle, GroupType, Node, NodePatch, ViewGraph, CONTAINS_RELATION,
};

/// Client-to-server frames for the delta stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    SubscribeGraphChanges { view_id: String },
    #[serde(rename_all = "camelCase")]
    UnsubscribeGraphChanges { view_id: String },
}

/// Server-to-client frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    GraphSubscriptionAck,
    GraphDelta(GraphDelta),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOp {
    Add,
    Update,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaTarget {
    Node,
    Edge,
}

/// One incremental change notification. `version` is the source's
/// monotonically increasing stamp; `patch` carries only the fields the
/// source wants changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDelta {
    pub version: u64,
    pub op: DeltaOp,
    pub target: DeltaTarget,
    pub guid: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub patch: serde_json::Value,
}

/// Partial update for an edge already in the graph.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgePatch {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub relation_type: Option<String>,
    #[serde(default)]
    pub style: Option<EdgeStyle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Subscribed,
    Receiving,
    Applying,
    Unsubscribed,
}

/// The minimal changed region of one merge, for the renderer. A full
/// redraw is only requested for the first applied delta after a
/// subscription.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub nodes: BTreeSet<String>,
    pub edges: BTreeSet<String>,
    pub full_redraw: bool,
    /// Recoverable problems hit while merging (dangling references,
    /// malformed patches). The delta that raised one is dropped; later
    /// deltas are unaffected.
    pub warnings: Vec<GraphError>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && !self.full_redraw
    }
}

/// Folds an ordered stream of `GraphDelta` frames into a live
/// `ViewGraph` without disturbing anything a delta does not name.
#[derive(Debug)]
pub struct DeltaPipeline {
    state: SubscriptionState,
    first_applied: bool,
}

impl Default for DeltaPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaPipeline {
    pub fn new() -> Self {
        Self {
            state: SubscriptionState::Unsubscribed,
            first_applied: false,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn subscribe(&mut self) {
        self.state = SubscriptionState::Subscribed;
        self.first_applied = false;
    }

    pub fn acknowledge(&mut self) {
        if self.state == SubscriptionState::Subscribed {
            self.state = SubscriptionState::Receiving;
        }
    }

    /// Tears the subscription down; deltas arriving afterwards are
    /// dropped without touching the graph.
    pub fn unsubscribe(&mut self) {
        self.state = SubscriptionState::Unsubscribed;
    }

    pub fn apply(
        &mut self,
        graph: &mut ViewGraph,
        config: &LayoutConfig,
        delta: &GraphDelta,
    ) -> ChangeSet {
        if self.state == SubscriptionState::Unsubscribed {
            debug!("delta for '{}' dropped: unsubscribed", delta.guid);
            return ChangeSet::default();
        }
        if delta.version <= graph.version {
            debug!(
                "stale delta for '{}' discarded (delta v{} <= graph v{})",
                delta.guid, delta.version, graph.version
            );
            return ChangeSet::default();
        }

        self.state = SubscriptionState::Applying;
        let mut changes = ChangeSet::default();
        match delta.target {
            DeltaTarget::Node => self.apply_node(graph, config, delta, &mut changes),
            DeltaTarget::Edge => self.apply_edge(graph, delta, &mut changes),
        }
        graph.set_version(delta.version);
        self.state = SubscriptionState::Receiving;

        if !changes.is_empty() && !self.first_applied {
            self.first_applied = true;
            changes.full_redraw = true;
        }
        changes
    }

    fn apply_node(
        &mut self,
        graph: &mut ViewGraph,
        config: &LayoutConfig,
        delta: &GraphDelta,
        changes: &mut ChangeSet,
    ) {
        match delta.op {
            DeltaOp::Update => {
                let Some(mut patch) = parse_patch::<NodePatch>(delta, changes) else {
                    return;
                };
                patch.guid = delta.guid.clone();
                if graph.get_node(&delta.guid).is_none() {
                    drop_dangling(delta, "node update", changes);
                    return;
                }
                graph.upsert_node(patch);
                changes.nodes.insert(delta.guid.clone());
            }
            DeltaOp::Add => {
                let Some(mut patch) = parse_patch::<NodePatch>(delta, changes) else {
                    return;
                };
                patch.guid = delta.guid.clone();
                self.add_node(graph, config, patch, changes);
            }
            DeltaOp::Remove => {
                if graph.get_node(&delta.guid).is_none() {
                    drop_dangling(delta, "node remove", changes);
                    return;
                }
                let removed_edges = graph.remove_edges_touching(&delta.guid);
                for edge in &removed_edges {
                    changes.edges.insert(edge.id.clone());
                }
                let removed = graph.remove_node(&delta.guid);
                if let Some(node) = removed {
                    if let Some(parent) = node.parent_guid {
                        changes.nodes.insert(parent);
                    }
                }
                repair_flatten_bookkeeping(graph, &delta.guid, changes);
                changes.nodes.insert(delta.guid.clone());
            }
        }
    }

    /// Inserts one new node. With no explicit position the node is slotted
    /// by the single-node placement rule; the rest of the graph is never
    /// re-laid-out.
    fn add_node(
        &mut self,
        graph: &mut ViewGraph,
        config: &LayoutConfig,
        patch: NodePatch,
        changes: &mut ChangeSet,
    ) {
        let guid = patch.guid.clone();
        if graph.get_node(&guid).is_some() {
            graph.upsert_node(patch);
            changes.nodes.insert(guid);
            return;
        }

        let logical_parent = patch.parent_guid.clone().flatten();
        if let Some(parent) = &logical_parent
            && graph.get_node(parent).is_none()
            && find_flatten_host(graph, parent).is_none()
        {
            warn!("node add '{guid}' dropped: unknown parent '{parent}'");
            changes
                .warnings
                .push(GraphError::dangling("node add", parent.clone()));
            return;
        }

        let mut node = Node::new(guid.clone(), patch.group_type.unwrap_or(GroupType::Item));
        node.size = patch.size.unwrap_or_default();
        if let Some(expanded) = patch.expanded {
            node.expanded = expanded;
        }
        if let Some(metadata) = patch.metadata {
            node.metadata = metadata;
        }

        // A parent that is itself flattened (or flattened away inside a
        // host) pulls in the configured placement policy.
        let host = logical_parent
            .as_deref()
            .and_then(|parent| find_flatten_host(graph, parent));
        match (host, config.flattened_add_policy) {
            (Some(host_guid), FlattenedAddPolicy::Sibling) => {
                let logical = logical_parent.clone().expect("host implies a parent");
                let plane_parent = graph
                    .get_node(&host_guid)
                    .and_then(|target| target.parent_guid.clone());
                node.parent_guid = plane_parent;
                node.position = patch
                    .position
                    .unwrap_or_else(|| place_new_node(graph, node.parent_guid.as_deref(), config));
                graph.insert_node(node.clone());

                let edge = Edge {
                    id: generated_edge_id(&logical, &guid),
                    from_guid: logical.clone(),
                    to_guid: guid.clone(),
                    label: None,
                    relation_type: CONTAINS_RELATION.to_string(),
                    style: EdgeStyle::Dashed,
                };
                if graph.add_edge(edge.clone()).is_ok() {
                    changes.edges.insert(edge.id.clone());
                }
                let mut bookkept = node;
                bookkept.parent_guid = Some(logical);
                if let Some(target) = graph.get_node_mut(&host_guid) {
                    target.metadata.flattened_children.push(bookkept);
                    target.metadata.generated_edges.push(edge);
                }
                changes.nodes.insert(host_guid);
            }
            (Some(host_guid), FlattenedAddPolicy::Nested) => {
                // Parked in the bookkeeping; materializes on unflatten.
                node.parent_guid = logical_parent;
                if let Some(position) = patch.position {
                    node.position = position;
                }
                if let Some(target) = graph.get_node_mut(&host_guid) {
                    target.metadata.flattened_children.push(node);
                }
                changes.nodes.insert(host_guid);
                return;
            }
            (None, _) => {
                node.parent_guid = logical_parent;
                node.position = patch
                    .position
                    .unwrap_or_else(|| place_new_node(graph, node.parent_guid.as_deref(), config));
                graph.insert_node(node);
            }
        }
        changes.nodes.insert(guid);
    }

    fn apply_edge(&mut self, graph: &mut ViewGraph, delta: &GraphDelta, changes: &mut ChangeSet) {
        match delta.op {
            DeltaOp::Add => {
                let Some(mut edge) = parse_patch::<Edge>(delta, changes) else {
                    return;
                };
                if edge.id.is_empty() {
                    edge.id = delta.guid.clone();
                }
                let id = edge.id.clone();
                match graph.add_edge(edge) {
                    Ok(()) => {
                        changes.edges.insert(id);
                    }
                    Err(error) => {
                        warn!("edge add '{id}' dropped: {error}");
                        changes.warnings.push(error);
                    }
                }
            }
            DeltaOp::Update => {
                let Some(patch) = parse_patch::<EdgePatch>(delta, changes) else {
                    return;
                };
                let Some(edge) = graph.edges.iter_mut().find(|edge| edge.id == delta.guid)
                else {
                    drop_dangling(delta, "edge update", changes);
                    return;
                };
                if let Some(label) = patch.label {
                    edge.label = Some(label);
                }
                if let Some(relation_type) = patch.relation_type {
                    edge.relation_type = relation_type;
                }
                if let Some(style) = patch.style {
                    edge.style = style;
                }
                graph.bump_version();
                changes.edges.insert(delta.guid.clone());
            }
            DeltaOp::Remove => {
                if graph.remove_edge(&delta.guid).is_some() {
                    changes.edges.insert(delta.guid.clone());
                } else {
                    debug!("edge remove '{}' was already gone", delta.guid);
                }
            }
        }
    }
}

fn parse_patch<T: serde::de::DeserializeOwned>(
    delta: &GraphDelta,
    changes: &mut ChangeSet,
) -> Option<T> {
    match serde_json::from_value(delta.patch.clone()) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!("malformed patch for '{}': {error}", delta.guid);
            changes.warnings.push(GraphError::Encoding(error));
            None
        }
    }
}

fn drop_dangling(delta: &GraphDelta, context: &str, changes: &mut ChangeSet) {
    warn!("{context} for unknown '{}' dropped", delta.guid);
    changes
        .warnings
        .push(GraphError::dangling(context, delta.guid.clone()));
}

/// Finds the flattened node whose plane (or bookkeeping) owns `guid`:
/// either `guid` is itself a flattened target, or it sits inside some
/// target's captured subtree.
fn find_flatten_host(graph: &ViewGraph, guid: &str) -> Option<String> {
    if let Some(node) = graph.get_node(guid)
        && node.metadata.per_node_flattened
    {
        return Some(guid.to_string());
    }
    graph
        .nodes
        .values()
        .find(|node| {
            node.metadata.per_node_flattened
                && node
                    .metadata
                    .flattened_children
                    .iter()
                    .any(|child| child.guid == guid)
        })
        .map(|node| node.guid.clone())
}

/// A removed node may live on inside a flattened target's captured
/// subtree; scrub it (and its synthesized edges) from that bookkeeping so
/// a later unflatten cannot resurrect it.
fn repair_flatten_bookkeeping(graph: &mut ViewGraph, guid: &str, changes: &mut ChangeSet) {
    let hosts: Vec<String> = graph
        .nodes
        .values()
        .filter(|node| {
            node.metadata.per_node_flattened
                && (node
                    .metadata
                    .flattened_children
                    .iter()
                    .any(|child| child.guid == guid || child.parent_guid.as_deref() == Some(guid))
                    || node.metadata.generated_edges.iter().any(|edge| edge.touches(guid)))
        })
        .map(|node| node.guid.clone())
        .collect();
    for host in hosts {
        if let Some(node) = graph.get_node_mut(&host) {
            node.metadata
                .flattened_children
                .retain(|child| child.guid != guid);
            for child in node.metadata.flattened_children.iter_mut() {
                if child.parent_guid.as_deref() == Some(guid) {
                    // Same promotion remove_node applies to live children.
                    child.parent_guid = Some(host.clone());
                }
                child.children.retain(|child_guid| child_guid != guid);
            }
            node.metadata
                .generated_edges
                .retain(|edge| !edge.touches(guid));
            changes.nodes.insert(host.clone());
        }
    }
}
