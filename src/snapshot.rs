use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::model::{Camera, DisplayMode, Edge, Node, ViewGraph};

/// Persisted form of a `ViewGraph`: every node's position, size and
/// flatten metadata (nodes hidden by collapse included), the edge list,
/// the camera, and the version the graph had when it was saved. The
/// version is opaque here; it rides along so a load can prove no layout
/// ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u64,
    pub display_mode: DisplayMode,
    pub camera: Camera,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Point-in-time copy of the graph. Interaction state (selection, hover,
/// drag) lives in the runtime, not the model, so nothing needs stripping
/// here; later mutation of the live graph cannot tear this copy.
pub fn save(graph: &ViewGraph) -> Snapshot {
    Snapshot {
        version: graph.version,
        display_mode: graph.display_mode,
        camera: graph.camera,
        nodes: graph.nodes.values().cloned().collect(),
        edges: graph.edges.clone(),
    }
}

/// Rebuilds a `ViewGraph` from a snapshot without invoking any layout
/// engine: positions, sizes and flatten metadata come back exactly as
/// saved and the version is carried through unchanged.
///
/// A snapshot that cannot be a coherent graph (blank or duplicate guids,
/// a parent that resolves nowhere, a non-positive zoom) is rejected;
/// callers keep their previous `ViewGraph`. Dangling edges are dropped
/// with a warning rather than rendered.
pub fn load(snapshot: Snapshot) -> Result<ViewGraph, GraphError> {
    if snapshot.camera.zoom <= 0.0 {
        return Err(GraphError::CorruptSnapshot(format!(
            "zoom must be positive, got {}",
            snapshot.camera.zoom
        )));
    }

    let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
    for node in snapshot.nodes {
        if node.guid.is_empty() {
            return Err(GraphError::CorruptSnapshot(
                "node with empty guid".to_string(),
            ));
        }
        if nodes.insert(node.guid.clone(), node).is_some() {
            return Err(GraphError::CorruptSnapshot(
                "duplicate node guid".to_string(),
            ));
        }
    }
    for node in nodes.values() {
        if let Some(parent) = &node.parent_guid
            && !nodes.contains_key(parent)
        {
            return Err(GraphError::CorruptSnapshot(format!(
                "node '{}' references missing parent '{parent}'",
                node.guid
            )));
        }
    }

    let mut edges = Vec::with_capacity(snapshot.edges.len());
    for edge in snapshot.edges {
        if nodes.contains_key(&edge.from_guid) && nodes.contains_key(&edge.to_guid) {
            edges.push(edge);
        } else {
            warn!("snapshot edge '{}' dropped: dangling endpoint", edge.id);
        }
    }

    let mut graph = ViewGraph {
        nodes,
        edges,
        camera: snapshot.camera,
        display_mode: snapshot.display_mode,
        version: snapshot.version,
    };
    graph.rebuild_children_index();
    graph.version = snapshot.version;
    Ok(graph)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub id: String,
    pub message: String,
}

/// Storage behind the save/load calls. Failures never touch the
/// in-memory graph and are never retried here; retry policy belongs to
/// the transport.
pub trait SnapshotStore {
    fn save(&self, view_id: &str, snapshot: &Snapshot) -> Result<SaveReceipt, GraphError>;
    fn load(&self, view_id: &str) -> Result<Option<Snapshot>, GraphError>;
}

/// One pretty-printed JSON file per view under a root directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, view_id: &str) -> PathBuf {
        self.root.join(format!("{view_id}.json"))
    }
}

impl SnapshotStore for FileStore {
    fn save(&self, view_id: &str, snapshot: &Snapshot) -> Result<SaveReceipt, GraphError> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(view_id);
        let file = File::create(&path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, snapshot)?;
        Ok(SaveReceipt {
            id: view_id.to_string(),
            message: format!("saved {}", path.display()),
        })
    }

    fn load(&self, view_id: &str) -> Result<Option<Snapshot>, GraphError> {
        let path = self.path_for(view_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let snapshot = serde_json::from_str(&contents)
            .map_err(|error| GraphError::CorruptSnapshot(error.to_string()))?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use crate::model::{GroupType, Point};

    fn sample_graph() -> ViewGraph {
        let mut graph = ViewGraph::new(DisplayMode::Containment);
        let mut parent = Node::new("parent", GroupType::Container);
        parent.position = Point::new(24.0, 24.0);
        graph.insert_node(parent);
        let mut child = Node::new("child", GroupType::Item);
        child.parent_guid = Some("parent".to_string());
        child.position = Point::new(300.0, 250.0);
        graph.insert_node(child);
        graph
    }

    #[test]
    fn round_trip_preserves_positions_and_metadata() {
        let mut graph = sample_graph();
        flatten(&mut graph, "parent");
        graph.get_node_mut("child").unwrap().position = Point::new(800.0, 400.0);

        let restored = load(save(&graph)).unwrap();

        assert_eq!(restored.nodes, graph.nodes);
        assert_eq!(restored.edges, graph.edges);
        assert_eq!(restored.version, graph.version);
    }

    #[test]
    fn serialized_form_is_stable_across_a_reload() {
        let graph = sample_graph();
        let first = serde_json::to_string(&save(&graph)).unwrap();
        let reloaded = load(serde_json::from_str(&first).unwrap()).unwrap();
        let second = serde_json::to_string(&save(&reloaded)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn load_never_bumps_the_version() {
        let graph = sample_graph();
        let version = graph.version;
        let restored = load(save(&graph)).unwrap();
        assert_eq!(restored.version, version);
    }

    #[test]
    fn duplicate_guids_are_rejected() {
        let mut snapshot = save(&sample_graph());
        let clone = snapshot.nodes[0].clone();
        snapshot.nodes.push(clone);
        assert!(matches!(
            load(snapshot),
            Err(GraphError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn missing_parent_is_rejected() {
        let mut snapshot = save(&sample_graph());
        snapshot.nodes.retain(|node| node.guid != "parent");
        assert!(matches!(
            load(snapshot),
            Err(GraphError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn dangling_edges_are_dropped_not_rendered() {
        let mut snapshot = save(&sample_graph());
        snapshot.edges.push(Edge {
            id: "ghost-edge".to_string(),
            from_guid: "parent".to_string(),
            to_guid: "ghost".to_string(),
            label: None,
            relation_type: "depends_on".to_string(),
            style: Default::default(),
        });
        let restored = load(snapshot).unwrap();
        assert!(restored.edges.is_empty());
    }

    #[test]
    fn file_store_round_trips_and_reports_missing_views() {
        let root = std::env::temp_dir().join(format!(
            "viewgraph-store-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let store = FileStore::new(&root);
        let snapshot = save(&sample_graph());

        assert!(store.load("missing").unwrap().is_none());
        let receipt = store.save("view-1", &snapshot).unwrap();
        assert_eq!(receipt.id, "view-1");

        let loaded = store.load("view-1").unwrap().expect("saved above");
        assert_eq!(loaded.version, snapshot.version);
        assert_eq!(loaded.nodes.len(), snapshot.nodes.len());

        std::fs::remove_dir_all(&root).ok();
    }
}
