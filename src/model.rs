use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::GraphError;

/// Relation tag that encodes visual nesting. Comparison is always
/// case-insensitive (`contains`, `Contains` and `CONTAINS` are the same
/// relation on the wire).
pub const CONTAINS_RELATION: &str = "CONTAINS";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

impl Size {
    pub fn new(w: f32, h: f32) -> Self {
        Self { w, h }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    Container,
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Containment,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// May arrive empty on a wire patch; the delta pipeline backfills it
    /// from the frame's guid before the edge is stored.
    #[serde(default)]
    pub id: String,
    pub from_guid: String,
    pub to_guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub relation_type: String,
    #[serde(default)]
    pub style: EdgeStyle,
}

impl Edge {
    pub fn is_containment(&self) -> bool {
        self.relation_type.eq_ignore_ascii_case(CONTAINS_RELATION)
    }

    pub fn touches(&self, guid: &str) -> bool {
        self.from_guid == guid || self.to_guid == guid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub pan_x: f32,
    pub pan_y: f32,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Open per-node metadata. The three recognized fields drive the flatten
/// transform; everything else round-trips verbatim through `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "is_false")]
    pub per_node_flattened: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flattened_children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_edges: Vec<Edge>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl NodeMetadata {
    pub fn is_empty(&self) -> bool {
        !self.per_node_flattened
            && self.flattened_children.is_empty()
            && self.generated_edges.is_empty()
            && self.extra.is_empty()
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_guid: Option<String>,
    /// Ordered child index. Derived from `parent_guid`; rebuilt after bulk
    /// loads, maintained incrementally by the mutation primitives.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default)]
    pub position: Point,
    #[serde(default)]
    pub size: Size,
    pub group_type: GroupType,
    #[serde(default = "default_true")]
    pub expanded: bool,
    #[serde(default, skip_serializing_if = "NodeMetadata::is_empty")]
    pub metadata: NodeMetadata,
}

impl Node {
    pub fn new(guid: impl Into<String>, group_type: GroupType) -> Self {
        Self {
            guid: guid.into(),
            parent_guid: None,
            children: Vec::new(),
            position: Point::default(),
            size: Size::default(),
            group_type,
            expanded: true,
            metadata: NodeMetadata::default(),
        }
    }

    pub fn is_container(&self) -> bool {
        self.group_type == GroupType::Container
    }
}

/// Deserializes a present-but-possibly-null field into `Some(inner)`,
/// letting `NodePatch` tell "absent" apart from "set to null".
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update for a single node. Absent fields leave the live node
/// untouched; a patch carrying only `guid` and `position` must not erase
/// metadata or reparent anything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default)]
    pub guid: String,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_guid: Option<Option<String>>,
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default)]
    pub group_type: Option<GroupType>,
    #[serde(default)]
    pub expanded: Option<bool>,
    #[serde(default)]
    pub metadata: Option<NodeMetadata>,
}

impl NodePatch {
    pub fn position(guid: impl Into<String>, position: Point) -> Self {
        Self {
            guid: guid.into(),
            position: Some(position),
            ..Self::default()
        }
    }
}

/// The aggregate root for one view: a flat arena of nodes keyed by guid
/// (canonical ownership), the edge list, and the camera. The tree shape is
/// carried by `parent_guid` with `children` as a derived ordered index.
///
/// Every mutation primitive bumps `version`; loading a snapshot does not.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewGraph {
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
    pub camera: Camera,
    pub display_mode: DisplayMode,
    pub version: u64,
}

impl ViewGraph {
    pub fn new(display_mode: DisplayMode) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            camera: Camera::default(),
            display_mode,
            version: 0,
        }
    }

    pub fn get_node(&self, guid: &str) -> Option<&Node> {
        self.nodes.get(guid)
    }

    pub(crate) fn get_node_mut(&mut self, guid: &str) -> Option<&mut Node> {
        self.nodes.get_mut(guid)
    }

    pub fn list_edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn roots(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|node| node.parent_guid.is_none())
            .collect()
    }

    pub fn children_of(&self, guid: &str) -> &[String] {
        self.nodes
            .get(guid)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Preorder guids of the subtree below `guid`, excluding `guid` itself.
    pub fn descendants(&self, guid: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<String> = self.children_of(guid).to_vec();
        stack.reverse();
        while let Some(current) = stack.pop() {
            let children = self.children_of(&current);
            for child in children.iter().rev() {
                stack.push(child.clone());
            }
            out.push(current);
        }
        out
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Raises the version to a source-supplied stamp without going through
    /// a local bump. Never lowers it.
    pub(crate) fn adopt_version(&mut self, version: u64) {
        if version > self.version {
            self.version = version;
        }
    }

    /// Pins the version to the stream's stamp at the end of a merge.
    /// Mutation primitives bump the version while a delta is being
    /// folded in; the stamp is authoritative once the merge completes,
    /// otherwise the next in-order frame would look stale.
    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Inserts a fully-formed node, attaching it to its parent's child
    /// index. Replaces any existing node with the same guid wholesale.
    pub fn insert_node(&mut self, node: Node) {
        let guid = node.guid.clone();
        let parent = node.parent_guid.clone();
        if let Some(previous) = self.nodes.insert(guid.clone(), node) {
            if previous.parent_guid != parent {
                self.detach_from_parent(previous.parent_guid.as_deref(), &guid);
            }
        }
        self.attach_to_parent(parent.as_deref(), &guid);
        self.bump_version();
    }

    /// Applies a partial patch, creating the node when it does not exist.
    /// Fields absent from the patch are preserved exactly.
    pub fn upsert_node(&mut self, patch: NodePatch) {
        if let Some(node) = self.nodes.get_mut(&patch.guid) {
            let old_parent = node.parent_guid.clone();
            if let Some(position) = patch.position {
                node.position = position;
            }
            if let Some(size) = patch.size {
                node.size = size;
            }
            if let Some(group_type) = patch.group_type {
                node.group_type = group_type;
            }
            if let Some(expanded) = patch.expanded {
                node.expanded = expanded;
            }
            if let Some(metadata) = patch.metadata {
                node.metadata = metadata;
            }
            if let Some(new_parent) = patch.parent_guid {
                if new_parent != old_parent {
                    node.parent_guid = new_parent.clone();
                    let guid = patch.guid.clone();
                    self.detach_from_parent(old_parent.as_deref(), &guid);
                    self.attach_to_parent(new_parent.as_deref(), &guid);
                }
            }
            self.bump_version();
        } else {
            let mut node = Node::new(
                patch.guid.clone(),
                patch.group_type.unwrap_or(GroupType::Item),
            );
            node.parent_guid = patch.parent_guid.flatten();
            if let Some(position) = patch.position {
                node.position = position;
            }
            if let Some(size) = patch.size {
                node.size = size;
            }
            if let Some(expanded) = patch.expanded {
                node.expanded = expanded;
            }
            if let Some(metadata) = patch.metadata {
                node.metadata = metadata;
            }
            self.insert_node(node);
        }
    }

    /// Removes a node, promoting its children to the removed node's parent
    /// so the tree stays consistent. Edges are the caller's concern
    /// (`remove_edges_touching`).
    pub fn remove_node(&mut self, guid: &str) -> Option<Node> {
        let node = self.nodes.remove(guid)?;
        self.detach_from_parent(node.parent_guid.as_deref(), guid);
        let orphans = node.children.clone();
        for child_guid in &orphans {
            if let Some(child) = self.nodes.get_mut(child_guid) {
                child.parent_guid = node.parent_guid.clone();
            }
            self.attach_to_parent(node.parent_guid.as_deref(), child_guid);
        }
        self.bump_version();
        Some(node)
    }

    /// Adds an edge after checking both endpoints resolve. Dangling edges
    /// are never stored.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&edge.from_guid) {
            return Err(GraphError::dangling(
                format!("edge '{}'", edge.id),
                edge.from_guid,
            ));
        }
        if !self.nodes.contains_key(&edge.to_guid) {
            return Err(GraphError::dangling(
                format!("edge '{}'", edge.id),
                edge.to_guid,
            ));
        }
        self.edges.push(edge);
        self.bump_version();
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let index = self.edges.iter().position(|edge| edge.id == id)?;
        let edge = self.edges.remove(index);
        self.bump_version();
        Some(edge)
    }

    pub fn remove_edges_touching(&mut self, guid: &str) -> Vec<Edge> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.edges.len());
        for edge in self.edges.drain(..) {
            if edge.touches(guid) {
                removed.push(edge);
            } else {
                kept.push(edge);
            }
        }
        self.edges = kept;
        if !removed.is_empty() {
            self.bump_version();
        }
        removed
    }

    /// Recomputes every `children` index from the canonical `parent_guid`
    /// fields. Stored child order is kept where it still matches; children
    /// the index missed are appended in arena order.
    pub fn rebuild_children_index(&mut self) {
        let mut by_parent: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for node in self.nodes.values() {
            if let Some(parent) = &node.parent_guid {
                by_parent
                    .entry(parent.clone())
                    .or_default()
                    .push(node.guid.clone());
            }
        }
        let guids: Vec<String> = self.nodes.keys().cloned().collect();
        for guid in guids {
            let actual = by_parent.remove(&guid).unwrap_or_default();
            let node = self.nodes.get_mut(&guid).expect("guid came from the map");
            let mut ordered: Vec<String> = node
                .children
                .iter()
                .filter(|child| actual.contains(*child))
                .cloned()
                .collect();
            for child in actual {
                if !ordered.contains(&child) {
                    ordered.push(child);
                }
            }
            node.children = ordered;
        }
    }

    /// Moves a node and its live subtree by the same offset.
    pub fn translate_subtree(&mut self, guid: &str, dx: f32, dy: f32) -> bool {
        if !self.nodes.contains_key(guid) {
            return false;
        }
        let mut targets = vec![guid.to_string()];
        targets.extend(self.descendants(guid));
        for target in &targets {
            if let Some(node) = self.nodes.get_mut(target) {
                node.position.x += dx;
                node.position.y += dy;
            }
        }
        self.bump_version();
        true
    }

    fn attach_to_parent(&mut self, parent: Option<&str>, guid: &str) {
        if let Some(parent_guid) = parent
            && let Some(parent_node) = self.nodes.get_mut(parent_guid)
            && !parent_node.children.iter().any(|child| child == guid)
        {
            parent_node.children.push(guid.to_string());
        }
    }

    fn detach_from_parent(&mut self, parent: Option<&str>, guid: &str) {
        if let Some(parent_guid) = parent
            && let Some(parent_node) = self.nodes.get_mut(parent_guid)
        {
            parent_node.children.retain(|child| child != guid);
        }
    }
}
