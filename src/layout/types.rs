use serde::{Deserialize, Serialize};

use crate::model::{Camera, GroupType, Node, CONTAINS_RELATION};

/// Raw entity as delivered by the backing store, before any position
/// exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: GroupType,
    /// Deterministic sibling ordering key; entities without one keep
    /// their input order after the keyed ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_guid: String,
    pub to_guid: String,
    pub relation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Relationship {
    pub fn is_containment(&self) -> bool {
        self.relation_type.eq_ignore_ascii_case(CONTAINS_RELATION)
    }
}

/// One backing-store document: the unpositioned graph a layout engine
/// turns into a `ViewGraph`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Output of a layout engine pass: positioned nodes plus the starting
/// camera. Engines are pure; the runtime owns folding this into a
/// `ViewGraph`.
#[derive(Debug, Clone)]
pub struct LayoutResult {
    pub nodes: Vec<Node>,
    pub camera: Camera,
}
