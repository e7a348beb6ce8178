mod containment;
mod flat;
pub(crate) mod types;
pub use types::*;
use containment::*;
use flat::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{ContainmentConfig, ForceConfig, LayoutConfig};
use crate::error::GraphError;
use crate::model::{Camera, DisplayMode, GroupType, Node, Point, Size, ViewGraph};

/// Closed set of layout engines. Selection by tag is total: an unknown
/// tag is an explicit error, never a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Containment,
    Flat,
}

impl EngineKind {
    pub fn from_tag(tag: &str) -> Result<Self, GraphError> {
        match tag.to_ascii_lowercase().as_str() {
            "containment" | "hierarchical" => Ok(Self::Containment),
            "flat" | "force" => Ok(Self::Flat),
            other => Err(GraphError::UnknownEngine(other.to_string())),
        }
    }

    pub fn display_mode(self) -> DisplayMode {
        match self {
            Self::Containment => DisplayMode::Containment,
            Self::Flat => DisplayMode::Flat,
        }
    }
}

/// Pure layout entry point: same entities and relationships in, same
/// node positions out, for either engine.
pub fn apply_layout(
    engine: EngineKind,
    entities: &[Entity],
    relationships: &[Relationship],
    config: &LayoutConfig,
) -> LayoutResult {
    match engine {
        EngineKind::Containment => compute_containment_layout(entities, relationships, config),
        EngineKind::Flat => compute_flat_layout(entities, relationships, config),
    }
}

/// Position for exactly one node added after the initial pass (a delta
/// "add" without an explicit position). Slots below the current siblings
/// under the same parent; never re-runs layout over the rest of the
/// graph.
pub fn place_new_node(
    graph: &ViewGraph,
    parent_guid: Option<&str>,
    config: &LayoutConfig,
) -> Point {
    let (gap_y, margin) = match graph.display_mode {
        DisplayMode::Containment => (config.containment.gap_y, config.containment.margin),
        DisplayMode::Flat => (config.flat.gap_y, config.flat.margin),
    };

    let siblings: Vec<&Node> = match parent_guid {
        Some(parent) => graph
            .children_of(parent)
            .iter()
            .filter_map(|child| graph.get_node(child))
            .collect(),
        None => graph.roots(),
    };

    if siblings.is_empty() {
        return match parent_guid.and_then(|parent| graph.get_node(parent)) {
            Some(parent) => Point::new(
                parent.position.x + config.containment.padding_x,
                parent.position.y + config.containment.padding_top,
            ),
            None => Point::new(margin, margin),
        };
    }

    let left = siblings
        .iter()
        .map(|node| node.position.x)
        .fold(f32::MAX, f32::min);
    let bottom = siblings
        .iter()
        .map(|node| node.position.y + node.size.h)
        .fold(f32::MIN, f32::max);
    Point::new(left, bottom + gap_y)
}

fn grid_columns(configured: usize, count: usize) -> usize {
    if configured > 0 {
        configured
    } else {
        (count.max(1) as f64).sqrt().ceil() as usize
    }
}

/// Deterministic sibling ordering: stable sort by sort-key, so equal keys
/// (and entities without one) retain their input order.
fn sort_siblings(
    guids: &mut [String],
    known: &HashMap<&str, &Entity>,
    input_order: &HashMap<&str, usize>,
) {
    guids.sort_by(|a, b| {
        let key = |guid: &str| {
            known
                .get(guid)
                .and_then(|entity| entity.sort_key)
                .filter(|key| !key.is_nan())
                .unwrap_or(f64::MAX)
        };
        key(a)
            .partial_cmp(&key(b))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let order = |guid: &str| input_order.get(guid).copied().unwrap_or(usize::MAX);
                order(a).cmp(&order(b))
            })
    });
}
