use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::model::{DisplayMode, ViewGraph};

/// Flattened, serializable mirror of a positioned graph, for CLI output
/// and golden-file comparisons.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub display_mode: DisplayMode,
    pub version: u64,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub guid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_guid: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub group_type: crate::model::GroupType,
    pub expanded: bool,
    pub flattened: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump {
    pub id: String,
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

impl LayoutDump {
    pub fn from_graph(graph: &ViewGraph) -> Self {
        let mut max_x = 0.0f32;
        let mut max_y = 0.0f32;
        let nodes = graph
            .nodes
            .values()
            .map(|node| {
                max_x = max_x.max(node.position.x + node.size.w);
                max_y = max_y.max(node.position.y + node.size.h);
                NodeDump {
                    guid: node.guid.clone(),
                    parent_guid: node.parent_guid.clone(),
                    x: node.position.x,
                    y: node.position.y,
                    width: node.size.w,
                    height: node.size.h,
                    group_type: node.group_type,
                    expanded: node.expanded,
                    flattened: node.metadata.per_node_flattened,
                }
            })
            .collect();

        let edges = graph
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                from: edge.from_guid.clone(),
                to: edge.to_guid.clone(),
                relation_type: edge.relation_type.clone(),
            })
            .collect();

        LayoutDump {
            display_mode: graph.display_mode,
            version: graph.version,
            width: max_x,
            height: max_y,
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(path: &Path, graph: &ViewGraph) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_graph(graph);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
