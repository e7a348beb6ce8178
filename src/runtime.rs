use log::warn;

use crate::config::LayoutConfig;
use crate::delta::{ChangeSet, DeltaPipeline, ServerMessage, SubscriptionState};
use crate::error::GraphError;
use crate::flatten;
use crate::layout::{apply_layout, EngineKind, GraphDocument, Relationship};
use crate::model::{Edge, EdgeStyle, Node, Point, Size, ViewGraph};
use crate::snapshot::{self, Snapshot};

const ZOOM_MIN: f32 = 0.1;
const ZOOM_MAX: f32 = 10.0;

#[derive(Debug, Clone)]
struct DragState {
    guid: String,
    /// Pointer offset from the node origin at grab time, so the node
    /// doesn't jump under the cursor.
    grab: Point,
}

/// Transient interaction state. Never serialized; a snapshot taken
/// mid-drag carries only the node positions as they stand.
#[derive(Debug, Clone, Default)]
pub struct InteractionState {
    pub selected: Option<String>,
    pub hovered: Option<String>,
    drag: Option<DragState>,
}

/// The owner of one view's graph. Everything that mutates the
/// `ViewGraph` goes through here; the renderer and UI read
/// `runtime.graph()` and hand intent (drag, flatten, save) back through
/// these operations. One instance per view, no ambient state.
pub struct LayoutRuntime {
    graph: ViewGraph,
    config: LayoutConfig,
    engine: EngineKind,
    pipeline: DeltaPipeline,
    interaction: InteractionState,
}

impl LayoutRuntime {
    pub fn new(engine: EngineKind, config: LayoutConfig) -> Self {
        Self {
            graph: ViewGraph::new(engine.display_mode()),
            config,
            engine,
            pipeline: DeltaPipeline::new(),
            interaction: InteractionState::default(),
        }
    }

    pub fn graph(&self) -> &ViewGraph {
        &self.graph
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    /// Initial load: one engine pass over the raw document, then edges.
    /// Relationships that aren't containment always become edges;
    /// containment itself becomes edges only in the flat presentation,
    /// where nesting can't show it.
    pub fn load(&mut self, document: &GraphDocument) {
        let result = apply_layout(
            self.engine,
            &document.entities,
            &document.relationships,
            &self.config,
        );
        let mut graph = ViewGraph::new(self.engine.display_mode());
        graph.camera = result.camera;
        for node in result.nodes {
            graph.nodes.insert(node.guid.clone(), node);
        }
        graph.rebuild_children_index();

        for (index, relationship) in document.relationships.iter().enumerate() {
            if relationship.is_containment() && self.engine == EngineKind::Containment {
                continue;
            }
            let edge = relationship_edge(relationship, index);
            if let Err(error) = graph.add_edge(edge) {
                warn!("load: {error}");
            }
        }

        graph.version = 1;
        self.graph = graph;
        self.interaction = InteractionState::default();
    }

    /// Explicit re-layout, e.g. when the user switches the global display
    /// mode. Never triggered implicitly by loads or deltas.
    pub fn relayout(&mut self, engine: EngineKind, document: &GraphDocument) {
        let version = self.graph.version;
        self.engine = engine;
        self.load(document);
        self.graph.adopt_version(version);
        self.graph.bump_version();
    }

    // ----- Interaction -----

    pub fn begin_drag(&mut self, guid: &str, pointer: Point) -> bool {
        let Some(node) = self.graph.get_node(guid) else {
            return false;
        };
        self.interaction.drag = Some(DragState {
            guid: guid.to_string(),
            grab: Point::new(pointer.x - node.position.x, pointer.y - node.position.y),
        });
        true
    }

    /// Moves the dragged node (and its whole live subtree) under the
    /// pointer.
    pub fn drag_to(&mut self, pointer: Point) -> bool {
        let Some(drag) = self.interaction.drag.clone() else {
            return false;
        };
        let Some(node) = self.graph.get_node(&drag.guid) else {
            self.interaction.drag = None;
            return false;
        };
        let dx = pointer.x - drag.grab.x - node.position.x;
        let dy = pointer.y - drag.grab.y - node.position.y;
        if dx == 0.0 && dy == 0.0 {
            return true;
        }
        self.graph.translate_subtree(&drag.guid, dx, dy)
    }

    pub fn end_drag(&mut self) {
        self.interaction.drag = None;
    }

    pub fn resize(&mut self, guid: &str, size: Size) -> bool {
        let Some(node) = self.graph.get_node_mut(guid) else {
            return false;
        };
        if node.size == size {
            return false;
        }
        node.size = size;
        self.graph.bump_version();
        true
    }

    pub fn select(&mut self, guid: Option<&str>) {
        self.interaction.selected = guid.map(str::to_string);
    }

    pub fn hover(&mut self, guid: Option<&str>) {
        self.interaction.hovered = guid.map(str::to_string);
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.graph.camera.pan_x += dx;
        self.graph.camera.pan_y += dy;
    }

    /// Zoom is UI-bounded here at the interaction entry point; the model
    /// itself stores whatever it is given.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.graph.camera.zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
    }

    // ----- Containment toggle -----

    pub fn flatten(&mut self, guid: &str) -> bool {
        flatten::flatten(&mut self.graph, guid)
    }

    pub fn unflatten(&mut self, guid: &str) -> bool {
        flatten::unflatten(&mut self.graph, guid)
    }

    pub fn set_expanded(&mut self, guid: &str, expanded: bool) -> bool {
        flatten::set_expanded(&mut self.graph, guid, expanded)
    }

    pub fn visible_nodes(&self) -> Vec<&Node> {
        flatten::visible_nodes(&self.graph)
    }

    // ----- Delta stream -----

    pub fn subscription_state(&self) -> SubscriptionState {
        self.pipeline.state()
    }

    /// Opens the subscription and returns the frame to send upstream.
    pub fn subscribe(&mut self, view_id: &str) -> crate::delta::ClientMessage {
        self.pipeline.subscribe();
        crate::delta::ClientMessage::SubscribeGraphChanges {
            view_id: view_id.to_string(),
        }
    }

    pub fn unsubscribe(&mut self, view_id: &str) -> crate::delta::ClientMessage {
        self.pipeline.unsubscribe();
        crate::delta::ClientMessage::UnsubscribeGraphChanges {
            view_id: view_id.to_string(),
        }
    }

    /// Feeds one server frame through the pipeline. Interaction handles
    /// pointing at nodes a delta removed are cleared so they cannot
    /// dangle.
    pub fn handle_message(&mut self, message: &ServerMessage) -> ChangeSet {
        let changes = match message {
            ServerMessage::GraphSubscriptionAck => {
                self.pipeline.acknowledge();
                ChangeSet::default()
            }
            ServerMessage::GraphDelta(delta) => {
                self.pipeline.apply(&mut self.graph, &self.config, delta)
            }
        };
        self.drop_dead_interaction();
        changes
    }

    // ----- Persistence -----

    /// Point-in-time snapshot; the live graph stays fully mutable while
    /// the caller ships this over the wire.
    pub fn save(&self) -> Snapshot {
        snapshot::save(&self.graph)
    }

    /// Replaces the graph from a snapshot without running any layout.
    /// On failure the current graph stays active and untouched.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<(), GraphError> {
        let graph = snapshot::load(snapshot)?;
        self.graph = graph;
        self.interaction = InteractionState::default();
        Ok(())
    }

    fn drop_dead_interaction(&mut self) {
        if let Some(selected) = &self.interaction.selected
            && self.graph.get_node(selected).is_none()
        {
            self.interaction.selected = None;
        }
        if let Some(hovered) = &self.interaction.hovered
            && self.graph.get_node(hovered).is_none()
        {
            self.interaction.hovered = None;
        }
        if let Some(drag) = &self.interaction.drag
            && self.graph.get_node(&drag.guid).is_none()
        {
            self.interaction.drag = None;
        }
    }
}

fn relationship_edge(relationship: &Relationship, index: usize) -> Edge {
    let style = if relationship.is_containment() {
        EdgeStyle::Dashed
    } else {
        EdgeStyle::Solid
    };
    Edge {
        id: format!("rel-{index}"),
        from_guid: relationship.from_guid.clone(),
        to_guid: relationship.to_guid.clone(),
        label: relationship.label.clone(),
        relation_type: relationship.relation_type.clone(),
        style,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{DeltaOp, DeltaTarget, GraphDelta};
    use crate::layout::Entity;
    use crate::model::GroupType;

    fn document() -> GraphDocument {
        let entity = |guid: &str, kind: GroupType| Entity {
            guid: guid.to_string(),
            label: None,
            kind,
            sort_key: None,
        };
        GraphDocument {
            entities: vec![
                entity("org", GroupType::Container),
                entity("svc-a", GroupType::Item),
                entity("svc-b", GroupType::Item),
            ],
            relationships: vec![
                Relationship {
                    from_guid: "org".to_string(),
                    to_guid: "svc-a".to_string(),
                    relation_type: "CONTAINS".to_string(),
                    label: None,
                },
                Relationship {
                    from_guid: "org".to_string(),
                    to_guid: "svc-b".to_string(),
                    relation_type: "contains".to_string(),
                    label: None,
                },
                Relationship {
                    from_guid: "svc-a".to_string(),
                    to_guid: "svc-b".to_string(),
                    relation_type: "calls".to_string(),
                    label: Some("rpc".to_string()),
                },
            ],
        }
    }

    fn loaded_runtime() -> LayoutRuntime {
        let mut runtime = LayoutRuntime::new(EngineKind::Containment, LayoutConfig::default());
        runtime.load(&document());
        runtime
    }

    #[test]
    fn containment_load_keeps_nesting_out_of_the_edge_list() {
        let runtime = loaded_runtime();
        assert_eq!(runtime.graph().edges.len(), 1);
        assert_eq!(runtime.graph().edges[0].relation_type, "calls");
        assert_eq!(
            runtime.graph().get_node("svc-a").unwrap().parent_guid.as_deref(),
            Some("org")
        );
    }

    #[test]
    fn flat_load_synthesizes_containment_edges_instead() {
        let mut runtime = LayoutRuntime::new(EngineKind::Flat, LayoutConfig::default());
        runtime.load(&document());
        let contains: Vec<_> = runtime
            .graph()
            .edges
            .iter()
            .filter(|edge| edge.is_containment())
            .collect();
        assert_eq!(contains.len(), 2);
        assert!(runtime.graph().roots().len() == 3);
    }

    #[test]
    fn dragging_a_container_carries_its_subtree() {
        let mut runtime = loaded_runtime();
        let org = runtime.graph().get_node("org").unwrap().position;
        let child = runtime.graph().get_node("svc-a").unwrap().position;

        assert!(runtime.begin_drag("org", Point::new(org.x + 4.0, org.y + 4.0)));
        assert!(runtime.drag_to(Point::new(org.x + 54.0, org.y + 24.0)));
        runtime.end_drag();

        let org_after = runtime.graph().get_node("org").unwrap().position;
        let child_after = runtime.graph().get_node("svc-a").unwrap().position;
        assert_eq!(org_after, Point::new(org.x + 50.0, org.y + 20.0));
        assert_eq!(child_after, Point::new(child.x + 50.0, child.y + 20.0));
    }

    #[test]
    fn dragged_flattened_child_position_survives_save_and_restore() {
        let mut runtime = loaded_runtime();
        runtime.flatten("org");

        let start = runtime.graph().get_node("svc-a").unwrap().position;
        runtime.begin_drag("svc-a", start);
        runtime.drag_to(Point::new(800.0, 400.0));
        runtime.end_drag();

        let snapshot = runtime.save();
        let mut reloaded = LayoutRuntime::new(EngineKind::Containment, LayoutConfig::default());
        reloaded.restore(snapshot).unwrap();

        assert_eq!(
            reloaded.graph().get_node("svc-a").unwrap().position,
            Point::new(800.0, 400.0)
        );
        assert!(reloaded.graph().get_node("org").unwrap().metadata.per_node_flattened);
    }

    #[test]
    fn restore_failure_keeps_the_previous_graph_active() {
        let mut runtime = loaded_runtime();
        let before_version = runtime.graph().version;
        let mut bad = runtime.save();
        bad.camera.zoom = 0.0;

        assert!(runtime.restore(bad).is_err());
        assert_eq!(runtime.graph().version, before_version);
        assert!(runtime.graph().get_node("org").is_some());
    }

    #[test]
    fn restore_does_not_touch_the_version() {
        let mut runtime = loaded_runtime();
        runtime.resize("svc-a", Size::new(10.0, 10.0));
        let version = runtime.graph().version;

        let snapshot = runtime.save();
        let mut reloaded = LayoutRuntime::new(EngineKind::Containment, LayoutConfig::default());
        reloaded.restore(snapshot).unwrap();

        assert_eq!(reloaded.graph().version, version);
    }

    #[test]
    fn delta_for_removed_selection_clears_interaction() {
        let mut runtime = loaded_runtime();
        runtime.subscribe("view-1");
        runtime.handle_message(&ServerMessage::GraphSubscriptionAck);
        runtime.select(Some("svc-b"));

        let version = runtime.graph().version;
        runtime.handle_message(&ServerMessage::GraphDelta(GraphDelta {
            version: version + 1,
            op: DeltaOp::Remove,
            target: DeltaTarget::Node,
            guid: "svc-b".to_string(),
            patch: serde_json::Value::Null,
        }));

        assert!(runtime.graph().get_node("svc-b").is_none());
        assert_eq!(runtime.interaction().selected, None);
    }

    #[test]
    fn zoom_is_clamped_at_the_interaction_boundary() {
        let mut runtime = loaded_runtime();
        runtime.set_zoom(99.0);
        assert_eq!(runtime.graph().camera.zoom, 10.0);
        runtime.set_zoom(0.0);
        assert_eq!(runtime.graph().camera.zoom, 0.1);
    }
}
