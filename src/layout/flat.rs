use super::*;

/// Flat layout: every entity becomes a top-level node on a deterministic
/// grid. Hierarchy is ignored here; the runtime synthesizes `CONTAINS`
/// edges so containment stays visible. An optional force relaxation pass
/// runs after the grid when enabled.
pub(super) fn compute_flat_layout(
    entities: &[Entity],
    relationships: &[Relationship],
    config: &LayoutConfig,
) -> LayoutResult {
    let cfg = &config.flat;
    let known: HashMap<&str, &Entity> = entities
        .iter()
        .map(|entity| (entity.guid.as_str(), entity))
        .collect();
    let input_order: HashMap<&str, usize> = entities
        .iter()
        .enumerate()
        .map(|(index, entity)| (entity.guid.as_str(), index))
        .collect();

    let mut ordered: Vec<String> = entities.iter().map(|entity| entity.guid.clone()).collect();
    sort_siblings(&mut ordered, &known, &input_order);

    let columns = grid_columns(cfg.columns, ordered.len());
    let mut nodes = Vec::with_capacity(ordered.len());
    for (index, guid) in ordered.iter().enumerate() {
        let entity = known[guid.as_str()];
        let column = index % columns;
        let row = index / columns;
        let mut node = Node::new(guid.clone(), entity.kind);
        node.position = Point::new(
            cfg.margin + column as f32 * (cfg.cell_width + cfg.gap_x),
            cfg.margin + row as f32 * (cfg.cell_height + cfg.gap_y),
        );
        node.size = Size::new(cfg.cell_width, cfg.cell_height);
        nodes.push(node);
    }

    if cfg.force.enabled {
        relax(&mut nodes, relationships, &cfg.force);
    }

    LayoutResult {
        nodes,
        camera: Camera::default(),
    }
}

/// Damped force relaxation over a fixed iteration budget: inverse-square
/// repulsion between all pairs, springs along relationship edges. The
/// starting grid is deterministic, so the relaxed result is too.
fn relax(nodes: &mut [Node], relationships: &[Relationship], force: &ForceConfig) {
    if nodes.len() <= 1 {
        return;
    }
    let index_of: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.guid.clone(), index))
        .collect();
    let springs: Vec<(usize, usize)> = relationships
        .iter()
        .filter_map(|relationship| {
            let from = *index_of.get(&relationship.from_guid)?;
            let to = *index_of.get(&relationship.to_guid)?;
            (from != to).then_some((from, to))
        })
        .collect();

    let mut velocities = vec![(0.0f32, 0.0f32); nodes.len()];
    for _ in 0..force.iterations {
        let mut forces = vec![(0.0f32, 0.0f32); nodes.len()];

        for a in 0..nodes.len() {
            for b in (a + 1)..nodes.len() {
                let dx = nodes[a].position.x - nodes[b].position.x;
                let dy = nodes[a].position.y - nodes[b].position.y;
                let dist_sq = (dx * dx + dy * dy).max(1.0);
                let dist = dist_sq.sqrt();
                let push = force.repulsion / dist_sq;
                let fx = push * dx / dist;
                let fy = push * dy / dist;
                forces[a].0 += fx;
                forces[a].1 += fy;
                forces[b].0 -= fx;
                forces[b].1 -= fy;
            }
        }

        for &(from, to) in &springs {
            let dx = nodes[to].position.x - nodes[from].position.x;
            let dy = nodes[to].position.y - nodes[from].position.y;
            let dist = (dx * dx + dy * dy).sqrt().max(0.001);
            let stretch = dist - force.link_distance;
            let fx = force.attraction * stretch * dx / dist;
            let fy = force.attraction * stretch * dy / dist;
            forces[from].0 += fx;
            forces[from].1 += fy;
            forces[to].0 -= fx;
            forces[to].1 -= fy;
        }

        for (index, node) in nodes.iter_mut().enumerate() {
            velocities[index].0 = (velocities[index].0 + forces[index].0) * force.damping;
            velocities[index].1 = (velocities[index].1 + forces[index].1) * force.damping;
            let mut step_x = velocities[index].0;
            let mut step_y = velocities[index].1;
            let step = (step_x * step_x + step_y * step_y).sqrt();
            if step > force.max_step {
                let scale = force.max_step / step;
                step_x *= scale;
                step_y *= scale;
            }
            node.position.x += step_x;
            node.position.y += step_y;
        }
    }
}
