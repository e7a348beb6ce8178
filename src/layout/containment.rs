use super::*;

/// Nested-box layout: containment relationships build the tree, children
/// sit on a grid inside their parent, and every container grows to the
/// bounding box of its children plus fixed padding, bottom-up. Root
/// containers are packed left-to-right.
pub(super) fn compute_containment_layout(
    entities: &[Entity],
    relationships: &[Relationship],
    config: &LayoutConfig,
) -> LayoutResult {
    let cfg = &config.containment;
    let known: HashMap<&str, &Entity> = entities
        .iter()
        .map(|entity| (entity.guid.as_str(), entity))
        .collect();
    let input_order: HashMap<&str, usize> = entities
        .iter()
        .enumerate()
        .map(|(index, entity)| (entity.guid.as_str(), index))
        .collect();

    // First containment relation wins; self-references and cycles are
    // ignored rather than looping the measurement pass.
    let mut parent_of: HashMap<String, String> = HashMap::new();
    for relationship in relationships {
        if !relationship.is_containment() {
            continue;
        }
        let parent = relationship.from_guid.as_str();
        let child = relationship.to_guid.as_str();
        if parent == child || !known.contains_key(parent) || !known.contains_key(child) {
            continue;
        }
        if parent_of.contains_key(child) || would_cycle(&parent_of, parent, child) {
            continue;
        }
        parent_of.insert(child.to_string(), parent.to_string());
    }

    let mut child_map: HashMap<String, Vec<String>> = HashMap::new();
    for entity in entities {
        if let Some(parent) = parent_of.get(&entity.guid) {
            child_map
                .entry(parent.clone())
                .or_default()
                .push(entity.guid.clone());
        }
    }
    for children in child_map.values_mut() {
        sort_siblings(children, &known, &input_order);
    }

    let mut roots: Vec<String> = entities
        .iter()
        .filter(|entity| !parent_of.contains_key(&entity.guid))
        .map(|entity| entity.guid.clone())
        .collect();
    sort_siblings(&mut roots, &known, &input_order);

    // Bottom-up measurement; children record positions relative to their
    // parent's origin, resolved to absolute coordinates afterwards.
    let mut sizes: HashMap<String, Size> = HashMap::new();
    let mut relative: HashMap<String, Point> = HashMap::new();
    for root in &roots {
        measure(root, &known, &child_map, cfg, &mut sizes, &mut relative);
    }

    let mut absolute: HashMap<String, Point> = HashMap::new();
    let mut x_cursor = cfg.margin;
    for root in &roots {
        let size = sizes.get(root).copied().unwrap_or_default();
        place(
            root,
            Point::new(x_cursor, cfg.margin),
            &child_map,
            &relative,
            &mut absolute,
        );
        x_cursor += size.w + cfg.root_spacing;
    }

    let mut nodes = Vec::with_capacity(entities.len());
    for entity in entities {
        let mut node = Node::new(entity.guid.clone(), entity.kind);
        node.parent_guid = parent_of.get(&entity.guid).cloned();
        node.children = child_map.get(&entity.guid).cloned().unwrap_or_default();
        node.position = absolute.get(&entity.guid).copied().unwrap_or_default();
        node.size = sizes.get(&entity.guid).copied().unwrap_or_default();
        nodes.push(node);
    }

    LayoutResult {
        nodes,
        camera: Camera::default(),
    }
}

fn would_cycle(parent_of: &HashMap<String, String>, parent: &str, child: &str) -> bool {
    let mut current = parent;
    while let Some(next) = parent_of.get(current) {
        if next == child {
            return true;
        }
        current = next;
    }
    false
}

fn measure(
    guid: &str,
    known: &HashMap<&str, &Entity>,
    child_map: &HashMap<String, Vec<String>>,
    cfg: &ContainmentConfig,
    sizes: &mut HashMap<String, Size>,
    relative: &mut HashMap<String, Point>,
) -> Size {
    let children = child_map.get(guid).map(Vec::as_slice).unwrap_or(&[]);
    let is_container = known
        .get(guid)
        .map(|entity| entity.kind == GroupType::Container)
        .unwrap_or(false);

    if children.is_empty() {
        let size = if is_container {
            Size::new(cfg.min_container_width, cfg.min_container_height)
        } else {
            Size::new(cfg.item_width, cfg.item_height)
        };
        sizes.insert(guid.to_string(), size);
        return size;
    }

    let child_sizes: Vec<Size> = children
        .iter()
        .map(|child| measure(child, known, child_map, cfg, sizes, relative))
        .collect();

    let columns = grid_columns(cfg.columns, children.len());
    let mut inner_width = 0.0f32;
    let mut y_cursor = 0.0f32;
    for (row_index, row) in children.chunks(columns).enumerate() {
        let row_sizes = &child_sizes[row_index * columns..row_index * columns + row.len()];
        let row_height = row_sizes.iter().map(|size| size.h).fold(0.0f32, f32::max);
        let mut x_cursor = 0.0f32;
        for (child, size) in row.iter().zip(row_sizes) {
            relative.insert(
                child.clone(),
                Point::new(cfg.padding_x + x_cursor, cfg.padding_top + y_cursor),
            );
            x_cursor += size.w + cfg.gap_x;
        }
        let row_width = x_cursor - cfg.gap_x;
        inner_width = inner_width.max(row_width);
        y_cursor += row_height + cfg.gap_y;
    }
    let inner_height = y_cursor - cfg.gap_y;

    let size = Size::new(
        (inner_width + cfg.padding_x * 2.0).max(cfg.min_container_width),
        (cfg.padding_top + inner_height + cfg.padding_bottom).max(cfg.min_container_height),
    );
    sizes.insert(guid.to_string(), size);
    size
}

fn place(
    guid: &str,
    origin: Point,
    child_map: &HashMap<String, Vec<String>>,
    relative: &HashMap<String, Point>,
    absolute: &mut HashMap<String, Point>,
) {
    absolute.insert(guid.to_string(), origin);
    let Some(children) = child_map.get(guid) else {
        return;
    };
    for child in children {
        let offset = relative.get(child).copied().unwrap_or_default();
        place(
            child,
            Point::new(origin.x + offset.x, origin.y + offset.y),
            child_map,
            relative,
            absolute,
        );
    }
}
