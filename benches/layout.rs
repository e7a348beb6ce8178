use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use viewgraph::config::LayoutConfig;
use viewgraph::layout::{apply_layout, EngineKind, Entity, Relationship};
use viewgraph::model::GroupType;

/// Synthetic hierarchy: `containers` root containers, each holding
/// `per_container` items, plus a chain of cross-cutting edges.
fn synthetic_document(containers: usize, per_container: usize) -> (Vec<Entity>, Vec<Relationship>) {
    let mut entities = Vec::new();
    let mut relationships = Vec::new();
    for c in 0..containers {
        let container = format!("group-{c}");
        entities.push(Entity {
            guid: container.clone(),
            label: None,
            kind: GroupType::Container,
            sort_key: Some(c as f64),
        });
        for i in 0..per_container {
            let item = format!("group-{c}-item-{i}");
            entities.push(Entity {
                guid: item.clone(),
                label: None,
                kind: GroupType::Item,
                sort_key: Some(i as f64),
            });
            relationships.push(Relationship {
                from_guid: container.clone(),
                to_guid: item.clone(),
                relation_type: "CONTAINS".to_string(),
                label: None,
            });
        }
    }
    for c in 1..containers {
        relationships.push(Relationship {
            from_guid: format!("group-{}-item-0", c - 1),
            to_guid: format!("group-{c}-item-0"),
            relation_type: "feeds".to_string(),
            label: None,
        });
    }
    (entities, relationships)
}

fn bench_containment(c: &mut Criterion) {
    let mut group = c.benchmark_group("containment_layout");
    let config = LayoutConfig::default();
    for (containers, per_container) in [(4usize, 8usize), (16, 16), (32, 32)] {
        let name = format!("{}x{}", containers, per_container);
        let (entities, relationships) = synthetic_document(containers, per_container);
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &(entities, relationships),
            |b, (entities, relationships)| {
                b.iter(|| {
                    let result = apply_layout(
                        EngineKind::Containment,
                        black_box(entities),
                        black_box(relationships),
                        &config,
                    );
                    black_box(result.nodes.len());
                });
            },
        );
    }
    group.finish();
}

fn bench_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_layout");
    let config = LayoutConfig::default();
    let mut relaxed = LayoutConfig::default();
    relaxed.flat.force.enabled = true;
    relaxed.flat.force.iterations = 60;
    for (containers, per_container) in [(4usize, 8usize), (16, 16)] {
        let name = format!("{}x{}", containers, per_container);
        let (entities, relationships) = synthetic_document(containers, per_container);
        group.bench_with_input(
            BenchmarkId::new("grid", &name),
            &(entities.clone(), relationships.clone()),
            |b, (entities, relationships)| {
                b.iter(|| {
                    let result = apply_layout(
                        EngineKind::Flat,
                        black_box(entities),
                        black_box(relationships),
                        &config,
                    );
                    black_box(result.nodes.len());
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("force", &name),
            &(entities, relationships),
            |b, (entities, relationships)| {
                b.iter(|| {
                    let result = apply_layout(
                        EngineKind::Flat,
                        black_box(entities),
                        black_box(relationships),
                        &relaxed,
                    );
                    black_box(result.nodes.len());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_containment, bench_flat
);
criterion_main!(benches);
