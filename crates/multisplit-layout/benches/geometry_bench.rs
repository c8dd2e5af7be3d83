//! Benchmarks for the geometry calculator and reconciler.
//!
//! Run with: cargo bench -p multisplit-layout

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use multisplit_core::{Bounds, NodeId, Orientation, PaneId, SizeConstraints, WidgetId};
use multisplit_layout::{GeometryCalculator, ModelSnapshot, NodeSnapshot, PaneModel, diff};
use std::hint::black_box;

/// Balanced tree of alternating orientation with `2^depth` leaves.
fn balanced(depth: u32, serial: &mut u32) -> NodeSnapshot {
    *serial += 1;
    let id = *serial;
    if depth == 0 {
        return NodeSnapshot::Leaf {
            pane_id: PaneId::new(format!("pane-{id}")),
            widget_id: WidgetId::from_parts("editor", format!("{id}")),
            constraints: if id % 3 == 0 {
                SizeConstraints::min(24, 12).unwrap_or_default()
            } else {
                SizeConstraints::default()
            },
        };
    }
    NodeSnapshot::Split {
        node_id: NodeId::new(format!("split-{id}")),
        orientation: if depth % 2 == 0 {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        },
        children: vec![balanced(depth - 1, serial), balanced(depth - 1, serial)],
        ratios: vec![0.4, 0.6],
    }
}

/// One split with `n` side-by-side panes.
fn wide(n: usize) -> NodeSnapshot {
    NodeSnapshot::Split {
        node_id: NodeId::new("row"),
        orientation: Orientation::Horizontal,
        children: (0..n)
            .map(|i| NodeSnapshot::Leaf {
                pane_id: PaneId::new(format!("pane-{i}")),
                widget_id: WidgetId::from_parts("terminal", format!("{i}")),
                constraints: SizeConstraints::default(),
            })
            .collect(),
        ratios: vec![1.0 / n as f64; n],
    }
}

fn model_of(root: NodeSnapshot) -> PaneModel {
    PaneModel::from_snapshot(&ModelSnapshot {
        root: Some(root),
        focused_pane_id: None,
    })
    .expect("bench tree is valid")
}

fn bench_calculate_balanced(c: &mut Criterion) {
    let mut group = c.benchmark_group("geometry/balanced");
    let outer = Bounds::from_size(3840, 2160);
    let calc = GeometryCalculator::default();

    for depth in [2u32, 4, 6, 8] {
        let model = model_of(balanced(depth, &mut 0));
        group.bench_with_input(BenchmarkId::new("calculate", 1 << depth), &model, |b, m| {
            b.iter(|| black_box(calc.calculate(m, outer)))
        });
    }

    group.finish();
}

fn bench_calculate_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("geometry/wide");
    let outer = Bounds::from_size(1920, 1080);
    let calc = GeometryCalculator::new(2);

    for n in [4usize, 16, 64] {
        let model = model_of(wide(n));
        group.bench_with_input(BenchmarkId::new("calculate", n), &model, |b, m| {
            b.iter(|| black_box(calc.calculate(m, outer)))
        });
    }

    group.finish();
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/diff");
    for depth in [4u32, 8] {
        let old = model_of(balanced(depth, &mut 0));
        let new = model_of(balanced(depth, &mut 1));
        group.bench_with_input(
            BenchmarkId::new("shifted_ids", 1 << depth),
            &(old, new),
            |b, (old, new)| b.iter(|| black_box(diff(Some(old), Some(new)))),
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_calculate_balanced,
    bench_calculate_wide,
    bench_diff
);
criterion_main!(benches);
