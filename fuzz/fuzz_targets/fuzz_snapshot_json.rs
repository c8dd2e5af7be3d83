#![no_main]

use libfuzzer_sys::fuzz_target;
use multisplit_core::Bounds;
use multisplit_layout::{GeometryCalculator, Node, PaneModel, RATIO_EPSILON};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Loading accepts snapshots that the mutation validator would refuse
    // (single-child splits, ratios under the minimum), so only the
    // guarantees of loading itself are checked here.
    let Ok(model) = PaneModel::from_json(text) else {
        return;
    };

    for pane in model.pane_ids() {
        let leaf = model.leaf(&pane).expect("listed pane resolves");
        assert_eq!(leaf.pane_id(), &pane);
    }
    if let Some(root) = model.root() {
        assert_eq!(model.parent(root), None, "root has a parent");
        for idx in model.preorder(root) {
            let Some(split) = model.node(idx).and_then(Node::as_split) else {
                continue;
            };
            assert_eq!(split.children().len(), split.ratios().len());
            let sum: f64 = split.ratios().iter().sum();
            assert!(
                split.is_empty() || (sum - 1.0).abs() < RATIO_EPSILON,
                "ratios {:?} not normalized",
                split.ratios()
            );
            for &child in split.children() {
                assert_eq!(model.parent(child), Some(idx));
            }
        }
    }
    if let Some(focus) = model.focused_pane_id() {
        assert!(model.contains_pane(focus), "focus on unknown pane");
    }

    let encoded = model.to_json().expect("loaded model encodes");
    let reloaded = PaneModel::from_json(&encoded).expect("own encoding loads");
    assert_eq!(reloaded, model, "round trip changed the model");

    // Layout never panics and assigns every pane a rectangle.
    let layout = GeometryCalculator::default().calculate(&model, Bounds::from_size(997, 613));
    assert_eq!(layout.rects.len(), model.pane_count());
});
