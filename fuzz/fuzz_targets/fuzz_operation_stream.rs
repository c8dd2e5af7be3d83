#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use multisplit_core::{Bounds, PaneId, WidgetId};
use multisplit_layout::{Node, PaneModel, SplitPlacement, validate_model_state};
use multisplit_runtime::PaneController;

#[derive(Debug, Arbitrary)]
enum Op {
    Split { target: u8, placement: u8, ratio: u8 },
    Remove { target: u8 },
    Ratios { target: u8, weights: Vec<u8> },
    Focus { target: u8 },
    Undo,
    Redo,
    Begin,
    Commit,
    Rollback,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut ctl = PaneController::new(PaneModel::singleton(
        PaneId::new("root"),
        WidgetId::new("editor:root"),
    ));

    for op in ops.iter().take(256) {
        apply(&mut ctl, op);
        let report = validate_model_state(ctl.model());
        assert!(report.is_valid, "invalid model after {op:?}: {report}");
        assert!(ctl.undo_depth() <= ctl.max_undo_levels());
    }

    while ctl.in_transaction() {
        ctl.rollback_transaction();
    }
    let layout = ctl.layout(Bounds::from_size(1280, 800));
    assert_eq!(layout.rects.len(), ctl.model().pane_count());
});

fn apply(ctl: &mut PaneController, op: &Op) {
    let panes = ctl.get_all_pane_ids();
    let pick = |i: u8| panes.get(usize::from(i) % panes.len().max(1)).cloned();
    match op {
        Op::Split { target, placement, ratio } => {
            let Some(pane) = pick(*target) else { return };
            let placement = match placement % 7 {
                0 => SplitPlacement::Left,
                1 => SplitPlacement::Right,
                2 => SplitPlacement::Top,
                3 => SplitPlacement::Bottom,
                4 => SplitPlacement::Before,
                5 => SplitPlacement::After,
                _ => SplitPlacement::Replace,
            };
            let ratio = f64::from(*ratio) / 255.0;
            ctl.split_pane(&pane, WidgetId::new("w"), placement, ratio);
        }
        Op::Remove { target } => {
            if let Some(pane) = pick(*target) {
                ctl.remove_pane(&pane);
            }
        }
        Op::Ratios { target, weights } => {
            let Some(pane) = pick(*target) else { return };
            let model = ctl.model();
            let Some(split) = model
                .leaf_index(&pane)
                .and_then(|idx| model.parent(idx))
                .and_then(|parent| model.node(parent))
                .and_then(Node::as_split)
            else {
                return;
            };
            let node_id = split.node_id().clone();
            // Raw weights; the validator decides whether they are acceptable.
            let ratios: Vec<f64> = weights.iter().map(|&w| f64::from(w) / 255.0).collect();
            ctl.set_ratios(&node_id, &ratios);
        }
        Op::Focus { target } => {
            if let Some(pane) = pick(*target) {
                ctl.focus_pane(&pane);
            }
        }
        Op::Undo => {
            ctl.undo();
        }
        Op::Redo => {
            ctl.redo();
        }
        Op::Begin => ctl.begin_transaction(),
        Op::Commit => {
            ctl.commit_transaction();
        }
        Op::Rollback => {
            ctl.rollback_transaction();
        }
    }
}
