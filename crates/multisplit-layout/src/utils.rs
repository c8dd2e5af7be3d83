//! Pure helpers over ratios and pane trees.

use std::fmt;

use multisplit_core::{NodeId, PaneId};
use rustc_hash::FxHashSet;

use crate::tree::{LeafNode, Node, NodeIdx, PaneModel};
use crate::validate::ValidationResult;

/// Smallest share a split child may hold.
pub const MIN_RATIO: f64 = 0.05;

/// Largest ratio accepted for a directional split (leaves `MIN_RATIO` for
/// the other side).
pub const MAX_SPLIT_RATIO: f64 = 0.95;

/// Closure tolerance for stored ratios.
pub const RATIO_EPSILON: f64 = 1e-6;

/// Closure tolerance for host-supplied ratio lists. Accepted lists are
/// normalized before they are stored.
pub const RATIO_INPUT_TOLERANCE: f64 = 1e-3;

const ZERO_SUM: f64 = 1e-12;

/// Scale `ratios` so they sum to exactly `1.0`.
///
/// Non-finite and negative entries count as zero. If every entry is
/// (near) zero, each child gets `1/n`.
#[must_use]
pub fn normalize_ratios(ratios: &[f64]) -> Vec<f64> {
    let n = ratios.len();
    if n == 0 {
        return Vec::new();
    }
    let cleaned: Vec<f64> = ratios
        .iter()
        .map(|&r| if r.is_finite() && r > 0.0 { r } else { 0.0 })
        .collect();
    let sum: f64 = cleaned.iter().sum();
    if sum <= ZERO_SUM {
        return vec![1.0 / n as f64; n];
    }

    let mut out: Vec<f64> = cleaned.iter().map(|r| r / sum).collect();
    // Fold rounding drift into the last entry so the sum closes exactly.
    let head: f64 = out[..n - 1].iter().sum();
    out[n - 1] = (1.0 - head).max(0.0);
    out
}

/// Keep already-closed ratio vectors verbatim; normalize anything else.
#[must_use]
pub fn settle_ratios(ratios: &[f64]) -> Vec<f64> {
    let sum: f64 = ratios.iter().sum();
    let clean = ratios.iter().all(|r| r.is_finite() && *r >= 0.0);
    if clean && (sum - 1.0).abs() <= RATIO_EPSILON {
        ratios.to_vec()
    } else {
        normalize_ratios(ratios)
    }
}

/// Why a ratio list was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RatioError {
    Empty,
    Negative { index: usize, value: f64 },
    NonFinite { index: usize },
    BadSum { sum: f64, tolerance: f64 },
}

impl fmt::Display for RatioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "ratio list is empty"),
            Self::Negative { index, value } => {
                write!(f, "ratio[{index}] is negative ({value})")
            }
            Self::NonFinite { index } => write!(f, "ratio[{index}] is not a finite number"),
            Self::BadSum { sum, tolerance } => write!(
                f,
                "ratios sum to {sum}; expected 1.0 (tolerance {tolerance})"
            ),
        }
    }
}

impl std::error::Error for RatioError {}

/// Reject empty lists, negative or non-finite entries, and sums farther
/// than [`RATIO_INPUT_TOLERANCE`] from `1.0`.
pub fn validate_ratios(ratios: &[f64]) -> Result<(), RatioError> {
    validate_ratios_within(ratios, RATIO_INPUT_TOLERANCE)
}

/// [`validate_ratios`] with an explicit closure tolerance.
pub fn validate_ratios_within(ratios: &[f64], tolerance: f64) -> Result<(), RatioError> {
    if ratios.is_empty() {
        return Err(RatioError::Empty);
    }
    for (index, &value) in ratios.iter().enumerate() {
        if !value.is_finite() {
            return Err(RatioError::NonFinite { index });
        }
        if value < 0.0 {
            return Err(RatioError::Negative { index, value });
        }
    }
    let sum: f64 = ratios.iter().sum();
    if (sum - 1.0).abs() > tolerance {
        return Err(RatioError::BadSum { sum, tolerance });
    }
    Ok(())
}

/// Look up a reachable node by pane id or split node id.
#[must_use]
pub fn find_node_by_id(model: &PaneModel, id: &str) -> Option<NodeIdx> {
    model
        .leaf_index(&PaneId::new(id))
        .or_else(|| model.split_index(&NodeId::new(id)))
}

/// All reachable leaves in depth-first layout order.
#[must_use]
pub fn get_all_leaves(model: &PaneModel) -> Vec<&LeafNode> {
    model.leaves()
}

/// Number of nodes on the longest root-to-leaf path (empty = 0, leaf = 1).
#[must_use]
pub fn get_tree_depth(model: &PaneModel) -> usize {
    let Some(root) = model.root() else {
        return 0;
    };
    let mut deepest = 0;
    let mut stack = vec![(root, 1usize)];
    let mut seen = FxHashSet::default();
    while let Some((idx, depth)) = stack.pop() {
        if !seen.insert(idx) {
            continue;
        }
        deepest = deepest.max(depth);
        stack.extend(model.children(idx).iter().map(|&child| (child, depth + 1)));
    }
    deepest
}

/// Walk the reachable tree and report every structural invariant violation.
#[must_use]
pub fn validate_tree_structure(model: &PaneModel) -> ValidationResult {
    let mut result = ValidationResult::ok();
    let Some(root) = model.root() else {
        return result;
    };
    if let Some(parent) = model.parent(root) {
        result.add_error(format!("root node {root} has parent {parent}"));
    }

    let mut seen = FxHashSet::default();
    let mut panes = FxHashSet::default();
    let mut nodes = FxHashSet::default();
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        if !seen.insert(idx) {
            result.add_error(format!(
                "node {idx} is reachable more than once (cycle or shared child)"
            ));
            continue;
        }
        match model.node(idx) {
            None => result.add_error(format!("dangling child reference {idx}")),
            Some(Node::Leaf(leaf)) => {
                if !panes.insert(leaf.pane_id()) {
                    result.add_error(format!("duplicate pane id '{}'", leaf.pane_id()));
                }
            }
            Some(Node::Split(split)) => {
                let id = split.node_id();
                if !nodes.insert(id) {
                    result.add_error(format!("duplicate split node id '{id}'"));
                }
                if split.children().len() != split.ratios().len() {
                    result.add_error(format!(
                        "split '{id}' has {} children but {} ratios",
                        split.children().len(),
                        split.ratios().len()
                    ));
                }
                if split.len() < 2 {
                    result.add_error(format!(
                        "split '{id}' has {} child(ren); expected at least 2",
                        split.len()
                    ));
                }
                for (i, &ratio) in split.ratios().iter().enumerate() {
                    let in_range = ratio.is_finite()
                        && ratio >= MIN_RATIO - RATIO_EPSILON
                        && ratio <= 1.0 + RATIO_EPSILON;
                    if !in_range {
                        result.add_error(format!(
                            "split '{id}' ratio[{i}] = {ratio} outside [{MIN_RATIO}, 1.0]"
                        ));
                    }
                }
                let sum: f64 = split.ratios().iter().sum();
                if !split.is_empty() && (sum - 1.0).abs() >= RATIO_EPSILON {
                    result.add_error(format!("split '{id}' ratios sum to {sum}, not 1.0"));
                }
                for &child in split.children() {
                    if model.parent(child) != Some(idx) {
                        result.add_error(format!(
                            "child {child} of split '{id}' has inconsistent parent link"
                        ));
                    }
                    stack.push(child);
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ModelSnapshot, NodeSnapshot};
    use multisplit_core::{Orientation, SizeConstraints, WidgetId};
    use proptest::prelude::*;

    fn leaf(id: &str) -> NodeSnapshot {
        NodeSnapshot::Leaf {
            pane_id: PaneId::new(id),
            widget_id: WidgetId::new("editor:x"),
            constraints: SizeConstraints::default(),
        }
    }

    fn split(id: &str, children: Vec<NodeSnapshot>, ratios: Vec<f64>) -> NodeSnapshot {
        NodeSnapshot::Split {
            node_id: NodeId::new(id),
            orientation: Orientation::Horizontal,
            children,
            ratios,
        }
    }

    fn model_of(root: NodeSnapshot) -> PaneModel {
        PaneModel::from_snapshot(&ModelSnapshot {
            root: Some(root),
            focused_pane_id: None,
        })
        .expect("valid snapshot")
    }

    #[test]
    fn normalize_scales_to_one() {
        assert_eq!(normalize_ratios(&[1.0, 3.0]), vec![0.25, 0.75]);
        assert_eq!(normalize_ratios(&[]), Vec::<f64>::new());
    }

    #[test]
    fn normalize_all_zero_is_uniform() {
        assert_eq!(normalize_ratios(&[0.0, 0.0, 0.0, 0.0]), vec![0.25; 4]);
        assert_eq!(normalize_ratios(&[-1.0, f64::NAN]), vec![0.5, 0.5]);
    }

    #[test]
    fn validate_ratios_rules() {
        assert_eq!(validate_ratios(&[]), Err(RatioError::Empty));
        assert_eq!(
            validate_ratios(&[1.2, -0.2]),
            Err(RatioError::Negative {
                index: 1,
                value: -0.2
            })
        );
        assert!(matches!(
            validate_ratios(&[0.5, 0.6]),
            Err(RatioError::BadSum { .. })
        ));
        assert_eq!(validate_ratios(&[0.3, 0.3, 0.4]), Ok(()));
        assert_eq!(validate_ratios(&[0.5, 0.5005]), Ok(()));
        assert!(validate_ratios_within(&[0.5, 0.5005], RATIO_EPSILON).is_err());
    }

    #[test]
    fn depth_and_leaves() {
        assert_eq!(get_tree_depth(&PaneModel::new()), 0);
        let model = model_of(split(
            "s1",
            vec![leaf("a"), split("s2", vec![leaf("b"), leaf("c")], vec![0.5, 0.5])],
            vec![0.5, 0.5],
        ));
        assert_eq!(get_tree_depth(&model), 3);
        let ids: Vec<&str> = get_all_leaves(&model)
            .iter()
            .map(|l| l.pane_id().as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(get_tree_depth(&model_of(leaf("solo"))), 1);
    }

    #[test]
    fn find_node_matches_panes_and_splits() {
        let model = model_of(split("s1", vec![leaf("a"), leaf("b")], vec![0.5, 0.5]));
        assert_eq!(find_node_by_id(&model, "s1"), model.root());
        assert_eq!(
            find_node_by_id(&model, "b"),
            model.leaf_index(&PaneId::new("b"))
        );
        assert_eq!(find_node_by_id(&model, "nope"), None);
    }

    #[test]
    fn structure_flags_single_child_and_small_ratio() {
        let model = model_of(split(
            "outer",
            vec![split("lonely", vec![leaf("a")], vec![1.0]), leaf("b")],
            vec![0.01, 0.99],
        ));
        let report = validate_tree_structure(&model);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("'lonely' has 1 child")));
        assert!(report.errors.iter().any(|e| e.contains("ratio[0] = 0.01")));
    }

    #[test]
    fn structure_accepts_settled_tree() {
        let model = model_of(split(
            "s1",
            vec![leaf("a"), leaf("b"), leaf("c")],
            vec![0.2, 0.3, 0.5],
        ));
        let report = validate_tree_structure(&model);
        assert!(report.is_valid, "{report}");
    }

    proptest! {
        #[test]
        fn normalized_ratios_close(raw in prop::collection::vec(0.0f64..100.0, 1..12)) {
            let out = normalize_ratios(&raw);
            prop_assert_eq!(out.len(), raw.len());
            let sum: f64 = out.iter().sum();
            prop_assert!((sum - 1.0).abs() < RATIO_EPSILON);
            prop_assert!(out.iter().all(|r| *r >= 0.0));
        }
    }
}
