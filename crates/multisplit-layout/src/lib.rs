#![forbid(unsafe_code)]

//! Pane tree, geometry, reconciliation, and validation for MultiSplit.
//!
//! [`PaneModel`] is an arena of [`Node`]s addressed by [`NodeIdx`], with the
//! parent table, pane registry, and split index rebuilt after every
//! structural change. Everything else in this crate is a read-only function
//! of a model:
//!
//! - [`GeometryCalculator`] turns a model and an outer [`Bounds`] into pane
//!   rectangles and divider handles.
//! - [`diff`] reports which panes a host must create, destroy, or refill.
//! - the `validate_*` functions pre-flight every mutation.
//!
//! [`Bounds`]: multisplit_core::Bounds

pub mod reconcile;
pub mod snapshot;
pub mod solve;
pub mod tree;
pub mod utils;
pub mod validate;

pub use reconcile::{DiffResult, WidgetHost, WidgetProvider, diff, diff_snapshots};
pub use snapshot::{ModelSnapshot, NodeSnapshot, SnapshotError};
pub use solve::{
    ConstraintViolation, DEFAULT_DIVIDER_WIDTH, Divider, GeometryCalculator, LayoutResult,
};
pub use tree::{LeafNode, Node, NodeIdx, PaneModel, SplitNode, SplitPlacement, TreeError};
pub use utils::{
    MAX_SPLIT_RATIO, MIN_RATIO, RATIO_EPSILON, RATIO_INPUT_TOLERANCE, RatioError,
    find_node_by_id, get_all_leaves, get_tree_depth, normalize_ratios, validate_ratios,
    validate_tree_structure,
};
pub use validate::{
    ValidationResult, validate_focus, validate_model_state, validate_remove, validate_split,
    validate_widget_id,
};
