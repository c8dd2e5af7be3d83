//! Serializable snapshot of a [`PaneModel`].
//!
//! ```json
//! { "root": { "type": "split", "node_id": "split-1", "orientation": "horizontal",
//!             "children": [ { "type": "leaf", "pane_id": "pane-1", "widget_id": "editor:a" },
//!                           { "type": "leaf", "pane_id": "pane-2", "widget_id": "terminal:1" } ],
//!             "ratios": [0.7, 0.3] },
//!   "focused_pane_id": "pane-2" }
//! ```
//!
//! Leaves may carry an optional `"constraints"` object; it is omitted when
//! the pane is unconstrained. The registry and parent table are rebuilt on
//! load, never serialized.

use std::fmt;

use multisplit_core::{NodeId, Orientation, PaneId, SizeConstraints, WidgetId};
use serde::{Deserialize, Serialize};

use crate::tree::{PaneModel, TreeError};

/// Whole-model snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub root: Option<NodeSnapshot>,
    #[serde(default)]
    pub focused_pane_id: Option<PaneId>,
}

/// One node of a snapshot, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeSnapshot {
    Leaf {
        pane_id: PaneId,
        widget_id: WidgetId,
        #[serde(default, skip_serializing_if = "SizeConstraints::is_unconstrained")]
        constraints: SizeConstraints,
    },
    Split {
        node_id: NodeId,
        orientation: Orientation,
        children: Vec<NodeSnapshot>,
        ratios: Vec<f64>,
    },
}

impl NodeSnapshot {
    /// Structural equality with ratios compared within `tolerance`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        match (self, other) {
            (
                Self::Leaf {
                    pane_id: a_pane,
                    widget_id: a_widget,
                    constraints: a_constraints,
                },
                Self::Leaf {
                    pane_id: b_pane,
                    widget_id: b_widget,
                    constraints: b_constraints,
                },
            ) => a_pane == b_pane && a_widget == b_widget && a_constraints == b_constraints,
            (
                Self::Split {
                    node_id: a_id,
                    orientation: a_orientation,
                    children: a_children,
                    ratios: a_ratios,
                },
                Self::Split {
                    node_id: b_id,
                    orientation: b_orientation,
                    children: b_children,
                    ratios: b_ratios,
                },
            ) => {
                a_id == b_id
                    && a_orientation == b_orientation
                    && a_children.len() == b_children.len()
                    && a_ratios.len() == b_ratios.len()
                    && a_ratios
                        .iter()
                        .zip(b_ratios)
                        .all(|(a, b)| (a - b).abs() <= tolerance)
                    && a_children
                        .iter()
                        .zip(b_children)
                        .all(|(a, b)| a.approx_eq(b, tolerance))
            }
            _ => false,
        }
    }

    /// Pane ids in depth-first order.
    #[must_use]
    pub fn pane_ids(&self) -> Vec<&PaneId> {
        let mut out = Vec::new();
        self.collect_panes(&mut out);
        out
    }

    fn collect_panes<'a>(&'a self, out: &mut Vec<&'a PaneId>) {
        match self {
            Self::Leaf { pane_id, .. } => out.push(pane_id),
            Self::Split { children, .. } => {
                for child in children {
                    child.collect_panes(out);
                }
            }
        }
    }
}

impl ModelSnapshot {
    /// Structural equality with ratios compared within `tolerance`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.focused_pane_id == other.focused_pane_id
            && match (&self.root, &other.root) {
                (Some(a), Some(b)) => a.approx_eq(b, tolerance),
                (None, None) => true,
                _ => false,
            }
    }
}

impl PaneModel {
    /// Export the reachable tree and focus.
    #[must_use]
    pub fn to_snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            root: self.root().and_then(|root| self.snapshot_subtree(root)),
            focused_pane_id: self.focused_pane_id().cloned(),
        }
    }

    /// Rebuild a model from a snapshot.
    ///
    /// Rejects duplicate ids, empty splits, mismatched ratio counts,
    /// negative or non-finite ratios, invalid constraints, and a focus that
    /// names no pane. Ratios that do not sum to 1 are normalized.
    /// Single-child splits load as-is.
    pub fn from_snapshot(snapshot: &ModelSnapshot) -> Result<Self, SnapshotError> {
        let mut model = Self::new();
        if let Some(root) = &snapshot.root {
            let idx = model.materialize(root)?;
            model.set_root(Some(idx))?;
        }
        if let Some(focused) = &snapshot.focused_pane_id {
            model
                .set_focused_pane_id(Some(focused.clone()))
                .map_err(|_| SnapshotError::UnknownFocus(focused.clone()))?;
        }
        Ok(model)
    }

    /// Compact JSON form of [`Self::to_snapshot`].
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(&self.to_snapshot())?)
    }

    /// Indented JSON form of [`Self::to_snapshot`].
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    /// Parse and load a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: ModelSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(&snapshot)
    }
}

/// Errors loading or encoding a snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    Json(serde_json::Error),
    Tree(TreeError),
    UnknownFocus(PaneId),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "snapshot JSON error: {err}"),
            Self::Tree(err) => write!(f, "invalid snapshot tree: {err}"),
            Self::UnknownFocus(pane) => {
                write!(f, "focused pane '{pane}' is not in the snapshot")
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Tree(err) => Some(err),
            Self::UnknownFocus(_) => None,
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<TreeError> for SnapshotError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}
