//! Pre-flight checks for mutating operations.
//!
//! Every check is a pure function of a [`PaneModel`] returning a
//! [`ValidationResult`]; nothing here mutates or panics.

use std::fmt;

use multisplit_core::{NodeId, PaneId, WidgetId};

use crate::tree::{Node, PaneModel, SplitPlacement};
use crate::utils::{
    MAX_SPLIT_RATIO, MIN_RATIO, RATIO_EPSILON, RATIO_INPUT_TOLERANCE, normalize_ratios,
    validate_ratios_within, validate_tree_structure,
};

/// Outcome of a validation pass.
///
/// Adding an error forces `is_valid = false`; warnings never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

impl ValidationResult {
    /// A passing result with no messages.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failing result with one error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        let mut result = Self::ok();
        result.add_error(message);
        result
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Fold another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    #[must_use]
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid && self.warnings.is_empty() {
            return f.write_str("valid");
        }
        let mut first = true;
        for message in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "error: {message}")?;
            first = false;
        }
        for message in &self.warnings {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "warning: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Check a split of `pane_id` at `placement` with the new pane taking
/// `ratio` of the space.
#[must_use]
pub fn validate_split(
    model: &PaneModel,
    pane_id: &PaneId,
    placement: SplitPlacement,
    ratio: f64,
) -> ValidationResult {
    let mut result = ValidationResult::ok();
    let Some(target) = model.leaf_index(pane_id) else {
        result.add_error(format!("pane '{pane_id}' not found"));
        return result;
    };
    if placement == SplitPlacement::Replace {
        return result;
    }

    if !(MIN_RATIO..=MAX_SPLIT_RATIO).contains(&ratio) {
        result.add_error(format!(
            "split ratio {ratio} outside [{MIN_RATIO}, {MAX_SPLIT_RATIO}]; \
             each side needs at least the minimum ratio {MIN_RATIO}"
        ));
        return result;
    }

    if placement.is_sibling() {
        let parent = model
            .parent(target)
            .and_then(|parent| model.node(parent))
            .and_then(Node::as_split);
        let Some(parent) = parent else {
            result.add_error(format!(
                "pane '{pane_id}' has no parent split to insert {placement} it"
            ));
            return result;
        };
        let share = model
            .index_in_parent(target)
            .and_then(|pos| parent.ratios().get(pos))
            .copied()
            .unwrap_or(0.0);
        let inserted = share * ratio;
        let kept = share - inserted;
        if inserted < MIN_RATIO - RATIO_EPSILON || kept < MIN_RATIO - RATIO_EPSILON {
            result.add_error(format!(
                "inserting {placement} pane '{pane_id}' (share {share:.4}) \
                 would leave a share below the minimum ratio {MIN_RATIO}"
            ));
        }
    }
    result
}

/// A widget id handed to a split must not be empty.
#[must_use]
pub fn validate_widget_id(widget_id: &WidgetId) -> ValidationResult {
    if widget_id.is_empty() {
        ValidationResult::error("widget id must not be empty")
    } else {
        ValidationResult::ok()
    }
}

/// Check removal of `pane_id`.
#[must_use]
pub fn validate_remove(model: &PaneModel, pane_id: &PaneId) -> ValidationResult {
    let mut result = ValidationResult::ok();
    if !model.contains_pane(pane_id) {
        result.add_error(format!("pane '{pane_id}' not found"));
    } else if model.pane_count() == 1 {
        result.add_warning(format!(
            "removing '{pane_id}' leaves the model without panes"
        ));
    }
    result
}

/// Check a new ratio vector for split `node_id`.
#[must_use]
pub fn validate_ratios(model: &PaneModel, node_id: &NodeId, ratios: &[f64]) -> ValidationResult {
    let mut result = ValidationResult::ok();
    let Some(split) = model.split_node(node_id) else {
        result.add_error(format!("split node '{node_id}' not found"));
        return result;
    };
    if ratios.len() != split.len() {
        result.add_error(format!(
            "split '{node_id}' has {} children but {} ratios were given",
            split.len(),
            ratios.len()
        ));
        return result;
    }
    if let Err(err) = validate_ratios_within(ratios, RATIO_INPUT_TOLERANCE) {
        result.add_error(err.to_string());
        return result;
    }
    for (i, ratio) in normalize_ratios(ratios).into_iter().enumerate() {
        if ratio < MIN_RATIO - RATIO_EPSILON {
            result.add_error(format!(
                "ratio[{i}] = {ratio:.4} is below the minimum ratio {MIN_RATIO}"
            ));
        }
    }
    result
}

/// Focus may only move to a registered pane.
#[must_use]
pub fn validate_focus(model: &PaneModel, pane_id: &PaneId) -> ValidationResult {
    if model.contains_pane(pane_id) {
        ValidationResult::ok()
    } else {
        ValidationResult::error(format!("pane '{pane_id}' not found"))
    }
}

/// Whole-model consistency: tree structure, registry, and focus.
#[must_use]
pub fn validate_model_state(model: &PaneModel) -> ValidationResult {
    let mut result = validate_tree_structure(model);

    for (pane_id, idx) in model.registry() {
        match model.node(idx) {
            Some(Node::Leaf(leaf)) if leaf.pane_id() == pane_id => {}
            Some(_) => result.add_error(format!(
                "registry entry '{pane_id}' points at {idx}, which is not its leaf"
            )),
            None => result.add_error(format!(
                "registry entry '{pane_id}' points at released slot {idx}"
            )),
        }
    }
    let reachable = model.leaves();
    for leaf in &reachable {
        if model.leaf_index(leaf.pane_id()).is_none() {
            result.add_error(format!("pane '{}' is missing from the registry", leaf.pane_id()));
        }
    }
    if reachable.len() != model.pane_count() {
        result.add_error(format!(
            "registry holds {} panes but {} leaves are reachable",
            model.pane_count(),
            reachable.len()
        ));
    }

    if let Some(focused) = model.focused_pane_id()
        && !model.contains_pane(focused)
    {
        result.add_error(format!("focused pane '{focused}' does not exist"));
    }
    result
}
