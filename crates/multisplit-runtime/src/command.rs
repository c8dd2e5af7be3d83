#![forbid(unsafe_code)]

//! Undoable pane-tree commands.
//!
//! Each command is a value object that receives the model on every call and
//! stores only stable ids (never arena indices) plus whatever prior state it
//! needs to reverse itself.
//!
//! # Invariants
//!
//! - `execute()` followed by `undo()` restores a structurally equal model
//! - `undo()` followed by `redo()` restores the executed model, with the same
//!   pane and split ids
//! - a failed `execute()` leaves the model untouched
//!
//! # State machine
//!
//! ```text
//! Idle --execute--> Executed --undo--> Idle --redo--> Executed
//! ```
//!
//! `execute()` on an executed command and `undo()` on an idle one fail with
//! [`CommandError::AlreadyExecuted`] / [`CommandError::NotExecuted`].

use std::fmt;

use multisplit_core::{NodeId, PaneId, WidgetId};
use multisplit_layout::{
    MAX_SPLIT_RATIO, MIN_RATIO, Node, NodeIdx, NodeSnapshot, PaneModel, RATIO_EPSILON,
    SplitPlacement, TreeError, normalize_ratios,
};

/// Result of command execution or undo.
pub type CommandResult = Result<(), CommandError>;

/// Errors that can occur during command execution.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// `execute()` on a command that is already applied.
    AlreadyExecuted,
    /// `undo()` on a command that is not applied.
    NotExecuted,
    PaneNotFound(PaneId),
    NodeNotFound(NodeId),
    /// `Before`/`After` on a pane with no parent split.
    InvalidPlacement {
        pane_id: PaneId,
        placement: SplitPlacement,
    },
    /// A structural primitive refused the change.
    Tree(TreeError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExecuted => write!(f, "command already executed"),
            Self::NotExecuted => write!(f, "command has not been executed"),
            Self::PaneNotFound(pane) => write!(f, "pane '{pane}' not found"),
            Self::NodeNotFound(node) => write!(f, "split node '{node}' not found"),
            Self::InvalidPlacement { pane_id, placement } => {
                write!(f, "cannot split pane '{pane_id}' {placement}: no parent split")
            }
            Self::Tree(err) => write!(f, "tree error: {err}"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TreeError> for CommandError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

/// What a command does, for event payloads and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Split,
    Remove,
    SetRatios,
    Batch,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Split => "split",
            Self::Remove => "remove",
            Self::SetRatios => "set_ratios",
            Self::Batch => "batch",
        };
        f.write_str(name)
    }
}

/// A reversible mutation of a [`PaneModel`].
pub trait PaneCommand: fmt::Debug {
    /// Apply the command.
    fn execute(&mut self, model: &mut PaneModel) -> CommandResult;

    /// Reverse the command.
    fn undo(&mut self, model: &mut PaneModel) -> CommandResult;

    /// Re-apply after an undo.
    fn redo(&mut self, model: &mut PaneModel) -> CommandResult {
        self.execute(model)
    }

    /// Human-readable description for UI display.
    fn description(&self) -> &str;

    fn kind(&self) -> CommandKind;

    fn is_executed(&self) -> bool;

    fn can_execute(&self) -> bool {
        !self.is_executed()
    }

    fn can_undo(&self) -> bool {
        self.is_executed()
    }
}

fn require_pane(model: &PaneModel, pane_id: &PaneId) -> Result<NodeIdx, CommandError> {
    model
        .leaf_index(pane_id)
        .ok_or_else(|| CommandError::PaneNotFound(pane_id.clone()))
}

fn require_split(model: &PaneModel, node_id: &NodeId) -> Result<NodeIdx, CommandError> {
    model
        .split_index(node_id)
        .ok_or_else(|| CommandError::NodeNotFound(node_id.clone()))
}

fn restore_focus(model: &mut PaneModel, focus: Option<&PaneId>) -> Result<(), TreeError> {
    let focus = focus.filter(|pane| model.contains_pane(pane)).cloned();
    model.set_focused_pane_id(focus).map(drop)
}

// ============================================================================
// Split
// ============================================================================

/// Add a pane next to `target`, or swap its widget for `Replace`.
///
/// Directional placements wrap the target in a new two-way split where the
/// new pane holds `ratio`. `Before`/`After` carve the new pane's share out
/// of the target's share in its existing parent. The new pane takes focus.
#[derive(Debug, Clone)]
pub struct SplitPaneCommand {
    target: PaneId,
    widget_id: WidgetId,
    placement: SplitPlacement,
    ratio: f64,
    description: String,
    new_pane_id: Option<PaneId>,
    node_id: Option<NodeId>,
    previous_ratios: Option<Vec<f64>>,
    previous_widget: Option<WidgetId>,
    previous_focus: Option<PaneId>,
    executed: bool,
}

impl SplitPaneCommand {
    #[must_use]
    pub fn new(target: PaneId, widget_id: WidgetId, placement: SplitPlacement, ratio: f64) -> Self {
        let description = match placement {
            SplitPlacement::Replace => format!("Replace widget in {target}"),
            _ => format!("Split {target} {placement}"),
        };
        Self {
            target,
            widget_id,
            placement,
            ratio,
            description,
            new_pane_id: None,
            node_id: None,
            previous_ratios: None,
            previous_widget: None,
            previous_focus: None,
            executed: false,
        }
    }

    /// Use `pane_id` for the new pane instead of allocating one.
    #[must_use]
    pub fn with_pane_id(mut self, pane_id: PaneId) -> Self {
        if self.placement != SplitPlacement::Replace {
            self.new_pane_id = Some(pane_id);
        }
        self
    }

    #[must_use]
    pub fn target(&self) -> &PaneId {
        &self.target
    }

    #[must_use]
    pub const fn placement(&self) -> SplitPlacement {
        self.placement
    }

    /// Id of the pane this command creates, once known.
    #[must_use]
    pub fn new_pane_id(&self) -> Option<&PaneId> {
        self.new_pane_id.as_ref()
    }

    /// Id of the wrapping split for directional placements, once executed.
    #[must_use]
    pub fn node_id(&self) -> Option<&NodeId> {
        self.node_id.as_ref()
    }

    fn new_leaf(&mut self, model: &mut PaneModel) -> Result<NodeIdx, CommandError> {
        let pane_id = self
            .new_pane_id
            .get_or_insert_with(|| model.allocate_pane_id())
            .clone();
        Ok(model.insert_leaf(pane_id, self.widget_id.clone())?)
    }

    fn wrap_target(&mut self, model: &mut PaneModel, target: NodeIdx) -> CommandResult {
        let Some(orientation) = self.placement.orientation() else {
            return Err(CommandError::InvalidPlacement {
                pane_id: self.target.clone(),
                placement: self.placement,
            });
        };
        // Checked before any mutation: a failed insert below would leave the
        // target wrapped in a single-child split.
        if !(MIN_RATIO..=MAX_SPLIT_RATIO).contains(&self.ratio) {
            return Err(TreeError::InvalidRatio { value: self.ratio }.into());
        }
        let leaf = self.new_leaf(model)?;
        let node_id = self
            .node_id
            .get_or_insert_with(|| model.allocate_node_id())
            .clone();
        let split = match model.insert_split(node_id, orientation) {
            Ok(split) => split,
            Err(err) => {
                model.release_subtree(leaf)?;
                return Err(err.into());
            }
        };

        match model.parent(target) {
            Some(parent) => model.replace_child(parent, target, split)?,
            None => {
                model.set_root(Some(split))?;
            }
        }
        let index = usize::from(!self.placement.inserts_first());
        model.add_child(split, target, 1.0)?;
        model.insert_child(split, index, leaf, self.ratio)?;
        Ok(())
    }

    fn insert_sibling(&mut self, model: &mut PaneModel, target: NodeIdx) -> CommandResult {
        let invalid = || CommandError::InvalidPlacement {
            pane_id: self.target.clone(),
            placement: self.placement,
        };
        let parent = model.parent(target).ok_or_else(invalid)?;
        let pos = model.index_in_parent(target).ok_or_else(invalid)?;
        let previous = model
            .node(parent)
            .and_then(Node::as_split)
            .map(|split| split.ratios().to_vec())
            .ok_or_else(invalid)?;
        let share = previous.get(pos).copied().ok_or_else(invalid)?;
        let inserted = share * self.ratio;
        let kept = share - inserted;
        let floor = MIN_RATIO - RATIO_EPSILON;
        if !self.ratio.is_finite() || inserted < floor || kept < floor {
            return Err(TreeError::InvalidRatio { value: self.ratio }.into());
        }
        let index = if self.placement.inserts_first() {
            pos
        } else {
            pos + 1
        };

        let leaf = self.new_leaf(model)?;
        if let Err(err) = model.insert_child(parent, index, leaf, inserted) {
            model.release_subtree(leaf)?;
            return Err(err.into());
        }
        let mut ratios = previous.clone();
        ratios[pos] = kept;
        ratios.insert(index, inserted);
        model.set_ratios(parent, &normalize_ratios(&ratios))?;
        self.previous_ratios = Some(previous);
        Ok(())
    }

    fn unwrap_target(&self, model: &mut PaneModel) -> CommandResult {
        let node_id = self.node_id.as_ref().ok_or(CommandError::NotExecuted)?;
        let new_pane = self.new_pane_id.as_ref().ok_or(CommandError::NotExecuted)?;
        let split = require_split(model, node_id)?;
        let target = require_pane(model, &self.target)?;
        let leaf = require_pane(model, new_pane)?;

        model.remove_child(split, leaf)?;
        model.release_subtree(leaf)?;
        model.remove_child(split, target)?;
        match model.parent(split) {
            Some(parent) => model.replace_child(parent, split, target)?,
            None => {
                model.set_root(Some(target))?;
            }
        }
        model.release_subtree(split)?;
        Ok(())
    }

    fn remove_sibling(&mut self, model: &mut PaneModel) -> CommandResult {
        let new_pane = self.new_pane_id.as_ref().ok_or(CommandError::NotExecuted)?;
        let previous = self
            .previous_ratios
            .as_ref()
            .ok_or(CommandError::NotExecuted)?;
        let leaf = require_pane(model, new_pane)?;
        let parent = model.parent(leaf).ok_or(CommandError::InvalidPlacement {
            pane_id: new_pane.clone(),
            placement: self.placement,
        })?;
        model.remove_child(parent, leaf)?;
        model.release_subtree(leaf)?;
        model.set_ratios(parent, previous)?;
        self.previous_ratios = None;
        Ok(())
    }
}

impl PaneCommand for SplitPaneCommand {
    fn execute(&mut self, model: &mut PaneModel) -> CommandResult {
        if self.executed {
            return Err(CommandError::AlreadyExecuted);
        }
        let target = require_pane(model, &self.target)?;
        self.previous_focus = model.focused_pane_id().cloned();

        match self.placement {
            SplitPlacement::Replace => {
                let previous = model.set_widget_id(&self.target, self.widget_id.clone())?;
                self.previous_widget = Some(previous);
            }
            SplitPlacement::Before | SplitPlacement::After => {
                self.insert_sibling(model, target)?;
            }
            _ => self.wrap_target(model, target)?,
        }

        match &self.new_pane_id {
            Some(pane) => {
                model.set_focused_pane_id(Some(pane.clone()))?;
            }
            None => restore_focus(model, self.previous_focus.as_ref())?,
        }
        self.executed = true;
        Ok(())
    }

    fn undo(&mut self, model: &mut PaneModel) -> CommandResult {
        if !self.executed {
            return Err(CommandError::NotExecuted);
        }
        match self.placement {
            SplitPlacement::Replace => {
                let previous = self
                    .previous_widget
                    .clone()
                    .ok_or(CommandError::NotExecuted)?;
                model.set_widget_id(&self.target, previous)?;
                self.previous_widget = None;
            }
            SplitPlacement::Before | SplitPlacement::After => self.remove_sibling(model)?,
            _ => self.unwrap_target(model)?,
        }
        restore_focus(model, self.previous_focus.as_ref())?;
        self.executed = false;
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Split
    }

    fn is_executed(&self) -> bool {
        self.executed
    }
}

// ============================================================================
// Remove
// ============================================================================

#[derive(Debug, Clone)]
enum Restore {
    /// The change stayed below this split.
    Subtree { anchor: NodeId, saved: NodeSnapshot },
    /// The change reached the root.
    Root(Option<NodeSnapshot>),
}

/// Remove a pane, collapsing any split left with a single child.
///
/// Collapse can cascade through chains of splits. The command snapshots the
/// nearest ancestor that survives unchanged in child count (or the whole
/// tree) and swaps it back on undo.
#[derive(Debug, Clone)]
pub struct RemovePaneCommand {
    pane_id: PaneId,
    description: String,
    restore: Option<Restore>,
    previous_focus: Option<PaneId>,
    executed: bool,
}

impl RemovePaneCommand {
    #[must_use]
    pub fn new(pane_id: PaneId) -> Self {
        let description = format!("Remove {pane_id}");
        Self {
            pane_id,
            description,
            restore: None,
            previous_focus: None,
            executed: false,
        }
    }

    #[must_use]
    pub fn pane_id(&self) -> &PaneId {
        &self.pane_id
    }
}

/// Nearest ancestor of `leaf` whose child count survives the removal and
/// collapse, or `None` when the change reaches the root.
fn collapse_anchor(model: &PaneModel, leaf: NodeIdx) -> Option<NodeIdx> {
    let mut current = leaf;
    // `true` while `current` leaves its parent; `false` once it is replaced
    // in place by a single remaining child.
    let mut detaching = true;
    loop {
        let parent = model.parent(current)?;
        match (detaching, model.children(parent).len()) {
            // Emptied: the parent itself leaves its own parent.
            (true, 1) => current = parent,
            // Left with one child, or already a single-child split around a
            // collapsing node: the parent is replaced in place.
            (true, 2) | (false, 1) => {
                current = parent;
                detaching = false;
            }
            _ => return Some(parent),
        }
    }
}

fn detach_and_collapse(model: &mut PaneModel, leaf: NodeIdx) -> Result<(), TreeError> {
    let Some(mut current) = model.parent(leaf) else {
        model.set_root(None)?;
        model.release_subtree(leaf)?;
        return Ok(());
    };
    model.remove_child(current, leaf)?;
    model.release_subtree(leaf)?;

    loop {
        let grandparent = model.parent(current);
        let children = model.children(current).to_vec();
        match (children.as_slice(), grandparent) {
            ([], Some(grandparent)) => {
                model.remove_child(grandparent, current)?;
                model.release_subtree(current)?;
                current = grandparent;
            }
            ([], None) => {
                model.set_root(None)?;
                model.release_subtree(current)?;
                return Ok(());
            }
            (&[only], grandparent) => {
                model.remove_child(current, only)?;
                match grandparent {
                    Some(grandparent) => model.replace_child(grandparent, current, only)?,
                    None => {
                        model.set_root(Some(only))?;
                    }
                }
                model.release_subtree(current)?;
                // The grandparent keeps its child count; keep going while it
                // is a single-child split itself.
                match grandparent {
                    Some(grandparent) => current = grandparent,
                    None => return Ok(()),
                }
            }
            _ => return Ok(()),
        }
    }
}

fn first_pane_in(model: &PaneModel, anchor: Option<&NodeId>) -> Option<PaneId> {
    let leaves = match anchor.and_then(|id| model.split_index(id)) {
        Some(idx) => model.leaves_under(idx),
        None => model.leaves(),
    };
    leaves.first().map(|leaf| leaf.pane_id().clone())
}

impl PaneCommand for RemovePaneCommand {
    fn execute(&mut self, model: &mut PaneModel) -> CommandResult {
        if self.executed {
            return Err(CommandError::AlreadyExecuted);
        }
        let leaf = require_pane(model, &self.pane_id)?;
        let restore = match collapse_anchor(model, leaf) {
            Some(anchor) => {
                let split = model
                    .node(anchor)
                    .and_then(Node::as_split)
                    .ok_or(TreeError::NotASplit(anchor))?;
                let saved = model
                    .snapshot_subtree(anchor)
                    .ok_or(TreeError::UnknownIndex(anchor))?;
                Restore::Subtree {
                    anchor: split.node_id().clone(),
                    saved,
                }
            }
            None => Restore::Root(model.root().and_then(|root| model.snapshot_subtree(root))),
        };
        let previous_focus = model.focused_pane_id().cloned();

        detach_and_collapse(model, leaf)?;

        let anchor = match &restore {
            Restore::Subtree { anchor, .. } => Some(anchor),
            Restore::Root(_) => None,
        };
        let focus = match &previous_focus {
            Some(pane) if *pane == self.pane_id => first_pane_in(model, anchor),
            other => other.clone().filter(|pane| model.contains_pane(pane)),
        };
        model.set_focused_pane_id(focus)?;

        self.restore = Some(restore);
        self.previous_focus = previous_focus;
        self.executed = true;
        Ok(())
    }

    fn undo(&mut self, model: &mut PaneModel) -> CommandResult {
        if !self.executed {
            return Err(CommandError::NotExecuted);
        }
        match self.restore.as_ref().ok_or(CommandError::NotExecuted)? {
            Restore::Subtree { anchor, saved } => {
                let idx = require_split(model, anchor)?;
                model.replace_subtree(idx, saved)?;
            }
            Restore::Root(saved) => {
                model.replace_root_with(saved.as_ref())?;
            }
        }
        restore_focus(model, self.previous_focus.as_ref())?;
        self.restore = None;
        self.executed = false;
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Remove
    }

    fn is_executed(&self) -> bool {
        self.executed
    }
}

// ============================================================================
// Ratios
// ============================================================================

/// Replace the ratios of one split. Undo restores the exact previous vector.
#[derive(Debug, Clone)]
pub struct SetRatiosCommand {
    node_id: NodeId,
    ratios: Vec<f64>,
    description: String,
    previous: Option<Vec<f64>>,
}

impl SetRatiosCommand {
    /// `ratios` are normalized before they are stored.
    #[must_use]
    pub fn new(node_id: NodeId, ratios: &[f64]) -> Self {
        let description = format!("Resize {node_id}");
        Self {
            node_id,
            ratios: normalize_ratios(ratios),
            description,
            previous: None,
        }
    }

    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    #[must_use]
    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }
}

impl PaneCommand for SetRatiosCommand {
    fn execute(&mut self, model: &mut PaneModel) -> CommandResult {
        if self.previous.is_some() {
            return Err(CommandError::AlreadyExecuted);
        }
        let idx = require_split(model, &self.node_id)?;
        self.previous = Some(model.set_ratios(idx, &self.ratios)?);
        Ok(())
    }

    fn undo(&mut self, model: &mut PaneModel) -> CommandResult {
        let previous = self.previous.as_ref().ok_or(CommandError::NotExecuted)?;
        let idx = require_split(model, &self.node_id)?;
        model.set_ratios(idx, previous)?;
        self.previous = None;
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> CommandKind {
        CommandKind::SetRatios
    }

    fn is_executed(&self) -> bool {
        self.previous.is_some()
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Several commands acting as one undo entry.
pub struct CommandBatch {
    /// Commands in execution order.
    commands: Vec<Box<dyn PaneCommand>>,
    description: String,
    /// Number of leading commands currently applied.
    executed_to: usize,
    executed: bool,
}

impl fmt::Debug for CommandBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBatch")
            .field("commands_count", &self.commands.len())
            .field("description", &self.description)
            .field("executed_to", &self.executed_to)
            .field("executed", &self.executed)
            .finish()
    }
}

impl CommandBatch {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            commands: Vec::new(),
            description: description.into(),
            executed_to: 0,
            executed: false,
        }
    }

    /// Wrap commands that were already executed, in execution order.
    #[must_use]
    pub fn from_executed(
        description: impl Into<String>,
        commands: Vec<Box<dyn PaneCommand>>,
    ) -> Self {
        let executed_to = commands.len();
        Self {
            commands,
            description: description.into(),
            executed_to,
            executed: true,
        }
    }

    /// Add a command to run when the batch executes.
    pub fn push(&mut self, cmd: Box<dyn PaneCommand>) {
        self.commands.push(cmd);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Descriptions of the contained commands, in execution order.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|cmd| cmd.description())
    }
}

impl PaneCommand for CommandBatch {
    fn execute(&mut self, model: &mut PaneModel) -> CommandResult {
        if self.executed {
            return Err(CommandError::AlreadyExecuted);
        }
        for i in 0..self.commands.len() {
            if let Err(err) = self.commands[i].execute(model) {
                // Roll back what already ran.
                for j in (0..i).rev() {
                    let _ = self.commands[j].undo(model);
                }
                self.executed_to = 0;
                return Err(err);
            }
            self.executed_to = i + 1;
        }
        self.executed = true;
        Ok(())
    }

    fn undo(&mut self, model: &mut PaneModel) -> CommandResult {
        if !self.is_executed() {
            return Err(CommandError::NotExecuted);
        }
        for i in (0..self.executed_to).rev() {
            self.commands[i].undo(model)?;
            self.executed_to = i;
        }
        self.executed = false;
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Batch
    }

    fn is_executed(&self) -> bool {
        self.executed
    }
}
