#![forbid(unsafe_code)]

//! The pane controller: validated mutation, undo/redo, and transactions.
//!
//! Every mutating entry point follows the same path:
//!
//! ```text
//! validate ──fail──> last_validation = errors, return false
//!    │ ok
//!    ▼
//! command.execute(model) ──fail──> last_validation = error, return false
//!    │ ok
//!    ▼
//! in transaction? ──yes──> pending list
//!    │ no
//!    ▼
//! undo stack (FIFO eviction), clear redo, emit ModelEvent
//! ```
//!
//! # Transactions
//!
//! `begin_transaction` nests. While any transaction is open, executed
//! commands collect in a pending list, `undo`/`redo` refuse to run, and
//! change notifications are held back. The outermost commit pushes the
//! pending commands as one undo entry; a rollback undoes the commands of the
//! innermost open transaction in reverse order.

use std::collections::VecDeque;

use multisplit_core::{Bounds, NodeId, PaneId, Signal, Subscription, WidgetId};
use multisplit_layout::{
    GeometryCalculator, LayoutResult, LeafNode, ModelSnapshot, PaneModel, SnapshotError,
    SplitPlacement, ValidationResult, validate,
};
use tracing::{debug, info, warn};

use crate::command::{
    CommandBatch, CommandKind, PaneCommand, RemovePaneCommand, SetRatiosCommand,
    SplitPaneCommand,
};
use crate::config::{ConfigError, DEFAULT_MAX_UNDO_LEVELS, EngineConfig};

/// Why the model changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOrigin {
    Execute,
    Undo,
    Redo,
    Commit,
    Rollback,
}

/// Notification emitted on the controller's [`Signal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// The tree changed shape, ratios, or widgets.
    Changed {
        kind: CommandKind,
        origin: ChangeOrigin,
    },
    /// Focus moved.
    FocusChanged {
        previous: Option<PaneId>,
        current: Option<PaneId>,
    },
    /// The whole model was replaced and history cleared.
    Reset,
}

/// Owner of the [`PaneModel`] and its undo history.
pub struct PaneController {
    model: PaneModel,
    undo_stack: VecDeque<Box<dyn PaneCommand>>,
    redo_stack: Vec<Box<dyn PaneCommand>>,
    max_undo_levels: usize,
    /// Pending-list length at each open `begin_transaction`.
    marks: Vec<usize>,
    pending: Vec<Box<dyn PaneCommand>>,
    /// Whether anything ran since the outermost transaction opened.
    transaction_dirty: bool,
    /// Focus when the outermost transaction opened.
    transaction_focus: Option<PaneId>,
    last_validation: ValidationResult,
    events: Signal<ModelEvent>,
    geometry: GeometryCalculator,
}

impl std::fmt::Debug for PaneController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaneController")
            .field("panes", &self.model.pane_count())
            .field("undo_depth", &self.undo_stack.len())
            .field("redo_depth", &self.redo_stack.len())
            .field("max_undo_levels", &self.max_undo_levels)
            .field("transaction_depth", &self.marks.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Default for PaneController {
    fn default() -> Self {
        Self::new(PaneModel::new())
    }
}

impl PaneController {
    /// Controller over `model` with default limits.
    #[must_use]
    pub fn new(model: PaneModel) -> Self {
        Self {
            model,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_undo_levels: DEFAULT_MAX_UNDO_LEVELS,
            marks: Vec::new(),
            pending: Vec::new(),
            transaction_dirty: false,
            transaction_focus: None,
            last_validation: ValidationResult::ok(),
            events: Signal::new(),
            geometry: GeometryCalculator::default(),
        }
    }

    /// Controller over `model` configured by `config`.
    pub fn with_config(model: PaneModel, config: &EngineConfig) -> Result<Self, ConfigError> {
        let config = config.clone().validated()?;
        let mut controller = Self::new(model);
        controller.max_undo_levels = config.history.max_undo_levels;
        controller.geometry = GeometryCalculator::new(config.geometry.divider_width);
        Ok(controller)
    }

    /// Set the undo cap, evicting the oldest entries if needed. Values
    /// below 1 are treated as 1.
    pub fn set_max_undo_levels(&mut self, levels: usize) {
        self.max_undo_levels = levels.max(1);
        self.enforce_limit();
    }

    #[must_use]
    pub const fn max_undo_levels(&self) -> usize {
        self.max_undo_levels
    }

    // --- queries ------------------------------------------------------------

    #[must_use]
    pub fn model(&self) -> &PaneModel {
        &self.model
    }

    #[must_use]
    pub fn get_all_pane_ids(&self) -> Vec<PaneId> {
        self.model.pane_ids()
    }

    #[must_use]
    pub fn get_pane(&self, pane_id: &PaneId) -> Option<&LeafNode> {
        self.model.leaf(pane_id)
    }

    #[must_use]
    pub fn focused_pane_id(&self) -> Option<&PaneId> {
        self.model.focused_pane_id()
    }

    /// Outcome of the most recent validation or failed command.
    #[must_use]
    pub fn last_validation(&self) -> &ValidationResult {
        &self.last_validation
    }

    /// Lay out the current model inside `outer`.
    #[must_use]
    pub fn layout(&self, outer: Bounds) -> LayoutResult {
        self.geometry.calculate(&self.model, outer)
    }

    #[must_use]
    pub fn geometry(&self) -> &GeometryCalculator {
        &self.geometry
    }

    #[must_use]
    pub fn to_snapshot(&self) -> ModelSnapshot {
        self.model.to_snapshot()
    }

    // --- events -------------------------------------------------------------

    /// Subscribe to model events. Dropping the subscription unsubscribes.
    #[must_use]
    pub fn connect(&self, handler: impl Fn(&ModelEvent) + 'static) -> Subscription {
        self.events.connect(handler)
    }

    pub fn disconnect(&self, subscription: Subscription) -> bool {
        self.events.disconnect(subscription)
    }

    /// The underlying channel, for bridging into a host toolkit.
    #[must_use]
    pub fn events(&self) -> &Signal<ModelEvent> {
        &self.events
    }

    // --- validated operations -----------------------------------------------

    /// Split `pane_id`, giving the new pane `ratio` of the space.
    ///
    /// On success the new pane is focused (except for `Replace`).
    pub fn split_pane(
        &mut self,
        pane_id: &PaneId,
        widget_id: WidgetId,
        placement: SplitPlacement,
        ratio: f64,
    ) -> bool {
        let mut result = validate::validate_split(&self.model, pane_id, placement, ratio);
        result.merge(validate::validate_widget_id(&widget_id));
        if !self.accept(result) {
            return false;
        }
        self.run(Box::new(SplitPaneCommand::new(
            pane_id.clone(),
            widget_id,
            placement,
            ratio,
        )))
    }

    /// [`Self::split_pane`] with a caller-chosen id for the new pane.
    pub fn split_pane_with_id(
        &mut self,
        pane_id: &PaneId,
        new_pane_id: PaneId,
        widget_id: WidgetId,
        placement: SplitPlacement,
        ratio: f64,
    ) -> bool {
        let mut result = validate::validate_split(&self.model, pane_id, placement, ratio);
        result.merge(validate::validate_widget_id(&widget_id));
        if new_pane_id.is_empty() {
            result.add_error("new pane id must not be empty");
        } else if self.model.contains_pane(&new_pane_id) {
            result.add_error(format!("pane '{new_pane_id}' already exists"));
        }
        if !self.accept(result) {
            return false;
        }
        let command = SplitPaneCommand::new(pane_id.clone(), widget_id, placement, ratio)
            .with_pane_id(new_pane_id);
        self.run(Box::new(command))
    }

    /// Remove `pane_id`, collapsing splits left with one child.
    pub fn remove_pane(&mut self, pane_id: &PaneId) -> bool {
        let result = validate::validate_remove(&self.model, pane_id);
        if !self.accept(result) {
            return false;
        }
        self.run(Box::new(RemovePaneCommand::new(pane_id.clone())))
    }

    /// Replace the ratios of split `node_id`.
    pub fn set_ratios(&mut self, node_id: &NodeId, ratios: &[f64]) -> bool {
        let result = validate::validate_ratios(&self.model, node_id, ratios);
        if !self.accept(result) {
            return false;
        }
        self.run(Box::new(SetRatiosCommand::new(node_id.clone(), ratios)))
    }

    /// Move focus to `pane_id`. Focus changes are not recorded in history.
    pub fn focus_pane(&mut self, pane_id: &PaneId) -> bool {
        let result = validate::validate_focus(&self.model, pane_id);
        if !self.accept(result) {
            return false;
        }
        match self.model.set_focused_pane_id(Some(pane_id.clone())) {
            Ok(previous) => {
                if !self.in_transaction() && previous.as_ref() != Some(pane_id) {
                    self.events.emit(&ModelEvent::FocusChanged {
                        previous,
                        current: Some(pane_id.clone()),
                    });
                }
                true
            }
            Err(err) => {
                self.last_validation = ValidationResult::error(err.to_string());
                false
            }
        }
    }

    /// Execute an arbitrary command without pre-flight validation.
    pub fn execute(&mut self, command: Box<dyn PaneCommand>) -> bool {
        self.last_validation = ValidationResult::ok();
        self.run(command)
    }

    // --- history ------------------------------------------------------------

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.in_transaction() && !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.in_transaction() && !self.redo_stack.is_empty()
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Up to `limit` undo descriptions, most recent first.
    #[must_use]
    pub fn undo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.undo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|cmd| cmd.description())
            .collect()
    }

    /// Up to `limit` redo descriptions, next redo first.
    #[must_use]
    pub fn redo_descriptions(&self, limit: usize) -> Vec<&str> {
        self.redo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|cmd| cmd.description())
            .collect()
    }

    /// Undo the most recent entry.
    pub fn undo(&mut self) -> bool {
        if self.in_transaction() {
            warn!("undo refused: transaction open");
            return false;
        }
        let Some(mut command) = self.undo_stack.pop_back() else {
            return false;
        };
        let focus_before = self.model.focused_pane_id().cloned();
        match command.undo(&mut self.model) {
            Ok(()) => {
                debug!(command = command.description(), "undone");
                let kind = command.kind();
                self.redo_stack.push(command);
                self.announce(kind, ChangeOrigin::Undo, focus_before);
                true
            }
            Err(err) => {
                warn!(command = command.description(), error = %err, "undo failed");
                self.last_validation = ValidationResult::error(err.to_string());
                self.undo_stack.push_back(command);
                false
            }
        }
    }

    /// Re-apply the most recently undone entry.
    pub fn redo(&mut self) -> bool {
        if self.in_transaction() {
            warn!("redo refused: transaction open");
            return false;
        }
        let Some(mut command) = self.redo_stack.pop() else {
            return false;
        };
        let focus_before = self.model.focused_pane_id().cloned();
        match command.redo(&mut self.model) {
            Ok(()) => {
                debug!(command = command.description(), "redone");
                let kind = command.kind();
                self.undo_stack.push_back(command);
                self.enforce_limit();
                self.announce(kind, ChangeOrigin::Redo, focus_before);
                true
            }
            Err(err) => {
                warn!(command = command.description(), error = %err, "redo failed");
                self.last_validation = ValidationResult::error(err.to_string());
                self.redo_stack.push(command);
                false
            }
        }
    }

    /// Drop all undo and redo entries.
    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    // --- snapshots ----------------------------------------------------------

    /// Replace the model with `snapshot` and clear history.
    ///
    /// Any open transaction is abandoned without rollback. On error the
    /// current model is kept.
    pub fn load_snapshot(&mut self, snapshot: &ModelSnapshot) -> Result<(), SnapshotError> {
        let model = PaneModel::from_snapshot(snapshot)?;
        self.replace_model(model);
        Ok(())
    }

    /// [`Self::load_snapshot`] from JSON text.
    pub fn load_json(&mut self, json: &str) -> Result<(), SnapshotError> {
        let model = PaneModel::from_json(json)?;
        self.replace_model(model);
        Ok(())
    }

    fn replace_model(&mut self, model: PaneModel) {
        if self.in_transaction() {
            warn!(
                depth = self.marks.len(),
                pending = self.pending.len(),
                "model replaced inside a transaction; pending commands dropped"
            );
        }
        self.model = model;
        self.marks.clear();
        self.pending.clear();
        self.transaction_dirty = false;
        self.clear_history();
        self.last_validation = ValidationResult::ok();
        info!(panes = self.model.pane_count(), "model loaded");
        self.events.emit(&ModelEvent::Reset);
    }

    // --- transactions -------------------------------------------------------

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        !self.marks.is_empty()
    }

    #[must_use]
    pub fn transaction_depth(&self) -> usize {
        self.marks.len()
    }

    pub fn begin_transaction(&mut self) {
        if self.marks.is_empty() {
            self.transaction_dirty = false;
            self.transaction_focus = self.model.focused_pane_id().cloned();
        }
        self.marks.push(self.pending.len());
        debug!(depth = self.marks.len(), "transaction begun");
    }

    /// Close the innermost transaction, keeping its commands.
    ///
    /// The outermost commit pushes everything pending as one undo entry.
    pub fn commit_transaction(&mut self) -> bool {
        if self.marks.pop().is_none() {
            warn!("commit without an open transaction");
            return false;
        }
        if self.in_transaction() {
            return true;
        }

        let mut pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        let entry: Option<Box<dyn PaneCommand>> = match count {
            0 => None,
            1 => pending.pop(),
            _ => Some(Box::new(CommandBatch::from_executed(
                format!("Transaction ({count} commands)"),
                pending,
            ))),
        };
        match entry {
            Some(entry) => {
                let kind = entry.kind();
                self.push_undo(entry);
                self.redo_stack.clear();
                info!(commands = count, "transaction committed");
                self.emit_change(kind, ChangeOrigin::Commit);
            }
            None => {
                let before = self.transaction_focus.take();
                self.emit_focus_change(before);
            }
        }
        self.finish_transaction();
        true
    }

    /// Undo and discard the commands of the innermost transaction.
    pub fn rollback_transaction(&mut self) -> bool {
        let Some(mark) = self.marks.pop() else {
            warn!("rollback without an open transaction");
            return false;
        };
        let mut ok = true;
        while self.pending.len() > mark {
            let Some(mut command) = self.pending.pop() else {
                break;
            };
            if let Err(err) = command.undo(&mut self.model) {
                warn!(command = command.description(), error = %err, "rollback step failed");
                self.last_validation = ValidationResult::error(err.to_string());
                ok = false;
            }
        }
        warn!(depth = self.marks.len() + 1, "transaction rolled back");

        if !self.in_transaction() {
            if self.transaction_dirty {
                self.emit_change(CommandKind::Batch, ChangeOrigin::Rollback);
            } else {
                let before = self.transaction_focus.take();
                self.emit_focus_change(before);
            }
            self.finish_transaction();
        }
        ok
    }

    /// Run `body` inside a transaction; commit if it returns `true`,
    /// roll back otherwise.
    pub fn transaction(&mut self, body: impl FnOnce(&mut Self) -> bool) -> bool {
        self.begin_transaction();
        if body(self) {
            self.commit_transaction()
        } else {
            self.rollback_transaction();
            false
        }
    }

    // --- internals ----------------------------------------------------------

    fn accept(&mut self, result: ValidationResult) -> bool {
        let valid = result.is_valid;
        if !valid {
            warn!(reason = %result, "operation rejected");
        }
        self.last_validation = result;
        valid
    }

    fn run(&mut self, mut command: Box<dyn PaneCommand>) -> bool {
        let focus_before = self.model.focused_pane_id().cloned();
        if let Err(err) = command.execute(&mut self.model) {
            warn!(command = command.description(), error = %err, "command failed");
            self.last_validation.add_error(err.to_string());
            return false;
        }
        debug!(command = command.description(), "executed");

        let kind = command.kind();
        if self.in_transaction() {
            self.pending.push(command);
            self.transaction_dirty = true;
        } else {
            self.push_undo(command);
            self.redo_stack.clear();
            self.announce(kind, ChangeOrigin::Execute, focus_before);
        }
        true
    }

    fn push_undo(&mut self, command: Box<dyn PaneCommand>) {
        self.undo_stack.push_back(command);
        self.enforce_limit();
    }

    fn enforce_limit(&mut self) {
        while self.undo_stack.len() > self.max_undo_levels {
            if let Some(evicted) = self.undo_stack.pop_front() {
                debug!(command = evicted.description(), "evicted from undo history");
            }
        }
    }

    fn announce(&self, kind: CommandKind, origin: ChangeOrigin, focus_before: Option<PaneId>) {
        if self.in_transaction() {
            return;
        }
        self.events.emit(&ModelEvent::Changed { kind, origin });
        self.emit_focus_change(focus_before);
    }

    fn emit_change(&mut self, kind: CommandKind, origin: ChangeOrigin) {
        let focus_before = self.transaction_focus.take();
        self.announce(kind, origin, focus_before);
    }

    fn emit_focus_change(&self, previous: Option<PaneId>) {
        let current = self.model.focused_pane_id().cloned();
        if current != previous {
            self.events
                .emit(&ModelEvent::FocusChanged { previous, current });
        }
    }

    fn finish_transaction(&mut self) {
        self.pending.clear();
        self.transaction_dirty = false;
        self.transaction_focus = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn pid(id: &str) -> PaneId {
        PaneId::new(id)
    }

    fn controller() -> PaneController {
        PaneController::new(PaneModel::singleton(pid("p1"), WidgetId::new("editor:main")))
    }

    fn recorder(ctl: &PaneController) -> (Rc<RefCell<Vec<ModelEvent>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let sub = ctl.connect(move |event| sink.borrow_mut().push(event.clone()));
        (log, sub)
    }

    #[test]
    fn rejected_split_leaves_model_and_history_untouched() {
        let mut ctl = controller();
        let before = ctl.to_snapshot();
        assert!(!ctl.split_pane(&pid("p1"), WidgetId::new("t"), SplitPlacement::Right, 0.01));
        assert!(!ctl.last_validation().is_valid);
        assert!(ctl.last_validation().errors[0].contains("minimum ratio"));
        assert_eq!(ctl.to_snapshot(), before);
        assert!(!ctl.can_undo());
    }

    #[test]
    fn unvalidated_command_with_full_ratio_is_refused() {
        let mut ctl = controller();
        let before = ctl.to_snapshot();
        let (log, _sub) = recorder(&ctl);
        let cmd = SplitPaneCommand::new(pid("p1"), WidgetId::new("t"), SplitPlacement::Right, 1.0);
        assert!(!ctl.execute(Box::new(cmd)));
        assert!(!ctl.last_validation().is_valid);
        assert_eq!(ctl.to_snapshot(), before);
        assert_eq!(ctl.focused_pane_id(), Some(&pid("p1")));
        assert_eq!(ctl.undo_depth(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn empty_widget_id_is_rejected() {
        let mut ctl = controller();
        assert!(!ctl.split_pane(&pid("p1"), WidgetId::new(""), SplitPlacement::Right, 0.5));
        assert_eq!(ctl.model().pane_count(), 1);
    }

    #[test]
    fn split_undo_redo_cycle() {
        let mut ctl = controller();
        let before = ctl.to_snapshot();
        assert!(ctl.split_pane(&pid("p1"), WidgetId::new("terminal"), SplitPlacement::Right, 0.3));
        let after = ctl.to_snapshot();
        assert_eq!(ctl.get_all_pane_ids().len(), 2);
        assert!(ctl.can_undo() && !ctl.can_redo());

        assert!(ctl.undo());
        assert_eq!(ctl.to_snapshot(), before);
        assert!(ctl.can_redo());
        assert!(ctl.redo());
        assert_eq!(ctl.to_snapshot(), after);
        assert!(!ctl.redo());
    }

    #[test]
    fn new_command_clears_redo() {
        let mut ctl = controller();
        assert!(ctl.split_pane(&pid("p1"), WidgetId::new("a"), SplitPlacement::Right, 0.5));
        assert!(ctl.undo());
        assert_eq!(ctl.redo_depth(), 1);
        assert!(ctl.split_pane(&pid("p1"), WidgetId::new("b"), SplitPlacement::Bottom, 0.5));
        assert_eq!(ctl.redo_depth(), 0);
    }

    #[test]
    fn history_evicts_oldest() {
        let mut ctl = controller();
        ctl.set_max_undo_levels(2);
        for _ in 0..4 {
            let focused = ctl.focused_pane_id().cloned().expect("focus");
            assert!(ctl.split_pane(&focused, WidgetId::new("x"), SplitPlacement::Right, 0.5));
        }
        assert_eq!(ctl.undo_depth(), 2);
        assert!(ctl.undo() && ctl.undo());
        assert!(!ctl.undo());
        assert_eq!(ctl.model().pane_count(), 3);
    }

    #[test]
    fn descriptions_most_recent_first() {
        let mut ctl = controller();
        assert!(ctl.split_pane_with_id(
            &pid("p1"),
            pid("p2"),
            WidgetId::new("a"),
            SplitPlacement::Right,
            0.5
        ));
        assert!(ctl.remove_pane(&pid("p2")));
        assert_eq!(ctl.undo_descriptions(10), vec!["Remove p2", "Split p1 right"]);
        assert_eq!(ctl.undo_descriptions(1), vec!["Remove p2"]);
    }

    #[test]
    fn duplicate_explicit_id_rejected() {
        let mut ctl = controller();
        assert!(!ctl.split_pane_with_id(
            &pid("p1"),
            pid("p1"),
            WidgetId::new("a"),
            SplitPlacement::Right,
            0.5
        ));
        assert!(ctl.last_validation().errors.iter().any(|e| e.contains("already exists")));
    }

    #[test]
    fn remove_last_pane_succeeds_with_warning() {
        let mut ctl = controller();
        assert!(ctl.remove_pane(&pid("p1")));
        assert!(ctl.last_validation().is_valid);
        assert_eq!(ctl.last_validation().warnings.len(), 1);
        assert!(ctl.model().is_empty());
        assert!(ctl.undo());
        assert_eq!(ctl.get_all_pane_ids(), vec![pid("p1")]);
    }

    #[test]
    fn set_ratios_validates_and_undoes() {
        let mut ctl = controller();
        assert!(ctl.split_pane(&pid("p1"), WidgetId::new("a"), SplitPlacement::Right, 0.5));
        let split = ctl
            .model()
            .root_node()
            .and_then(|n| n.as_split())
            .map(|s| s.node_id().clone())
            .expect("split root");
        assert!(!ctl.set_ratios(&split, &[0.99, 0.01]));
        assert!(!ctl.set_ratios(&split, &[0.5, 0.6]));
        assert!(ctl.set_ratios(&split, &[0.25, 0.75]));
        assert!(ctl.undo());
        let ratios = ctl
            .model()
            .split_node(&split)
            .map(|s| s.ratios().to_vec())
            .expect("split");
        assert_eq!(ratios, vec![0.5, 0.5]);
    }

    #[test]
    fn events_for_execute_undo_and_focus() {
        let mut ctl = controller();
        let (log, _sub) = recorder(&ctl);
        assert!(ctl.split_pane_with_id(
            &pid("p1"),
            pid("p2"),
            WidgetId::new("a"),
            SplitPlacement::Right,
            0.5
        ));
        assert!(ctl.undo());
        assert!(ctl.focus_pane(&pid("p1")));
        assert_eq!(
            *log.borrow(),
            vec![
                ModelEvent::Changed {
                    kind: CommandKind::Split,
                    origin: ChangeOrigin::Execute
                },
                ModelEvent::FocusChanged {
                    previous: Some(pid("p1")),
                    current: Some(pid("p2"))
                },
                ModelEvent::Changed {
                    kind: CommandKind::Split,
                    origin: ChangeOrigin::Undo
                },
                ModelEvent::FocusChanged {
                    previous: Some(pid("p2")),
                    current: Some(pid("p1"))
                },
            ]
        );
    }

    #[test]
    fn focus_unknown_pane_fails() {
        let mut ctl = controller();
        assert!(!ctl.focus_pane(&pid("nope")));
        assert_eq!(ctl.focused_pane_id(), Some(&pid("p1")));
    }

    #[test]
    fn transaction_commits_as_single_entry() {
        let mut ctl = controller();
        let (log, _sub) = recorder(&ctl);
        ctl.begin_transaction();
        assert!(ctl.split_pane_with_id(
            &pid("p1"),
            pid("p2"),
            WidgetId::new("a"),
            SplitPlacement::Right,
            0.5
        ));
        assert!(ctl.split_pane_with_id(
            &pid("p2"),
            pid("p3"),
            WidgetId::new("b"),
            SplitPlacement::Bottom,
            0.5
        ));
        assert!(!ctl.can_undo());
        assert!(!ctl.undo());
        assert!(log.borrow().is_empty());
        assert!(ctl.commit_transaction());

        assert_eq!(ctl.undo_depth(), 1);
        assert_eq!(ctl.model().pane_count(), 3);
        assert_eq!(
            log.borrow()[0],
            ModelEvent::Changed {
                kind: CommandKind::Batch,
                origin: ChangeOrigin::Commit
            }
        );
        assert!(ctl.undo());
        assert_eq!(ctl.get_all_pane_ids(), vec![pid("p1")]);
        assert!(ctl.redo());
        assert_eq!(ctl.model().pane_count(), 3);
    }

    #[test]
    fn rollback_restores_model() {
        let mut ctl = controller();
        let before = ctl.to_snapshot();
        ctl.begin_transaction();
        assert!(ctl.split_pane(&pid("p1"), WidgetId::new("a"), SplitPlacement::Left, 0.4));
        assert!(ctl.remove_pane(&pid("p1")));
        assert!(ctl.rollback_transaction());
        assert_eq!(ctl.to_snapshot(), before);
        assert!(!ctl.in_transaction());
        assert_eq!(ctl.undo_depth(), 0);
    }

    #[test]
    fn nested_rollback_discards_inner_only() {
        let mut ctl = controller();
        ctl.begin_transaction();
        assert!(ctl.split_pane_with_id(
            &pid("p1"),
            pid("p2"),
            WidgetId::new("a"),
            SplitPlacement::Right,
            0.5
        ));
        ctl.begin_transaction();
        assert!(ctl.split_pane_with_id(
            &pid("p2"),
            pid("p3"),
            WidgetId::new("b"),
            SplitPlacement::Right,
            0.5
        ));
        assert_eq!(ctl.transaction_depth(), 2);
        assert!(ctl.rollback_transaction());
        assert_eq!(ctl.model().pane_count(), 2);
        assert!(ctl.commit_transaction());
        assert_eq!(ctl.undo_depth(), 1);
        assert_eq!(ctl.get_all_pane_ids(), vec![pid("p1"), pid("p2")]);
    }

    #[test]
    fn unbalanced_commit_and_rollback_fail() {
        let mut ctl = controller();
        assert!(!ctl.commit_transaction());
        assert!(!ctl.rollback_transaction());
        ctl.begin_transaction();
        assert!(ctl.commit_transaction());
        assert_eq!(ctl.undo_depth(), 0);
    }

    #[test]
    fn transaction_closure() {
        let mut ctl = controller();
        let kept = ctl.transaction(|c| {
            c.split_pane(&pid("p1"), WidgetId::new("a"), SplitPlacement::Right, 0.5)
        });
        assert!(kept);
        assert_eq!(ctl.model().pane_count(), 2);

        let dropped = ctl.transaction(|c| {
            c.split_pane(&pid("p1"), WidgetId::new("b"), SplitPlacement::Top, 0.5)
                && c.split_pane(&pid("missing"), WidgetId::new("c"), SplitPlacement::Top, 0.5)
        });
        assert!(!dropped);
        assert_eq!(ctl.model().pane_count(), 2);
        assert_eq!(ctl.undo_depth(), 1);
    }

    #[test]
    fn load_resets_history_and_emits() {
        let mut ctl = controller();
        assert!(ctl.split_pane(&pid("p1"), WidgetId::new("a"), SplitPlacement::Right, 0.5));
        let (log, _sub) = recorder(&ctl);
        let json =
            r#"{"root":{"type":"leaf","pane_id":"solo","widget_id":"x"},"focused_pane_id":null}"#;
        ctl.load_json(json).expect("valid json");
        assert_eq!(ctl.get_all_pane_ids(), vec![pid("solo")]);
        assert!(!ctl.can_undo());
        assert_eq!(*log.borrow(), vec![ModelEvent::Reset]);
        assert!(ctl.load_json("{").is_err());
        assert_eq!(ctl.get_all_pane_ids(), vec![pid("solo")]);
    }

    #[test]
    fn dropped_subscription_stops_events() {
        let mut ctl = controller();
        let (log, sub) = recorder(&ctl);
        drop(sub);
        assert!(ctl.split_pane(&pid("p1"), WidgetId::new("a"), SplitPlacement::Right, 0.5));
        assert!(log.borrow().is_empty());
        assert_eq!(ctl.events().handler_count(), 0);
    }

    #[test]
    fn with_config_applies_limits() {
        let mut config = EngineConfig::default();
        config.history.max_undo_levels = 1;
        config.geometry.divider_width = 0;
        let ctl = PaneController::with_config(PaneModel::new(), &config).expect("valid");
        assert_eq!(ctl.max_undo_levels(), 1);
        assert_eq!(ctl.geometry().divider_width(), 0);

        config.history.max_undo_levels = 0;
        assert!(PaneController::with_config(PaneModel::new(), &config).is_err());
    }

    #[test]
    fn layout_uses_configured_dividers() {
        let mut ctl = controller();
        assert!(ctl.split_pane_with_id(
            &pid("p1"),
            pid("p2"),
            WidgetId::new("a"),
            SplitPlacement::Right,
            0.5
        ));
        let layout = ctl.layout(Bounds::new(0, 0, 804, 600));
        assert_eq!(layout.bounds(&pid("p1")), Some(Bounds::new(0, 0, 400, 600)));
        assert_eq!(layout.bounds(&pid("p2")), Some(Bounds::new(404, 0, 400, 600)));
        assert!(layout.is_feasible());
    }
}
