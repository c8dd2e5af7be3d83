//! Tree reconciler: which panes need a widget created, destroyed, or swapped.
//!
//! The diff is a set difference over `{pane_id: widget_id}` maps, not a
//! positional diff. Moving or resizing a pane without changing its widget
//! produces an empty diff; hosts re-query geometry for repositioning.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use multisplit_core::{PaneId, WidgetId};

use crate::snapshot::{ModelSnapshot, NodeSnapshot};
use crate::tree::PaneModel;

/// Panes that appeared, disappeared, or changed widget between revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub added: BTreeSet<PaneId>,
    pub removed: BTreeSet<PaneId>,
    pub modified: BTreeSet<PaneId>,
}

impl DiffResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of panes the host has to touch.
    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Diff two model revisions. `None` stands for an empty tree.
#[must_use]
pub fn diff(old: Option<&PaneModel>, new: Option<&PaneModel>) -> DiffResult {
    diff_maps(&model_widgets(old), &model_widgets(new))
}

/// Diff two serialized revisions. `None` (or a null root) is an empty tree.
#[must_use]
pub fn diff_snapshots(old: Option<&ModelSnapshot>, new: Option<&ModelSnapshot>) -> DiffResult {
    diff_maps(&snapshot_widgets(old), &snapshot_widgets(new))
}

fn model_widgets(model: Option<&PaneModel>) -> BTreeMap<&PaneId, &WidgetId> {
    model
        .map(|model| {
            model
                .leaves()
                .into_iter()
                .map(|leaf| (leaf.pane_id(), leaf.widget_id()))
                .collect()
        })
        .unwrap_or_default()
}

fn snapshot_widgets(snapshot: Option<&ModelSnapshot>) -> BTreeMap<&PaneId, &WidgetId> {
    let mut out = BTreeMap::new();
    let mut stack: Vec<&NodeSnapshot> = snapshot
        .and_then(|s| s.root.as_ref())
        .into_iter()
        .collect();
    while let Some(node) = stack.pop() {
        match node {
            NodeSnapshot::Leaf {
                pane_id, widget_id, ..
            } => {
                out.insert(pane_id, widget_id);
            }
            NodeSnapshot::Split { children, .. } => stack.extend(children.iter()),
        }
    }
    out
}

fn diff_maps(
    old: &BTreeMap<&PaneId, &WidgetId>,
    new: &BTreeMap<&PaneId, &WidgetId>,
) -> DiffResult {
    let mut result = DiffResult::default();
    for (&pane, &widget) in old {
        match new.get(pane) {
            None => {
                result.removed.insert(pane.clone());
            }
            Some(&next) if next != widget => {
                result.modified.insert(pane.clone());
            }
            Some(_) => {}
        }
    }
    for &pane in new.keys() {
        if !old.contains_key(pane) {
            result.added.insert(pane.clone());
        }
    }
    result
}

/// Host-side widget factory.
///
/// The engine never calls this; a [`WidgetHost`] drives it from a
/// [`DiffResult`] inside the host's reconciliation loop.
pub trait WidgetProvider {
    /// Opaque toolkit widget.
    type Handle;

    /// Create content for `pane_id`.
    fn provide_widget(&mut self, widget_id: &WidgetId, pane_id: &PaneId) -> Self::Handle;

    /// Dispose of content previously provided for `pane_id`.
    fn widget_closing(&mut self, widget_id: &WidgetId, pane_id: &PaneId, handle: Self::Handle);
}

/// Live widgets keyed by pane, kept in step with a model by applying diffs.
pub struct WidgetHost<P: WidgetProvider> {
    provider: P,
    live: BTreeMap<PaneId, (WidgetId, P::Handle)>,
}

impl<P: WidgetProvider> fmt::Debug for WidgetHost<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetHost")
            .field("live", &self.live.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<P: WidgetProvider> WidgetHost<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            live: BTreeMap::new(),
        }
    }

    /// Apply `diff` against the current `model`.
    ///
    /// Closes removed and modified panes first, then provides modified and
    /// added ones.
    pub fn apply(&mut self, diff: &DiffResult, model: &PaneModel) {
        for pane in diff.removed.iter().chain(&diff.modified) {
            if let Some((widget, handle)) = self.live.remove(pane) {
                self.provider.widget_closing(&widget, pane, handle);
            }
        }
        for pane in diff.modified.iter().chain(&diff.added) {
            if let Some(leaf) = model.leaf(pane) {
                let widget = leaf.widget_id().clone();
                let handle = self.provider.provide_widget(&widget, pane);
                self.live.insert(pane.clone(), (widget, handle));
            }
        }
    }

    /// Diff `previous` against `model` and apply the result.
    pub fn sync(&mut self, previous: Option<&PaneModel>, model: &PaneModel) -> DiffResult {
        let delta = diff(previous, Some(model));
        self.apply(&delta, model);
        delta
    }

    /// Close every live widget.
    pub fn close_all(&mut self) {
        for (pane, (widget, handle)) in std::mem::take(&mut self.live) {
            self.provider.widget_closing(&widget, &pane, handle);
        }
    }

    #[must_use]
    pub fn handle(&self, pane_id: &PaneId) -> Option<&P::Handle> {
        self.live.get(pane_id).map(|(_, handle)| handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn into_provider(self) -> P {
        self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multisplit_core::{NodeId, Orientation, SizeConstraints};

    fn leaf(pane: &str, widget: &str) -> NodeSnapshot {
        NodeSnapshot::Leaf {
            pane_id: PaneId::new(pane),
            widget_id: WidgetId::new(widget),
            constraints: SizeConstraints::default(),
        }
    }

    fn pair(a: NodeSnapshot, b: NodeSnapshot) -> PaneModel {
        PaneModel::from_snapshot(&ModelSnapshot {
            root: Some(NodeSnapshot::Split {
                node_id: NodeId::new("s"),
                orientation: Orientation::Horizontal,
                children: vec![a, b],
                ratios: vec![0.5, 0.5],
            }),
            focused_pane_id: None,
        })
        .expect("valid")
    }

    fn set(ids: &[&str]) -> BTreeSet<PaneId> {
        ids.iter().map(|id| PaneId::new(*id)).collect()
    }

    #[test]
    fn added_and_removed() {
        let old = pair(leaf("p1", "editor:a"), leaf("p2", "editor:b"));
        let new = pair(leaf("p1", "editor:a"), leaf("p3", "terminal:1"));
        let result = diff(Some(&old), Some(&new));
        assert_eq!(result.added, set(&["p3"]));
        assert_eq!(result.removed, set(&["p2"]));
        assert!(result.modified.is_empty());
    }

    #[test]
    fn widget_change_is_modified() {
        let old = pair(leaf("p1", "editor:a"), leaf("p2", "editor:b"));
        let new = pair(leaf("p1", "editor:a"), leaf("p2", "browser:b"));
        let result = diff(Some(&old), Some(&new));
        assert_eq!(result.modified, set(&["p2"]));
        assert_eq!(result.changed_count(), 1);
    }

    #[test]
    fn reordering_is_not_a_change() {
        let old = pair(leaf("p1", "editor:a"), leaf("p2", "editor:b"));
        let new = pair(leaf("p2", "editor:b"), leaf("p1", "editor:a"));
        assert!(diff(Some(&old), Some(&new)).is_empty());
    }

    #[test]
    fn null_tree_is_empty_set() {
        let model = pair(leaf("p1", "a"), leaf("p2", "b"));
        assert_eq!(diff(None, Some(&model)).added, set(&["p1", "p2"]));
        assert_eq!(diff(Some(&model), None).removed, set(&["p1", "p2"]));
        assert!(diff(None, None).is_empty());
    }

    #[test]
    fn snapshot_diff_matches_model_diff() {
        let old = pair(leaf("p1", "editor:a"), leaf("p2", "editor:b"));
        let new = pair(leaf("p1", "editor:z"), leaf("p3", "editor:b"));
        assert_eq!(
            diff_snapshots(Some(&old.to_snapshot()), Some(&new.to_snapshot())),
            diff(Some(&old), Some(&new))
        );
    }

    #[derive(Default)]
    struct Recorder {
        next: u32,
        log: Vec<String>,
    }

    impl WidgetProvider for Recorder {
        type Handle = u32;

        fn provide_widget(&mut self, widget_id: &WidgetId, pane_id: &PaneId) -> u32 {
            self.next += 1;
            self.log.push(format!("provide {pane_id} {widget_id}"));
            self.next
        }

        fn widget_closing(&mut self, widget_id: &WidgetId, pane_id: &PaneId, handle: u32) {
            self.log.push(format!("close {pane_id} {widget_id} #{handle}"));
        }
    }

    #[test]
    fn widget_host_closes_before_providing() {
        let first = pair(leaf("p1", "editor:a"), leaf("p2", "editor:b"));
        let second = pair(leaf("p1", "editor:z"), leaf("p3", "terminal:1"));
        let mut host = WidgetHost::new(Recorder::default());
        host.sync(None, &first);
        assert_eq!(host.len(), 2);

        host.sync(Some(&first), &second);
        assert_eq!(host.len(), 2);
        assert!(host.handle(&PaneId::new("p2")).is_none());
        let log = &host.provider().log;
        assert_eq!(
            log[2..].to_vec(),
            vec![
                "close p2 editor:b #2".to_string(),
                "close p1 editor:a #1".to_string(),
                "provide p1 editor:z".to_string(),
                "provide p3 terminal:1".to_string(),
            ]
        );

        host.close_all();
        assert!(host.is_empty());
    }
}
