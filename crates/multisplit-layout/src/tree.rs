//! Arena-backed split tree.
//!
//! All nodes live in a flat slot vector owned by [`PaneModel`] and refer to
//! each other by [`NodeIdx`]. Three derived indexes are rebuilt from scratch
//! after every structural mutation, never patched in place:
//!
//! - the parent table, covering every live slot (detached subtrees included);
//! - the pane registry `PaneId -> NodeIdx`, covering leaves reachable from
//!   the root;
//! - the split index `NodeId -> NodeIdx`, covering reachable splits.
//!
//! Structural primitives refuse anything that would make a node the child of
//! two parents or introduce a cycle, so the arena always holds a forest.

use std::fmt;

use multisplit_core::{ConstraintError, NodeId, Orientation, PaneId, SizeConstraints, WidgetId};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::snapshot::NodeSnapshot;
use crate::utils::settle_ratios;

/// Index of a node slot in the model's arena.
///
/// Indices are reused after a subtree is released, so they are only
/// meaningful until the next structural mutation. Use [`PaneId`] or
/// [`NodeId`] for identity that must survive edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIdx(usize);

impl NodeIdx {
    /// Raw slot number.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a new pane goes relative to the target pane of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPlacement {
    /// Wrap the target in a horizontal split, new pane first.
    Left,
    /// Wrap the target in a horizontal split, new pane second.
    Right,
    /// Wrap the target in a vertical split, new pane first.
    Top,
    /// Wrap the target in a vertical split, new pane second.
    Bottom,
    /// Insert as a sibling immediately before the target in its parent split.
    Before,
    /// Insert as a sibling immediately after the target in its parent split.
    After,
    /// Swap the target's widget in place.
    Replace,
}

impl SplitPlacement {
    /// Orientation of the wrapping split for directional placements.
    #[must_use]
    pub const fn orientation(self) -> Option<Orientation> {
        match self {
            Self::Left | Self::Right => Some(Orientation::Horizontal),
            Self::Top | Self::Bottom => Some(Orientation::Vertical),
            Self::Before | Self::After | Self::Replace => None,
        }
    }

    /// Whether the new pane precedes the target.
    #[must_use]
    pub const fn inserts_first(self) -> bool {
        matches!(self, Self::Left | Self::Top | Self::Before)
    }

    /// `Left`, `Right`, `Top` or `Bottom`.
    #[must_use]
    pub const fn is_directional(self) -> bool {
        self.orientation().is_some()
    }

    /// `Before` or `After`.
    #[must_use]
    pub const fn is_sibling(self) -> bool {
        matches!(self, Self::Before | Self::After)
    }
}

impl fmt::Display for SplitPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Before => "before",
            Self::After => "after",
            Self::Replace => "replace",
        };
        f.write_str(name)
    }
}

/// Terminal content holder.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pane_id: PaneId,
    widget_id: WidgetId,
    constraints: SizeConstraints,
}

impl LeafNode {
    #[must_use]
    pub fn pane_id(&self) -> &PaneId {
        &self.pane_id
    }

    #[must_use]
    pub fn widget_id(&self) -> &WidgetId {
        &self.widget_id
    }

    #[must_use]
    pub fn constraints(&self) -> SizeConstraints {
        self.constraints
    }
}

/// Internal node dividing its rectangle among ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitNode {
    node_id: NodeId,
    orientation: Orientation,
    children: Vec<NodeIdx>,
    ratios: Vec<f64>,
}

impl SplitNode {
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Children in layout order.
    #[must_use]
    pub fn children(&self) -> &[NodeIdx] {
        &self.children
    }

    /// Ratios parallel to [`Self::children`].
    #[must_use]
    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Node payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(LeafNode),
    Split(SplitNode),
}

impl Node {
    #[must_use]
    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            Self::Split(_) => None,
        }
    }

    #[must_use]
    pub fn as_split(&self) -> Option<&SplitNode> {
        match self {
            Self::Split(split) => Some(split),
            Self::Leaf(_) => None,
        }
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// The pane id of a leaf or the node id of a split.
    #[must_use]
    pub fn id_str(&self) -> &str {
        match self {
            Self::Leaf(leaf) => leaf.pane_id.as_str(),
            Self::Split(split) => split.node_id.as_str(),
        }
    }

    fn children(&self) -> &[NodeIdx] {
        match self {
            Self::Leaf(_) => &[],
            Self::Split(split) => &split.children,
        }
    }
}

/// The authoritative pane tree.
///
/// Mutation goes through the structural primitives below; the runtime's
/// commands compose them into undoable operations.
#[derive(Debug, Clone, Default)]
pub struct PaneModel {
    slots: Vec<Option<Node>>,
    free: Vec<NodeIdx>,
    root: Option<NodeIdx>,
    focused: Option<PaneId>,
    parents: FxHashMap<NodeIdx, NodeIdx>,
    registry: FxHashMap<PaneId, NodeIdx>,
    splits: FxHashMap<NodeId, NodeIdx>,
    next_pane_serial: u64,
    next_split_serial: u64,
}

impl PartialEq for PaneModel {
    /// Structural equality: shape, ids, ratios, constraints and focus.
    /// Arena indices are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.to_snapshot() == other.to_snapshot()
    }
}

impl PaneModel {
    /// Empty model with no root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Model holding a single focused pane.
    #[must_use]
    pub fn singleton(pane_id: PaneId, widget_id: WidgetId) -> Self {
        let mut model = Self::new();
        let idx = model.alloc(Node::Leaf(LeafNode {
            pane_id: pane_id.clone(),
            widget_id,
            constraints: SizeConstraints::default(),
        }));
        model.root = Some(idx);
        model.focused = Some(pane_id);
        model.rebuild_indexes();
        model
    }

    // --- queries ----------------------------------------------------------

    #[must_use]
    pub const fn root(&self) -> Option<NodeIdx> {
        self.root
    }

    #[must_use]
    pub fn root_node(&self) -> Option<&Node> {
        self.root.and_then(|idx| self.node(idx))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[must_use]
    pub fn node(&self, idx: NodeIdx) -> Option<&Node> {
        self.slots.get(idx.0).and_then(Option::as_ref)
    }

    /// Children of `idx` (empty for leaves and unknown indices).
    #[must_use]
    pub fn children(&self, idx: NodeIdx) -> &[NodeIdx] {
        match self.node(idx) {
            Some(node) => node.children(),
            None => &[],
        }
    }

    #[must_use]
    pub fn parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.parents.get(&idx).copied()
    }

    /// Position of `idx` among its parent's children.
    #[must_use]
    pub fn index_in_parent(&self, idx: NodeIdx) -> Option<usize> {
        let parent = self.parent(idx)?;
        self.children(parent).iter().position(|&child| child == idx)
    }

    /// Topmost ancestor of `idx` (itself when it has no parent).
    #[must_use]
    pub fn get_root(&self, idx: NodeIdx) -> NodeIdx {
        let mut current = idx;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Number of ancestors above `idx`.
    #[must_use]
    pub fn get_depth(&self, idx: NodeIdx) -> usize {
        let mut depth = 0;
        let mut current = idx;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    #[must_use]
    pub fn leaf_index(&self, pane_id: &PaneId) -> Option<NodeIdx> {
        self.registry.get(pane_id).copied()
    }

    /// Registered leaf for `pane_id`.
    #[must_use]
    pub fn leaf(&self, pane_id: &PaneId) -> Option<&LeafNode> {
        self.leaf_index(pane_id)
            .and_then(|idx| self.node(idx))
            .and_then(Node::as_leaf)
    }

    #[must_use]
    pub fn contains_pane(&self, pane_id: &PaneId) -> bool {
        self.registry.contains_key(pane_id)
    }

    #[must_use]
    pub fn split_index(&self, node_id: &NodeId) -> Option<NodeIdx> {
        self.splits.get(node_id).copied()
    }

    #[must_use]
    pub fn split_node(&self, node_id: &NodeId) -> Option<&SplitNode> {
        self.split_index(node_id)
            .and_then(|idx| self.node(idx))
            .and_then(Node::as_split)
    }

    /// Pre-order walk starting at `start`, children in layout order.
    #[must_use]
    pub fn preorder(&self, start: NodeIdx) -> Vec<NodeIdx> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if self.node(idx).is_none() {
                continue;
            }
            out.push(idx);
            stack.extend(self.children(idx).iter().rev().copied());
        }
        out
    }

    /// Leaves reachable from the root, depth-first in layout order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&LeafNode> {
        self.root
            .map(|root| self.leaves_under(root))
            .unwrap_or_default()
    }

    /// Leaves under `start`, depth-first in layout order.
    #[must_use]
    pub fn leaves_under(&self, start: NodeIdx) -> Vec<&LeafNode> {
        self.preorder(start)
            .into_iter()
            .filter_map(|idx| self.node(idx).and_then(Node::as_leaf))
            .collect()
    }

    /// Pane ids in depth-first layout order.
    #[must_use]
    pub fn pane_ids(&self) -> Vec<PaneId> {
        self.leaves()
            .into_iter()
            .map(|leaf| leaf.pane_id.clone())
            .collect()
    }

    #[must_use]
    pub fn pane_count(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn focused_pane_id(&self) -> Option<&PaneId> {
        self.focused.as_ref()
    }

    /// Registry entries, in arbitrary order.
    pub fn registry(&self) -> impl Iterator<Item = (&PaneId, NodeIdx)> {
        self.registry.iter().map(|(pane, idx)| (pane, *idx))
    }

    /// Number of occupied arena slots, detached subtrees included.
    #[must_use]
    pub fn live_node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    // --- id allocation ----------------------------------------------------

    /// Next unused `pane-<n>` id.
    pub fn allocate_pane_id(&mut self) -> PaneId {
        loop {
            self.next_pane_serial += 1;
            let candidate = PaneId::new(format!("pane-{}", self.next_pane_serial));
            if !self.pane_in_arena(&candidate) {
                return candidate;
            }
        }
    }

    /// Next unused `split-<n>` id.
    pub fn allocate_node_id(&mut self) -> NodeId {
        loop {
            self.next_split_serial += 1;
            let candidate = NodeId::new(format!("split-{}", self.next_split_serial));
            if !self.node_id_in_arena(&candidate) {
                return candidate;
            }
        }
    }

    // --- structural primitives ---------------------------------------------

    /// Allocate a detached leaf.
    pub fn insert_leaf(
        &mut self,
        pane_id: PaneId,
        widget_id: WidgetId,
    ) -> Result<NodeIdx, TreeError> {
        if self.pane_in_arena(&pane_id) {
            return Err(TreeError::DuplicatePaneId(pane_id));
        }
        Ok(self.alloc(Node::Leaf(LeafNode {
            pane_id,
            widget_id,
            constraints: SizeConstraints::default(),
        })))
    }

    /// Allocate a detached split with no children.
    pub fn insert_split(
        &mut self,
        node_id: NodeId,
        orientation: Orientation,
    ) -> Result<NodeIdx, TreeError> {
        if self.node_id_in_arena(&node_id) {
            return Err(TreeError::DuplicateNodeId(node_id));
        }
        Ok(self.alloc(Node::Split(SplitNode {
            node_id,
            orientation,
            children: Vec::new(),
            ratios: Vec::new(),
        })))
    }

    /// Append a detached `child` to `parent`. See [`Self::insert_child`].
    pub fn add_child(
        &mut self,
        parent: NodeIdx,
        child: NodeIdx,
        ratio: f64,
    ) -> Result<(), TreeError> {
        let len = self.split_ref(parent)?.len();
        self.insert_child(parent, len, child, ratio)
    }

    /// Insert a detached `child` at `index` in `parent`.
    ///
    /// The child receives `ratio` and the existing ratios are scaled by
    /// `1 - ratio`. The first child of an empty split receives `1.0` and
    /// `ratio` is ignored.
    pub fn insert_child(
        &mut self,
        parent: NodeIdx,
        index: usize,
        child: NodeIdx,
        ratio: f64,
    ) -> Result<(), TreeError> {
        self.check_attachable(parent, child)?;
        let split = self.split_ref(parent)?;
        if index > split.len() {
            return Err(TreeError::IndexOutOfRange {
                index,
                len: split.len(),
            });
        }
        let first = split.is_empty();
        if !first && !(ratio.is_finite() && ratio > 0.0 && ratio < 1.0) {
            return Err(TreeError::InvalidRatio { value: ratio });
        }

        let split = self.split_mut(parent)?;
        if first {
            split.children.push(child);
            split.ratios = vec![1.0];
        } else {
            for existing in &mut split.ratios {
                *existing *= 1.0 - ratio;
            }
            split.children.insert(index, child);
            split.ratios.insert(index, ratio);
            split.ratios = settle_ratios(&split.ratios);
        }
        self.rebuild_indexes();
        Ok(())
    }

    /// Detach `child` from `parent`, renormalizing the remaining ratios.
    ///
    /// The child's subtree stays allocated; release it or reattach it.
    /// Returns the ratio the child held.
    pub fn remove_child(&mut self, parent: NodeIdx, child: NodeIdx) -> Result<f64, TreeError> {
        let split = self.split_mut(parent)?;
        let pos = split
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(TreeError::ChildNotFound { parent, child })?;
        split.children.remove(pos);
        let ratio = split.ratios.remove(pos);
        split.ratios = settle_ratios(&split.ratios);
        self.rebuild_indexes();
        Ok(ratio)
    }

    /// Put detached `new` into `old`'s slot, keeping the slot's ratio.
    ///
    /// `old` becomes detached.
    pub fn replace_child(
        &mut self,
        parent: NodeIdx,
        old: NodeIdx,
        new: NodeIdx,
    ) -> Result<(), TreeError> {
        self.check_attachable(parent, new)?;
        let split = self.split_mut(parent)?;
        let pos = split
            .children
            .iter()
            .position(|&c| c == old)
            .ok_or(TreeError::ChildNotFound { parent, child: old })?;
        split.children[pos] = new;
        self.rebuild_indexes();
        Ok(())
    }

    /// Install a detached node (or nothing) as the root.
    ///
    /// Returns the previous root, now detached.
    pub fn set_root(&mut self, new_root: Option<NodeIdx>) -> Result<Option<NodeIdx>, TreeError> {
        if new_root == self.root {
            return Ok(self.root);
        }
        if let Some(idx) = new_root {
            self.require(idx)?;
            if self.parent(idx).is_some() {
                return Err(TreeError::AlreadyAttached { child: idx });
            }
        }
        let previous = std::mem::replace(&mut self.root, new_root);
        self.rebuild_indexes();
        Ok(previous)
    }

    /// Free a detached subtree's slots.
    pub fn release_subtree(&mut self, idx: NodeIdx) -> Result<usize, TreeError> {
        self.require(idx)?;
        if self.parent(idx).is_some() || self.root == Some(idx) {
            return Err(TreeError::StillAttached(idx));
        }
        let doomed = self.preorder(idx);
        let released = doomed.len();
        self.free_slots(&doomed);
        self.rebuild_indexes();
        Ok(released)
    }

    /// Replace the ratios of split `idx`, returning the previous ones.
    ///
    /// Ratios within `1e-6` of closing are stored verbatim; anything else
    /// is normalized.
    pub fn set_ratios(&mut self, idx: NodeIdx, ratios: &[f64]) -> Result<Vec<f64>, TreeError> {
        let split = self.split_ref(idx)?;
        if ratios.len() != split.len() {
            return Err(TreeError::RatioCountMismatch {
                expected: split.len(),
                actual: ratios.len(),
            });
        }
        check_ratio_values(ratios)?;
        let split = self.split_mut(idx)?;
        Ok(std::mem::replace(&mut split.ratios, settle_ratios(ratios)))
    }

    /// Swap a pane's widget, returning the previous one.
    pub fn set_widget_id(
        &mut self,
        pane_id: &PaneId,
        widget_id: WidgetId,
    ) -> Result<WidgetId, TreeError> {
        let leaf = self.leaf_mut(pane_id)?;
        Ok(std::mem::replace(&mut leaf.widget_id, widget_id))
    }

    /// Replace a pane's size constraints, returning the previous ones.
    pub fn set_constraints(
        &mut self,
        pane_id: &PaneId,
        constraints: SizeConstraints,
    ) -> Result<SizeConstraints, TreeError> {
        let constraints = constraints.validate()?;
        let leaf = self.leaf_mut(pane_id)?;
        Ok(std::mem::replace(&mut leaf.constraints, constraints))
    }

    /// Move focus. `Some` must name a registered pane.
    pub fn set_focused_pane_id(
        &mut self,
        pane_id: Option<PaneId>,
    ) -> Result<Option<PaneId>, TreeError> {
        if let Some(pane) = &pane_id
            && !self.registry.contains_key(pane)
        {
            return Err(TreeError::PaneNotFound(pane.clone()));
        }
        Ok(std::mem::replace(&mut self.focused, pane_id))
    }

    // --- subtree snapshots ------------------------------------------------

    /// Owned copy of the subtree rooted at `idx`.
    #[must_use]
    pub fn snapshot_subtree(&self, idx: NodeIdx) -> Option<NodeSnapshot> {
        Some(match self.node(idx)? {
            Node::Leaf(leaf) => NodeSnapshot::Leaf {
                pane_id: leaf.pane_id.clone(),
                widget_id: leaf.widget_id.clone(),
                constraints: leaf.constraints,
            },
            Node::Split(split) => NodeSnapshot::Split {
                node_id: split.node_id.clone(),
                orientation: split.orientation,
                children: split
                    .children
                    .iter()
                    .map(|&child| self.snapshot_subtree(child))
                    .collect::<Option<Vec<_>>>()?,
                ratios: split.ratios.clone(),
            },
        })
    }

    /// Build a detached subtree from a snapshot.
    ///
    /// Fails without touching the arena if the snapshot is malformed or
    /// reuses an id that is already allocated.
    pub fn materialize(&mut self, snapshot: &NodeSnapshot) -> Result<NodeIdx, TreeError> {
        self.check_materializable(snapshot)?;
        let idx = self.build(snapshot);
        self.rebuild_indexes();
        Ok(idx)
    }

    /// Swap the subtree at `target` for one built from `snapshot`, in the
    /// same slot of the same parent with the same ratio.
    ///
    /// Ids inside the old subtree may be reused by the snapshot. On failure
    /// the old subtree is rebuilt in place.
    pub fn replace_subtree(
        &mut self,
        target: NodeIdx,
        snapshot: &NodeSnapshot,
    ) -> Result<NodeIdx, TreeError> {
        if self.root == Some(target) {
            return self
                .replace_root_with(Some(snapshot))
                .and_then(|root| root.ok_or(TreeError::UnknownIndex(target)));
        }
        let parent = self.parent(target).ok_or(TreeError::StillDetached(target))?;
        let pos = self
            .index_in_parent(target)
            .ok_or(TreeError::ChildNotFound {
                parent,
                child: target,
            })?;
        let previous = self
            .snapshot_subtree(target)
            .ok_or(TreeError::UnknownIndex(target))?;

        let doomed = self.preorder(target);
        self.free_slots(&doomed);
        let outcome = self.check_materializable(snapshot);
        let built = match &outcome {
            Ok(()) => self.build(snapshot),
            Err(_) => self.build(&previous),
        };
        self.split_mut(parent)?.children[pos] = built;
        self.rebuild_indexes();
        outcome.map(|()| built)
    }

    /// Replace the whole reachable tree with `snapshot` (or empty it).
    ///
    /// On failure the previous tree is rebuilt.
    pub fn replace_root_with(
        &mut self,
        snapshot: Option<&NodeSnapshot>,
    ) -> Result<Option<NodeIdx>, TreeError> {
        let previous = self.root.and_then(|root| self.snapshot_subtree(root));
        if let Some(root) = self.root.take() {
            let doomed = self.preorder(root);
            self.free_slots(&doomed);
        }
        let outcome = match snapshot {
            Some(snapshot) => self.check_materializable(snapshot).map(|()| snapshot),
            None => {
                self.rebuild_indexes();
                return Ok(None);
            }
        };
        let (root, result) = match outcome {
            Ok(snapshot) => {
                let root = self.build(snapshot);
                (Some(root), Ok(Some(root)))
            }
            Err(err) => (previous.as_ref().map(|p| self.build(p)), Err(err)),
        };
        self.root = root;
        self.rebuild_indexes();
        result
    }

    // --- internals ----------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeIdx {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx.0] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                NodeIdx(self.slots.len() - 1)
            }
        }
    }

    fn free_slots(&mut self, doomed: &[NodeIdx]) {
        for &idx in doomed {
            if let Some(slot) = self.slots.get_mut(idx.0)
                && slot.take().is_some()
            {
                self.free.push(idx);
            }
        }
    }

    fn build(&mut self, snapshot: &NodeSnapshot) -> NodeIdx {
        match snapshot {
            NodeSnapshot::Leaf {
                pane_id,
                widget_id,
                constraints,
            } => self.alloc(Node::Leaf(LeafNode {
                pane_id: pane_id.clone(),
                widget_id: widget_id.clone(),
                constraints: *constraints,
            })),
            NodeSnapshot::Split {
                node_id,
                orientation,
                children,
                ratios,
            } => {
                let children = children.iter().map(|child| self.build(child)).collect();
                self.alloc(Node::Split(SplitNode {
                    node_id: node_id.clone(),
                    orientation: *orientation,
                    children,
                    ratios: settle_ratios(ratios),
                }))
            }
        }
    }

    fn check_materializable(&self, snapshot: &NodeSnapshot) -> Result<(), TreeError> {
        let mut panes = FxHashSet::default();
        let mut nodes = FxHashSet::default();
        let mut stack = vec![snapshot];
        while let Some(node) = stack.pop() {
            match node {
                NodeSnapshot::Leaf {
                    pane_id,
                    constraints,
                    ..
                } => {
                    if !panes.insert(pane_id) || self.pane_in_arena(pane_id) {
                        return Err(TreeError::DuplicatePaneId(pane_id.clone()));
                    }
                    constraints.validate()?;
                }
                NodeSnapshot::Split {
                    node_id,
                    children,
                    ratios,
                    ..
                } => {
                    if !nodes.insert(node_id) || self.node_id_in_arena(node_id) {
                        return Err(TreeError::DuplicateNodeId(node_id.clone()));
                    }
                    if children.is_empty() {
                        return Err(TreeError::EmptySplit(node_id.clone()));
                    }
                    if children.len() != ratios.len() {
                        return Err(TreeError::RatioCountMismatch {
                            expected: children.len(),
                            actual: ratios.len(),
                        });
                    }
                    check_ratio_values(ratios)?;
                    stack.extend(children.iter());
                }
            }
        }
        Ok(())
    }

    fn check_attachable(&self, parent: NodeIdx, child: NodeIdx) -> Result<(), TreeError> {
        self.split_ref(parent)?;
        self.require(child)?;
        if self.parent(child).is_some() || self.root == Some(child) {
            return Err(TreeError::AlreadyAttached { child });
        }
        let mut current = Some(parent);
        while let Some(idx) = current {
            if idx == child {
                return Err(TreeError::WouldCycle { parent, child });
            }
            current = self.parent(idx);
        }
        Ok(())
    }

    fn require(&self, idx: NodeIdx) -> Result<&Node, TreeError> {
        self.node(idx).ok_or(TreeError::UnknownIndex(idx))
    }

    fn split_ref(&self, idx: NodeIdx) -> Result<&SplitNode, TreeError> {
        self.require(idx)?
            .as_split()
            .ok_or(TreeError::NotASplit(idx))
    }

    fn split_mut(&mut self, idx: NodeIdx) -> Result<&mut SplitNode, TreeError> {
        match self.slots.get_mut(idx.0).and_then(Option::as_mut) {
            Some(Node::Split(split)) => Ok(split),
            Some(Node::Leaf(_)) => Err(TreeError::NotASplit(idx)),
            None => Err(TreeError::UnknownIndex(idx)),
        }
    }

    fn leaf_mut(&mut self, pane_id: &PaneId) -> Result<&mut LeafNode, TreeError> {
        let idx = self
            .leaf_index(pane_id)
            .ok_or_else(|| TreeError::PaneNotFound(pane_id.clone()))?;
        match self.slots.get_mut(idx.0).and_then(Option::as_mut) {
            Some(Node::Leaf(leaf)) => Ok(leaf),
            _ => Err(TreeError::PaneNotFound(pane_id.clone())),
        }
    }

    fn pane_in_arena(&self, pane_id: &PaneId) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|node| matches!(node, Node::Leaf(leaf) if &leaf.pane_id == pane_id))
    }

    fn node_id_in_arena(&self, node_id: &NodeId) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|node| matches!(node, Node::Split(split) if &split.node_id == node_id))
    }

    fn rebuild_indexes(&mut self) {
        self.parents.clear();
        for (slot, node) in self.slots.iter().enumerate() {
            if let Some(Node::Split(split)) = node {
                for &child in &split.children {
                    self.parents.insert(child, NodeIdx(slot));
                }
            }
        }

        self.registry.clear();
        self.splits.clear();
        if let Some(root) = self.root {
            let mut seen = vec![false; self.slots.len()];
            let mut stack = vec![root];
            while let Some(idx) = stack.pop() {
                if std::mem::replace(&mut seen[idx.0], true) {
                    continue;
                }
                match self.slots.get(idx.0).and_then(Option::as_ref) {
                    Some(Node::Leaf(leaf)) => {
                        self.registry.entry(leaf.pane_id.clone()).or_insert(idx);
                    }
                    Some(Node::Split(split)) => {
                        self.splits.entry(split.node_id.clone()).or_insert(idx);
                        stack.extend(split.children.iter().copied());
                    }
                    None => {}
                }
            }
        }

        if let Some(focused) = &self.focused
            && !self.registry.contains_key(focused)
        {
            self.focused = None;
        }
    }
}

fn check_ratio_values(ratios: &[f64]) -> Result<(), TreeError> {
    if let Some(&bad) = ratios.iter().find(|r| !r.is_finite() || **r < 0.0) {
        return Err(TreeError::InvalidRatio { value: bad });
    }
    Ok(())
}

/// Rejected structural mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    UnknownIndex(NodeIdx),
    NotASplit(NodeIdx),
    PaneNotFound(PaneId),
    NodeNotFound(NodeId),
    DuplicatePaneId(PaneId),
    DuplicateNodeId(NodeId),
    AlreadyAttached { child: NodeIdx },
    StillAttached(NodeIdx),
    StillDetached(NodeIdx),
    WouldCycle { parent: NodeIdx, child: NodeIdx },
    ChildNotFound { parent: NodeIdx, child: NodeIdx },
    IndexOutOfRange { index: usize, len: usize },
    InvalidRatio { value: f64 },
    RatioCountMismatch { expected: usize, actual: usize },
    EmptySplit(NodeId),
    Constraint(ConstraintError),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownIndex(idx) => write!(f, "no node at arena slot {idx}"),
            Self::NotASplit(idx) => write!(f, "node {idx} is not a split"),
            Self::PaneNotFound(pane) => write!(f, "pane '{pane}' not found"),
            Self::NodeNotFound(node) => write!(f, "split node '{node}' not found"),
            Self::DuplicatePaneId(pane) => write!(f, "duplicate pane id '{pane}'"),
            Self::DuplicateNodeId(node) => write!(f, "duplicate split node id '{node}'"),
            Self::AlreadyAttached { child } => {
                write!(f, "node {child} is already attached to the tree")
            }
            Self::StillAttached(idx) => write!(f, "node {idx} must be detached first"),
            Self::StillDetached(idx) => write!(f, "node {idx} is not attached to a parent"),
            Self::WouldCycle { parent, child } => {
                write!(f, "attaching {child} under {parent} would create a cycle")
            }
            Self::ChildNotFound { parent, child } => {
                write!(f, "node {child} is not a child of {parent}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "child index {index} out of range (len {len})")
            }
            Self::InvalidRatio { value } => write!(f, "invalid ratio {value}"),
            Self::RatioCountMismatch { expected, actual } => {
                write!(f, "expected {expected} ratios, got {actual}")
            }
            Self::EmptySplit(node) => write!(f, "split node '{node}' has no children"),
            Self::Constraint(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Constraint(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConstraintError> for TreeError {
    fn from(err: ConstraintError) -> Self {
        Self::Constraint(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane(raw: &str) -> PaneId {
        PaneId::new(raw)
    }

    fn widget(raw: &str) -> WidgetId {
        WidgetId::new(raw)
    }

    /// `root(h): [a, inner(v): [b, c]]`
    fn nested() -> (PaneModel, NodeIdx, NodeIdx) {
        let mut model = PaneModel::new();
        let root = model
            .insert_split(NodeId::new("root"), Orientation::Horizontal)
            .expect("split");
        let inner = model
            .insert_split(NodeId::new("inner"), Orientation::Vertical)
            .expect("split");
        let a = model.insert_leaf(pane("a"), widget("editor:a")).expect("a");
        let b = model.insert_leaf(pane("b"), widget("editor:b")).expect("b");
        let c = model.insert_leaf(pane("c"), widget("editor:c")).expect("c");
        model.add_child(inner, b, 0.5).expect("b");
        model.add_child(inner, c, 0.5).expect("c");
        model.add_child(root, a, 0.5).expect("a");
        model.add_child(root, inner, 0.5).expect("inner");
        model.set_root(Some(root)).expect("root");
        (model, root, inner)
    }

    #[test]
    fn singleton_registers_and_focuses() {
        let model = PaneModel::singleton(pane("p1"), widget("editor:main.py"));
        assert_eq!(model.pane_ids(), vec![pane("p1")]);
        assert_eq!(model.focused_pane_id(), Some(&pane("p1")));
        assert_eq!(
            model.leaf(&pane("p1")).map(|l| l.widget_id().as_str()),
            Some("editor:main.py")
        );
    }

    #[test]
    fn nested_build_has_parents_and_depths() {
        let (model, root, inner) = nested();
        assert_eq!(model.pane_ids(), vec![pane("a"), pane("b"), pane("c")]);
        let c = model.leaf_index(&pane("c")).expect("c");
        assert_eq!(model.parent(c), Some(inner));
        assert_eq!(model.parent(inner), Some(root));
        assert_eq!(model.get_root(c), root);
        assert_eq!(model.get_depth(c), 2);
        assert_eq!(model.get_depth(root), 0);
        assert_eq!(model.index_in_parent(inner), Some(1));
    }

    #[test]
    fn add_child_scales_existing_ratios() {
        let (mut model, root, _) = nested();
        let d = model.insert_leaf(pane("d"), widget("x")).expect("d");
        model.add_child(root, d, 0.5).expect("add");
        let split = model.node(root).and_then(Node::as_split).expect("split");
        assert_eq!(split.ratios(), &[0.25, 0.25, 0.5]);
    }

    #[test]
    fn remove_child_renormalizes() {
        let (mut model, root, inner) = nested();
        let d = model.insert_leaf(pane("d"), widget("x")).expect("d");
        model.add_child(root, d, 0.5).expect("add");
        let removed = model.remove_child(root, inner).expect("remove");
        assert!((removed - 0.25).abs() < 1e-12);
        let split = model.node(root).and_then(Node::as_split).expect("split");
        assert!((split.ratios()[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((split.ratios().iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(!model.contains_pane(&pane("b")));
        assert_eq!(model.parent(inner), None);
        assert!(model.node(inner).is_some(), "detached, not released");
    }

    #[test]
    fn replace_child_keeps_slot_ratio() {
        let (mut model, root, inner) = nested();
        model.set_ratios(root, &[0.3, 0.7]).expect("ratios");
        let z = model.insert_leaf(pane("z"), widget("x")).expect("z");
        model.replace_child(root, inner, z).expect("replace");
        let split = model.node(root).and_then(Node::as_split).expect("split");
        assert_eq!(split.children()[1], z);
        assert_eq!(split.ratios(), &[0.3, 0.7]);
        assert_eq!(model.parent(z), Some(root));
        assert_eq!(model.parent(inner), None);
    }

    #[test]
    fn attach_rejects_cycles_and_double_parents() {
        let (mut model, root, inner) = nested();
        let b = model.leaf_index(&pane("b")).expect("b");
        assert_eq!(
            model.add_child(root, b, 0.5),
            Err(TreeError::AlreadyAttached { child: b })
        );
        model.remove_child(root, inner).expect("detach inner");
        let inner_b = model.children(inner)[0];
        model.remove_child(inner, inner_b).expect("detach b");
        // `inner` is detached but `root` is the tree root: attaching root
        // under inner is rejected as an attached node.
        assert_eq!(
            model.add_child(inner, root, 0.5),
            Err(TreeError::AlreadyAttached { child: root })
        );
        let outer = model
            .insert_split(NodeId::new("outer"), Orientation::Vertical)
            .expect("outer");
        model.add_child(outer, inner, 0.5).expect("inner under outer");
        assert_eq!(
            model.add_child(inner, outer, 0.5),
            Err(TreeError::WouldCycle {
                parent: inner,
                child: outer
            })
        );
    }

    #[test]
    fn release_requires_detached() {
        let (mut model, root, inner) = nested();
        assert_eq!(
            model.release_subtree(inner),
            Err(TreeError::StillAttached(inner))
        );
        model.remove_child(root, inner).expect("detach");
        assert_eq!(model.release_subtree(inner), Ok(3));
        assert_eq!(model.live_node_count(), 2);
    }

    #[test]
    fn duplicate_ids_are_rejected_across_arena() {
        let (mut model, _, _) = nested();
        assert_eq!(
            model.insert_leaf(pane("a"), widget("x")),
            Err(TreeError::DuplicatePaneId(pane("a")))
        );
        assert_eq!(
            model.insert_split(NodeId::new("inner"), Orientation::Vertical),
            Err(TreeError::DuplicateNodeId(NodeId::new("inner")))
        );
    }

    #[test]
    fn allocation_skips_existing_ids() {
        let mut model = PaneModel::singleton(pane("pane-1"), widget("x"));
        assert_eq!(model.allocate_pane_id(), pane("pane-2"));
        assert_eq!(model.allocate_node_id(), NodeId::new("split-1"));
    }

    #[test]
    fn set_ratios_keeps_closed_vectors_verbatim() {
        let (mut model, root, _) = nested();
        let old = model.set_ratios(root, &[0.25, 0.75]).expect("set");
        assert_eq!(old, vec![0.5, 0.5]);
        model.set_ratios(root, &[2.0, 6.0]).expect("normalized");
        let split = model.node(root).and_then(Node::as_split).expect("split");
        assert_eq!(split.ratios(), &[0.25, 0.75]);
        assert!(matches!(
            model.set_ratios(root, &[1.0]),
            Err(TreeError::RatioCountMismatch { .. })
        ));
        assert!(matches!(
            model.set_ratios(root, &[-0.5, 1.5]),
            Err(TreeError::InvalidRatio { .. })
        ));
    }

    #[test]
    fn focus_is_dropped_when_pane_leaves_tree() {
        let (mut model, root, inner) = nested();
        model.set_focused_pane_id(Some(pane("b"))).expect("focus");
        model.remove_child(root, inner).expect("detach");
        assert_eq!(model.focused_pane_id(), None);
        assert!(model.set_focused_pane_id(Some(pane("b"))).is_err());
    }

    #[test]
    fn replace_subtree_restores_in_place() {
        let (mut model, root, inner) = nested();
        model.set_ratios(root, &[0.4, 0.6]).expect("ratios");
        let before = model.snapshot_subtree(inner).expect("snapshot");
        let c = model.leaf_index(&pane("c")).expect("c");
        model.remove_child(inner, c).expect("detach c");
        model.release_subtree(c).expect("release");

        let rebuilt = model.replace_subtree(inner, &before).expect("restore");
        assert_eq!(model.snapshot_subtree(rebuilt), Some(before));
        let split = model.node(root).and_then(Node::as_split).expect("split");
        assert_eq!(split.ratios(), &[0.4, 0.6]);
        assert_eq!(model.pane_ids(), vec![pane("a"), pane("b"), pane("c")]);
    }

    #[test]
    fn replace_subtree_failure_rebuilds_previous() {
        let (mut model, _, inner) = nested();
        let before = model.to_snapshot();
        let clash = NodeSnapshot::Leaf {
            pane_id: pane("a"),
            widget_id: widget("x"),
            constraints: SizeConstraints::default(),
        };
        assert_eq!(
            model.replace_subtree(inner, &clash),
            Err(TreeError::DuplicatePaneId(pane("a")))
        );
        assert_eq!(model.to_snapshot(), before);
    }

    #[test]
    fn replace_root_with_none_empties_model() {
        let (mut model, _, _) = nested();
        assert_eq!(model.replace_root_with(None), Ok(None));
        assert!(model.is_empty());
        assert_eq!(model.live_node_count(), 0);
        assert_eq!(model.pane_count(), 0);
    }

    #[test]
    fn structural_equality_ignores_arena_layout() {
        let (a, _, _) = nested();
        let mut b = PaneModel::new();
        let snapshot = a.to_snapshot();
        let root = snapshot.root.as_ref().expect("root");
        // Burn a few slots so indices differ.
        let junk = b.insert_leaf(pane("junk"), widget("x")).expect("junk");
        let idx = b.materialize(root).expect("materialize");
        b.release_subtree(junk).expect("release");
        b.set_root(Some(idx)).expect("root");
        assert_eq!(a, b);
    }

    #[test]
    fn placement_helpers() {
        assert_eq!(
            SplitPlacement::Right.orientation(),
            Some(Orientation::Horizontal)
        );
        assert_eq!(SplitPlacement::Top.orientation(), Some(Orientation::Vertical));
        assert!(SplitPlacement::Top.inserts_first());
        assert!(!SplitPlacement::Bottom.inserts_first());
        assert!(SplitPlacement::After.is_sibling());
        assert!(!SplitPlacement::Replace.is_directional());
    }
}
