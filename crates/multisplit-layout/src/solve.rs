//! Geometry calculator: pane tree + outer rectangle -> pixel rectangles.
//!
//! # Algorithm
//!
//! For each split, `(n - 1) * divider_width` is taken from the extent along
//! the split axis and the remainder is distributed by ratio using
//! cumulative rounding (`end_i = round(A * sum(r_0..=r_i))`, last end
//! pinned to `A`). Child extents plus dividers therefore always equal the
//! split's extent exactly.
//!
//! A constraint pass then clamps each child to the aggregated min/max of
//! its subtree along the split axis and settles the difference against
//! siblings, nearest first (the following sibling before the preceding one
//! at equal distance).
//!
//! # Infeasible constraints
//!
//! When no sibling has slack left, exact tiling wins: the unresolved
//! pixels stay with the clamped child, and every leaf whose final bounds
//! break its [`SizeConstraints`](multisplit_core::SizeConstraints) is listed
//! in [`LayoutResult::violations`]. The calculator never fails.

use std::collections::BTreeMap;

use multisplit_core::{Bounds, NodeId, Orientation, PaneId};

use crate::tree::{Node, NodeIdx, PaneModel};

/// Default handle thickness in pixels.
pub const DEFAULT_DIVIDER_WIDTH: i32 = 4;

/// Resize handle between two adjacent children of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divider {
    /// Split owning the handle.
    pub node_id: NodeId,
    /// The handle sits between child `index` and child `index + 1`.
    pub index: usize,
    pub orientation: Orientation,
    pub bounds: Bounds,
}

/// A leaf whose solved bounds fall outside its size constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub pane_id: PaneId,
    pub axis: Orientation,
    pub actual: i32,
    pub min: i32,
    pub max: Option<i32>,
}

/// Output of [`GeometryCalculator::calculate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutResult {
    pub outer: Bounds,
    pub rects: BTreeMap<PaneId, Bounds>,
    pub dividers: Vec<Divider>,
    pub violations: Vec<ConstraintViolation>,
}

impl LayoutResult {
    /// `true` when every leaf satisfies its constraints.
    #[must_use]
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }

    #[must_use]
    pub fn bounds(&self, pane_id: &PaneId) -> Option<Bounds> {
        self.rects.get(pane_id).copied()
    }

    /// Pane containing the point, if any.
    #[must_use]
    pub fn pane_at(&self, x: i32, y: i32) -> Option<&PaneId> {
        self.rects
            .iter()
            .find(|(_, bounds)| bounds.contains(x, y))
            .map(|(pane, _)| pane)
    }

    /// Divider containing the point, if any.
    #[must_use]
    pub fn divider_at(&self, x: i32, y: i32) -> Option<&Divider> {
        self.dividers.iter().find(|d| d.bounds.contains(x, y))
    }
}

/// Stateless layout solver parameterized by divider thickness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryCalculator {
    divider_width: i32,
}

impl Default for GeometryCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_DIVIDER_WIDTH)
    }
}

impl GeometryCalculator {
    /// Negative widths are treated as zero.
    #[must_use]
    pub const fn new(divider_width: i32) -> Self {
        Self {
            divider_width: if divider_width < 0 { 0 } else { divider_width },
        }
    }

    #[must_use]
    pub const fn divider_width(&self) -> i32 {
        self.divider_width
    }

    /// Solve the whole tree inside `outer`.
    #[must_use]
    pub fn calculate(&self, model: &PaneModel, outer: Bounds) -> LayoutResult {
        let mut result = LayoutResult {
            outer,
            ..LayoutResult::default()
        };
        if let Some(root) = model.root() {
            let outer = Bounds::new(outer.x, outer.y, outer.width.max(0), outer.height.max(0));
            self.place(model, root, outer, &mut result);
        }
        result
    }

    /// Pane rectangles only.
    #[must_use]
    pub fn calculate_bounds(&self, model: &PaneModel, outer: Bounds) -> BTreeMap<PaneId, Bounds> {
        self.calculate(model, outer).rects
    }

    /// One rectangle per split boundary, in tree pre-order.
    #[must_use]
    pub fn calculate_divider_bounds(&self, model: &PaneModel, outer: Bounds) -> Vec<Bounds> {
        self.calculate(model, outer)
            .dividers
            .into_iter()
            .map(|divider| divider.bounds)
            .collect()
    }

    /// Dividers with their owning split and position.
    #[must_use]
    pub fn calculate_dividers(&self, model: &PaneModel, outer: Bounds) -> Vec<Divider> {
        self.calculate(model, outer).dividers
    }

    fn place(&self, model: &PaneModel, idx: NodeIdx, area: Bounds, out: &mut LayoutResult) {
        let Some(node) = model.node(idx) else {
            return;
        };
        let split = match node {
            Node::Leaf(leaf) => {
                let constraints = leaf.constraints();
                for axis in [Orientation::Horizontal, Orientation::Vertical] {
                    let actual = area.extent_along(axis);
                    if !constraints.admits_along(axis, actual) {
                        out.violations.push(ConstraintViolation {
                            pane_id: leaf.pane_id().clone(),
                            axis,
                            actual,
                            min: constraints.min_along(axis),
                            max: constraints.max_along(axis),
                        });
                    }
                }
                out.rects.insert(leaf.pane_id().clone(), area);
                return;
            }
            Node::Split(split) => split,
        };

        let n = split.len();
        if n == 0 {
            return;
        }
        let axis = split.orientation();
        let extent = area.extent_along(axis);
        let gaps = (n - 1) as i32;
        let divider = if gaps == 0 || gaps.saturating_mul(self.divider_width) <= extent {
            self.divider_width
        } else {
            extent / gaps
        };
        let available = extent.saturating_sub(gaps.saturating_mul(divider));

        let mut sizes = proportional_sizes(available, split.ratios(), n);
        let limits: Vec<(i32, Option<i32>)> = split
            .children()
            .iter()
            .map(|&child| {
                (
                    self.subtree_min(model, child, axis),
                    self.subtree_max(model, child, axis),
                )
            })
            .collect();
        apply_constraints(&mut sizes, &limits);

        let mut cursor = area.start_along(axis);
        for (i, (&child, &size)) in split.children().iter().zip(&sizes).enumerate() {
            self.place(model, child, area.slice_along(axis, cursor, size), out);
            cursor = cursor.saturating_add(size);
            if i + 1 < n {
                out.dividers.push(Divider {
                    node_id: split.node_id().clone(),
                    index: i,
                    orientation: axis,
                    bounds: area.slice_along(axis, cursor, divider),
                });
                cursor = cursor.saturating_add(divider);
            }
        }
    }

    /// Smallest extent along `axis` the subtree can occupy.
    fn subtree_min(&self, model: &PaneModel, idx: NodeIdx, axis: Orientation) -> i32 {
        match model.node(idx) {
            Some(Node::Leaf(leaf)) => leaf.constraints().min_along(axis),
            Some(Node::Split(split)) => {
                let mins = split
                    .children()
                    .iter()
                    .map(|&child| self.subtree_min(model, child, axis));
                if split.orientation() == axis {
                    let gaps = split.len().saturating_sub(1) as i32;
                    mins.fold(0i32, i32::saturating_add)
                        .saturating_add(gaps.saturating_mul(self.divider_width))
                } else {
                    mins.max().unwrap_or(0)
                }
            }
            None => 0,
        }
    }

    /// Largest extent along `axis` the subtree can use, if bounded.
    fn subtree_max(&self, model: &PaneModel, idx: NodeIdx, axis: Orientation) -> Option<i32> {
        match model.node(idx) {
            Some(Node::Leaf(leaf)) => leaf.constraints().max_along(axis),
            Some(Node::Split(split)) => {
                let mut maxes = split
                    .children()
                    .iter()
                    .map(|&child| self.subtree_max(model, child, axis));
                if split.orientation() == axis {
                    let gaps = split.len().saturating_sub(1) as i32;
                    let total =
                        maxes.try_fold(0i32, |acc, max| max.map(|m| acc.saturating_add(m)))?;
                    Some(total.saturating_add(gaps.saturating_mul(self.divider_width)))
                } else {
                    maxes.flatten().min()
                }
            }
            None => None,
        }
    }
}

/// Cumulative-rounding distribution of `available` pixels by `ratios`.
fn proportional_sizes(available: i32, ratios: &[f64], n: usize) -> Vec<i32> {
    let available = available.max(0);
    let mut sizes = Vec::with_capacity(n);
    let mut acc = 0.0;
    let mut previous_end = 0;
    for i in 0..n {
        acc += ratios.get(i).copied().unwrap_or(0.0);
        let end = if i + 1 == n {
            available
        } else {
            ((f64::from(available) * acc).round() as i32).clamp(previous_end, available)
        };
        sizes.push(end - previous_end);
        previous_end = end;
    }
    sizes
}

/// Clamp each size into its limits, trading pixels with siblings.
///
/// The sum of `sizes` is preserved.
fn apply_constraints(sizes: &mut [i32], limits: &[(i32, Option<i32>)]) {
    let n = sizes.len();
    let bounds = |j: usize| {
        let (lo, hi) = limits[j];
        (lo, hi.unwrap_or(i32::MAX).max(lo))
    };

    for i in 0..n {
        let (lo, hi) = bounds(i);
        let target = sizes[i].clamp(lo, hi);
        // Positive: the child needs pixels. Negative: it has pixels to give.
        let mut delta = target - sizes[i];
        if delta == 0 {
            continue;
        }
        sizes[i] = target;

        for j in sibling_order(i, n) {
            if delta == 0 {
                break;
            }
            let (lo_j, hi_j) = bounds(j);
            if delta > 0 {
                let give = (sizes[j] - lo_j).clamp(0, delta);
                sizes[j] -= give;
                delta -= give;
            } else {
                let take = hi_j.saturating_sub(sizes[j]).clamp(0, -delta);
                sizes[j] += take;
                delta += take;
            }
        }
        // Keep the tiling exact when siblings ran out of slack.
        sizes[i] -= delta;
    }
}

/// Sibling indices ordered by distance from `i`, following side first.
fn sibling_order(i: usize, n: usize) -> impl Iterator<Item = usize> {
    (1..n).flat_map(move |distance| {
        let after = (i + distance < n).then_some(i + distance);
        let before = i.checked_sub(distance);
        after.into_iter().chain(before)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ModelSnapshot, NodeSnapshot};
    use multisplit_core::{SizeConstraints, WidgetId};

    fn leaf(id: &str) -> NodeSnapshot {
        constrained(id, SizeConstraints::default())
    }

    fn constrained(id: &str, constraints: SizeConstraints) -> NodeSnapshot {
        NodeSnapshot::Leaf {
            pane_id: PaneId::new(id),
            widget_id: WidgetId::new("editor:x"),
            constraints,
        }
    }

    fn split(
        id: &str,
        orientation: Orientation,
        children: Vec<NodeSnapshot>,
        ratios: Vec<f64>,
    ) -> NodeSnapshot {
        NodeSnapshot::Split {
            node_id: NodeId::new(id),
            orientation,
            children,
            ratios,
        }
    }

    fn model_of(root: NodeSnapshot) -> PaneModel {
        PaneModel::from_snapshot(&ModelSnapshot {
            root: Some(root),
            focused_pane_id: None,
        })
        .expect("valid")
    }

    fn rect(result: &LayoutResult, id: &str) -> Bounds {
        result.bounds(&PaneId::new(id)).expect("pane laid out")
    }

    #[test]
    fn two_children_with_divider() {
        let model = model_of(split(
            "s",
            Orientation::Horizontal,
            vec![leaf("a"), leaf("b")],
            vec![0.5, 0.5],
        ));
        let result = GeometryCalculator::new(4).calculate(&model, Bounds::new(0, 0, 804, 600));
        assert_eq!(rect(&result, "a"), Bounds::new(0, 0, 400, 600));
        assert_eq!(rect(&result, "b"), Bounds::new(404, 0, 400, 600));
        assert_eq!(result.dividers.len(), 1);
        assert_eq!(result.dividers[0].bounds, Bounds::new(400, 0, 4, 600));
        assert!(result.is_feasible());
    }

    #[test]
    fn single_leaf_fills_outer() {
        let model = model_of(leaf("solo"));
        let outer = Bounds::new(10, 20, 300, 200);
        let result = GeometryCalculator::default().calculate(&model, outer);
        assert_eq!(rect(&result, "solo"), outer);
        assert!(result.dividers.is_empty());
    }

    #[test]
    fn empty_model_yields_nothing() {
        let result =
            GeometryCalculator::default().calculate(&PaneModel::new(), Bounds::from_size(10, 10));
        assert!(result.rects.is_empty());
        assert!(result.dividers.is_empty());
    }

    #[test]
    fn rounding_remainder_is_distributed_exactly() {
        let model = model_of(split(
            "s",
            Orientation::Vertical,
            vec![leaf("a"), leaf("b"), leaf("c")],
            vec![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0],
        ));
        let result = GeometryCalculator::new(1).calculate(&model, Bounds::from_size(50, 102));
        let heights: Vec<i32> = ["a", "b", "c"].iter().map(|id| rect(&result, id).height).collect();
        assert_eq!(heights.iter().sum::<i32>() + 2, 102);
        assert_eq!(heights, vec![33, 34, 33]);
        assert_eq!(rect(&result, "c").bottom(), 102);
    }

    #[test]
    fn nested_layout() {
        let model = model_of(split(
            "root",
            Orientation::Horizontal,
            vec![
                leaf("left"),
                split(
                    "right",
                    Orientation::Vertical,
                    vec![leaf("top"), leaf("bottom")],
                    vec![0.5, 0.5],
                ),
            ],
            vec![0.5, 0.5],
        ));
        let result = GeometryCalculator::new(2).calculate(&model, Bounds::from_size(202, 102));
        assert_eq!(rect(&result, "left"), Bounds::new(0, 0, 100, 102));
        assert_eq!(rect(&result, "top"), Bounds::new(102, 0, 100, 50));
        assert_eq!(rect(&result, "bottom"), Bounds::new(102, 52, 100, 50));
        assert_eq!(
            GeometryCalculator::new(2)
                .calculate_divider_bounds(&model, Bounds::from_size(202, 102)),
            vec![Bounds::new(100, 0, 2, 102), Bounds::new(102, 50, 100, 2)]
        );
    }

    #[test]
    fn min_constraint_takes_from_nearest_sibling() {
        let min = SizeConstraints::min(300, 0).expect("valid");
        let model = model_of(split(
            "s",
            Orientation::Horizontal,
            vec![leaf("a"), constrained("b", min), leaf("c")],
            vec![0.4, 0.2, 0.4],
        ));
        let result = GeometryCalculator::new(0).calculate(&model, Bounds::from_size(1000, 100));
        assert_eq!(rect(&result, "a").width, 400);
        assert_eq!(rect(&result, "b").width, 300);
        assert_eq!(rect(&result, "c").width, 300);
        assert!(result.is_feasible());
    }

    #[test]
    fn max_constraint_gives_surplus_to_siblings() {
        let max = SizeConstraints::new(0, 0, Some(100), None).expect("valid");
        let model = model_of(split(
            "s",
            Orientation::Horizontal,
            vec![constrained("a", max), leaf("b")],
            vec![0.5, 0.5],
        ));
        let result = GeometryCalculator::new(0).calculate(&model, Bounds::from_size(600, 10));
        assert_eq!(rect(&result, "a").width, 100);
        assert_eq!(rect(&result, "b"), Bounds::new(100, 0, 500, 10));
    }

    #[test]
    fn infeasible_minimums_are_reported_and_tiling_holds() {
        let min = SizeConstraints::min(400, 0).expect("valid");
        let model = model_of(split(
            "s",
            Orientation::Horizontal,
            vec![constrained("a", min), constrained("b", min)],
            vec![0.5, 0.5],
        ));
        let result = GeometryCalculator::new(0).calculate(&model, Bounds::from_size(600, 50));
        let a = rect(&result, "a");
        let b = rect(&result, "b");
        assert_eq!(a.width + b.width, 600);
        assert_eq!(a.right(), b.x);
        assert!(!result.is_feasible());
        assert!(
            result
                .violations
                .iter()
                .all(|v| v.axis == Orientation::Horizontal && v.min == 400)
        );
    }

    #[test]
    fn subtree_minimums_aggregate_along_axis() {
        let min = SizeConstraints::min(100, 0).expect("valid");
        let model = model_of(split(
            "root",
            Orientation::Horizontal,
            vec![
                leaf("wide"),
                split(
                    "inner",
                    Orientation::Horizontal,
                    vec![constrained("x", min), constrained("y", min)],
                    vec![0.5, 0.5],
                ),
            ],
            vec![0.9, 0.1],
        ));
        let result = GeometryCalculator::new(0).calculate(&model, Bounds::from_size(1000, 10));
        assert_eq!(rect(&result, "wide").width, 800);
        assert_eq!(rect(&result, "x").width, 100);
        assert_eq!(rect(&result, "y").width, 100);
        assert!(result.is_feasible());
    }

    #[test]
    fn degenerate_extent_never_goes_negative() {
        let model = model_of(split(
            "s",
            Orientation::Horizontal,
            vec![leaf("a"), leaf("b"), leaf("c")],
            vec![0.3, 0.3, 0.4],
        ));
        let result = GeometryCalculator::new(8).calculate(&model, Bounds::from_size(5, 5));
        let total: i32 = result.rects.values().map(|b| b.width).sum::<i32>()
            + result.dividers.iter().map(|d| d.bounds.width).sum::<i32>();
        assert_eq!(total, 5);
        assert!(result.rects.values().all(|b| b.width >= 0));
    }

    #[test]
    fn huge_minimums_saturate_instead_of_overflowing() {
        let huge = SizeConstraints::new(2_000_000_000, 0, Some(2_000_000_000), None)
            .expect("valid");
        let model = model_of(split(
            "root",
            Orientation::Horizontal,
            vec![
                leaf("w"),
                split(
                    "inner",
                    Orientation::Horizontal,
                    vec![constrained("x", huge), constrained("y", huge)],
                    vec![0.5, 0.5],
                ),
            ],
            vec![0.5, 0.5],
        ));
        let result = GeometryCalculator::new(4).calculate(&model, Bounds::from_size(800, 600));
        assert_eq!(result.rects.len(), 3);
        assert!(!result.is_feasible());
        let total: i32 = result.rects.values().map(|b| b.width).sum::<i32>()
            + result.dividers.iter().map(|d| d.bounds.width).sum::<i32>();
        assert_eq!(total, 800);
    }

    #[test]
    fn huge_divider_width_is_squeezed_into_extent() {
        let model = model_of(split(
            "root",
            Orientation::Horizontal,
            vec![
                leaf("a"),
                split(
                    "inner",
                    Orientation::Vertical,
                    vec![leaf("b"), leaf("c"), leaf("d")],
                    vec![0.3, 0.3, 0.4],
                ),
                leaf("e"),
            ],
            vec![0.3, 0.3, 0.4],
        ));
        let result =
            GeometryCalculator::new(i32::MAX).calculate(&model, Bounds::from_size(800, 600));
        assert_eq!(result.rects.len(), 5);
        assert!(result.rects.values().all(|b| b.width >= 0 && b.height >= 0));
        assert!(result.dividers.iter().all(|d| d.bounds.right() <= 800));
    }

    #[test]
    fn hit_testing() {
        let model = model_of(split(
            "s",
            Orientation::Horizontal,
            vec![leaf("a"), leaf("b")],
            vec![0.5, 0.5],
        ));
        let result = GeometryCalculator::new(4).calculate(&model, Bounds::from_size(804, 600));
        assert_eq!(result.pane_at(10, 10), Some(&PaneId::new("a")));
        assert_eq!(result.pane_at(500, 10), Some(&PaneId::new("b")));
        assert_eq!(result.pane_at(401, 10), None);
        let divider = result.divider_at(401, 10).expect("divider");
        assert_eq!(divider.node_id, NodeId::new("s"));
        assert_eq!(divider.index, 0);
    }

    #[test]
    fn sibling_order_prefers_following_side() {
        let order: Vec<usize> = sibling_order(2, 5).collect();
        assert_eq!(order, vec![3, 1, 4, 0]);
    }
}
