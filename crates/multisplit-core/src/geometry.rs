#![forbid(unsafe_code)]

//! Geometric primitives.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An axis-aligned integer rectangle in host pixels.
///
/// Origin is top-left. `width` and `height` produced by the layout engine
/// are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge (inclusive).
    pub x: i32,
    /// Top edge (inclusive).
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Bounds {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Area in pixels. Degenerate rectangles have zero area.
    #[inline]
    pub const fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Check if the rectangle has zero (or negative) area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Whether the two rectangles share at least one pixel.
    #[inline]
    pub const fn intersects(&self, other: &Bounds) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Start coordinate along `orientation`'s layout axis.
    #[inline]
    pub const fn start_along(&self, orientation: Orientation) -> i32 {
        match orientation {
            Orientation::Horizontal => self.x,
            Orientation::Vertical => self.y,
        }
    }

    /// Extent along `orientation`'s layout axis (width for horizontal splits).
    #[inline]
    pub const fn extent_along(&self, orientation: Orientation) -> i32 {
        match orientation {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }

    /// Sub-rectangle covering `[start, start + extent)` along the layout
    /// axis and the full cross extent.
    #[inline]
    pub const fn slice_along(&self, orientation: Orientation, start: i32, extent: i32) -> Self {
        match orientation {
            Orientation::Horizontal => Self::new(start, self.y, extent, self.height),
            Orientation::Vertical => Self::new(self.x, start, self.width, extent),
        }
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Direction a split lays its children out in.
///
/// A horizontal split places children left-to-right and divides width; a
/// vertical split stacks them top-to-bottom and divides height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// The perpendicular orientation.
    #[must_use]
    pub const fn cross(self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }

    /// Name of the dimension this orientation divides.
    #[must_use]
    pub const fn axis_name(self) -> &'static str {
        match self {
            Self::Horizontal => "width",
            Self::Vertical => "height",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Horizontal => f.write_str("horizontal"),
            Self::Vertical => f.write_str("vertical"),
        }
    }
}

/// Per-pane size bounds.
///
/// The default is unconstrained: zero minimums and no maximums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeConstraints {
    pub min_width: i32,
    pub min_height: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<i32>,
}

impl SizeConstraints {
    /// Build validated constraints.
    pub fn new(
        min_width: i32,
        min_height: i32,
        max_width: Option<i32>,
        max_height: Option<i32>,
    ) -> Result<Self, ConstraintError> {
        Self {
            min_width,
            min_height,
            max_width,
            max_height,
        }
        .validate()
    }

    /// Constraints with only minimums.
    pub fn min(min_width: i32, min_height: i32) -> Result<Self, ConstraintError> {
        Self::new(min_width, min_height, None, None)
    }

    /// Check `min >= 0` and `max >= min` on both axes.
    pub fn validate(self) -> Result<Self, ConstraintError> {
        check_axis("width", self.min_width, self.max_width)?;
        check_axis("height", self.min_height, self.max_height)?;
        Ok(self)
    }

    /// `true` when these constraints never alter a size.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    /// Clamp a size into these bounds (minimum applied first, then maximum).
    #[must_use]
    pub fn clamp_size(&self, width: i32, height: i32) -> (i32, i32) {
        (
            clamp_axis(width, self.min_width, self.max_width),
            clamp_axis(height, self.min_height, self.max_height),
        )
    }

    /// Minimum along the axis divided by `orientation`.
    #[must_use]
    pub const fn min_along(&self, orientation: Orientation) -> i32 {
        match orientation {
            Orientation::Horizontal => self.min_width,
            Orientation::Vertical => self.min_height,
        }
    }

    /// Maximum along the axis divided by `orientation`, if any.
    #[must_use]
    pub const fn max_along(&self, orientation: Orientation) -> Option<i32> {
        match orientation {
            Orientation::Horizontal => self.max_width,
            Orientation::Vertical => self.max_height,
        }
    }

    /// Whether `extent` along `orientation` respects these bounds.
    #[must_use]
    pub fn admits_along(&self, orientation: Orientation, extent: i32) -> bool {
        extent >= self.min_along(orientation)
            && self.max_along(orientation).is_none_or(|max| extent <= max)
    }
}

fn check_axis(axis: &'static str, min: i32, max: Option<i32>) -> Result<(), ConstraintError> {
    if min < 0 {
        return Err(ConstraintError::NegativeMinimum { axis, min });
    }
    if let Some(max) = max
        && max < min
    {
        return Err(ConstraintError::MaxBelowMin { axis, min, max });
    }
    Ok(())
}

fn clamp_axis(value: i32, min: i32, max: Option<i32>) -> i32 {
    let value = value.max(min);
    match max {
        Some(max) => value.min(max),
        None => value,
    }
}

/// Rejected [`SizeConstraints`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintError {
    NegativeMinimum {
        axis: &'static str,
        min: i32,
    },
    MaxBelowMin {
        axis: &'static str,
        min: i32,
        max: i32,
    },
}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeMinimum { axis, min } => {
                write!(f, "minimum {axis} must be >= 0, got {min}")
            }
            Self::MaxBelowMin { axis, min, max } => {
                write!(f, "invalid {axis} constraints: max {max} < min {min}")
            }
        }
    }
}

impl std::error::Error for ConstraintError {}
