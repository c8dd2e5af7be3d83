#![forbid(unsafe_code)]

//! Core: identifiers, geometry primitives, and the toolkit-independent event
//! channel shared by the MultiSplit layout engine.
//!
//! Nothing in this crate knows about trees or commands. The layout crate
//! builds the pane model on top of these types and the runtime crate drives
//! mutations and announces them through [`signal::Signal`].

pub mod bridge;
pub mod geometry;
pub mod id;
pub mod signal;

pub use bridge::{HostSink, SignalBridge, SignalEmitter};
pub use geometry::{Bounds, ConstraintError, Orientation, SizeConstraints};
pub use id::{NodeId, PaneId, WidgetId};
pub use signal::{Signal, Subscription};
