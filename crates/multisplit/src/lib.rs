#![forbid(unsafe_code)]

//! MultiSplit public facade crate.
//!
//! Re-exports the pane tree, geometry, and controller from the internal
//! crates and offers a prelude for day-to-day usage.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use multisplit_core::{
    Bounds, ConstraintError, HostSink, NodeId, Orientation, PaneId, Signal, SignalBridge,
    SignalEmitter, SizeConstraints, Subscription, WidgetId,
};

// --- Layout re-exports -----------------------------------------------------

pub use multisplit_layout::{
    DiffResult, Divider, GeometryCalculator, LayoutResult, LeafNode, ModelSnapshot, Node,
    NodeSnapshot, PaneModel, SnapshotError, SplitNode, SplitPlacement, TreeError,
    ValidationResult, WidgetHost, WidgetProvider, diff,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use multisplit_runtime::{
    ChangeOrigin, CommandError, CommandKind, ConfigError, EngineConfig, ModelEvent, PaneCommand,
    PaneController,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for MultiSplit hosts.
#[derive(Debug)]
pub enum Error {
    /// Structural tree operation failed.
    Tree(TreeError),
    /// Snapshot could not be encoded or loaded.
    Snapshot(SnapshotError),
    /// Command failed to execute or undo.
    #[cfg(feature = "runtime")]
    Command(CommandError),
    /// Configuration could not be loaded.
    #[cfg(feature = "runtime")]
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree(err) => write!(f, "{err}"),
            Self::Snapshot(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Command(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            Self::Snapshot(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Command(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Config(err) => Some(err),
        }
    }
}

impl From<TreeError> for Error {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<SnapshotError> for Error {
    fn from(err: SnapshotError) -> Self {
        Self::Snapshot(err)
    }
}

#[cfg(feature = "runtime")]
impl From<CommandError> for Error {
    fn from(err: CommandError) -> Self {
        Self::Command(err)
    }
}

#[cfg(feature = "runtime")]
impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Standard result type for MultiSplit APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Bounds, Error, GeometryCalculator, LayoutResult, ModelSnapshot, Orientation, PaneId,
        PaneModel, Result, SplitPlacement, WidgetId,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{ModelEvent, PaneController};

    pub use crate::{core, layout};

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use multisplit_core as core;
pub use multisplit_layout as layout;
#[cfg(feature = "runtime")]
pub use multisplit_runtime as runtime;
