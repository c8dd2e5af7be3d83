#![forbid(unsafe_code)]

//! Command layer and controller for MultiSplit.
//!
//! Mutations of a [`PaneModel`] are expressed as [`PaneCommand`]s that know
//! how to undo themselves. [`PaneController`] validates each request, runs
//! the command, keeps a bounded undo/redo history, groups work into nested
//! transactions, and announces changes as [`ModelEvent`]s.
//!
//! ```rust,ignore
//! let mut ctl = PaneController::new(PaneModel::singleton(
//!     PaneId::new("p1"),
//!     WidgetId::new("editor:main"),
//! ));
//! ctl.split_pane(&PaneId::new("p1"), WidgetId::new("terminal"), SplitPlacement::Right, 0.3);
//! let layout = ctl.layout(Bounds::from_size(1280, 800));
//! ```
//!
//! [`PaneModel`]: multisplit_layout::PaneModel

pub mod command;
pub mod config;
pub mod controller;

pub use command::{
    CommandBatch, CommandError, CommandKind, CommandResult, PaneCommand, RemovePaneCommand,
    SetRatiosCommand, SplitPaneCommand,
};
pub use config::{
    ConfigError, DEFAULT_MAX_UNDO_LEVELS, EngineConfig, GeometryConfig, HistoryConfig,
};
pub use controller::{ChangeOrigin, ModelEvent, PaneController};
