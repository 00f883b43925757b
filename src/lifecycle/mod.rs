//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Program::init → load + persist metadata → bind → serve in background
//!
//! Shutdown (shutdown.rs, task_group.rs):
//!     Program::stop → broker exit → broadcast → acceptor stops → tasks drain
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main calls Program::stop
//! ```
//!
//! # Design Decisions
//! - Ordered startup: metadata first, listener last
//! - Stop is one-shot; repeated signals are harmless
//! - Drain is bounded by a timeout in the daemon, never in the acceptor

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod task_group;

pub use shutdown::Shutdown;
pub use startup::{Program, Started, StartupError};
pub use task_group::TaskGroup;
