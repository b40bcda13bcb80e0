//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Build router → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every ShutdownSignal resolves → server stops accepting → drain
//!
//! Signals (signals.rs):
//!     SIGINT / SIGTERM → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, including a bad route template
//! - Listener binds last (traffic only when the route table is complete)
//! - Shutdown is level-triggered so late subscribers still observe it

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
