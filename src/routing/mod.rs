//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Setup (once):
//!     register(method, template, handler)
//!     → pattern.rs (validate, classify static/dynamic, build regex)
//!     → route.rs (immutable Route)
//!     → router.rs (append to ordered table)
//!
//! Per request:
//!     Router::incoming(transport)
//!     → pool.rs (acquire RequestState)
//!     → router.rs (scan in registration order, exact match then regex)
//!     → context.rs (handler reads params, writes response, may call next())
//!     → pool.rs (reset and release, also on panic)
//!     → Dispatch { Handled | Exhausted | Unhandled | Aborted }
//! ```
//!
//! # Design Decisions
//! - Registration order is precedence; nothing is sorted or deduplicated
//! - Template errors fail registration, never dispatch
//! - Parameter values are borrowed slices of the request path
//! - Dispatch is synchronous and never blocks on I/O itself

pub mod context;
pub mod pattern;
pub mod pool;
pub mod route;
pub mod router;

pub use context::Context;
pub use pattern::{Pattern, PatternError};
pub use pool::{ContextPool, Pooled, RequestState};
pub use route::{Handler, Route, METHODS};
pub use router::{Dispatch, RouteError, Router};
