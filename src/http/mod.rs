//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum serve, trace / request-id / timeout layers)
//!     → server.rs (in-flight limit, buffer body up to the configured size)
//!     → exchange.rs (request parts + response under construction)
//!     → routing::Router::incoming on the blocking pool
//!     → Dispatch outcome → 404 / 500 / handler response
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - The router only sees the `Transport` trait, never Axum types
//! - Not-found and panic responses are decided here, not in the router
//! - Request ID added as early as possible for tracing

pub mod exchange;
pub mod mime;
pub mod request;
pub mod server;
pub mod transport;

pub use exchange::Exchange;
pub use request::{RequestIdLayer, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
pub use transport::Transport;
