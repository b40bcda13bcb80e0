//! Waypoint: an ordered HTTP path router with continuation-style middleware.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::Exchange ──▶ routing::Router::incoming
//!                    (trace, id,                          │ acquire pooled state
//!                     timeout,                            │ scan routes in order
//!                     body limit)                         │ bind params → handler(Context)
//!                                                         │ next()? keep scanning
//!     Client Response                                     ▼
//!     ◀────────────── Dispatch outcome → 404 / 500 / handler response
//!
//!     Cross-cutting: config, observability (logs + metrics), lifecycle (shutdown)
//! ```
//!
//! Routes are registered once at startup and never change while serving:
//!
//! ```no_run
//! use waypoint::Router;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut router = Router::new();
//! router
//!     .middleware(|ctx| {
//!         ctx.set("x-powered-by", "waypoint");
//!         ctx.next();
//!     })?
//!     .get("/users/:id", |ctx| {
//!         let id = ctx.param("id").to_owned();
//!         ctx.send(format!("user {id}"));
//!     })?;
//! router.listen(8080).await?;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use http::{Exchange, HttpServer, ServerError, Transport};
pub use lifecycle::Shutdown;
pub use routing::{Context, Dispatch, PatternError, RouteError, Router};
