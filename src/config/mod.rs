//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → main.rs builds the router and server from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the route table is too, so there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    LimitsConfig, ListenerConfig, ObservabilityConfig, PoolConfig, ServerConfig, StaticMount,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
