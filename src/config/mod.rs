//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → handed by value to logging, metrics, the listener adapter
//!       and the terminal collaborator
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Nothing is read from process environment; the file and CLI flags are the only inputs

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    Environment, LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, ServerConfig,
    TerminalConfig, TimeoutConfig,
};
pub use validation::ValidationError;
