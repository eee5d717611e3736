//! Configuration for the Courier runtime.
//!
//! Settings come from built-in defaults, TOML/YAML files, a `.env` file and
//! `COURIER_*` environment variables, merged in that order.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, CourierConfig, DispatchConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, PollingConfig, SpanEventConfig,
};
pub use validation::validate_config;
