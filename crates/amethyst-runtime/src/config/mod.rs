//! Configuration module for the Amethyst runtime.
//!
//! This module provides figment-based loading and validation of the bot
//! settings and logging options.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, Profile};
pub use schema::{AmethystConfig, BotConfig, LogFormat, LogLevel, LogOutput, LoggingConfig};
pub use validation::validate_config;
