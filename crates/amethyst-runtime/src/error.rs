//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while running a bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Plugin loading or client startup failed.
    #[error(transparent)]
    Client(#[from] amethyst_framework::ClientError),

    /// No bot token was configured.
    #[error("No bot token configured; set bot.token or AMETHYST_BOT_TOKEN")]
    MissingToken,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
