//! Amethyst Runtime - process layer for Amethyst bots.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `AmethystConfig`)
//! - Logging configuration (`LoggingBuilder`)
//! - Runtime orchestration (`AmethystRuntime`): applies the configuration to
//!   a [`Client`](amethyst_framework::Client), loads plugins, starts it and
//!   shuts it down on Ctrl+C or SIGTERM
//!
//! ```rust,ignore
//! use amethyst_runtime::AmethystRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = AmethystRuntime::new()?;
//!     let client = Client::new(module_path!(), Arc::new(MyGateway::new()))?;
//!     runtime.run(client).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    AmethystConfig, BotConfig, ConfigError, ConfigLoader, ConfigResult, LogFormat, LogLevel,
    LogOutput, LoggingConfig, Profile,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{AmethystRuntime, RuntimeBuilder, wait_for_shutdown};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Commonly used logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
