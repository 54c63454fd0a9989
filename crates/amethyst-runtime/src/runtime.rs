//! Process lifecycle: configuration, logging, plugin loading and shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use amethyst_runtime::AmethystRuntime;
//!
//! let runtime = AmethystRuntime::new()?;
//! let client = Client::new(module_path!(), gateway)?;
//!
//! // Applies the config, loads plugins, starts, and stops on Ctrl+C
//! runtime.run(client).await?;
//! ```

use std::path::Path;

use amethyst_core::GuildId;
use amethyst_framework::Client;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::config::{AmethystConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Runs a [`Client`] as configured.
pub struct AmethystRuntime {
    config: AmethystConfig,
}

impl AmethystRuntime {
    /// Loads the configuration from the default sources and initializes
    /// logging.
    pub fn new() -> RuntimeResult<Self> {
        Self::builder().build()
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from a loaded configuration.
    ///
    /// The configuration is validated and logging is initialized from it.
    pub fn from_config(config: AmethystConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized from configuration"
        );

        Ok(Self { config })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &AmethystConfig {
        &self.config
    }

    /// Applies the guild scope and auto-sync setting to `client`, then loads
    /// the plugins of the configured modules. Returns the number of plugins
    /// loaded.
    pub fn configure(&self, client: &mut Client) -> RuntimeResult<usize> {
        let bot = &self.config.bot;
        if let Some(guild) = bot.guild {
            client.set_guild(Some(GuildId(guild)));
        }
        if bot.auto_sync {
            client.set_auto_sync(true);
        }

        let loaded = client.load_plugins(&bot.plugin_modules)?;
        debug!(
            loaded,
            total = client.plugin_count(),
            modules = ?bot.plugin_modules,
            "Configured client"
        );
        Ok(loaded)
    }

    /// Runs `client` until a shutdown signal is received.
    pub async fn run(&self, client: Client) -> RuntimeResult<()> {
        info!("Amethyst is starting. Press Ctrl+C to stop.");
        self.run_until(client, wait_for_shutdown()).await
    }

    /// Runs `client` until `shutdown` completes or the gateway stops on its
    /// own.
    pub async fn run_until<F>(&self, mut client: Client, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let token = self
            .config
            .bot
            .token
            .clone()
            .ok_or(RuntimeError::MissingToken)?;
        self.configure(&mut client)?;

        let handle = client.handle();
        let start = client.start(&token);
        tokio::pin!(start);

        tokio::select! {
            result = &mut start => {
                result?;
                info!("Gateway stopped");
            }
            () = shutdown => {
                handle.close().await;
                start.await?;
            }
        }

        info!("Runtime stopped");
        Ok(())
    }
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(err) => {
                warn!("Failed to register SIGTERM handler: {err}");
                ctrl_c.await;
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating an [`AmethystRuntime`] with custom configuration.
///
/// ```rust,ignore
/// let runtime = AmethystRuntime::builder()
///     .config_file("config/amethyst.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: AmethystConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> RuntimeResult<AmethystRuntime> {
        let config = self.config_loader.load()?;
        AmethystRuntime::from_config(config)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
