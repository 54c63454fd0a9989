//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`amethyst.{profile}.toml` / `amethyst.{profile}.yaml`)
//! 3. Main config file (`amethyst.toml` / `amethyst.yaml`)
//! 4. Environment variables (`AMETHYST_*`)
//! 5. Programmatic overrides
//!
//! A `.env` file in the working directory is read into the process
//! environment before variables are collected.
//!
//! # Environment Variable Mapping
//!
//! Nested keys use `__` as separator:
//!
//! - `AMETHYST_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `AMETHYST_BOT__PLUGIN_MODULES=[".cogs"]` → `bot.plugin_modules`
//!
//! The bot settings also have flat variables:
//!
//! | variable             | key             | value                                  |
//! |----------------------|-----------------|----------------------------------------|
//! | `AMETHYST_BOT_TOKEN` | `bot.token`     | the token                              |
//! | `AMETHYST_GUILD`     | `bot.guild`     | a numeric guild id                     |
//! | `AMETHYST_AUTO_SYNC` | `bot.auto_sync` | set to enable, `0/false/no/off` to not |
//!
//! # Example
//!
//! ```rust,ignore
//! use amethyst_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace};

use super::error::{ConfigError, ConfigResult};
use super::schema::AmethystConfig;

/// Prefix of every environment variable read by the loader.
pub const ENV_PREFIX: &str = "AMETHYST_";

const TOKEN_VAR: &str = "AMETHYST_BOT_TOKEN";
const GUILD_VAR: &str = "AMETHYST_GUILD";
const AUTO_SYNC_VAR: &str = "AMETHYST_AUTO_SYNC";
const PROFILE_VAR: &str = "AMETHYST_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads the profile from `AMETHYST_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic overrides.
    figment: Figment,
    /// Explicit profile; read from the environment at load time otherwise.
    profile: Option<Profile>,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Whether to read a `.env` file first.
    load_dotenv: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: None,
            search_paths: Vec::new(),
            load_env: true,
            load_dotenv: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Some(Profile::parse(profile.as_ref()));
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables and the `.env` file.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self.load_dotenv = false;
        self
    }

    /// Skips the `.env` file while still reading the process environment.
    pub fn without_dotenv(mut self) -> Self {
        self.load_dotenv = false;
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: AmethystConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<AmethystConfig> {
        if self.load_dotenv {
            match dotenvy::dotenv() {
                Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
                Err(err) if err.not_found() => {}
                Err(err) => debug!("Ignoring unreadable .env file: {err}"),
            }
        }

        let profile = self.profile.clone().unwrap_or_else(Profile::from_env);
        let figment = self.build_figment(&profile)?;
        let config: AmethystConfig = figment.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            guild = ?config.bot.guild,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(mut self, profile: &Profile) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(AmethystConfig::default()));

        // Config files
        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment, profile);
        }

        // Environment variables
        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["bot_token", "guild", "auto_sync", "profile"])
                    .split("__"),
            );
            figment = merge_flat_env(figment)?;
        }

        // Programmatic overrides win
        let overrides = std::mem::take(&mut self.figment);
        Ok(figment.merge(overrides))
    }

    /// Merges a single config file into the figment, dispatching on file extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("amethyst"));
        }
        paths
    }

    /// Searches for and loads configuration files.
    ///
    /// The first search path holding a main file wins. Its profile file is
    /// merged beneath it.
    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_variables, unused_mut)
    )]
    fn load_config_files(&self, mut figment: Figment, profile: &Profile) -> Figment {
        let mut base_names: Vec<&str> = Vec::new();
        #[cfg(feature = "toml-config")]
        base_names.push("amethyst.toml");
        #[cfg(feature = "yaml-config")]
        base_names.extend(["amethyst.yaml", "amethyst.yml"]);

        for search_path in self.resolve_search_paths() {
            let mut found = false;
            for base_name in &base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = search_path.join(format!("{stem}.{profile}.{ext}"));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    if let Ok(merged) = Self::merge_config_file(figment.clone(), &profile_path) {
                        figment = merged;
                    }
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    if let Ok(merged) = Self::merge_config_file(figment.clone(), &base_path) {
                        figment = merged;
                    }
                    found = true;
                }
            }
            if found {
                return figment;
            }
        }

        debug!("No configuration file found, using defaults");
        figment
    }
}

/// Merges `AMETHYST_BOT_TOKEN`, `AMETHYST_GUILD` and `AMETHYST_AUTO_SYNC`.
fn merge_flat_env(mut figment: Figment) -> ConfigResult<Figment> {
    if let Some(token) = env_var(TOKEN_VAR) {
        figment = figment.merge(Serialized::default("bot.token", token));
    }

    if let Some(guild) = env_var(GUILD_VAR) {
        let id = guild
            .trim()
            .parse::<u64>()
            .map_err(|err| ConfigError::InvalidEnv {
                key: GUILD_VAR,
                value: guild.clone(),
                reason: err.to_string(),
            })?;
        figment = figment.merge(Serialized::default("bot.guild", id));
    }

    if let Some(value) = env_var(AUTO_SYNC_VAR) {
        figment = figment.merge(Serialized::default("bot.auto_sync", is_enabled(&value)));
    }

    Ok(figment)
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// A flag variable is on unless it reads as false.
fn is_enabled(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .without_env()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.logging.level.as_str(), "info");
            assert!(config.bot.token.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Development"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_file_and_profile_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "amethyst.toml",
                r#"
                [bot]
                guild = 42
                plugin_modules = [".cogs"]

                [logging]
                level = "warn"
                "#,
            )?;
            jail.create_file(
                "amethyst.production.toml",
                r#"
                [bot]
                auto_sync = true

                [logging]
                level = "error"
                "#,
            )?;

            let config = ConfigLoader::new()
                .without_dotenv()
                .profile("production")
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.bot.guild, Some(42));
            assert_eq!(config.bot.plugin_modules, vec![".cogs".to_string()]);
            assert!(config.bot.auto_sync);
            // The main file overrides its profile file.
            assert_eq!(config.logging.level, LogLevel::Warn);
            Ok(())
        });
    }

    #[test]
    fn test_flat_env_vars() {
        Jail::expect_with(|jail| {
            jail.set_env("AMETHYST_BOT_TOKEN", "abc.def");
            jail.set_env("AMETHYST_GUILD", "1234");
            jail.set_env("AMETHYST_AUTO_SYNC", "yes");
            jail.set_env("AMETHYST_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new()
                .without_dotenv()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.bot.token.as_deref(), Some("abc.def"));
            assert_eq!(config.bot.guild, Some(1234));
            assert!(config.bot.auto_sync);
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_auto_sync_disabled_by_falsy_value() {
        Jail::expect_with(|jail| {
            jail.set_env("AMETHYST_AUTO_SYNC", "off");
            let config = ConfigLoader::new()
                .without_dotenv()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert!(!config.bot.auto_sync);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_guild_is_an_error() {
        Jail::expect_with(|jail| {
            jail.set_env("AMETHYST_GUILD", "not-a-number");
            let result = ConfigLoader::new()
                .without_dotenv()
                .search_path(jail.directory())
                .load();
            assert!(matches!(
                result,
                Err(ConfigError::InvalidEnv { key: GUILD_VAR, .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new()
            .without_env()
            .file("/nonexistent/amethyst.toml")
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_is_enabled() {
        assert!(is_enabled("1"));
        assert!(is_enabled(""));
        assert!(!is_enabled("False"));
        assert!(!is_enabled(" no "));
    }
}
