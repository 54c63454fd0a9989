//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{AmethystConfig, BotConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &AmethystConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates bot settings.
fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.plugin_modules.is_empty() {
        return Err(ConfigError::validation(
            "bot.plugin_modules must name at least one module",
        ));
    }

    if let Some(module) = bot
        .plugin_modules
        .iter()
        .find(|module| module.trim().is_empty())
    {
        return Err(ConfigError::validation(format!(
            "Invalid plugin module: {module:?}"
        )));
    }

    if let Some(token) = &bot.token
        && token.trim().is_empty()
    {
        return Err(ConfigError::validation("bot.token must not be empty"));
    }

    if bot.guild == Some(0) {
        return Err(ConfigError::validation("bot.guild must be a valid guild id"));
    }

    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    if let Some(module) = logging.filters.keys().find(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid log filter module: {module:?}"
        )));
    }

    Ok(())
}
