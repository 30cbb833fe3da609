//! Configuration validation.

use guildkit_framework::builtin::MAX_PREFIX_LEN;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, GuildkitConfig, LogOutput, LoggingConfig, StorageConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &GuildkitConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_storage_config(&config.storage)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    let prefix = &bot.default_prefix;
    if prefix.is_empty() {
        return Err(ConfigError::validation("Default prefix cannot be empty"));
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(
            "Default prefix cannot contain whitespace",
        ));
    }
    if prefix.chars().count() > MAX_PREFIX_LEN {
        return Err(ConfigError::validation(format!(
            "Default prefix can be at most {MAX_PREFIX_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_storage_config(storage: &StorageConfig) -> ConfigResult<()> {
    if storage.autosave_secs == 0 {
        return Err(ConfigError::validation(
            "Autosave interval must be greater than 0",
        ));
    }
    if storage.snapshot_path.as_os_str().is_empty() {
        return Err(ConfigError::missing_field("storage.snapshot_path"));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}
