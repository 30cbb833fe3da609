//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables `guildkit.toml` / `config.toml`
//! - `yaml-config`: enables `guildkit.yaml` / `guildkit.yml` / `config.yaml` / `config.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic base layer ([`ConfigLoader::merge`])
//! 3. Profile-specific config file (`guildkit.{profile}.toml`)
//! 4. Main config file (`guildkit.toml`)
//! 5. Environment variables (`GUILDKIT_*`)
//! 6. `GUILDKIT_EXTENSION_DIR`, which overrides `extensions.dir`
//!
//! # Environment Variable Mapping
//!
//! Variables use the `GUILDKIT_` prefix with `__` as the nesting separator:
//!
//! - `GUILDKIT_BOT__DEFAULT_PREFIX=!` → `bot.default_prefix = "!"`
//! - `GUILDKIT_STORAGE__AUTOSAVE_SECS=60` → `storage.autosave_secs = 60`
//! - `GUILDKIT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! # Example
//!
//! ```rust,ignore
//! use guildkit_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .file("./deploy/guildkit.toml")
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
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::GuildkitConfig;

/// Environment variable naming the extension directory.  Takes precedence
/// over every other source.
pub const EXTENSION_DIR_ENV: &str = "GUILDKIT_EXTENSION_DIR";

const ENV_PREFIX: &str = "GUILDKIT_";
const PROFILE_ENV: &str = "GUILDKIT_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `GUILDKIT_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points `config` at the directory named by [`EXTENSION_DIR_ENV`], if set.
pub fn apply_extension_dir_override(config: &mut GuildkitConfig) {
    if let Some(dir) = std::env::var_os(EXTENSION_DIR_ENV).filter(|d| !d.is_empty()) {
        debug!(dir = ?dir, "Extension directory taken from {EXTENSION_DIR_ENV}");
        config.extensions.dir = PathBuf::from(dir);
    }
}

/// Multi-source configuration loader.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for config files.  Without any, the
    /// current directory and the user config directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds `<user config dir>/guildkit` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(config_dir) => self.search_path(config_dir.join("guildkit")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Whether environment variables are consulted.
    pub fn uses_env(&self) -> bool {
        self.load_env
    }

    /// Layers `config` over the defaults, below files and environment.
    pub fn merge(mut self, config: GuildkitConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<GuildkitConfig> {
        let profile = self.profile.clone();
        let load_env = self.load_env;
        let mut config: GuildkitConfig = self.build_figment()?.extract()?;

        if load_env {
            apply_extension_dir_override(&mut config);
        }

        debug!(
            profile = %profile,
            default_prefix = %config.bot.default_prefix,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(GuildkitConfig::default()))
            .merge(self.figment.clone());

        match &self.config_file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                figment = merge_file(figment, path)?;
            }
            None => figment = self.merge_discovered(figment)?,
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        Ok(figment)
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("guildkit")))
            .collect()
    }

    /// Merges the first config file found in the search directories, preceded
    /// by its profile variant (`guildkit.production.toml`) when present.
    fn merge_discovered(&self, mut figment: Figment) -> ConfigResult<Figment> {
        for dir in self.search_dirs() {
            for name in CONFIG_FILE_NAMES {
                let base = dir.join(name);
                if let Some((stem, ext)) = name.rsplit_once('.') {
                    let variant = dir.join(format!("{stem}.{}.{ext}", self.profile));
                    if variant.exists() {
                        debug!(path = %variant.display(), "Loading profile-specific config");
                        figment = merge_file(figment, &variant)?;
                    }
                }
                if base.exists() {
                    info!(path = %base.display(), "Loading configuration file");
                    return merge_file(figment, &base);
                }
            }
        }
        warn!("No configuration file found, using defaults");
        Ok(figment)
    }
}

/// File names searched for, in order.  Only formats enabled by feature flags
/// are listed.
const CONFIG_FILE_NAMES: &[&str] = &[
    #[cfg(feature = "toml-config")]
    "guildkit.toml",
    #[cfg(feature = "toml-config")]
    "config.toml",
    #[cfg(feature = "yaml-config")]
    "guildkit.yaml",
    #[cfg(feature = "yaml-config")]
    "guildkit.yml",
    #[cfg(feature = "yaml-config")]
    "config.yaml",
    #[cfg(feature = "yaml-config")]
    "config.yml",
];

/// Merges one file, dispatching on its extension.
#[cfg_attr(
    not(any(feature = "toml-config", feature = "yaml-config")),
    allow(unused_variables)
)]
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::ParseError(format!(
            "unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, LogLevel};
    use figment::Jail;
    use guildkit_core::UserId;

    #[test]
    fn test_defaults_without_any_source() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config, GuildkitConfig::default());
            assert_eq!(config.bot.default_prefix, ".");
            assert_eq!(config.storage.autosave_secs, 300);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "guildkit.toml",
                r#"
                [bot]
                default_prefix = "!"
                operator_id = 42

                [logging]
                level = "debug"
                format = "pretty"
                "#,
            )?;
            jail.set_env("GUILDKIT_BOT__DEFAULT_PREFIX", "?");
            jail.set_env("GUILDKIT_STORAGE__AUTOSAVE_SECS", "60");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.bot.default_prefix, "?");
            assert_eq!(config.bot.operator_id, Some(UserId(42)));
            assert_eq!(config.storage.autosave_secs, 60);
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_is_overridden_by_base_file() {
        Jail::expect_with(|jail| {
            jail.create_file("guildkit.production.toml", "[storage]\nautosave_secs = 30\n")?;
            jail.create_file("guildkit.toml", "[bot]\ndefault_prefix = \"$\"\n")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.storage.autosave_secs, 30);
            assert_eq!(config.bot.default_prefix, "$");
            Ok(())
        });
    }

    #[test]
    fn test_extension_dir_env_wins() {
        Jail::expect_with(|jail| {
            jail.set_env("GUILDKIT_EXTENSIONS__DIR", "/from/nested");
            jail.set_env(EXTENSION_DIR_ENV, "/from/override");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.extensions.dir, PathBuf::from("/from/override"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigLoader::new()
            .file("/definitely/not/here/guildkit.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
