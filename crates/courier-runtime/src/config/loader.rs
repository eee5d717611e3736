//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config`: enables TOML files (`courier.toml`, `config.toml`)
//! - `yaml-config`: enables YAML files (`courier.yaml`, `courier.yml`, ...)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides passed to [`ConfigLoader::merge`]
//! 3. Profile-specific config file (`courier.{profile}.toml`)
//! 4. Main config file (`courier.toml`)
//! 5. `TELEGRAM_BOT_TOKEN`
//! 6. Environment variables (`COURIER_*`)
//!
//! A `.env` file found in a search path is loaded into the process
//! environment first; variables already set are not overwritten.
//!
//! # Environment Variable Mapping
//!
//! - `COURIER_BOT__TOKEN=123:abc` → `bot.token = "123:abc"`
//! - `COURIER_POLLING__TIMEOUT_SECS=50` → `polling.timeout_secs = 50`
//! - `COURIER_DISPATCH__SATURATION=reject` → `dispatch.saturation = "reject"`
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./deploy/courier.toml")
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
use super::schema::CourierConfig;
use super::validation::validate_config;

/// Environment variable holding the bot token, outside the `COURIER_` namespace.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "COURIER_PROFILE";

const ENV_PREFIX: &str = "COURIER_";

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

    /// Parses a profile name; `dev` and `prod` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `COURIER_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
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
    figment: Figment,
    profile: Option<Profile>,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    load_dotenv: bool,
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
            profile: None,
            search_paths: Vec::new(),
            load_env: true,
            load_dotenv: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile, overriding `COURIER_PROFILE`.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Some(Profile::parse(profile.as_ref()));
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables environment variables, including `TELEGRAM_BOT_TOKEN`.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Disables `.env` loading.
    pub fn without_dotenv(mut self) -> Self {
        self.load_dotenv = false;
        self
    }

    /// Merges configuration programmatically, above the defaults and below
    /// files and the environment.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and validates the configuration.
    pub fn load(self) -> ConfigResult<CourierConfig> {
        let profile = self.profile.clone().unwrap_or_else(Profile::from_env);
        let figment = self.build_figment(&profile)?;

        let config: CourierConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            token_set = !config.bot.token.is_empty(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self, profile: &Profile) -> ConfigResult<Figment> {
        let search_paths = self.resolve_search_paths();

        if self.load_dotenv {
            Self::load_dotenv_files(&search_paths)?;
        }

        let mut figment = Figment::from(Serialized::defaults(CourierConfig::default()));
        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, &path)?;
        } else {
            figment = Self::load_config_files(figment, &search_paths, profile);
        }

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment
                .merge(Env::raw().only(&[TOKEN_ENV]).map(|_| "bot.token".into()))
                .merge(
                    Env::prefixed(ENV_PREFIX)
                        .ignore(&["PROFILE"])
                        .split("__"),
                );
        }

        Ok(figment)
    }

    fn load_dotenv_files(search_paths: &[PathBuf]) -> ConfigResult<()> {
        for dir in search_paths {
            let path = dir.join(".env");
            if path.is_file() {
                debug!(path = %path.display(), "Loading .env file");
                dotenvy::from_path(&path).map_err(|e| {
                    ConfigError::ParseError(format!("{}: {e}", path.display()))
                })?;
            }
        }
        Ok(())
    }

    /// Merges a single config file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => {
                let _ = figment;
                Err(ConfigError::ParseError(format!(
                    "Unsupported or disabled configuration file format: .{ext}"
                )))
            }
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("courier"));
        }
        paths
    }

    /// Searches `search_paths × base_names`, merging the profile-specific
    /// variant and then the base file. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        profile: &Profile,
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = search_path.join(format!("{stem}.{}.{ext}", profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    figment = merge_fn(figment, &base_path);
                    return (figment, true);
                }
            }
        }
        (figment, false)
    }

    #[allow(unused_mut, unused_variables)]
    fn load_config_files(mut figment: Figment, search_paths: &[PathBuf], profile: &Profile) -> Figment {
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = Self::load_format_files(
                figment,
                search_paths,
                &["courier.toml", "config.toml"],
                profile,
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = Self::load_format_files(
                figment,
                search_paths,
                &["courier.yaml", "courier.yml", "config.yaml", "config.yml"],
                profile,
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<CourierConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file plus the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<CourierConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use courier_framework::Saturation;
    use figment::Jail;

    fn jailed(jail: &Jail) -> ConfigLoader {
        ConfigLoader::new().search_path(jail.directory())
    }

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = jailed(jail).without_env().load().unwrap();

            assert_eq!(config.logging.level.as_str(), "info");
            assert_eq!(config.polling.timeout_secs, 30);
            assert_eq!(config.dispatch.saturation, Saturation::Wait);
            assert!(config.bot.token.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Development"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_ENV, "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[test]
    fn test_token_env_and_prefixed_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env(TOKEN_ENV, "123:raw");
            jail.set_env("COURIER_POLLING__TIMEOUT_SECS", "20");
            jail.set_env("COURIER_DISPATCH__SATURATION", "reject");

            let config = jailed(jail).without_dotenv().load().unwrap();
            assert_eq!(config.bot.token, "123:raw");
            assert_eq!(config.polling.timeout_secs, 20);
            assert_eq!(config.dispatch.saturation, Saturation::Reject);
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_token_wins_over_raw() {
        Jail::expect_with(|jail| {
            jail.set_env(TOKEN_ENV, "123:raw");
            jail.set_env("COURIER_BOT__TOKEN", "456:prefixed");

            let config = jailed(jail).without_dotenv().load().unwrap();
            assert_eq!(config.bot.token, "456:prefixed");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_env_value_fails_validation() {
        Jail::expect_with(|jail| {
            jail.set_env("COURIER_DISPATCH__MAX_IN_FLIGHT", "0");

            let err = jailed(jail).without_dotenv().load().unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        Jail::expect_with(|jail| {
            let err = jailed(jail).file("nope.toml").load().unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_dotenv_is_loaded() {
        Jail::expect_with(|jail| {
            jail.create_file(".env", "COURIER_POLLING__RETRY_DELAY_SECS=9\n")?;

            let config = jailed(jail).load().unwrap();
            assert_eq!(config.polling.retry_delay_secs, 9);

            // dotenvy writes the real process environment.
            unsafe {
                std::env::remove_var("COURIER_POLLING__RETRY_DELAY_SECS");
            }
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_and_profile_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [bot]
                token = "from-file"

                [polling]
                timeout_secs = 25

                [logging]
                level = "debug"
                filters = { courier_framework = "trace" }
                "#,
            )?;
            jail.create_file(
                "courier.production.toml",
                r#"
                [polling]
                timeout_secs = 10
                retry_delay_secs = 2
                "#,
            )?;

            let config = jailed(jail).profile("prod").without_env().load().unwrap();
            // The base file is merged after the profile file.
            assert_eq!(config.polling.timeout_secs, 25);
            assert_eq!(config.polling.retry_delay_secs, 2);
            assert_eq!(config.bot.token, "from-file");
            assert_eq!(config.logging.level.as_str(), "debug");
            assert_eq!(config.logging.filters.len(), 1);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("courier.toml", "[bot]\ntoken = \"from-file\"\n")?;
            jail.set_env(TOKEN_ENV, "from-env");

            let config = jailed(jail).without_dotenv().load().unwrap();
            assert_eq!(config.bot.token, "from-env");
            Ok(())
        });
    }
}
