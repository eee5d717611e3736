//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{
    BotConfig, CourierConfig, DispatchConfig, LogOutput, LoggingConfig, PollingConfig,
};

/// The Bot API accepts at most this many updates per fetch.
pub const MAX_POLL_LIMIT: u32 = 100;

/// Validates the entire configuration.
///
/// An empty token is accepted here; the runtime rejects it only when it
/// has to build the HTTP transport itself.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_polling_config(&config.polling)?;
    validate_dispatch_config(&config.dispatch)?;
    validate_logging_config(&config.logging)?;

    if config.bot.request_timeout_secs <= config.polling.timeout_secs {
        return Err(ConfigError::validation(format!(
            "bot.request_timeout_secs ({}) must exceed polling.timeout_secs ({})",
            config.bot.request_timeout_secs, config.polling.timeout_secs
        )));
    }

    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    validate_url(&bot.api_url)?;
    if bot.token.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation("Bot token cannot contain whitespace"));
    }
    Ok(())
}

fn validate_polling_config(polling: &PollingConfig) -> ConfigResult<()> {
    if polling.retry_delay_secs == 0 {
        return Err(ConfigError::validation(
            "polling.retry_delay_secs must be greater than 0",
        ));
    }

    if let Some(limit) = polling.limit {
        if !(1..=MAX_POLL_LIMIT).contains(&limit) {
            return Err(ConfigError::validation(format!(
                "polling.limit must be between 1 and {MAX_POLL_LIMIT}, got {limit}"
            )));
        }
    }

    Ok(())
}

fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.max_in_flight == 0 {
        return Err(ConfigError::validation(
            "dispatch.max_in_flight must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("bot.api_url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {valid_schemes:?}"),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_request_timeout_must_exceed_poll_timeout() {
        let mut config = CourierConfig::default();
        config.bot.request_timeout_secs = config.polling.timeout_secs;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_polling_bounds() {
        let mut config = CourierConfig::default();
        config.polling.retry_delay_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = CourierConfig::default();
        config.polling.limit = Some(101);
        assert!(validate_config(&config).is_err());

        config.polling.limit = Some(100);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_pool_rejected() {
        let mut config = CourierConfig::default();
        config.dispatch.max_in_flight = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_url() {
        let mut config = CourierConfig::default();
        config.bot.api_url = "ftp://example.com".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some("courier.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
