//! Contains validation logic for the final Config struct.

use super::Config;
use crate::core::error::{AppError, Result};

/// Validates the configuration after loading and potential overrides.
/// Mutates the config to clamp values where applicable.
/// Internal helper for the builder's `build` method.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.sleep_between_requests.0 < 0.0 || config.sleep_between_requests.1 < 0.0 {
        return Err(AppError::Config(
            "Sleep durations cannot be negative.".to_string(),
        ));
    }
    if config.sleep_between_requests.0 > config.sleep_between_requests.1 {
        tracing::warn!(
            "Min sleep ({:.2}s) > max sleep ({:.2}s). Setting max sleep = min sleep.",
            config.sleep_between_requests.0,
            config.sleep_between_requests.1
        );
        config.sleep_between_requests.1 = config.sleep_between_requests.0;
    }
    if config.dns_servers.is_empty() {
        tracing::warn!("DNS servers list is empty. Resolver will use system defaults.");
    }
    if !config.smtp_sender_email.contains('@') || !config.smtp_sender_email.contains('.') {
        return Err(AppError::Config(format!(
            "Invalid SMTP sender email format: {}",
            config.smtp_sender_email
        )));
    }
    if config.max_concurrency == 0 {
        tracing::warn!("Max concurrency was set to 0. Setting to 1.");
        config.max_concurrency = 1;
    }
    if config.min_rounds == 0 {
        tracing::warn!("Min rounds was set to 0. Setting to 1.");
        config.min_rounds = 1;
    }
    if config.max_rounds < config.min_rounds {
        tracing::warn!(
            "Max rounds ({}) < min rounds ({}). Setting max rounds = min rounds.",
            config.max_rounds,
            config.min_rounds
        );
        config.max_rounds = config.min_rounds;
    }
    if config.give_up_after_empty_rounds == 0 {
        tracing::warn!("Give-up threshold was set to 0. Setting to 1.");
        config.give_up_after_empty_rounds = 1;
    }
    if config.max_search_attempts == 0 {
        config.max_search_attempts = 1;
    }
    if config.max_verification_attempts == 0 {
        config.max_verification_attempts = 1;
    }
    if config.max_results_per_phrase == 0 {
        tracing::warn!("Max results per phrase was set to 0. Setting to 1.");
        config.max_results_per_phrase = 1;
    }
    if config.search_backend_url.trim().is_empty() {
        return Err(AppError::Config(
            "Search backend URL must not be empty.".to_string(),
        ));
    }
    Ok(())
}
