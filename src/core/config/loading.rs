//! Handles loading configuration from files and applying it to the Config.

use super::{Config, ConfigFile};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Returns the parsed `ConfigFile` content. Internal to the builder logic.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

/// Applies settings from a parsed `ConfigFile` onto a mutable `Config`.
/// Internal helper for the builder. This merges settings.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    // Network
    if let Some(timeout) = file_config.network.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref user_agent) = file_config.network.user_agent {
        config.user_agent = user_agent.clone();
    }
    if let Some(min_sleep) = file_config.network.min_sleep {
        config.sleep_between_requests.0 = min_sleep;
    }
    if let Some(max_sleep) = file_config.network.max_sleep {
        config.sleep_between_requests.1 = max_sleep;
    }

    // DNS
    if let Some(ref servers) = file_config.dns.dns_servers {
        if !servers.is_empty() {
            config.dns_servers = servers.clone();
        }
    }
    if let Some(timeout) = file_config.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(timeout);
    }

    // SMTP
    if let Some(ref sender) = file_config.smtp.smtp_sender_email {
        config.smtp_sender_email = sender.clone();
    }
    if let Some(timeout) = file_config.smtp.smtp_timeout {
        config.smtp_timeout = Duration::from_secs(timeout);
    }
    if let Some(attempts) = file_config.smtp.max_verification_attempts {
        config.max_verification_attempts = attempts;
    }

    // Search
    if let Some(ref url) = file_config.search.backend_url {
        config.search_backend_url = url.clone();
    }
    if let Some(max_results) = file_config.search.max_results_per_phrase {
        config.max_results_per_phrase = max_results;
    }
    if let Some(max_fetch) = file_config.search.max_fetch_urls {
        config.max_fetch_urls = max_fetch;
    }
    if let Some(ref indicators) = file_config.search.contact_page_indicators {
        if !indicators.is_empty() {
            config.contact_page_indicators = indicators.clone();
        }
    }

    // Discovery
    if let Some(max_rounds) = file_config.discovery.max_rounds {
        config.max_rounds = max_rounds;
    }
    if let Some(min_rounds) = file_config.discovery.min_rounds {
        config.min_rounds = min_rounds;
    }
    if let Some(give_up) = file_config.discovery.give_up_after_empty_rounds {
        config.give_up_after_empty_rounds = give_up;
    }
    if let Some(concurrency) = file_config.discovery.max_concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(attempts) = file_config.discovery.max_search_attempts {
        config.max_search_attempts = attempts;
    }

    // Classification
    if let Some(ref prefixes) = file_config.classification.generic_email_prefixes {
        config.generic_email_prefixes = prefixes.iter().cloned().collect();
    }
    if let Some(ref domains) = file_config.classification.excluded_domains {
        if !domains.is_empty() {
            config.excluded_domains = domains.clone();
        }
    }
    if let Some(ref prefixes) = file_config.classification.excluded_prefixes {
        if !prefixes.is_empty() {
            config.excluded_prefixes = prefixes.clone();
        }
    }

    // Verification policy
    if let Some(enable) = file_config.verification.assume_valid_on_dns_failure {
        config.assume_valid_on_dns_failure = enable;
    }
    if let Some(enable) = file_config.verification.assume_valid_on_ambiguous {
        config.assume_valid_on_ambiguous = enable;
    }

    // Cache
    if let Some(ref dir) = file_config.cache.cache_dir {
        if !dir.trim().is_empty() {
            config.cache_dir = PathBuf::from(dir.trim());
        }
    }
}
