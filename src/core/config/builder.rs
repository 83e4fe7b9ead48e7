//! Provides the `ConfigBuilder` for fluent configuration construction.

use super::{apply_file_config, load_config_file, validate_config, Config, ConfigFile};
use crate::core::error::{AppError, Result};
use std::path::Path;
use std::time::Duration;

/// Builder pattern for creating `Config` instances fluently.
///
/// This is the primary way callers should create a `Config`: it handles
/// loading from files, applying overrides, and validation.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    config_file_path: Option<String>,
    overrides: ConfigFile,
}

impl ConfigBuilder {
    /// Creates a new builder with default configuration values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify an optional configuration file path to load.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.overrides.network.request_timeout = Some(duration.as_secs());
        self
    }
    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.overrides.network.user_agent = Some(value.into());
        self
    }
    pub fn sleep_between_requests(mut self, min: f32, max: f32) -> Self {
        self.overrides.network.min_sleep = Some(min);
        self.overrides.network.max_sleep = Some(max);
        self
    }
    pub fn dns_servers(mut self, servers: Vec<String>) -> Self {
        self.overrides.dns.dns_servers = Some(servers);
        self
    }
    pub fn dns_timeout(mut self, duration: Duration) -> Self {
        self.overrides.dns.dns_timeout = Some(duration.as_secs());
        self
    }
    pub fn smtp_sender_email(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.smtp_sender_email = Some(value.into());
        self
    }
    pub fn smtp_timeout(mut self, duration: Duration) -> Self {
        self.overrides.smtp.smtp_timeout = Some(duration.as_secs());
        self
    }
    pub fn max_verification_attempts(mut self, value: u32) -> Self {
        self.overrides.smtp.max_verification_attempts = Some(value);
        self
    }
    pub fn search_backend_url(mut self, value: impl Into<String>) -> Self {
        self.overrides.search.backend_url = Some(value.into());
        self
    }
    pub fn max_results_per_phrase(mut self, value: usize) -> Self {
        self.overrides.search.max_results_per_phrase = Some(value);
        self
    }
    pub fn max_fetch_urls(mut self, value: usize) -> Self {
        self.overrides.search.max_fetch_urls = Some(value);
        self
    }
    pub fn contact_page_indicators(mut self, indicators: Vec<String>) -> Self {
        self.overrides.search.contact_page_indicators = Some(indicators);
        self
    }
    pub fn max_rounds(mut self, value: u32) -> Self {
        self.overrides.discovery.max_rounds = Some(value);
        self
    }
    pub fn min_rounds(mut self, value: u32) -> Self {
        self.overrides.discovery.min_rounds = Some(value);
        self
    }
    pub fn give_up_after_empty_rounds(mut self, value: u32) -> Self {
        self.overrides.discovery.give_up_after_empty_rounds = Some(value);
        self
    }
    pub fn max_concurrency(mut self, value: usize) -> Self {
        self.overrides.discovery.max_concurrency = Some(value);
        self
    }
    pub fn max_search_attempts(mut self, value: u32) -> Self {
        self.overrides.discovery.max_search_attempts = Some(value);
        self
    }
    pub fn generic_email_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.overrides.classification.generic_email_prefixes = Some(prefixes);
        self
    }
    pub fn excluded_domains(mut self, domains: Vec<String>) -> Self {
        self.overrides.classification.excluded_domains = Some(domains);
        self
    }
    pub fn assume_valid_on_dns_failure(mut self, enable: bool) -> Self {
        self.overrides.verification.assume_valid_on_dns_failure = Some(enable);
        self
    }
    pub fn assume_valid_on_ambiguous(mut self, enable: bool) -> Self {
        self.overrides.verification.assume_valid_on_ambiguous = Some(enable);
        self
    }
    pub fn cache_dir(mut self, dir: impl Into<String>) -> Self {
        self.overrides.cache.cache_dir = Some(dir.into());
        self
    }

    /// Builds the final `Config`, applying defaults, file settings,
    /// overrides, and validation.
    pub fn build(mut self) -> Result<Config> {
        let mut loaded_path: Option<String> = None;

        if let Some(ref path) = self.config_file_path {
            match load_config_file(path) {
                Ok(file_config) => {
                    apply_file_config(&mut self.config, &file_config);
                    loaded_path = Some(path.clone());
                    tracing::info!("Loaded base configuration from specified file: {}", path);
                }
                Err(e) => {
                    tracing::error!("Failed to load specified config file '{}': {}", path, e);
                    return Err(AppError::Config(format!(
                        "Failed to load specified configuration file '{}': {}",
                        path, e
                    )));
                }
            }
        } else {
            tracing::debug!("No config file specified, checking default locations.");
            for path_str in ["./email-prospector.toml", "./config.toml"] {
                if Path::new(path_str).exists() {
                    match load_config_file(path_str) {
                        Ok(file_config) => {
                            apply_file_config(&mut self.config, &file_config);
                            loaded_path = Some(path_str.to_string());
                            tracing::info!(
                                "Loaded base configuration from default location: {}",
                                path_str
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to load or parse default config '{}': {}",
                                path_str,
                                e
                            );
                        }
                    }
                }
            }
            if loaded_path.is_none() {
                tracing::debug!("No configuration file found. Using defaults and overrides.");
            }
        }

        apply_file_config(&mut self.config, &self.overrides);
        self.config.loaded_config_path = loaded_path;
        validate_config(&mut self.config)?;

        tracing::debug!("Final configuration built successfully.");
        Ok(self.config)
    }
}
