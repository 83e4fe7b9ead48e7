//! Configuration for the discovery pipeline.
//!
//! A [`Config`] starts from built-in defaults, is optionally overlaid with a
//! TOML [`ConfigFile`], then with programmatic overrides from the
//! [`ConfigBuilder`], and finally validated. CLI flags map onto builder
//! setters, so precedence is: defaults < file < explicit overrides.

mod builder;
mod loading;
mod validation;

pub use builder::ConfigBuilder;

use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Effective, validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Network
    pub request_timeout: Duration,
    pub user_agent: String,
    /// (min, max) seconds slept between probing attempts, jittered.
    pub sleep_between_requests: (f32, f32),

    // DNS
    pub dns_servers: Vec<String>,
    pub dns_timeout: Duration,

    // SMTP
    pub smtp_sender_email: String,
    pub smtp_timeout: Duration,
    pub max_verification_attempts: u32,

    // Search
    pub search_backend_url: String,
    pub max_results_per_phrase: usize,
    pub max_fetch_urls: usize,
    pub contact_page_indicators: Vec<String>,

    // Discovery loop
    pub max_rounds: u32,
    pub min_rounds: u32,
    pub give_up_after_empty_rounds: u32,
    pub max_concurrency: usize,
    pub max_search_attempts: u32,

    // Classification / extraction
    pub generic_email_prefixes: HashSet<String>,
    pub excluded_domains: Vec<String>,
    pub excluded_prefixes: Vec<String>,

    // Verification policy (recall over precision, both default on)
    pub assume_valid_on_dns_failure: bool,
    pub assume_valid_on_ambiguous: bool,

    // Dedup cache
    pub cache_dir: PathBuf,

    // Compiled patterns
    pub email_regex: Regex,
    pub phone_regex: Regex,

    /// Path of the config file that was loaded, if any.
    pub loaded_config_path: Option<String>,
}

const DEFAULT_GENERIC_PREFIXES: &[&str] = &[
    "info", "contact", "sales", "support", "admin", "help", "service",
    "marketing", "team", "office", "general", "inquiry", "enquiries", "mail",
    "email", "hello", "hi", "welcome", "customer", "client", "business",
    "company", "corp", "inc", "webmaster", "postmaster", "accounts",
    "billing", "finance", "hr", "careers", "jobs", "press", "media", "news",
    "pr", "noreply", "no-reply", "donotreply",
];

const DEFAULT_EXCLUDED_DOMAINS: &[&str] = &[
    "example.com", "example.org", "example.net", "test.com", "domain.com",
    "yoursite.com", "company.com", "email.com", "yourdomain.com",
    "localhost",
];

const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
    "noreply", "no-reply", "donotreply", "bounce", "mailer-daemon",
    "postmaster", "abuse", "privacy", "legal", "sample", "demo", "fake",
    "null", "void",
];

const DEFAULT_CONTACT_INDICATORS: &[&str] =
    &["contact", "about", "team", "press", "staff", "people", "leadership"];

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            user_agent: format!("email-prospector/{}", env!("CARGO_PKG_VERSION")),
            sleep_between_requests: (0.2, 1.0),

            dns_servers: vec!["8.8.8.8".into(), "1.1.1.1".into()],
            dns_timeout: Duration::from_secs(5),

            smtp_sender_email: "verify@example-probe.net".into(),
            smtp_timeout: Duration::from_secs(10),
            max_verification_attempts: 2,

            search_backend_url: "http://localhost:8080".into(),
            max_results_per_phrase: 50,
            max_fetch_urls: 8,
            contact_page_indicators: DEFAULT_CONTACT_INDICATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),

            max_rounds: 20,
            min_rounds: 2,
            give_up_after_empty_rounds: 3,
            max_concurrency: 8,
            max_search_attempts: 2,

            generic_email_prefixes: DEFAULT_GENERIC_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_domains: DEFAULT_EXCLUDED_DOMAINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),

            assume_valid_on_dns_failure: true,
            assume_valid_on_ambiguous: true,

            cache_dir: PathBuf::from("./.prospector-cache"),

            email_regex: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                .expect("email regex is valid"),
            phone_regex: Regex::new(r"\d{3}[-.]?\d{3}[-.]?\d{4}")
                .expect("phone regex is valid"),

            loaded_config_path: None,
        }
    }
}

/// Returns a jittered sleep duration within the configured bounds.
pub fn get_random_sleep_duration(config: &Config) -> Duration {
    let (min, max) = config.sleep_between_requests;
    if max <= min {
        return Duration::from_secs_f32(min.max(0.0));
    }
    let secs = rand::thread_rng().gen_range(min..max);
    Duration::from_secs_f32(secs)
}

/// Raw deserialized representation of a TOML configuration file.
///
/// Every field is optional; unset fields leave the default untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub dns: DnsSection,
    #[serde(default)]
    pub smtp: SmtpSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub classification: ClassificationSection,
    #[serde(default)]
    pub verification: VerificationSection,
    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkSection {
    pub request_timeout: Option<u64>,
    pub user_agent: Option<String>,
    pub min_sleep: Option<f32>,
    pub max_sleep: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DnsSection {
    pub dns_servers: Option<Vec<String>>,
    pub dns_timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SmtpSection {
    pub smtp_sender_email: Option<String>,
    pub smtp_timeout: Option<u64>,
    pub max_verification_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchSection {
    pub backend_url: Option<String>,
    pub max_results_per_phrase: Option<usize>,
    pub max_fetch_urls: Option<usize>,
    pub contact_page_indicators: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoverySection {
    pub max_rounds: Option<u32>,
    pub min_rounds: Option<u32>,
    pub give_up_after_empty_rounds: Option<u32>,
    pub max_concurrency: Option<usize>,
    pub max_search_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClassificationSection {
    pub generic_email_prefixes: Option<Vec<String>>,
    pub excluded_domains: Option<Vec<String>>,
    pub excluded_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerificationSection {
    pub assume_valid_on_dns_failure: Option<bool>,
    pub assume_valid_on_ambiguous: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CacheSection {
    pub cache_dir: Option<String>,
}

// Re-exported for the builder module.
pub(crate) use loading::{apply_file_config, load_config_file};
pub(crate) use validation::validate_config;
