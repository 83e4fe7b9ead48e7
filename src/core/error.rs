//! Application-wide error type and `Result` alias.

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, AppError>;

/// All error conditions surfaced by the discovery pipeline.
///
/// Candidate-level rejections (generic prefix, failed SMTP probe, ...) are
/// ordinary data carried in classification/verification results, not errors;
/// this enum covers genuine failures of the machinery around them.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Search/fetch transport error: {0}")]
    Transport(String),

    #[error("Domain does not exist (NXDOMAIN): {0}")]
    NxDomain(String),

    #[error("No usable DNS records for domain: {0}")]
    NoDnsRecords(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("SMTP protocol error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("SMTP check inconclusive: {0}")]
    SmtpInconclusive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dedup cache I/O error: {0}")]
    CacheIo(String),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Could not extract a domain: {0}")]
    DomainExtraction(String),

    #[error("Strategy produced no usable phrases: {0}")]
    Strategy(String),
}
