//! # Email Prospector Core Library
//!
//! This crate provides the core logic for discovering and verifying
//! topic-scoped contact email addresses: round-based search, candidate
//! extraction with surrounding-context capture, generic/personal
//! classification, DNS+SMTP deliverability verification with catch-all
//! detection, and cross-run deduplication via a persistent campaign cache.
//!
//! It is designed to be used either directly as a library or via the
//! `email-prospector` command-line tool (which uses this library).

mod cache;
mod classify;
mod core;
mod extraction;
mod search;
mod utils;
mod verify;

pub use crate::cache::{campaign_key, DedupCache};
pub use crate::classify::{classify, Classification};
pub use crate::core::config::{Config, ConfigBuilder};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    AcceptedEmail, CandidateSource, DiscoveryRequest, DiscoveryResult, DomainRecord,
    EnrichedCandidate, RunStats, VerificationStatus,
};
pub use crate::core::prospector::EmailProspector;
pub use crate::extraction::extract;
pub use crate::search::{
    static_phrases_for_round, ContentFetcher, HttpFetcher, QueryStrategy, SearchBackend,
    SearchHit, SearxngBackend, StaticStrategy,
};
pub use crate::utils::smtp::test_smtp_connectivity;
pub use crate::verify::{
    final_confidence, DnsSmtpProber, DomainProber, DomainState, DomainVerifier, Verification,
};

use std::sync::Arc;

/// Initializes shared resources (HTTP client, DNS resolver, SMTP probe).
/// Essential for creating an `EmailProspector` instance.
pub async fn initialize_prospector(config: &Config) -> Result<EmailProspector> {
    EmailProspector::new(config).await
}

/// Performs an early check for SMTP connectivity.
pub async fn check_smtp_connectivity() -> Result<()> {
    test_smtp_connectivity().await
}

/// Runs one discovery request end to end.
///
/// Thin wrapper over [`EmailProspector::discover`] mirroring the CLI's
/// single-run usage; embedders wanting cancellation or reuse should hold
/// the prospector directly.
pub async fn discover_emails(
    prospector: Arc<EmailProspector>,
    request: DiscoveryRequest,
) -> Result<DiscoveryResult> {
    prospector.discover(&request).await
}
