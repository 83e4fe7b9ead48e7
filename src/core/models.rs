//! Data structures shared across the discovery pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the caller asks for: a topic to mine, how many new addresses to
/// return, and an optional session identifier that scopes the dedup cache
/// to a campaign instead of the bare topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub topic: String,
    pub target_count: usize,
    pub session_id: Option<String>,
}

impl DiscoveryRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            target_count: 5,
            session_id: None,
        }
    }

    pub fn with_target(mut self, target_count: usize) -> Self {
        self.target_count = target_count;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Where a candidate token was found.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateSource {
    /// The search phrase that produced the result this token came from.
    pub phrase: String,
    /// URL of the search hit or fetched page, when known.
    pub url: Option<String>,
    /// Title of the search hit or fetched page, when known.
    pub page_title: Option<String>,
}

/// An address-shaped token plus the contextual signals captured around it.
///
/// Owned by the run that produced it; merged into the accumulator by value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichedCandidate {
    pub email: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub is_personal: bool,
    pub source: CandidateSource,
    pub round: u32,
}

impl EnrichedCandidate {
    pub fn new(email: impl Into<String>, source: CandidateSource, round: u32) -> Self {
        Self {
            email: email.into(),
            name: None,
            title: None,
            department: None,
            is_personal: false,
            source,
            round,
        }
    }

    /// True if any surrounding-context signal was captured.
    pub fn has_context(&self) -> bool {
        self.name.is_some() || self.title.is_some() || self.department.is_some()
    }

    pub fn domain(&self) -> &str {
        self.email.split('@').nth(1).unwrap_or("")
    }

    pub fn local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or("")
    }
}

/// Outcome of the deliverability check for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Mail exchanger gave a definitive positive answer for this recipient.
    Confirmed,
    /// DNS or SMTP was ambiguous; accepted under the availability policy.
    Unverifiable,
    /// The domain accepts any recipient, so a positive answer means nothing.
    CatchAll,
}

/// Cached per-domain verification facts, computed at most once per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainRecord {
    pub domain: String,
    pub has_mx: bool,
    pub mx_host: Option<String>,
    pub is_catch_all: bool,
}

/// An address that survived classification, verification and dedup.
///
/// Unique by email within a run; re-discovery merges enrichment
/// (last write wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedEmail {
    pub email: String,
    pub confidence: f64,
    pub verification_status: VerificationStatus,
    pub name: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub is_personal: bool,
    pub source: CandidateSource,
    pub round: u32,
}

/// Debug counters accumulated over a run. Informational only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub phrases_dispatched: usize,
    pub search_failures: usize,
    pub pages_fetched: usize,
    pub fetch_failures: usize,
    pub candidates_extracted: usize,
    pub skipped_cached: usize,
    pub rejected_format: usize,
    pub rejected_classification: usize,
    pub rejected_verification: usize,
    /// Rejection reason -> count, for observability.
    pub rejection_reasons: HashMap<String, usize>,
}

impl RunStats {
    pub fn note_rejection(&mut self, reason: &str) {
        *self.rejection_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }
}

/// The payload returned to the caller and printed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub success: bool,
    pub emails: Vec<String>,
    pub email_details: Vec<AcceptedEmail>,
    pub total_emails: usize,
    pub search_rounds: u32,
    /// Wall-clock seconds for the whole run.
    pub execution_time: f64,
    pub topic: String,
    pub target_achieved: bool,
    pub stats: RunStats,
}
