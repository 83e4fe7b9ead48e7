//! Deliverability verification with per-domain caching.
//!
//! Verification is expensive and monotone within a run: once a domain's
//! MX/catch-all facts are known they are reused for every further address
//! on that domain. Concurrent first-time lookups for the same domain are
//! collapsed into a single probe; followers await the in-flight result.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{DomainRecord, VerificationStatus};
use crate::utils::dns::{create_resolver, resolve_mail_server};
use crate::utils::smtp::SmtpProbe;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use trust_dns_resolver::TokioAsyncResolver;

/// Confidence penalty applied to addresses on catch-all domains.
pub const CATCH_ALL_PENALTY: f64 = 0.2;
/// Confidence penalty applied when verification stayed ambiguous.
pub const UNVERIFIABLE_PENALTY: f64 = 0.1;

/// Resolved per-domain verification state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainState {
    /// Definitively no mail exchanger: the domain cannot receive mail.
    NoMx,
    /// DNS was ambiguous (timeout, resolver failure); existence assumed.
    MxAssumed,
    /// MX resolved; catch-all status probed.
    Verified { mx_host: String, is_catch_all: bool },
}

/// Result of verifying one address.
#[derive(Debug, Clone)]
pub struct Verification {
    pub accepted: bool,
    pub status: Option<VerificationStatus>,
    pub reason: Option<String>,
    pub record: DomainRecord,
}

/// The network-facing half of verification, kept behind a trait so tests
/// can count probes and script outcomes.
#[async_trait]
pub trait DomainProber: Send + Sync {
    /// Resolves MX facts and performs the one-time catch-all probe.
    async fn probe_domain(&self, domain: &str) -> DomainState;

    /// RCPT-level check for a concrete recipient on a known exchanger.
    /// Returns the probe status and a descriptive message.
    async fn probe_recipient(&self, email: &str, mx_host: &str) -> (Option<bool>, String);
}

/// Production prober: trust-dns MX resolution + lettre RCPT probing.
pub struct DnsSmtpProber {
    resolver: TokioAsyncResolver,
    smtp: SmtpProbe,
}

impl DnsSmtpProber {
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        let resolver = create_resolver(&config).await?;
        Ok(Self {
            resolver,
            smtp: SmtpProbe::new(config),
        })
    }
}

#[async_trait]
impl DomainProber for DnsSmtpProber {
    async fn probe_domain(&self, domain: &str) -> DomainState {
        match resolve_mail_server(&self.resolver, domain).await {
            Ok(mail_server) => {
                tracing::info!(target: "verify_task",
                    "Using mail server {} for domain {}", mail_server.exchange, domain);
                let is_catch_all = self
                    .smtp
                    .probe_catch_all(domain, &mail_server.exchange)
                    .await;
                DomainState::Verified {
                    mx_host: mail_server.exchange,
                    is_catch_all,
                }
            }
            Err(e @ AppError::NxDomain(_)) | Err(e @ AppError::NoDnsRecords(_)) => {
                tracing::info!(target: "verify_task",
                    "Domain {} has no usable mail exchanger: {}", domain, e);
                DomainState::NoMx
            }
            Err(e) => {
                tracing::warn!(target: "verify_task",
                    "DNS lookup for {} failed transiently: {}. Treating MX as assumed.",
                    domain, e);
                DomainState::MxAssumed
            }
        }
    }

    async fn probe_recipient(&self, email: &str, mx_host: &str) -> (Option<bool>, String) {
        self.smtp.check_recipient_with_retries(email, mx_host).await
    }
}

/// Per-run verifier: caches domain facts and applies the acceptance policy.
pub struct DomainVerifier {
    prober: Arc<dyn DomainProber>,
    records: Mutex<HashMap<String, Arc<OnceCell<DomainState>>>>,
    assume_valid_on_dns_failure: bool,
    assume_valid_on_ambiguous: bool,
}

impl DomainVerifier {
    pub fn new(prober: Arc<dyn DomainProber>, config: &Config) -> Self {
        Self {
            prober,
            records: Mutex::new(HashMap::new()),
            assume_valid_on_dns_failure: config.assume_valid_on_dns_failure,
            assume_valid_on_ambiguous: config.assume_valid_on_ambiguous,
        }
    }

    /// Verifies one address, reusing cached domain facts where available.
    pub async fn verify(&self, email: &str) -> Verification {
        let domain = email.split('@').nth(1).unwrap_or("").to_lowercase();

        let cell = {
            let mut records = self.records.lock();
            Arc::clone(records.entry(domain.clone()).or_default())
        };

        let prober = Arc::clone(&self.prober);
        let probe_domain = domain.clone();
        let state = cell
            .get_or_init(|| async move { prober.probe_domain(&probe_domain).await })
            .await
            .clone();

        match state {
            DomainState::NoMx => Verification {
                accepted: false,
                status: None,
                reason: Some("no_mx_record".to_string()),
                record: DomainRecord {
                    domain,
                    has_mx: false,
                    mx_host: None,
                    is_catch_all: false,
                },
            },
            DomainState::MxAssumed => {
                let record = DomainRecord {
                    domain,
                    has_mx: true,
                    mx_host: None,
                    is_catch_all: false,
                };
                if self.assume_valid_on_dns_failure {
                    Verification {
                        accepted: true,
                        status: Some(VerificationStatus::Unverifiable),
                        reason: None,
                        record,
                    }
                } else {
                    Verification {
                        accepted: false,
                        status: None,
                        reason: Some("dns_failure".to_string()),
                        record,
                    }
                }
            }
            DomainState::Verified {
                mx_host,
                is_catch_all: true,
            } => Verification {
                accepted: true,
                status: Some(VerificationStatus::CatchAll),
                reason: None,
                record: DomainRecord {
                    domain,
                    has_mx: true,
                    mx_host: Some(mx_host),
                    is_catch_all: true,
                },
            },
            DomainState::Verified {
                mx_host,
                is_catch_all: false,
            } => {
                let (status, message) = self.prober.probe_recipient(email, &mx_host).await;
                let record = DomainRecord {
                    domain,
                    has_mx: true,
                    mx_host: Some(mx_host),
                    is_catch_all: false,
                };
                match status {
                    Some(true) => Verification {
                        accepted: true,
                        status: Some(VerificationStatus::Confirmed),
                        reason: None,
                        record,
                    },
                    Some(false) => {
                        tracing::debug!(target: "verify_task",
                            "SMTP rejected <{}>: {}", email, message);
                        Verification {
                            accepted: false,
                            status: None,
                            reason: Some("smtp_rejected".to_string()),
                            record,
                        }
                    }
                    None => {
                        if self.assume_valid_on_ambiguous {
                            Verification {
                                accepted: true,
                                status: Some(VerificationStatus::Unverifiable),
                                reason: None,
                                record,
                            }
                        } else {
                            Verification {
                                accepted: false,
                                status: None,
                                reason: Some("smtp_ambiguous".to_string()),
                                record,
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Adjusts a classification's base confidence for the verification outcome.
pub fn final_confidence(base_confidence: f64, status: VerificationStatus) -> f64 {
    let adjusted = match status {
        VerificationStatus::Confirmed => base_confidence,
        VerificationStatus::Unverifiable => base_confidence - UNVERIFIABLE_PENALTY,
        VerificationStatus::CatchAll => base_confidence - CATCH_ALL_PENALTY,
    };
    adjusted.clamp(0.0, 1.0)
}
