//! Outcome type for a single SMTP recipient probe.

/// Result of one RCPT-level check against a mail server.
#[derive(Debug, Clone)]
pub struct SmtpVerificationResult {
    /// `Some(true)` — server accepted the recipient.
    /// `Some(false)` — server definitively rejected the recipient.
    /// `None` — inconclusive (transient failure, blocked port, ...).
    pub exists: Option<bool>,
    /// Human-readable description of what the server said.
    pub message: String,
    /// Whether retrying the probe could produce a conclusive answer.
    pub should_retry: bool,
}

impl SmtpVerificationResult {
    pub fn conclusive(exists: bool, message: impl Into<String>) -> Self {
        Self {
            exists: Some(exists),
            message: message.into(),
            should_retry: false,
        }
    }

    pub fn inconclusive_retry(message: impl Into<String>) -> Self {
        Self {
            exists: None,
            message: message.into(),
            should_retry: true,
        }
    }

    pub fn inconclusive_no_retry(message: impl Into<String>) -> Self {
        Self {
            exists: None,
            message: message.into(),
            should_retry: false,
        }
    }
}
