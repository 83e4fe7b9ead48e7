//! Professional/generic classification of extracted candidates.
//!
//! Classification is deterministic and network-free: the same candidate
//! always yields the same verdict. Network state only enters later, in
//! verification.

use crate::core::config::Config;
use crate::core::models::EnrichedCandidate;

/// Verdict for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub accept: bool,
    /// Reason code for observability (`generic_info`, `gov_domain`, ...).
    pub reason: String,
    /// Seed for the final confidence computed after verification.
    pub base_confidence: f64,
    /// True for `firstname.lastname`-shaped local parts.
    pub is_personal: bool,
}

impl Classification {
    fn accept(reason: &str, base_confidence: f64, is_personal: bool) -> Self {
        Self {
            accept: true,
            reason: reason.to_string(),
            base_confidence,
            is_personal,
        }
    }

    fn reject(reason: String) -> Self {
        Self {
            accept: false,
            reason,
            base_confidence: 0.0,
            is_personal: false,
        }
    }
}

/// Base confidence for personal-format addresses.
pub const PERSONAL_BASE_CONFIDENCE: f64 = 0.9;
/// Base confidence for every other accepted address.
pub const DEFAULT_BASE_CONFIDENCE: f64 = 0.7;

const SEPARATORS: [char; 3] = ['.', '_', '-'];

/// Classifies a candidate as accepted (with a base confidence tier) or
/// rejected (with a reason code).
pub fn classify(config: &Config, candidate: &EnrichedCandidate) -> Classification {
    let local = candidate.local_part();
    let domain = candidate.domain();

    if let Some(prefix) = matched_generic_prefix(config, local) {
        // A generic mailbox with captured person context (name, title or
        // department nearby) is still a usable contact; a bare one is not.
        if candidate.has_context() {
            return Classification::accept("generic_with_context", DEFAULT_BASE_CONFIDENCE, false);
        }
        return Classification::reject(format!("generic_{}", prefix));
    }

    if domain.ends_with(".gov") || domain.contains(".gov.") {
        return Classification::reject("gov_domain".to_string());
    }

    let is_academic = domain.ends_with(".edu") || domain.contains(".edu.") || domain.contains(".ac.");
    if is_academic && !has_personal_indicator(local) {
        return Classification::reject("edu_department".to_string());
    }

    if is_personal_format(local) {
        return Classification::accept("personal_format", PERSONAL_BASE_CONFIDENCE, true);
    }

    if has_personal_indicator(local) {
        return Classification::accept("separator_format", DEFAULT_BASE_CONFIDENCE, false);
    }

    if local.len() >= 4 && local.chars().all(|c| c.is_ascii_alphabetic()) {
        return Classification::accept("plain_name", DEFAULT_BASE_CONFIDENCE, false);
    }

    Classification::reject("no_personal_indicator".to_string())
}

/// Exact or `prefix<separator>` match against the closed generic list.
fn matched_generic_prefix<'a>(config: &'a Config, local: &str) -> Option<&'a str> {
    config.generic_email_prefixes.iter().find_map(|prefix| {
        if local == prefix {
            return Some(prefix.as_str());
        }
        local
            .strip_prefix(prefix.as_str())
            .filter(|rest| rest.starts_with(SEPARATORS))
            .map(|_| prefix.as_str())
    })
}

/// Separator character or digit anywhere in the local part.
fn has_personal_indicator(local: &str) -> bool {
    local.chars().any(|c| SEPARATORS.contains(&c) || c.is_ascii_digit())
}

/// `firstname.lastname` shape: two or more dot-separated segments, each at
/// least two characters.
fn is_personal_format(local: &str) -> bool {
    let segments: Vec<&str> = local.split('.').collect();
    segments.len() >= 2 && segments.iter().all(|s| s.len() >= 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigBuilder;
    use crate::core::models::CandidateSource;

    fn test_config() -> Config {
        ConfigBuilder::new().build().expect("default config builds")
    }

    fn candidate(email: &str) -> EnrichedCandidate {
        EnrichedCandidate::new(email, CandidateSource::default(), 1)
    }

    #[test]
    fn generic_exact_match_rejected() {
        let config = test_config();
        for email in ["info@acme.com", "sales@acme.com", "support@acme.com", "hr@acme.com"] {
            let verdict = classify(&config, &candidate(email));
            assert!(!verdict.accept, "{} should be rejected", email);
            assert!(verdict.reason.starts_with("generic_"), "reason was {}", verdict.reason);
        }
    }

    #[test]
    fn generic_prefix_with_separator_rejected() {
        let config = test_config();
        let verdict = classify(&config, &candidate("support-team@acme.com"));
        assert!(!verdict.accept);
        assert_eq!(verdict.reason, "generic_support");
    }

    #[test]
    fn generic_prefix_embedded_in_word_is_not_generic() {
        let config = test_config();
        // "information" starts with "info" but with no separator after it.
        let verdict = classify(&config, &candidate("information@acme.com"));
        assert!(verdict.accept);
    }

    #[test]
    fn generic_with_context_is_accepted() {
        let config = test_config();
        let mut c = candidate("info@acme.com");
        c.title = Some("CEO".into());
        let verdict = classify(&config, &c);
        assert!(verdict.accept);
        assert_eq!(verdict.reason, "generic_with_context");
        assert_eq!(verdict.base_confidence, DEFAULT_BASE_CONFIDENCE);
    }

    #[test]
    fn gov_domains_rejected_outright() {
        let config = test_config();
        let verdict = classify(&config, &candidate("jane.doe@agency.gov"));
        assert!(!verdict.accept);
        assert_eq!(verdict.reason, "gov_domain");
        assert!(!classify(&config, &candidate("john@dept.gov.au")).accept);
    }

    #[test]
    fn edu_requires_personal_indicator() {
        let config = test_config();
        let rejected = classify(&config, &candidate("admissions@mit.edu"));
        assert!(!rejected.accept);
        assert_eq!(rejected.reason, "edu_department");

        let accepted = classify(&config, &candidate("jane.doe@mit.edu"));
        assert!(accepted.accept);
        assert_eq!(accepted.base_confidence, PERSONAL_BASE_CONFIDENCE);

        let digits = classify(&config, &candidate("jdoe42@ox.ac.uk"));
        assert!(digits.accept);
        assert_eq!(digits.base_confidence, DEFAULT_BASE_CONFIDENCE);
    }

    #[test]
    fn personal_format_gets_top_tier() {
        let config = test_config();
        let verdict = classify(&config, &candidate("jane.doe@acme.com"));
        assert!(verdict.accept);
        assert!(verdict.is_personal);
        assert_eq!(verdict.reason, "personal_format");
        assert_eq!(verdict.base_confidence, PERSONAL_BASE_CONFIDENCE);
    }

    #[test]
    fn short_dot_segments_are_not_personal_format() {
        let config = test_config();
        // "j.doe" has a one-character segment; it still has a separator.
        let verdict = classify(&config, &candidate("j.doe@acme.com"));
        assert!(verdict.accept);
        assert!(!verdict.is_personal);
        assert_eq!(verdict.base_confidence, DEFAULT_BASE_CONFIDENCE);
    }

    #[test]
    fn plain_alpha_token_accepted_at_lowest_tier() {
        let config = test_config();
        let verdict = classify(&config, &candidate("janedoe@acme.com"));
        assert!(verdict.accept);
        assert_eq!(verdict.reason, "plain_name");
        assert_eq!(verdict.base_confidence, DEFAULT_BASE_CONFIDENCE);
    }

    #[test]
    fn short_opaque_locals_rejected() {
        let config = test_config();
        let verdict = classify(&config, &candidate("jd@acme.com"));
        assert!(!verdict.accept);
        assert_eq!(verdict.reason, "no_personal_indicator");
    }

    #[test]
    fn classification_is_deterministic() {
        let config = test_config();
        let c = candidate("jane.doe@acme.com");
        let first = classify(&config, &c);
        for _ in 0..10 {
            assert_eq!(classify(&config, &c), first);
        }
    }
}
