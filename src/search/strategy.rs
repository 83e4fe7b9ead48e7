//! Deterministic phrase templates, keyed by round number.
//!
//! This doubles as the default `QueryStrategy` implementation and as the
//! orchestrator's fallback when an injected strategy fails or returns
//! nothing usable.

use super::QueryStrategy;
use crate::core::error::Result;
use async_trait::async_trait;

/// Static phrase templates for a round. Round 1 favors short, high-yield
/// phrasings; rounds 2 and 3 rotate through role axes; later rounds broaden
/// to company-shaped queries.
pub fn static_phrases_for_round(topic: &str, round: u32) -> Vec<String> {
    let templates: &[&str] = match round {
        1 => &[
            "{topic} email contact",
            "{topic} CEO email",
            "{topic} founder contact",
            "{topic} business email",
            "{topic} company contact",
        ],
        2 => &[
            "{topic} team email",
            "{topic} sales contact",
            "{topic} support email",
            "{topic} info contact",
            "{topic} director email",
        ],
        3 => &[
            "{topic} manager email",
            "{topic} consultant contact",
            "{topic} specialist email",
            "{topic} expert contact",
            "{topic} advisor email",
        ],
        _ => &[
            "{topic} startup email",
            "{topic} company email",
            "{topic} business contact",
            "{topic} executive email",
            "{topic} owner contact",
        ],
    };

    templates
        .iter()
        .map(|t| t.replace("{topic}", topic.trim()))
        .collect()
}

/// The built-in strategy: nothing but the static templates.
#[derive(Debug, Clone, Default)]
pub struct StaticStrategy;

#[async_trait]
impl QueryStrategy for StaticStrategy {
    async fn generate(&self, topic: &str, round: u32) -> Result<Vec<String>> {
        Ok(static_phrases_for_round(topic, round))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_round_yields_phrases() {
        for round in 1..=25 {
            let phrases = static_phrases_for_round("fintech", round);
            assert!(!phrases.is_empty(), "round {} produced no phrases", round);
            assert!(phrases.iter().all(|p| p.contains("fintech")));
        }
    }

    #[test]
    fn rounds_differ_early_on() {
        let r1 = static_phrases_for_round("fintech", 1);
        let r2 = static_phrases_for_round("fintech", 2);
        let r3 = static_phrases_for_round("fintech", 3);
        assert_ne!(r1, r2);
        assert_ne!(r2, r3);
    }

    #[test]
    fn topic_is_trimmed() {
        let phrases = static_phrases_for_round("  fintech  ", 1);
        assert!(phrases.iter().all(|p| !p.contains("  fintech")));
    }
}
