//! Candidate address extraction and surrounding-context enrichment.
//!
//! Extraction is a pure function over its inputs: it scans text for
//! address-shaped tokens, drops obvious noise (placeholder domains, phone
//! digit runs, oversized local parts) and, when raw markup is available,
//! captures nearby name/title/department signals. It never performs I/O.

use crate::core::config::Config;
use crate::core::models::{CandidateSource, EnrichedCandidate};
use crate::utils::domain::domain_shape_ok;

use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Local parts longer than this are treated as scraped noise.
const MAX_LOCAL_PART_LEN: usize = 40;

/// How many characters around a token are searched for context signals.
const CONTEXT_RADIUS: usize = 200;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(CEO|CTO|CFO|COO|Founder|Co-Founder|President|Vice President|VP|Director|Manager|Head of [A-Za-z]+|Lead|Engineer|Developer|Consultant|Specialist|Analyst|Advisor|Owner|Partner|Principal)\b",
    )
    .expect("title regex is valid")
});

static DEPARTMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(Engineering|Marketing|Sales|Support|Finance|Operations|Product|Design|Research|Legal|Human Resources|HR|Communications|Business Development|Customer Success)\b",
    )
    .expect("department regex is valid")
});

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)\b").expect("name regex is valid")
});

static NON_CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>")
        .expect("non-content regex is valid")
});

/// Extracts candidate addresses from `text`, enriching each from
/// `raw_markup` when it is supplied. Absence of markup never fails the
/// call; enrichment fields are simply left unset.
pub fn extract(
    config: &Config,
    text: &str,
    raw_markup: Option<&str>,
    source: &CandidateSource,
    round: u32,
) -> Vec<EnrichedCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    let markup_text = raw_markup.map(flatten_markup);

    for token in config.email_regex.find_iter(text) {
        let email = token.as_str().trim_matches('.').to_lowercase();
        if !seen.insert(email.clone()) {
            continue;
        }

        let (local, domain) = match email.split_once('@') {
            Some(parts) => parts,
            None => continue,
        };

        if is_excluded(config, local, domain) {
            tracing::trace!(target: "extract_task", "Excluded placeholder token: {}", email);
            continue;
        }
        if !local_shape_ok(config, local) || !domain_shape_ok(domain) {
            tracing::trace!(target: "extract_task", "Malformed token dropped: {}", email);
            continue;
        }

        let mut candidate = EnrichedCandidate::new(email, source.clone(), round);
        if let Some(ref markup) = markup_text {
            if let Some(window) = context_window(markup, &candidate.email, CONTEXT_RADIUS) {
                enrich_from_context(&window, &mut candidate);
            }
        }
        candidates.push(candidate);
    }

    candidates
}

/// Collapses an HTML document (or plain text) into searchable text.
/// Script/style content does not survive; tag boundaries become spaces.
pub fn flatten_markup(markup: &str) -> String {
    if !markup.contains('<') {
        return markup.to_string();
    }
    let cleaned = NON_CONTENT_RE.replace_all(markup, " ");
    let document = Html::parse_document(&cleaned);
    let mut out = String::with_capacity(markup.len() / 2);
    for node in document.root_element().text() {
        let trimmed = node.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(trimmed);
    }
    out
}

fn is_excluded(config: &Config, local: &str, domain: &str) -> bool {
    if config
        .excluded_domains
        .iter()
        .any(|d| domain == d || domain.ends_with(&format!(".{}", d)))
    {
        return true;
    }
    config
        .excluded_prefixes
        .iter()
        .any(|p| local == p || local.starts_with(p.as_str()))
}

fn local_shape_ok(config: &Config, local: &str) -> bool {
    if local.is_empty() || local.len() > 64 || local.len() > MAX_LOCAL_PART_LEN {
        return false;
    }
    // Digit runs shaped like phone numbers are scraped noise.
    !config.phone_regex.is_match(local)
}

/// Finds `token` in `text` case-insensitively and returns the surrounding
/// window, clamped to character boundaries.
fn context_window(text: &str, token: &str, radius: usize) -> Option<String> {
    let token_re = Regex::new(&format!("(?i){}", regex::escape(token))).ok()?;
    let found = token_re.find(text)?;

    let mut start = found.start().saturating_sub(radius);
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (found.end() + radius).min(text.len());
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    Some(text[start..end].to_string())
}

fn enrich_from_context(window: &str, candidate: &mut EnrichedCandidate) {
    if let Some(m) = TITLE_RE.find(window) {
        candidate.title = Some(m.as_str().to_string());
    }
    if let Some(m) = DEPARTMENT_RE.find(window) {
        candidate.department = Some(m.as_str().to_string());
    }

    // A run of two or more capitalized words that is not itself a
    // title/department phrase is treated as a personal name.
    for name_match in NAME_RE.find_iter(window) {
        let run = name_match.as_str();
        if TITLE_RE.is_match(run) || DEPARTMENT_RE.is_match(run) {
            continue;
        }
        candidate.name = Some(run.to_string());
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigBuilder;

    fn test_config() -> Config {
        ConfigBuilder::new().build().expect("default config builds")
    }

    fn source() -> CandidateSource {
        CandidateSource {
            phrase: "fintech email contact".into(),
            url: Some("https://acme.com/team".into()),
            page_title: Some("Acme Team".into()),
        }
    }

    #[test]
    fn extracts_and_lowercases_plain_tokens() {
        let config = test_config();
        let found = extract(
            &config,
            "Reach Jane.Doe@Acme.com or john.smith@acme.com for details",
            None,
            &source(),
            1,
        );
        let emails: Vec<&str> = found.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, vec!["jane.doe@acme.com", "john.smith@acme.com"]);
    }

    #[test]
    fn dedupes_within_one_call() {
        let config = test_config();
        let found = extract(
            &config,
            "a@acme.com ... a@acme.com ... A@ACME.COM",
            None,
            &source(),
            1,
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn single_letter_local_is_kept_for_classifier() {
        // Shape checks only reject empty/oversized locals; tier decisions
        // belong to the classifier.
        let config = test_config();
        let found = extract(&config, "j@acme.com", None, &source(), 1);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn excludes_placeholder_domains_and_prefixes() {
        let config = test_config();
        let text = "info@example.com noreply@acme.com postmaster@acme.com jane@acme.com";
        let found = extract(&config, text, None, &source(), 1);
        let emails: Vec<&str> = found.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, vec!["jane@acme.com"]);
    }

    #[test]
    fn rejects_phone_shaped_and_oversized_locals() {
        let config = test_config();
        let text = "call 555-123-4567x@acme.com or 5551234567@acme.com";
        assert!(extract(&config, text, None, &source(), 1).is_empty());

        let long_local = format!("{}@acme.com", "a".repeat(41));
        assert!(extract(&config, &long_local, None, &source(), 1).is_empty());
    }

    #[test]
    fn rejects_bad_domains() {
        let config = test_config();
        // Top label must be alphabetic and at least two chars; the regex
        // already requires an alphabetic TLD, the shape check backs it up.
        assert!(extract(&config, "x@a.b", None, &source(), 1).is_empty());
    }

    #[test]
    fn enriches_from_markup_context() {
        let config = test_config();
        let markup = r#"
            <html><body>
            <div class="team-member">
                <h3>Jane Doe</h3>
                <p>CEO, Engineering</p>
                <a href="mailto:jane.doe@acme.com">jane.doe@acme.com</a>
            </div>
            </body></html>
        "#;
        let found = extract(
            &config,
            "jane.doe@acme.com",
            Some(markup),
            &source(),
            2,
        );
        assert_eq!(found.len(), 1);
        let candidate = &found[0];
        assert_eq!(candidate.name.as_deref(), Some("Jane Doe"));
        assert_eq!(candidate.title.as_deref(), Some("CEO"));
        assert_eq!(candidate.department.as_deref(), Some("Engineering"));
        assert_eq!(candidate.round, 2);
    }

    #[test]
    fn no_markup_means_no_enrichment_and_no_failure() {
        let config = test_config();
        let found = extract(&config, "jane.doe@acme.com", None, &source(), 1);
        assert_eq!(found.len(), 1);
        assert!(found[0].name.is_none());
        assert!(found[0].title.is_none());
        assert!(found[0].department.is_none());
    }

    #[test]
    fn title_phrases_are_not_mistaken_for_names() {
        let config = test_config();
        let markup = "Contact Marketing Director at sales-team@acme.com";
        let found = extract(&config, "sales-team@acme.com", Some(markup), &source(), 1);
        assert_eq!(found.len(), 1);
        // "Marketing Director" is a title/department phrase, not a name.
        assert!(found[0].name.is_none());
        assert_eq!(found[0].title.as_deref(), Some("Director"));
    }

    #[test]
    fn flatten_markup_strips_tags() {
        let text = flatten_markup("<p>Hello <b>world</b></p>");
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn flatten_markup_drops_script_and_style_content() {
        let text = flatten_markup(
            "<style>.x{color:red}</style><p>Team</p><script>var a = 'spam@junk.com';</script>",
        );
        assert_eq!(text, "Team");
    }
}
