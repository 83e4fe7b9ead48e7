//! End-to-end pipeline tests driven through mock collaborators.

use async_trait::async_trait;
use email_prospector_core::{
    ConfigBuilder, ContentFetcher, DedupCache, DiscoveryRequest, DomainProber, DomainState,
    EmailProspector, QueryStrategy, Result as CoreResult, SearchBackend, SearchHit,
    VerificationStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------------

/// Returns the same hits for every phrase.
struct ScriptedBackend {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn search(&self, _phrase: &str) -> CoreResult<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.clone())
    }
}

/// Produces a fresh unique address on every call, so no round is empty.
struct GeneratorBackend {
    counter: AtomicUsize,
}

#[async_trait]
impl SearchBackend for GeneratorBackend {
    async fn search(&self, _phrase: &str) -> CoreResult<Vec<SearchHit>> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(vec![SearchHit {
            title: String::new(),
            url: String::new(),
            snippet: format!("reach person{n}.surname{n}@generated{n}.com today"),
        }])
    }
}

/// Serves canned bodies by URL; everything else 404s.
struct ScriptedFetcher {
    bodies: HashMap<String, String>,
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> CoreResult<String> {
        match self.bodies.get(url) {
            Some(body) => Ok(body.clone()),
            None => Err(email_prospector_core::AppError::Transport(format!(
                "no canned body for {}",
                url
            ))),
        }
    }
}

impl ScriptedFetcher {
    fn empty() -> Self {
        Self {
            bodies: HashMap::new(),
        }
    }
}

/// Accepts every recipient; per-domain states can be scripted. Counts both
/// probe kinds per domain.
struct CountingProber {
    states: HashMap<String, DomainState>,
    recipient_answers: HashMap<String, Option<bool>>,
    domain_probes: parking_lot::Mutex<HashMap<String, usize>>,
}

impl CountingProber {
    fn accepting() -> Self {
        Self {
            states: HashMap::new(),
            recipient_answers: HashMap::new(),
            domain_probes: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn with_state(mut self, domain: &str, state: DomainState) -> Self {
        self.states.insert(domain.to_string(), state);
        self
    }

    fn with_recipient_answer(mut self, email: &str, answer: Option<bool>) -> Self {
        self.recipient_answers.insert(email.to_string(), answer);
        self
    }

    fn probes_for(&self, domain: &str) -> usize {
        *self.domain_probes.lock().get(domain).unwrap_or(&0)
    }
}

#[async_trait]
impl DomainProber for CountingProber {
    async fn probe_domain(&self, domain: &str) -> DomainState {
        *self
            .domain_probes
            .lock()
            .entry(domain.to_string())
            .or_insert(0) += 1;
        self.states.get(domain).cloned().unwrap_or(DomainState::Verified {
            mx_host: format!("mx.{}", domain),
            is_catch_all: false,
        })
    }

    async fn probe_recipient(&self, email: &str, _mx_host: &str) -> (Option<bool>, String) {
        let answer = self
            .recipient_answers
            .get(email)
            .copied()
            .unwrap_or(Some(true));
        (answer, "scripted answer".to_string())
    }
}

struct FailingStrategy;

#[async_trait]
impl QueryStrategy for FailingStrategy {
    async fn generate(&self, _topic: &str, _round: u32) -> CoreResult<Vec<String>> {
        Err(email_prospector_core::AppError::Strategy(
            "oracle offline".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    _cache_dir: TempDir,
    config: Arc<email_prospector_core::Config>,
}

impl Harness {
    fn new(max_rounds: u32, min_rounds: u32) -> Self {
        let cache_dir = TempDir::new().expect("temp cache dir");
        let config = ConfigBuilder::new()
            .cache_dir(cache_dir.path().to_string_lossy().to_string())
            .max_rounds(max_rounds)
            .min_rounds(min_rounds)
            .give_up_after_empty_rounds(2)
            .max_concurrency(4)
            .build()
            .expect("test config builds");
        Self {
            _cache_dir: cache_dir,
            config: Arc::new(config),
        }
    }

    fn cache(&self, topic: &str) -> DedupCache {
        DedupCache::for_campaign(&self.config.cache_dir, topic, None)
    }

    fn prospector(
        &self,
        backend: Arc<dyn SearchBackend>,
        fetcher: Arc<dyn ContentFetcher>,
        prober: Arc<dyn DomainProber>,
    ) -> EmailProspector {
        EmailProspector::with_components(
            Arc::clone(&self.config),
            Arc::new(email_prospector_core::StaticStrategy),
            backend,
            fetcher,
            prober,
        )
    }
}

fn snippet_hit(snippet: &str) -> SearchHit {
    // Lowercase title: capitalized word runs would read as name context.
    SearchHit {
        title: "search result".to_string(),
        url: String::new(),
        snippet: snippet.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// The worked example from the design discussion: one cached address is
/// skipped, one generic address is rejected, one personal address survives.
#[tokio::test]
async fn fintech_example_scenario() {
    let harness = Harness::new(6, 2);

    // Pre-seed the campaign store with run 1's output.
    harness
        .cache("fintech")
        .append(&["jane.doe@acme.com".to_string()])
        .unwrap();

    let backend = Arc::new(ScriptedBackend::new(vec![snippet_hit(
        "jane.doe@acme.com info@acme.com john.smith@acme.com",
    )]));
    let prober = Arc::new(CountingProber::accepting());
    let prospector = harness.prospector(
        backend,
        Arc::new(ScriptedFetcher::empty()),
        Arc::clone(&prober) as Arc<dyn DomainProber>,
    );

    let request = DiscoveryRequest::new("fintech").with_target(3);
    let result = prospector.discover(&request).await.unwrap();

    assert_eq!(result.emails, vec!["john.smith@acme.com".to_string()]);
    assert!(result.success);
    assert!(!result.target_achieved);
    assert_eq!(
        result.email_details[0].verification_status,
        VerificationStatus::Confirmed
    );
    assert!(result.stats.skipped_cached > 0);

    // The new address was appended to the campaign store.
    let stored = harness.cache("fintech").load().unwrap();
    assert!(stored.contains("john.smith@acme.com"));
    assert!(stored.contains("jane.doe@acme.com"));
}

/// Running the same campaign twice never returns a run-1 address in run 2.
#[tokio::test]
async fn dedup_is_idempotent_across_runs() {
    let harness = Harness::new(6, 2);
    let hits = vec![snippet_hit(
        "jane.doe@acme.com john.smith@beta.io sam.jones@gamma.net",
    )];

    let run = |hits: Vec<SearchHit>| {
        let prospector = harness.prospector(
            Arc::new(ScriptedBackend::new(hits)),
            Arc::new(ScriptedFetcher::empty()),
            Arc::new(CountingProber::accepting()),
        );
        async move {
            prospector
                .discover(&DiscoveryRequest::new("fintech").with_target(5))
                .await
                .unwrap()
        }
    };

    let first = run(hits.clone()).await;
    assert_eq!(first.total_emails, 3);

    let second = run(hits).await;
    for email in &second.emails {
        assert!(
            !first.emails.contains(email),
            "run 2 returned run 1 address {}",
            email
        );
    }
    assert!(second.emails.is_empty());
    assert!(!second.success);
}

/// Two candidates on one never-seen domain trigger exactly one MX/catch-all
/// probe for that domain.
#[tokio::test]
async fn domain_probe_runs_once_per_run() {
    let harness = Harness::new(4, 2);
    let backend = Arc::new(ScriptedBackend::new(vec![snippet_hit(
        "jane.doe@acme.com john.smith@acme.com sam.jones@acme.com",
    )]));
    let prober = Arc::new(CountingProber::accepting());

    let prospector = harness.prospector(
        backend,
        Arc::new(ScriptedFetcher::empty()),
        Arc::clone(&prober) as Arc<dyn DomainProber>,
    );
    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(3))
        .await
        .unwrap();

    assert_eq!(result.total_emails, 3);
    assert_eq!(prober.probes_for("acme.com"), 1);
}

/// Catch-all domains mark every accepted address and depress confidence
/// strictly below an identically shaped address on a normal domain.
#[tokio::test]
async fn catch_all_penalty_applies() {
    let harness = Harness::new(4, 2);
    let backend = Arc::new(ScriptedBackend::new(vec![snippet_hit(
        "jane.doe@catchy.com john.smith@solid.com",
    )]));
    let prober = Arc::new(CountingProber::accepting().with_state(
        "catchy.com",
        DomainState::Verified {
            mx_host: "mx.catchy.com".to_string(),
            is_catch_all: true,
        },
    ));

    let prospector = harness.prospector(
        backend,
        Arc::new(ScriptedFetcher::empty()),
        prober,
    );
    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(2))
        .await
        .unwrap();

    let by_email: HashMap<&str, _> = result
        .email_details
        .iter()
        .map(|d| (d.email.as_str(), d))
        .collect();

    let flagged = by_email["jane.doe@catchy.com"];
    let baseline = by_email["john.smith@solid.com"];
    assert_eq!(flagged.verification_status, VerificationStatus::CatchAll);
    assert_eq!(baseline.verification_status, VerificationStatus::Confirmed);
    assert!(flagged.confidence < baseline.confidence);
}

/// The loop terminates at max_rounds even when every round keeps yielding.
#[tokio::test]
async fn terminates_at_max_rounds() {
    let harness = Harness::new(5, 2);
    let prospector = harness.prospector(
        Arc::new(GeneratorBackend {
            counter: AtomicUsize::new(0),
        }),
        Arc::new(ScriptedFetcher::empty()),
        Arc::new(CountingProber::accepting()),
    );

    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(10_000))
        .await
        .unwrap();

    assert_eq!(result.search_rounds, 5);
    assert!(!result.target_achieved);
    assert!(result.total_emails > 0);
}

/// Reaching the target in round 1 does not stop the loop before the
/// minimum round floor.
#[tokio::test]
async fn does_not_stop_on_round_one() {
    let harness = Harness::new(6, 2);
    let backend = Arc::new(ScriptedBackend::new(vec![snippet_hit(
        "jane.doe@acme.com john.smith@beta.io",
    )]));
    let prospector = harness.prospector(
        backend,
        Arc::new(ScriptedFetcher::empty()),
        Arc::new(CountingProber::accepting()),
    );

    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(1))
        .await
        .unwrap();

    assert!(result.search_rounds >= 2);
    assert!(result.target_achieved);
    // Exactly the target count is returned even when more was accepted.
    assert_eq!(result.total_emails, 1);
}

/// A generic local part is rejected bare but accepted when the page gave
/// it person context.
#[tokio::test]
async fn generic_prefix_requires_context() {
    let harness = Harness::new(4, 2);
    let backend = Arc::new(ScriptedBackend::new(vec![
        snippet_hit("for partnership write info@bare-generic.com thanks"),
        snippet_hit("Maria Lopez, CEO - info@context-rich.com"),
    ]));
    let prospector = harness.prospector(
        backend,
        Arc::new(ScriptedFetcher::empty()),
        Arc::new(CountingProber::accepting()),
    );

    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(5))
        .await
        .unwrap();

    assert!(result.emails.contains(&"info@context-rich.com".to_string()));
    assert!(!result.emails.contains(&"info@bare-generic.com".to_string()));
    let rejected_generic = result
        .stats
        .rejection_reasons
        .keys()
        .any(|reason| reason.starts_with("generic_"));
    assert!(rejected_generic);
}

/// Definitive SMTP rejections drop the candidate; ambiguous answers keep
/// it with a penalty status.
#[tokio::test]
async fn smtp_rejection_and_ambiguity() {
    let harness = Harness::new(4, 2);
    let backend = Arc::new(ScriptedBackend::new(vec![snippet_hit(
        "gone.person@acme.com maybe.person@acme.com sure.person@acme.com",
    )]));
    let prober = Arc::new(
        CountingProber::accepting()
            .with_recipient_answer("gone.person@acme.com", Some(false))
            .with_recipient_answer("maybe.person@acme.com", None),
    );
    let prospector = harness.prospector(
        backend,
        Arc::new(ScriptedFetcher::empty()),
        prober,
    );

    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(5))
        .await
        .unwrap();

    assert!(!result.emails.contains(&"gone.person@acme.com".to_string()));

    let by_email: HashMap<&str, _> = result
        .email_details
        .iter()
        .map(|d| (d.email.as_str(), d))
        .collect();
    assert_eq!(
        by_email["maybe.person@acme.com"].verification_status,
        VerificationStatus::Unverifiable
    );
    assert_eq!(
        by_email["sure.person@acme.com"].verification_status,
        VerificationStatus::Confirmed
    );
    assert!(
        by_email["maybe.person@acme.com"].confidence
            < by_email["sure.person@acme.com"].confidence
    );
}

/// Candidates found on fetched contact pages carry markup enrichment.
#[tokio::test]
async fn fetches_promising_pages_and_enriches() {
    let harness = Harness::new(4, 2);
    let contact_url = "https://acme.com/contact";
    let backend = Arc::new(ScriptedBackend::new(vec![SearchHit {
        title: "Acme — Contact".to_string(),
        url: contact_url.to_string(),
        snippet: String::new(),
    }]));
    let mut bodies = HashMap::new();
    bodies.insert(
        contact_url.to_string(),
        r##"<html><body><div><h3>Jane Doe</h3><p>Director, Engineering</p>
           <a href="#">jane.doe@acme.com</a></div></body></html>"##
            .to_string(),
    );
    let prospector = harness.prospector(
        backend,
        Arc::new(ScriptedFetcher { bodies }),
        Arc::new(CountingProber::accepting()),
    );

    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(1))
        .await
        .unwrap();

    assert_eq!(result.emails, vec!["jane.doe@acme.com".to_string()]);
    let detail = &result.email_details[0];
    assert_eq!(detail.name.as_deref(), Some("Jane Doe"));
    assert_eq!(detail.title.as_deref(), Some("Director"));
    assert_eq!(detail.department.as_deref(), Some("Engineering"));
    assert!(result.stats.pages_fetched > 0);
}

/// A failing strategy degrades to the static phrase templates.
#[tokio::test]
async fn strategy_failure_falls_back_to_static_phrases() {
    let harness = Harness::new(3, 2);
    let backend = Arc::new(ScriptedBackend::new(vec![snippet_hit(
        "jane.doe@acme.com",
    )]));
    let prospector = EmailProspector::with_components(
        Arc::clone(&harness.config),
        Arc::new(FailingStrategy),
        Arc::clone(&backend) as Arc<dyn SearchBackend>,
        Arc::new(ScriptedFetcher::empty()),
        Arc::new(CountingProber::accepting()),
    );

    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(1))
        .await
        .unwrap();

    assert!(result.success);
    assert!(backend.calls.load(Ordering::SeqCst) > 0);
}

/// Cancellation before the run starts spawns no rounds and still returns a
/// well-formed (empty) result.
#[tokio::test]
async fn cancellation_stops_new_rounds() {
    let harness = Harness::new(10, 2);
    let prospector = harness.prospector(
        Arc::new(GeneratorBackend {
            counter: AtomicUsize::new(0),
        }),
        Arc::new(ScriptedFetcher::empty()),
        Arc::new(CountingProber::accepting()),
    );

    prospector.cancellation_token().cancel();
    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(5))
        .await
        .unwrap();

    assert_eq!(result.search_rounds, 0);
    assert!(result.emails.is_empty());
    assert!(!result.success);
}

/// Losing the dedup store degrades to in-memory-only dedup, never a crash.
#[tokio::test]
async fn cache_io_failure_is_not_fatal() {
    // Point the cache "directory" at a regular file so appends must fail.
    let blocker = TempDir::new().unwrap();
    let file_path = blocker.path().join("not-a-directory");
    std::fs::write(&file_path, b"occupied").unwrap();

    let config = ConfigBuilder::new()
        .cache_dir(file_path.to_string_lossy().to_string())
        .max_rounds(3)
        .min_rounds(2)
        .give_up_after_empty_rounds(2)
        .build()
        .unwrap();

    let prospector = EmailProspector::with_components(
        Arc::new(config),
        Arc::new(email_prospector_core::StaticStrategy),
        Arc::new(ScriptedBackend::new(vec![snippet_hit("jane.doe@acme.com")])),
        Arc::new(ScriptedFetcher::empty()),
        Arc::new(CountingProber::accepting()),
    );

    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(1))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.emails, vec!["jane.doe@acme.com".to_string()]);
}

/// Every returned address matches the grammar and the exclusion list.
#[tokio::test]
async fn emitted_addresses_respect_format_invariant() {
    let harness = Harness::new(4, 2);
    let backend = Arc::new(ScriptedBackend::new(vec![snippet_hit(
        "jane.doe@acme.com noreply@acme.com someone@example.com bad@@token 555-123-4567@acme.com",
    )]));
    let prospector = harness.prospector(
        backend,
        Arc::new(ScriptedFetcher::empty()),
        Arc::new(CountingProber::accepting()),
    );

    let result = prospector
        .discover(&DiscoveryRequest::new("fintech").with_target(10))
        .await
        .unwrap();

    assert_eq!(result.emails, vec!["jane.doe@acme.com".to_string()]);
    let grammar = regex::Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").unwrap();
    for email in &result.emails {
        assert!(grammar.is_match(email), "{} violates grammar", email);
    }
}
