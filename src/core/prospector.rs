//! The round-loop orchestrator driving discovery end to end.
//!
//! Each round asks the strategy for phrases, dispatches them concurrently
//! to the search backend, extracts candidates from snippets and from a
//! bounded set of fetched pages, then pushes survivors through
//! classification, verification and the dedup check into the accumulator.
//! The loop itself is sequential; only the work inside a round fans out.

use crate::cache::DedupCache;
use crate::classify::classify;
use crate::core::config::{get_random_sleep_duration, Config};
use crate::core::error::Result;
use crate::core::models::{
    AcceptedEmail, CandidateSource, DiscoveryRequest, DiscoveryResult, EnrichedCandidate, RunStats,
};
use crate::extraction::{extract, flatten_markup};
use crate::search::{
    static_phrases_for_round, ContentFetcher, HttpFetcher, QueryStrategy, SearchBackend,
    SearchHit, SearxngBackend, StaticStrategy,
};
use crate::verify::{final_confidence, DnsSmtpProber, DomainProber, DomainVerifier};

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A search hit remembered together with the phrase that produced it.
#[derive(Debug, Clone)]
struct RoundHit {
    phrase: String,
    hit: SearchHit,
}

/// The main struct orchestrating discovery and verification.
#[derive(Clone)]
pub struct EmailProspector {
    config: Arc<Config>,
    strategy: Arc<dyn QueryStrategy>,
    backend: Arc<dyn SearchBackend>,
    fetcher: Arc<dyn ContentFetcher>,
    prober: Arc<dyn DomainProber>,
    cancel: CancellationToken,
}

impl EmailProspector {
    /// Creates a prospector with the production collaborators: SearxNG
    /// search, HTTP fetching, DNS+SMTP probing, static phrase strategy.
    pub async fn new(config: &Config) -> Result<Self> {
        tracing::debug!("Initializing EmailProspector components...");
        let config = Arc::new(config.clone());

        let backend = SearxngBackend::new(&config)?;
        let fetcher = HttpFetcher::new(&config)?;
        let prober = DnsSmtpProber::new(Arc::clone(&config)).await?;
        tracing::info!("EmailProspector initialized successfully.");

        Ok(Self {
            config,
            strategy: Arc::new(StaticStrategy),
            backend: Arc::new(backend),
            fetcher: Arc::new(fetcher),
            prober: Arc::new(prober),
            cancel: CancellationToken::new(),
        })
    }

    /// Creates a prospector from externally supplied collaborators.
    /// This is the seam used by tests and by embedders that bring their own
    /// strategy, search service or fetch transport.
    pub fn with_components(
        config: Arc<Config>,
        strategy: Arc<dyn QueryStrategy>,
        backend: Arc<dyn SearchBackend>,
        fetcher: Arc<dyn ContentFetcher>,
        prober: Arc<dyn DomainProber>,
    ) -> Self {
        Self {
            config,
            strategy,
            backend,
            fetcher,
            prober,
            cancel: CancellationToken::new(),
        }
    }

    /// Token external callers can use to stop the run: no new phrase or
    /// fetch work is spawned after cancellation; in-flight calls finish or
    /// time out naturally and still count toward the current round.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the full discovery loop for one request.
    pub async fn discover(&self, request: &DiscoveryRequest) -> Result<DiscoveryResult> {
        let task_label = format!("{}#{}", request.topic, request.target_count);
        tracing::info!(target: "discovery_task", "[{}] Starting discovery run.", task_label);
        let start_time = Instant::now();

        let cache = DedupCache::for_campaign(
            &self.config.cache_dir,
            &request.topic,
            request.session_id.as_deref(),
        );
        let previously_returned = match cache.load() {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(target: "discovery_task",
                    "[{}] Dedup store unavailable ({}); continuing in-memory only.",
                    task_label, e);
                HashSet::new()
            }
        };

        // Domain facts are scoped to this run.
        let verifier = Arc::new(DomainVerifier::new(Arc::clone(&self.prober), &self.config));

        let mut accumulator: HashMap<String, AcceptedEmail> = HashMap::new();
        let mut stats = RunStats::default();
        let mut consecutive_empty_rounds = 0u32;
        let mut rounds_run = 0u32;

        let mut round = 1u32;
        while round <= self.config.max_rounds {
            if self.cancel.is_cancelled() {
                tracing::info!(target: "discovery_task",
                    "[{}] Cancellation requested; stopping before round {}.", task_label, round);
                break;
            }

            tracing::info!(target: "discovery_task",
                "[{}] Round {} starting ({}/{} accumulated).",
                task_label, round, accumulator.len(), request.target_count);

            let phrases = self.phrases_for_round(&request.topic, round).await;
            let before = accumulator.len();

            self.run_round(
                round,
                &phrases,
                &previously_returned,
                &verifier,
                &mut accumulator,
                &mut stats,
            )
            .await;
            rounds_run = round;

            let gained = accumulator.len() - before;
            tracing::info!(target: "discovery_task",
                "[{}] Round {} finished: {} new, {} total unique.",
                task_label, round, gained, accumulator.len());

            if gained == 0 {
                consecutive_empty_rounds += 1;
                tracing::warn!(target: "discovery_task",
                    "[{}] {} consecutive empty round(s).", task_label, consecutive_empty_rounds);
            } else {
                consecutive_empty_rounds = 0;
            }

            // Stopping on the first round would over-index on one query's
            // bias, so the target only terminates after the round floor.
            if accumulator.len() >= request.target_count && round >= self.config.min_rounds {
                tracing::info!(target: "discovery_task",
                    "[{}] Target reached after {} rounds.", task_label, round);
                break;
            }
            if consecutive_empty_rounds >= self.config.give_up_after_empty_rounds {
                tracing::warn!(target: "discovery_task",
                    "[{}] Topic appears exhausted after {} empty rounds; returning partial result.",
                    task_label, consecutive_empty_rounds);
                break;
            }

            round += 1;
        }

        let mut email_details: Vec<AcceptedEmail> = accumulator.into_values().collect();
        email_details.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.email.cmp(&b.email))
        });
        email_details.truncate(request.target_count);

        let emails: Vec<String> = email_details.iter().map(|d| d.email.clone()).collect();

        if let Err(e) = cache.append(&emails) {
            tracing::warn!(target: "discovery_task",
                "[{}] Failed to persist dedup entries ({}); results still returned.",
                task_label, e);
        }

        let execution_time = start_time.elapsed().as_secs_f64();
        let target_achieved = emails.len() >= request.target_count;
        tracing::info!(target: "discovery_task",
            "[{}] Discovery finished in {:.2}s: {} address(es) over {} round(s).",
            task_label, execution_time, emails.len(), rounds_run);

        Ok(DiscoveryResult {
            success: !emails.is_empty(),
            total_emails: emails.len(),
            emails,
            email_details,
            search_rounds: rounds_run,
            execution_time,
            topic: request.topic.clone(),
            target_achieved,
            stats,
        })
    }

    /// Asks the strategy for this round's phrases, falling back to the
    /// deterministic templates when it fails or returns nothing usable.
    async fn phrases_for_round(&self, topic: &str, round: u32) -> Vec<String> {
        match self.strategy.generate(topic, round).await {
            Ok(phrases) => {
                let usable: Vec<String> = phrases
                    .into_iter()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                if usable.is_empty() {
                    tracing::warn!(target: "discovery_task",
                        "Strategy returned no usable phrases for round {}; using static templates.",
                        round);
                    static_phrases_for_round(topic, round)
                } else {
                    usable
                }
            }
            Err(e) => {
                tracing::warn!(target: "discovery_task",
                    "Strategy failed for round {} ({}); using static templates.", round, e);
                static_phrases_for_round(topic, round)
            }
        }
    }

    /// Executes one round: search, extract, fetch-and-extract, accumulate.
    async fn run_round(
        &self,
        round: u32,
        phrases: &[String],
        previously_returned: &HashSet<String>,
        verifier: &Arc<DomainVerifier>,
        accumulator: &mut HashMap<String, AcceptedEmail>,
        stats: &mut RunStats,
    ) {
        let round_hits = self.dispatch_phrases(phrases, stats).await;

        // Snippet-level extraction is free; it runs for every hit.
        let mut candidates: Vec<EnrichedCandidate> = Vec::new();
        for round_hit in &round_hits {
            let source = CandidateSource {
                phrase: round_hit.phrase.clone(),
                url: Some(round_hit.hit.url.clone()),
                page_title: Some(round_hit.hit.title.clone()),
            };
            let text = format!("{} {}", round_hit.hit.title, round_hit.hit.snippet);
            candidates.extend(extract(&self.config, &text, Some(text.as_str()), &source, round));
        }

        candidates.extend(self.fetch_and_extract(round, &round_hits, stats).await);
        stats.candidates_extracted += candidates.len();

        self.accumulate(candidates, previously_returned, verifier, accumulator, stats)
            .await;
    }

    /// Dispatches every phrase concurrently under the concurrency ceiling.
    /// Individual phrase failures are logged and skipped.
    async fn dispatch_phrases(&self, phrases: &[String], stats: &mut RunStats) -> Vec<RoundHit> {
        let mut tasks = FuturesUnordered::new();
        let mut round_hits: Vec<RoundHit> = Vec::new();
        let mut failures = 0usize;

        for phrase in phrases {
            if self.cancel.is_cancelled() {
                break;
            }
            while tasks.len() >= self.config.max_concurrency {
                if let Some(result) = tasks.next().await {
                    collect_phrase_result(result, &mut round_hits, &mut failures);
                } else {
                    break;
                }
            }

            let backend = Arc::clone(&self.backend);
            let config = Arc::clone(&self.config);
            let phrase = phrase.clone();
            stats.phrases_dispatched += 1;

            tasks.push(tokio::spawn(async move {
                let hits = search_with_retries(&*backend, &config, &phrase).await;
                (phrase, hits)
            }));
        }

        while let Some(result) = tasks.next().await {
            collect_phrase_result(result, &mut round_hits, &mut failures);
        }

        stats.search_failures += failures;
        round_hits
    }

    /// Fetches the most promising result URLs and extracts from their
    /// content. Pages whose URL or title carries a contact-page indicator
    /// are preferred; without any, the top results are used as fallback.
    async fn fetch_and_extract(
        &self,
        round: u32,
        round_hits: &[RoundHit],
        stats: &mut RunStats,
    ) -> Vec<EnrichedCandidate> {
        let mut selected: Vec<&RoundHit> = round_hits
            .iter()
            .filter(|rh| self.is_promising(&rh.hit))
            .collect();
        if selected.is_empty() {
            selected = round_hits.iter().collect();
        }

        let mut seen_urls = HashSet::new();
        selected.retain(|rh| !rh.hit.url.is_empty() && seen_urls.insert(rh.hit.url.clone()));
        selected.truncate(self.config.max_fetch_urls);

        if selected.is_empty() {
            return Vec::new();
        }
        tracing::debug!(target: "discovery_task",
            "Fetching {} promising page(s) for round {}.", selected.len(), round);

        let mut tasks = FuturesUnordered::new();
        let mut candidates = Vec::new();

        for round_hit in selected {
            if self.cancel.is_cancelled() {
                break;
            }
            while tasks.len() >= self.config.max_concurrency {
                if let Some(result) = tasks.next().await {
                    self.collect_fetch_result(result, round, &mut candidates, stats);
                } else {
                    break;
                }
            }

            let fetcher = Arc::clone(&self.fetcher);
            let owned = (*round_hit).clone();
            tasks.push(tokio::spawn(async move {
                let body = fetcher.fetch(&owned.hit.url).await;
                (owned, body)
            }));
        }

        while let Some(result) = tasks.next().await {
            self.collect_fetch_result(result, round, &mut candidates, stats);
        }

        candidates
    }

    fn collect_fetch_result(
        &self,
        result: std::result::Result<(RoundHit, Result<String>), tokio::task::JoinError>,
        round: u32,
        candidates: &mut Vec<EnrichedCandidate>,
        stats: &mut RunStats,
    ) {
        match result {
            Ok((round_hit, Ok(body))) => {
                stats.pages_fetched += 1;
                let source = CandidateSource {
                    phrase: round_hit.phrase,
                    url: Some(round_hit.hit.url),
                    page_title: Some(round_hit.hit.title),
                };
                let text = flatten_markup(&body);
                candidates.extend(extract(&self.config, &text, Some(body.as_str()), &source, round));
            }
            Ok((round_hit, Err(e))) => {
                stats.fetch_failures += 1;
                tracing::debug!(target: "fetch_task",
                    "Fetch of {} failed: {}", round_hit.hit.url, e);
            }
            Err(e) => {
                stats.fetch_failures += 1;
                tracing::error!(target: "fetch_task", "A fetch task failed to join: {}", e);
            }
        }
    }

    fn is_promising(&self, hit: &SearchHit) -> bool {
        let url = hit.url.to_lowercase();
        let title = hit.title.to_lowercase();
        self.config
            .contact_page_indicators
            .iter()
            .any(|ind| url.contains(ind.as_str()) || title.contains(ind.as_str()))
    }

    /// Pushes candidates through dedup, classification and verification,
    /// merging survivors into the run accumulator.
    async fn accumulate(
        &self,
        candidates: Vec<EnrichedCandidate>,
        previously_returned: &HashSet<String>,
        verifier: &Arc<DomainVerifier>,
        accumulator: &mut HashMap<String, AcceptedEmail>,
        stats: &mut RunStats,
    ) {
        // Same-round sightings of one address are merged before
        // classification so late-arriving context can rescue a candidate.
        let mut pending: HashMap<String, EnrichedCandidate> = HashMap::new();
        for candidate in candidates {
            if previously_returned.contains(&candidate.email) {
                stats.skipped_cached += 1;
                tracing::trace!(target: "discovery_task",
                    "Skipping previously returned address: {}", candidate.email);
                continue;
            }
            if let Some(existing) = accumulator.get_mut(&candidate.email) {
                merge_enrichment(existing, &candidate);
                continue;
            }
            match pending.entry(candidate.email.clone()) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    merge_candidate(entry.get_mut(), &candidate);
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(candidate);
                }
            }
        }

        let mut to_verify: Vec<(EnrichedCandidate, crate::classify::Classification)> = Vec::new();
        for (_, candidate) in pending {
            let verdict = classify(&self.config, &candidate);
            if !verdict.accept {
                stats.rejected_classification += 1;
                stats.note_rejection(&verdict.reason);
                tracing::debug!(target: "discovery_task",
                    "Rejected {} ({}).", candidate.email, verdict.reason);
                continue;
            }
            to_verify.push((candidate, verdict));
        }

        if to_verify.is_empty() {
            return;
        }

        let mut tasks = FuturesUnordered::new();
        for (candidate, verdict) in to_verify {
            while tasks.len() >= self.config.max_concurrency {
                if let Some(result) = tasks.next().await {
                    self.collect_verified(result, accumulator, stats);
                } else {
                    break;
                }
            }

            let verifier = Arc::clone(verifier);
            tasks.push(tokio::spawn(async move {
                let verification = verifier.verify(&candidate.email).await;
                (candidate, verdict, verification)
            }));
        }

        while let Some(result) = tasks.next().await {
            self.collect_verified(result, accumulator, stats);
        }
    }

    fn collect_verified(
        &self,
        result: std::result::Result<
            (
                EnrichedCandidate,
                crate::classify::Classification,
                crate::verify::Verification,
            ),
            tokio::task::JoinError,
        >,
        accumulator: &mut HashMap<String, AcceptedEmail>,
        stats: &mut RunStats,
    ) {
        let (mut candidate, verdict, verification) = match result {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(target: "discovery_task",
                    "A verification task failed to join: {}", e);
                return;
            }
        };

        let status = match (verification.accepted, verification.status) {
            (true, Some(status)) => status,
            _ => {
                stats.rejected_verification += 1;
                let reason = verification
                    .reason
                    .unwrap_or_else(|| "verification_failed".to_string());
                stats.note_rejection(&reason);
                tracing::debug!(target: "discovery_task",
                    "Verification rejected {} ({}).", candidate.email, reason);
                return;
            }
        };

        candidate.is_personal = verdict.is_personal;
        let confidence = final_confidence(verdict.base_confidence, status);

        tracing::info!(target: "discovery_task",
            "Accepted {} (confidence {:.2}, status {:?}, round {}).",
            candidate.email, confidence, status, candidate.round);

        accumulator.insert(
            candidate.email.clone(),
            AcceptedEmail {
                email: candidate.email,
                confidence,
                verification_status: status,
                name: candidate.name,
                title: candidate.title,
                department: candidate.department,
                is_personal: candidate.is_personal,
                source: candidate.source,
                round: candidate.round,
            },
        );
    }
}

/// Later sightings of an already accepted address update its context
/// fields; verification facts are not recomputed.
fn merge_enrichment(existing: &mut AcceptedEmail, newer: &EnrichedCandidate) {
    if newer.name.is_some() {
        existing.name = newer.name.clone();
    }
    if newer.title.is_some() {
        existing.title = newer.title.clone();
    }
    if newer.department.is_some() {
        existing.department = newer.department.clone();
    }
}

/// Merges two same-round sightings of one address before classification.
fn merge_candidate(existing: &mut EnrichedCandidate, newer: &EnrichedCandidate) {
    if newer.name.is_some() {
        existing.name = newer.name.clone();
    }
    if newer.title.is_some() {
        existing.title = newer.title.clone();
    }
    if newer.department.is_some() {
        existing.department = newer.department.clone();
    }
}

fn collect_phrase_result(
    result: std::result::Result<(String, Option<Vec<SearchHit>>), tokio::task::JoinError>,
    round_hits: &mut Vec<RoundHit>,
    failures: &mut usize,
) {
    match result {
        Ok((phrase, Some(hits))) => {
            if hits.is_empty() {
                tracing::debug!(target: "search_task", "Phrase '{}' returned no results.", phrase);
            }
            round_hits.extend(hits.into_iter().map(|hit| RoundHit {
                phrase: phrase.clone(),
                hit,
            }));
        }
        Ok((phrase, None)) => {
            *failures += 1;
            tracing::warn!(target: "search_task",
                "Phrase '{}' abandoned after repeated backend failures.", phrase);
        }
        Err(e) => {
            *failures += 1;
            tracing::error!(target: "search_task", "A search task failed to join: {}", e);
        }
    }
}

/// Runs one phrase with bounded retries and jittered backoff.
/// `None` means the backend kept failing; an empty vec is a real answer.
async fn search_with_retries(
    backend: &dyn SearchBackend,
    config: &Config,
    phrase: &str,
) -> Option<Vec<SearchHit>> {
    for attempt in 0..config.max_search_attempts {
        match backend.search(phrase).await {
            Ok(hits) => return Some(hits),
            Err(e) => {
                tracing::warn!(target: "search_task",
                    "Search attempt {}/{} for '{}' failed: {}",
                    attempt + 1, config.max_search_attempts, phrase, e);
                if attempt + 1 < config.max_search_attempts {
                    tokio::time::sleep(get_random_sleep_duration(config)).await;
                }
            }
        }
    }
    None
}
