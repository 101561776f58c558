//! Bounded-concurrency enrichment of selected candidates.
//!
//! Candidates are processed in consecutive chunks of size *k*. Every member
//! of a chunk runs as its own task; the next chunk starts only once the whole
//! chunk has drained. Each candidate yields exactly one [`CompanyOutcome`],
//! and nothing that goes wrong for one candidate reaches another.
//!
//! Contact discovery and the aggregate insight run as detached tasks. They
//! are collected in [`BackgroundTasks`] so a caller that is about to exit can
//! wait for them; the primary result never does.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use prospector_crawler::truncate_chars;
use prospector_shared::{
    CompanyCandidate, CompanyOutcome, EnrichmentConfig, InsightPayload, ProspectorError, Result,
    SearchId,
};

use crate::collaborators::{
    AggregateInsight, ContactFinder, ExtractionCache, InsightExtractor, Scrape, SearchStore,
};
use crate::contacts::clean_people;
use crate::progress::ProgressReporter;

/// Stored when the aggregate oracle fails or returns nothing.
pub const AGGREGATE_FALLBACK: &str = "No aggregate insight could be generated for this search.";

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Handles to detached work launched by a run.
///
/// Dropping this leaves the tasks running on the runtime.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every task to finish. Task panics are logged, not raised.
    pub async fn wait(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task did not complete");
            }
        }
    }
}

/// Outcomes of one enrichment run, in candidate order.
#[derive(Debug)]
pub struct EnrichmentRun {
    pub outcomes: Vec<CompanyOutcome>,
    pub background: BackgroundTasks,
}

impl EnrichmentRun {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Drives cache check → scrape → extract → cache write → persist for each
/// candidate.
#[derive(Clone)]
pub struct Enricher {
    scraper: Arc<dyn Scrape>,
    extractor: Arc<dyn InsightExtractor>,
    cache: Arc<dyn ExtractionCache>,
    store: Arc<dyn SearchStore>,
    contacts: Option<Arc<dyn ContactFinder>>,
    aggregate: Option<Arc<dyn AggregateInsight>>,
    config: EnrichmentConfig,
}

impl Enricher {
    pub fn new(
        scraper: Arc<dyn Scrape>,
        extractor: Arc<dyn InsightExtractor>,
        cache: Arc<dyn ExtractionCache>,
        store: Arc<dyn SearchStore>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            scraper,
            extractor,
            cache,
            store,
            contacts: None,
            aggregate: None,
            config,
        }
    }

    /// Look up contact people for every persisted success.
    pub fn with_contacts(mut self, contacts: Arc<dyn ContactFinder>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    /// Generate and store an aggregate insight after every run.
    pub fn with_aggregate(mut self, aggregate: Arc<dyn AggregateInsight>) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    /// Enrich `candidates` for `search_id` and persist every outcome.
    ///
    /// Returns once every candidate has an outcome and has been persisted
    /// (best-effort). Contact and aggregate work may still be running.
    #[instrument(skip_all, fields(search_id = %search_id, candidates = candidates.len()))]
    pub async fn enrich(
        &self,
        search_id: &SearchId,
        query: &str,
        candidates: Vec<CompanyCandidate>,
        progress: &dyn ProgressReporter,
    ) -> EnrichmentRun {
        let chunk_size = self.config.concurrency.max(1);
        let total = candidates.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut background = BackgroundTasks::default();

        info!(total, chunk_size, "enriching candidates");

        for (chunk_index, chunk) in candidates.chunks(chunk_size).enumerate() {
            debug!(chunk = chunk_index, size = chunk.len(), "starting chunk");

            let handles: Vec<_> = chunk
                .iter()
                .map(|candidate| {
                    let this = self.clone();
                    let search_id = search_id.clone();
                    let owned = candidate.clone();
                    let handle =
                        tokio::spawn(async move { this.process_candidate(&search_id, owned).await });
                    (candidate, handle)
                })
                .collect();

            for (candidate, handle) in handles {
                let (outcome, contacts) = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(company = %candidate.name, error = %e, "enrichment task aborted");
                        (
                            CompanyOutcome::failure(candidate, format!("enrichment task failed: {e}")),
                            None,
                        )
                    }
                };
                if let Some(handle) = contacts {
                    background.push(handle);
                }
                progress.company_done(&outcome, outcomes.len() + 1, total);
                outcomes.push(outcome);
            }
        }

        self.persist_failures(search_id, &outcomes).await;

        if let Some(handle) = self.spawn_aggregate(search_id, query, &outcomes) {
            background.push(handle);
        }

        let run = EnrichmentRun {
            outcomes,
            background,
        };
        info!(
            succeeded = run.succeeded(),
            failed = run.failed(),
            background = run.background.len(),
            "enrichment finished"
        );
        run
    }

    /// Produce and persist the outcome for one candidate, plus its contact task.
    async fn process_candidate(
        &self,
        search_id: &SearchId,
        candidate: CompanyCandidate,
    ) -> (CompanyOutcome, Option<JoinHandle<()>>) {
        let extracted = match self.extract_candidate(&candidate).await {
            Ok(payload) => payload,
            Err(e) => {
                debug!(company = %candidate.name, error = %e, "candidate failed");
                return (CompanyOutcome::failure(&candidate, e.to_string()), None);
            }
        };

        let outcome = CompanyOutcome::Success {
            name: candidate.name.clone(),
            website: candidate.website.clone(),
            description: candidate.description.clone(),
            industry: candidate.industry.clone(),
            country: candidate.country.clone(),
            extracted,
        };

        match self.store.persist_company(search_id, &outcome).await {
            Ok(company_id) => {
                let contacts = self.spawn_contacts(company_id, candidate.website_str());
                (outcome, contacts)
            }
            Err(e) => {
                warn!(company = %candidate.name, error = %e, "failed to persist enriched company");
                (
                    CompanyOutcome::failure(&candidate, format!("failed to persist company: {e}")),
                    None,
                )
            }
        }
    }

    async fn extract_candidate(&self, candidate: &CompanyCandidate) -> Result<InsightPayload> {
        let website = candidate.website_str();

        if let Some(mut cached) = self.cache.get(website) {
            debug!(company = %candidate.name, "extraction cache hit");
            cached.name = candidate.name.clone();
            cached.website = website.to_string();
            return Ok(cached);
        }

        let scraped = self.scraper.scrape(website).await;
        if scraped.pages.is_empty() {
            let reason = if scraped.errors.is_empty() {
                "no content could be scraped".to_string()
            } else {
                format!("no content could be scraped: {}", scraped.errors.join("; "))
            };
            return Err(ProspectorError::Network(reason));
        }
        if !scraped.errors.is_empty() {
            debug!(company = %candidate.name, errors = ?scraped.errors, "partial scrape");
        }

        let combined = scraped.combined_text();
        let text = truncate_chars(&combined, self.config.max_text_chars);

        let payload = self.extractor.extract(&candidate.name, website, text).await?;
        self.cache.set(website, payload.clone());
        Ok(payload)
    }

    async fn persist_failures(&self, search_id: &SearchId, outcomes: &[CompanyOutcome]) {
        let failures: Vec<CompanyOutcome> = outcomes.iter().filter(|o| !o.is_success()).cloned().collect();
        if failures.is_empty() {
            return;
        }
        if let Err(e) = self.store.persist_companies(search_id, &failures).await {
            error!(count = failures.len(), error = %e, "failed to persist failed companies");
        }
    }

    fn spawn_contacts(&self, company_id: String, website: &str) -> Option<JoinHandle<()>> {
        let finder = self.contacts.clone()?;
        if website.trim().is_empty() {
            return None;
        }
        let store = Arc::clone(&self.store);
        let website = website.to_string();

        Some(tokio::spawn(async move {
            let people = match finder.find_people(&website).await {
                Ok(people) => clean_people(people),
                Err(e) => {
                    warn!(%website, error = %e, "contact discovery failed");
                    return;
                }
            };
            if people.is_empty() {
                debug!(%website, "no reachable contacts found");
                return;
            }
            match store.persist_people(&company_id, &people).await {
                Ok(count) => info!(%website, count, "stored contacts"),
                Err(e) => warn!(%website, error = %e, "failed to store contacts"),
            }
        }))
    }

    fn spawn_aggregate(
        &self,
        search_id: &SearchId,
        query: &str,
        outcomes: &[CompanyOutcome],
    ) -> Option<JoinHandle<()>> {
        let oracle = self.aggregate.clone()?;
        let store = Arc::clone(&self.store);
        let search_id = search_id.clone();
        let query = query.to_string();
        let outcomes = outcomes.to_vec();

        Some(tokio::spawn(async move {
            let insight = match oracle.aggregate_insight(&query, &outcomes).await {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => AGGREGATE_FALLBACK.to_string(),
                Err(e) => {
                    warn!(%search_id, error = %e, "aggregate insight failed");
                    AGGREGATE_FALLBACK.to_string()
                }
            };
            if let Err(e) = store.update_search_insight(&search_id, &insight).await {
                warn!(%search_id, error = %e, "failed to store aggregate insight");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use prospector_shared::Person;

    use super::*;
    use crate::progress::SilentProgress;
    use crate::testing::*;

    fn config(concurrency: usize) -> EnrichmentConfig {
        EnrichmentConfig {
            concurrency,
            max_text_chars: 15_000,
        }
    }

    struct Harness {
        scraper: Arc<FakeScraper>,
        extractor: Arc<FakeExtractor>,
        cache: Arc<MapCache>,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                scraper: Arc::new(FakeScraper::default()),
                extractor: Arc::new(FakeExtractor::default()),
                cache: Arc::new(MapCache::default()),
                store: Arc::new(MemoryStore::default()),
            }
        }

        fn enricher(&self, concurrency: usize) -> Enricher {
            Enricher::new(
                self.scraper.clone(),
                self.extractor.clone(),
                self.cache.clone(),
                self.store.clone(),
                config(concurrency),
            )
        }
    }

    #[tokio::test]
    async fn one_failure_among_seven_is_isolated() {
        let h = Harness::new();
        h.extractor.fail_for("Company 3");
        let candidates = candidates(7);

        let run = h
            .enricher(5)
            .enrich(&SearchId::new(), "logistics saas", candidates, &SilentProgress)
            .await;

        assert_eq!(run.outcomes.len(), 7);
        assert_eq!(run.succeeded(), 6);
        assert_eq!(run.failed(), 1);
        match &run.outcomes[2] {
            CompanyOutcome::Failure {
                name,
                website,
                error_message,
                ..
            } => {
                assert_eq!(name, "Company 3");
                assert_eq!(website.as_deref(), Some("https://company3.com"));
                assert!(error_message.contains("extraction refused"));
            }
            other => panic!("expected failure, got {other:?}"),
        }

        let stored = h.store.companies();
        assert_eq!(stored.len(), 7);
        assert_eq!(stored.iter().filter(|o| o.is_success()).count(), 6);
        assert_eq!(h.store.batch_writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn outcomes_keep_candidate_order() {
        let h = Harness::new();
        h.extractor.set_delay_for("Company 1", Duration::from_millis(50));
        let run = h
            .enricher(3)
            .enrich(&SearchId::new(), "q", candidates(3), &SilentProgress)
            .await;
        let names: Vec<&str> = run.outcomes.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["Company 1", "Company 2", "Company 3"]);
    }

    #[tokio::test]
    async fn chunks_bound_concurrency_and_never_overlap() {
        let h = Harness::new();
        h.extractor.set_default_delay(Duration::from_millis(20));

        h.enricher(2)
            .enrich(&SearchId::new(), "q", candidates(5), &SilentProgress)
            .await;

        assert!(h.extractor.max_in_flight.load(Ordering::SeqCst) <= 2);

        let events = h.extractor.events();
        let chunk_of = |name: &str| -> usize {
            let n: usize = name.trim_start_matches("Company ").parse().unwrap();
            (n - 1) / 2
        };
        for (i, (name, started)) in events.iter().enumerate() {
            if !*started {
                continue;
            }
            // Every event before a start belongs to the same or an earlier chunk,
            // and all ends of earlier chunks precede it.
            let chunk = chunk_of(name);
            let earlier_ends_after = events[i..]
                .iter()
                .any(|(other, is_start)| !*is_start && chunk_of(other) < chunk);
            assert!(!earlier_ends_after, "{name} started before an earlier chunk drained");
        }
    }

    #[tokio::test]
    async fn empty_scrape_fails_without_calling_oracle() {
        let h = Harness::new();
        h.scraper.fail_for("https://company1.com");

        let run = h
            .enricher(5)
            .enrich(&SearchId::new(), "q", candidates(1), &SilentProgress)
            .await;

        match &run.outcomes[0] {
            CompanyOutcome::Failure { error_message, .. } => {
                assert!(error_message.contains("no content could be scraped"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
        assert!(h.cache.get("company1.com").is_none());
    }

    #[tokio::test]
    async fn cache_hit_skips_scrape_and_rewrites_identity() {
        let h = Harness::new();
        h.cache.set(
            "https://www.company1.com/",
            InsightPayload {
                name: "Old Name Ltd".into(),
                website: "https://www.company1.com/".into(),
                summary: "cached summary".into(),
                ..Default::default()
            },
        );

        let run = h
            .enricher(5)
            .enrich(&SearchId::new(), "q", candidates(1), &SilentProgress)
            .await;

        assert_eq!(h.scraper.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.extractor.calls.load(Ordering::SeqCst), 0);
        match &run.outcomes[0] {
            CompanyOutcome::Success { extracted, .. } => {
                assert_eq!(extracted.summary, "cached summary");
                assert_eq!(extracted.name, "Company 1");
                assert_eq!(extracted.website, "https://company1.com");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_extraction_populates_cache_and_failure_does_not() {
        let h = Harness::new();
        h.extractor.fail_for("Company 2");

        h.enricher(5)
            .enrich(&SearchId::new(), "q", candidates(2), &SilentProgress)
            .await;

        assert!(h.cache.get("company1.com").is_some());
        assert!(h.cache.get("company2.com").is_none());
    }

    #[tokio::test]
    async fn combined_text_is_truncated() {
        let h = Harness::new();
        h.scraper.set_text("https://company1.com", &"x".repeat(50_000));

        let enricher = Enricher::new(
            h.scraper.clone(),
            h.extractor.clone(),
            h.cache.clone(),
            h.store.clone(),
            EnrichmentConfig {
                concurrency: 1,
                max_text_chars: 1_000,
            },
        );
        enricher
            .enrich(&SearchId::new(), "q", candidates(1), &SilentProgress)
            .await;

        assert_eq!(h.extractor.longest_text.load(Ordering::SeqCst), 1_000);
    }

    #[tokio::test]
    async fn panicking_task_becomes_failure() {
        let h = Harness::new();
        h.extractor.panic_for("Company 2");

        let run = h
            .enricher(5)
            .enrich(&SearchId::new(), "q", candidates(3), &SilentProgress)
            .await;

        assert_eq!(run.succeeded(), 2);
        assert!(matches!(&run.outcomes[1], CompanyOutcome::Failure { error_message, .. }
            if error_message.contains("enrichment task failed")));
    }

    #[tokio::test]
    async fn persist_error_turns_success_into_failure() {
        let h = Harness::new();
        h.store.fail_company_writes_for("Company 1");

        let run = h
            .enricher(5)
            .enrich(&SearchId::new(), "q", candidates(2), &SilentProgress)
            .await;

        assert!(!run.outcomes[0].is_success());
        assert!(run.outcomes[1].is_success());
    }

    #[tokio::test]
    async fn failed_batch_write_does_not_lose_successes() {
        let h = Harness::new();
        h.extractor.fail_for("Company 1");
        h.store.fail_batch_writes();

        let run = h
            .enricher(5)
            .enrich(&SearchId::new(), "q", candidates(3), &SilentProgress)
            .await;

        assert_eq!(run.outcomes.len(), 3);
        assert_eq!(h.store.companies().len(), 2);
    }

    #[tokio::test]
    async fn contacts_are_cleaned_and_stored_in_background() {
        let h = Harness::new();
        let contacts = Arc::new(FakeContacts::returning(vec![
            Person {
                name: "Jane".into(),
                email: Some("jane@company1.com".into()),
                ..Default::default()
            },
            Person {
                name: "Nobody".into(),
                ..Default::default()
            },
        ]));
        let enricher = h.enricher(5).with_contacts(contacts.clone());

        let run = enricher
            .enrich(&SearchId::new(), "q", candidates(2), &SilentProgress)
            .await;
        assert_eq!(run.background.len(), 2);
        run.background.wait().await;

        let people = h.store.people();
        assert_eq!(people.len(), 2);
        assert!(people.iter().all(|(_, p)| p.name == "Jane"));
    }

    #[tokio::test]
    async fn contact_failures_are_swallowed() {
        let h = Harness::new();
        let enricher = h.enricher(5).with_contacts(Arc::new(FakeContacts::failing()));

        let run = enricher
            .enrich(&SearchId::new(), "q", candidates(1), &SilentProgress)
            .await;
        assert!(run.outcomes[0].is_success());
        run.background.wait().await;
        assert!(h.store.people().is_empty());
    }

    #[tokio::test]
    async fn aggregate_insight_is_stored() {
        let h = Harness::new();
        let search_id = SearchId::new();
        let enricher = h
            .enricher(5)
            .with_aggregate(Arc::new(FakeAggregate::returning("  Busy market.  ")));

        let run = enricher.enrich(&search_id, "q", candidates(2), &SilentProgress).await;
        run.background.wait().await;
        assert_eq!(h.store.insight(&search_id).as_deref(), Some("Busy market."));
    }

    #[tokio::test]
    async fn blank_or_failed_aggregate_uses_fallback() {
        for oracle in [FakeAggregate::returning("   "), FakeAggregate::failing()] {
            let h = Harness::new();
            let search_id = SearchId::new();
            let run = h
                .enricher(5)
                .with_aggregate(Arc::new(oracle))
                .enrich(&search_id, "q", candidates(1), &SilentProgress)
                .await;
            run.background.wait().await;
            assert_eq!(h.store.insight(&search_id).as_deref(), Some(AGGREGATE_FALLBACK));
        }
    }

    #[tokio::test]
    async fn empty_candidate_list_is_a_noop() {
        let h = Harness::new();
        let run = h
            .enricher(5)
            .enrich(&SearchId::new(), "q", Vec::new(), &SilentProgress)
            .await;
        assert!(run.outcomes.is_empty());
        assert!(run.background.is_empty());
        assert_eq!(h.store.batch_writes.load(Ordering::SeqCst), 0);
    }
}
