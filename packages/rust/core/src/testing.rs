//! In-process fakes for the collaborator traits.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use prospector_crawler::{PageKind, ScrapePage, ScrapeResult};
use prospector_shared::{
    CompanyCandidate, CompanyOutcome, DomainSet, InsightPayload, NicheKey, Person,
    ProspectorError, Result, SearchId, normalize_domain,
};

use crate::collaborators::{
    AggregateInsight, CompanyDiscovery, ContactFinder, ExtractionCache, InsightExtractor, Scrape,
    SearchStore,
};

/// `Company 1` .. `Company n` at `https://company{i}.com`.
pub fn candidates(n: usize) -> Vec<CompanyCandidate> {
    (1..=n)
        .map(|i| CompanyCandidate {
            name: format!("Company {i}"),
            website: Some(format!("https://company{i}.com")),
            description: format!("Company number {i}"),
            industry: "Software".into(),
            country: "DE".into(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDiscovery {
    result: Mutex<Option<Result<Vec<CompanyCandidate>>>>,
    pub calls: Mutex<Vec<(String, usize, f32)>>,
}

impl FakeDiscovery {
    pub fn returning(candidates: Vec<CompanyCandidate>) -> Self {
        Self {
            result: Mutex::new(Some(Ok(candidates))),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Mutex::new(Some(Err(ProspectorError::Oracle("discovery down".into())))),
            ..Default::default()
        }
    }

    pub fn last_call(&self) -> Option<(String, usize, f32)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompanyDiscovery for FakeDiscovery {
    async fn discover(&self, query: &str, limit: usize, temperature: f32) -> Result<Vec<CompanyCandidate>> {
        self.calls.lock().unwrap().push((query.to_string(), limit, temperature));
        match &*self.result.lock().unwrap() {
            Some(Ok(list)) => Ok(list.clone()),
            Some(Err(e)) => Err(ProspectorError::Oracle(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Scraper
// ---------------------------------------------------------------------------

/// Returns one homepage per site unless told otherwise.
#[derive(Default)]
pub struct FakeScraper {
    failing: Mutex<HashSet<String>>,
    texts: Mutex<HashMap<String, String>>,
    pub calls: AtomicUsize,
}

impl FakeScraper {
    pub fn fail_for(&self, website: &str) {
        self.failing.lock().unwrap().insert(website.to_string());
    }

    pub fn set_text(&self, website: &str, text: &str) {
        self.texts.lock().unwrap().insert(website.to_string(), text.to_string());
    }
}

#[async_trait]
impl Scrape for FakeScraper {
    async fn scrape(&self, website: &str) -> ScrapeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(website) {
            return ScrapeResult {
                pages: Vec::new(),
                errors: vec![format!("homepage: network error: {website}: connection refused")],
            };
        }
        let text = self
            .texts
            .lock()
            .unwrap()
            .get(website)
            .cloned()
            .unwrap_or_else(|| format!("Welcome to {website}"));
        ScrapeResult {
            pages: vec![ScrapePage {
                kind: PageKind::Home,
                url: website.to_string(),
                text,
            }],
            errors: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Records call order and concurrency; can fail, panic, or stall per company.
#[derive(Default)]
pub struct FakeExtractor {
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    default_delay: Mutex<Option<Duration>>,
    events: Mutex<Vec<(String, bool)>>,
    in_flight: AtomicUsize,
    pub calls: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub longest_text: AtomicUsize,
}

impl FakeExtractor {
    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn panic_for(&self, name: &str) {
        self.panicking.lock().unwrap().insert(name.to_string());
    }

    pub fn set_delay_for(&self, name: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(name.to_string(), delay);
    }

    pub fn set_default_delay(&self, delay: Duration) {
        *self.default_delay.lock().unwrap() = Some(delay);
    }

    /// `(company, is_start)` in the order they happened.
    pub fn events(&self) -> Vec<(String, bool)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl InsightExtractor for FakeExtractor {
    async fn extract(&self, company_name: &str, website: &str, combined_text: &str) -> Result<InsightPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.longest_text
            .fetch_max(combined_text.chars().count(), Ordering::SeqCst);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push((company_name.to_string(), true));

        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(company_name)
            .copied()
            .or(*self.default_delay.lock().unwrap());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.events.lock().unwrap().push((company_name.to_string(), false));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.lock().unwrap().contains(company_name) {
            panic!("extractor blew up for {company_name}");
        }
        if self.failing.lock().unwrap().contains(company_name) {
            return Err(ProspectorError::Oracle("extraction refused".into()));
        }

        Ok(InsightPayload {
            name: company_name.to_string(),
            website: website.to_string(),
            summary: format!("{company_name} does logistics software"),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Unbounded domain-keyed cache without expiry.
#[derive(Default)]
pub struct MapCache {
    entries: Mutex<HashMap<String, InsightPayload>>,
}

impl ExtractionCache for MapCache {
    fn get(&self, website: &str) -> Option<InsightPayload> {
        self.entries.lock().unwrap().get(&normalize_domain(website)).cloned()
    }

    fn set(&self, website: &str, payload: InsightPayload) {
        let domain = normalize_domain(website);
        if !domain.is_empty() {
            self.entries.lock().unwrap().insert(domain, payload);
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    searches: Mutex<Vec<(SearchId, String, String, NicheKey)>>,
    companies: Mutex<Vec<CompanyOutcome>>,
    people: Mutex<Vec<(String, Person)>>,
    insights: Mutex<HashMap<SearchId, String>>,
    seen: Mutex<HashMap<(String, NicheKey), DomainSet>>,
    saved: Mutex<HashMap<String, DomainSet>>,
    failing_companies: Mutex<HashSet<String>>,
    fail_batches: AtomicBool,
    fail_domain_reads: AtomicBool,
    pub batch_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn fail_company_writes_for(&self, name: &str) {
        self.failing_companies.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_batch_writes(&self) {
        self.fail_batches.store(true, Ordering::SeqCst);
    }

    pub fn fail_domain_reads(&self) {
        self.fail_domain_reads.store(true, Ordering::SeqCst);
    }

    pub fn seed_seen(&self, owner: &str, niche: &NicheKey, domains: &[&str]) {
        self.seen
            .lock()
            .unwrap()
            .entry((owner.to_string(), niche.clone()))
            .or_default()
            .extend(domains.iter().map(|d| d.to_string()));
    }

    pub fn seed_saved(&self, owner: &str, domains: &[&str]) {
        self.saved
            .lock()
            .unwrap()
            .entry(owner.to_string())
            .or_default()
            .extend(domains.iter().map(|d| d.to_string()));
    }

    pub fn searches(&self) -> Vec<(SearchId, String, String, NicheKey)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn companies(&self) -> Vec<CompanyOutcome> {
        self.companies.lock().unwrap().clone()
    }

    pub fn people(&self) -> Vec<(String, Person)> {
        self.people.lock().unwrap().clone()
    }

    pub fn insight(&self, search_id: &SearchId) -> Option<String> {
        self.insights.lock().unwrap().get(search_id).cloned()
    }

    pub fn seen(&self, owner: &str, niche: &NicheKey) -> DomainSet {
        self.seen
            .lock()
            .unwrap()
            .get(&(owner.to_string(), niche.clone()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn create_search(&self, id: &SearchId, owner_id: &str, query: &str, niche: &NicheKey) -> Result<()> {
        self.searches.lock().unwrap().push((
            id.clone(),
            owner_id.to_string(),
            query.to_string(),
            niche.clone(),
        ));
        Ok(())
    }

    async fn persist_company(&self, _search_id: &SearchId, outcome: &CompanyOutcome) -> Result<String> {
        if self.failing_companies.lock().unwrap().contains(outcome.name()) {
            return Err(ProspectorError::Storage("disk full".into()));
        }
        let mut companies = self.companies.lock().unwrap();
        companies.push(outcome.clone());
        Ok(format!("company-{}", companies.len()))
    }

    async fn persist_companies(&self, _search_id: &SearchId, outcomes: &[CompanyOutcome]) -> Result<()> {
        self.batch_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(ProspectorError::Storage("disk full".into()));
        }
        self.companies.lock().unwrap().extend_from_slice(outcomes);
        Ok(())
    }

    async fn persist_people(&self, company_id: &str, people: &[Person]) -> Result<usize> {
        let mut stored = self.people.lock().unwrap();
        stored.extend(people.iter().map(|p| (company_id.to_string(), p.clone())));
        Ok(people.len())
    }

    async fn update_search_insight(&self, search_id: &SearchId, insight: &str) -> Result<()> {
        self.insights
            .lock()
            .unwrap()
            .insert(search_id.clone(), insight.to_string());
        Ok(())
    }

    async fn seen_domains(&self, owner_id: &str, niche: &NicheKey) -> Result<DomainSet> {
        if self.fail_domain_reads.load(Ordering::SeqCst) {
            return Err(ProspectorError::Storage("database locked".into()));
        }
        Ok(self.seen(owner_id, niche))
    }

    async fn saved_domains(&self, owner_id: &str) -> Result<DomainSet> {
        if self.fail_domain_reads.load(Ordering::SeqCst) {
            return Err(ProspectorError::Storage("database locked".into()));
        }
        Ok(self.saved.lock().unwrap().get(owner_id).cloned().unwrap_or_default())
    }

    async fn mark_seen(&self, owner_id: &str, niche: &NicheKey, domains: &[String]) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .entry((owner_id.to_string(), niche.clone()))
            .or_default()
            .extend(domains.iter().cloned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Background oracles
// ---------------------------------------------------------------------------

pub struct FakeContacts {
    people: Option<Vec<Person>>,
}

impl FakeContacts {
    pub fn returning(people: Vec<Person>) -> Self {
        Self { people: Some(people) }
    }

    pub fn failing() -> Self {
        Self { people: None }
    }
}

#[async_trait]
impl ContactFinder for FakeContacts {
    async fn find_people(&self, website: &str) -> Result<Vec<Person>> {
        self.people
            .clone()
            .ok_or_else(|| ProspectorError::Network(format!("{website}: connection reset")))
    }
}

pub struct FakeAggregate {
    text: Option<String>,
}

impl FakeAggregate {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl AggregateInsight for FakeAggregate {
    async fn aggregate_insight(&self, _query: &str, _companies: &[CompanyOutcome]) -> Result<String> {
        self.text
            .clone()
            .ok_or_else(|| ProspectorError::Oracle("rate limited".into()))
    }
}
