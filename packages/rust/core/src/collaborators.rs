//! Seams between the pipeline and the systems it drives.
//!
//! Every external collaborator (oracles, scraper, cache, persistence) sits
//! behind a trait so the orchestrator can be exercised with in-process fakes.

use async_trait::async_trait;

use prospector_crawler::{ScrapeResult, SiteScraper};
use prospector_shared::{
    CompanyCandidate, CompanyOutcome, DomainSet, InsightPayload, NicheKey, Person, Result,
    SearchId,
};

/// Finds candidate companies for a free-text market query.
#[async_trait]
pub trait CompanyDiscovery: Send + Sync {
    /// Return up to `limit` candidates. An empty list is a valid answer.
    async fn discover(&self, query: &str, limit: usize, temperature: f32)
    -> Result<Vec<CompanyCandidate>>;
}

/// Turns scraped website text into a structured insight record.
#[async_trait]
pub trait InsightExtractor: Send + Sync {
    async fn extract(
        &self,
        company_name: &str,
        website: &str,
        combined_text: &str,
    ) -> Result<InsightPayload>;
}

/// Finds contact people on a company website.
#[async_trait]
pub trait ContactFinder: Send + Sync {
    async fn find_people(&self, website: &str) -> Result<Vec<Person>>;
}

/// Writes a narrative paragraph about a whole result set.
#[async_trait]
pub trait AggregateInsight: Send + Sync {
    async fn aggregate_insight(&self, query: &str, companies: &[CompanyOutcome]) -> Result<String>;
}

/// Fetches the text of a company website.
#[async_trait]
pub trait Scrape: Send + Sync {
    async fn scrape(&self, website: &str) -> ScrapeResult;
}

#[async_trait]
impl Scrape for SiteScraper {
    async fn scrape(&self, website: &str) -> ScrapeResult {
        SiteScraper::scrape(self, website).await
    }
}

/// Domain-keyed store of previously extracted insight.
///
/// Implementations must tolerate concurrent calls from many enrichment tasks.
pub trait ExtractionCache: Send + Sync {
    fn get(&self, website: &str) -> Option<InsightPayload>;
    fn set(&self, website: &str, payload: InsightPayload);
}

/// Durable record of searches, companies, people, and domain history.
#[async_trait]
pub trait SearchStore: Send + Sync {
    async fn create_search(
        &self,
        id: &SearchId,
        owner_id: &str,
        query: &str,
        niche: &NicheKey,
    ) -> Result<()>;

    /// Persist one outcome and return its row ID.
    async fn persist_company(&self, search_id: &SearchId, outcome: &CompanyOutcome) -> Result<String>;

    /// Persist a batch of outcomes in one write.
    async fn persist_companies(&self, search_id: &SearchId, outcomes: &[CompanyOutcome]) -> Result<()>;

    async fn persist_people(&self, company_id: &str, people: &[Person]) -> Result<usize>;

    async fn update_search_insight(&self, search_id: &SearchId, insight: &str) -> Result<()>;

    async fn seen_domains(&self, owner_id: &str, niche: &NicheKey) -> Result<DomainSet>;

    async fn saved_domains(&self, owner_id: &str) -> Result<DomainSet>;

    async fn mark_seen(&self, owner_id: &str, niche: &NicheKey, domains: &[String]) -> Result<()>;
}
