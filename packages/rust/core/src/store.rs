//! [`SearchStore`] backed by the libSQL [`Storage`].

use async_trait::async_trait;

use prospector_shared::{CompanyOutcome, DomainSet, NicheKey, Person, Result, SearchId};
use prospector_storage::Storage;

use crate::collaborators::SearchStore;

#[async_trait]
impl SearchStore for Storage {
    async fn create_search(
        &self,
        id: &SearchId,
        owner_id: &str,
        query: &str,
        niche: &NicheKey,
    ) -> Result<()> {
        self.insert_search(id, owner_id, query, niche).await
    }

    async fn persist_company(&self, search_id: &SearchId, outcome: &CompanyOutcome) -> Result<String> {
        self.insert_company(search_id, outcome).await
    }

    async fn persist_companies(&self, search_id: &SearchId, outcomes: &[CompanyOutcome]) -> Result<()> {
        self.insert_companies(search_id, outcomes).await.map(|_| ())
    }

    async fn persist_people(&self, company_id: &str, people: &[Person]) -> Result<usize> {
        self.insert_people(company_id, people).await
    }

    async fn update_search_insight(&self, search_id: &SearchId, insight: &str) -> Result<()> {
        Storage::update_search_insight(self, search_id, insight).await
    }

    async fn seen_domains(&self, owner_id: &str, niche: &NicheKey) -> Result<DomainSet> {
        self.get_seen_domains(owner_id, niche).await
    }

    async fn saved_domains(&self, owner_id: &str) -> Result<DomainSet> {
        self.get_saved_domains(owner_id).await
    }

    async fn mark_seen(&self, owner_id: &str, niche: &NicheKey, domains: &[String]) -> Result<()> {
        self.mark_domains_seen(owner_id, niche, domains).await.map(|_| ())
    }
}
