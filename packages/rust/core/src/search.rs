//! End-to-end search: discover → de-duplicate → select → enrich.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use prospector_shared::{
    AppConfig, CompanyCandidate, CompanyOutcome, DomainSet, NicheKey, ProspectorError, Result,
    SearchId, SearchSection, normalize_website,
};

use crate::collaborators::{CompanyDiscovery, SearchStore};
use crate::orchestrator::{BackgroundTasks, Enricher};
use crate::progress::ProgressReporter;
use crate::selector::{self, SelectionStats, SelectionTier};

/// One user-initiated search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub owner_id: String,
    pub query: String,
    pub desired_count: usize,
    pub randomize: bool,
}

/// Discovery sizing and temperature knobs.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub oversample_factor: usize,
    pub max_candidates: usize,
    pub randomized_temperature: f32,
    pub stable_temperature: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from(&SearchSection::default())
    }
}

impl From<&SearchSection> for SearchSettings {
    fn from(section: &SearchSection) -> Self {
        Self {
            oversample_factor: section.oversample_factor.max(1),
            max_candidates: section.max_candidates,
            randomized_temperature: section.randomized_temperature,
            stable_temperature: section.stable_temperature,
        }
    }
}

impl From<&AppConfig> for SearchSettings {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.search)
    }
}

impl SearchSettings {
    /// How many candidates to ask discovery for.
    pub fn discovery_limit(&self, desired_count: usize) -> usize {
        desired_count
            .saturating_mul(self.oversample_factor)
            .min(self.max_candidates)
    }

    pub fn temperature(&self, randomize: bool) -> f32 {
        if randomize {
            self.randomized_temperature
        } else {
            self.stable_temperature
        }
    }
}

/// Everything a search produced.
#[derive(Debug)]
pub struct SearchReport {
    pub search_id: SearchId,
    pub niche_key: NicheKey,
    /// Candidates returned by discovery after de-duplication.
    pub discovered: usize,
    pub outcomes: Vec<CompanyOutcome>,
    pub stats: SelectionStats,
    /// Tier of each entry in `outcomes`, index-aligned.
    pub tiers: Vec<SelectionTier>,
    pub background: BackgroundTasks,
}

/// Wires discovery, selection, and enrichment against one store.
pub struct SearchPipeline {
    discovery: Arc<dyn CompanyDiscovery>,
    store: Arc<dyn SearchStore>,
    enricher: Enricher,
    settings: SearchSettings,
}

impl SearchPipeline {
    pub fn new(
        discovery: Arc<dyn CompanyDiscovery>,
        store: Arc<dyn SearchStore>,
        enricher: Enricher,
        settings: SearchSettings,
    ) -> Self {
        Self {
            discovery,
            store,
            enricher,
            settings,
        }
    }

    /// Run one search to completion.
    ///
    /// Only an invalid request or a failure to create the search record is
    /// an error. Discovery failures yield an empty report.
    #[instrument(skip_all, fields(owner = %request.owner_id, query = %request.query))]
    pub async fn run_search(
        &self,
        request: &SearchRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<SearchReport> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(ProspectorError::validation("search query must not be empty"));
        }

        let niche = NicheKey::from_query(query);
        let search_id = SearchId::new();
        self.store
            .create_search(&search_id, &request.owner_id, query, &niche)
            .await?;
        info!(%search_id, %niche, "search created");

        let mut report = SearchReport {
            search_id: search_id.clone(),
            niche_key: niche.clone(),
            discovered: 0,
            outcomes: Vec::new(),
            stats: SelectionStats {
                requested: request.desired_count,
                ..Default::default()
            },
            tiers: Vec::new(),
            background: BackgroundTasks::default(),
        };

        // --- Discovery ---
        progress.phase("Discovering companies");
        let limit = self.settings.discovery_limit(request.desired_count);
        let temperature = self.settings.temperature(request.randomize);
        let candidates = match self.discovery.discover(query, limit, temperature).await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "discovery failed");
                return Ok(report);
            }
        };
        let candidates = dedupe_candidates(candidates);
        report.discovered = candidates.len();
        if candidates.is_empty() {
            info!("discovery returned no candidates");
            return Ok(report);
        }

        // --- Selection ---
        progress.phase("Selecting companies");
        let seen = self.load_domains(
            "seen",
            self.store.seen_domains(&request.owner_id, &niche).await,
        );
        let saved = self.load_domains("saved", self.store.saved_domains(&request.owner_id).await);

        let selection = selector::select(
            &candidates,
            &seen,
            request.desired_count,
            request.randomize,
            &saved,
        );
        info!(
            discovered = candidates.len(),
            selected = selection.selected.len(),
            fresh = selection.stats.fresh,
            repeat = selection.stats.repeat_seen,
            saved = selection.stats.repeat_unseen_saved,
            "selection complete"
        );

        let domains = selection.domains();
        if !domains.is_empty() {
            if let Err(e) = self.store.mark_seen(&request.owner_id, &niche, &domains).await {
                warn!(error = %e, "failed to record seen domains");
            }
        }

        // --- Enrichment ---
        progress.phase("Enriching companies");
        let run = self
            .enricher
            .enrich(&search_id, query, selection.selected, progress)
            .await;

        report.outcomes = run.outcomes;
        report.background = run.background;
        report.stats = selection.stats;
        report.tiers = selection.tiers;
        Ok(report)
    }

    fn load_domains(&self, kind: &str, loaded: Result<DomainSet>) -> DomainSet {
        loaded.unwrap_or_else(|e| {
            warn!(kind, error = %e, "failed to load domain history, treating as empty");
            DomainSet::new()
        })
    }
}

/// Drop candidates whose normalized domain already appeared. Candidates
/// without a website are all kept.
pub fn dedupe_candidates(candidates: Vec<CompanyCandidate>) -> Vec<CompanyCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            let domain = normalize_website(c.website.as_deref());
            domain.is_empty() || seen.insert(domain)
        })
        .collect()
}
