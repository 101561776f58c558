//! Discovery-to-enrichment pipeline for Prospector.
//!
//! This crate ties together candidate discovery, diversity-aware selection,
//! cached website insight extraction, and persistence into one search
//! workflow ([`SearchPipeline::run_search`]).

pub mod cache;
pub mod collaborators;
pub mod contacts;
pub mod llm;
pub mod orchestrator;
pub mod progress;
pub mod search;
pub mod selector;
pub mod store;

#[cfg(test)]
mod testing;

pub use cache::TtlLruCache;
pub use collaborators::{
    AggregateInsight, CompanyDiscovery, ContactFinder, ExtractionCache, InsightExtractor, Scrape,
    SearchStore,
};
pub use contacts::{WebContactFinder, clean_people};
pub use llm::LlmClient;
pub use orchestrator::{AGGREGATE_FALLBACK, BackgroundTasks, Enricher, EnrichmentRun};
pub use progress::{ProgressReporter, SilentProgress};
pub use search::{SearchPipeline, SearchReport, SearchRequest, SearchSettings, dedupe_candidates};
pub use selector::{Selection, SelectionStats, SelectionTier, select};
