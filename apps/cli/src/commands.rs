//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use prospector_core::{
    Enricher, LlmClient, ProgressReporter, SearchPipeline, SearchReport, SearchRequest,
    SearchSettings, TtlLruCache, WebContactFinder,
};
use prospector_crawler::SiteScraper;
use prospector_shared::{
    AppConfig, CacheConfig, CompanyOutcome, EnrichmentConfig, ScrapeConfig, SearchId,
    database_path, init_config, load_config, normalize_domain, validate_api_key,
};
use prospector_storage::Storage;
use tracing::info;

/// Owner ID used when `--owner` is not given.
const DEFAULT_OWNER: &str = "local";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Prospector: find and profile companies in a market niche.
#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "Discover companies for a market query and enrich them from their websites.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run a search: discover, select, and enrich companies.
    Search {
        /// Free-text market query, e.g. "logistics SaaS in Germany".
        query: String,

        /// Owner the seen/saved history belongs to.
        #[arg(long, env = "PROSPECTOR_OWNER", default_value = DEFAULT_OWNER)]
        owner: String,

        /// Number of companies to enrich (defaults to config).
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Keep discovery order stable instead of shuffling within tiers.
        #[arg(long)]
        no_shuffle: bool,

        /// Companies enriched in parallel per chunk (defaults to config).
        #[arg(long)]
        concurrency: Option<usize>,

        /// Database path (defaults to config).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List past searches.
    Searches {
        /// Only show searches for this owner.
        #[arg(long)]
        owner: Option<String>,

        /// Maximum number of searches to show.
        #[arg(long, default_value = "20")]
        limit: u32,

        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show the companies (and contacts) of one search.
    Companies {
        /// Search ID as printed by `search` or `searches`.
        search_id: String,

        /// Print outcomes as JSON instead of text.
        #[arg(long)]
        json: bool,

        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Save a domain so it is only reused when fresh candidates run out.
    Save {
        domain: String,

        #[arg(long, env = "PROSPECTOR_OWNER", default_value = DEFAULT_OWNER)]
        owner: String,

        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Remove a saved domain.
    Unsave {
        domain: String,

        #[arg(long, env = "PROSPECTOR_OWNER", default_value = DEFAULT_OWNER)]
        owner: String,

        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "prospector=info",
        1 => "prospector=debug",
        _ => "prospector=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Search {
            query,
            owner,
            count,
            no_shuffle,
            concurrency,
            db,
        } => {
            let options = SearchOptions {
                owner,
                count,
                shuffle: !no_shuffle,
                concurrency,
                db,
            };
            cmd_search(&query, options).await
        }
        Command::Searches { owner, limit, db } => cmd_searches(owner.as_deref(), limit, db.as_deref()).await,
        Command::Companies { search_id, json, db } => cmd_companies(&search_id, json, db.as_deref()).await,
        Command::Save { domain, owner, db } => cmd_save(&domain, &owner, db.as_deref()).await,
        Command::Unsave { domain, owner, db } => cmd_unsave(&domain, &owner, db.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

fn resolve_db_path(config: &AppConfig, db: Option<&Path>) -> Result<PathBuf> {
    match db {
        Some(p) => Ok(p.to_path_buf()),
        None => Ok(database_path(config)?),
    }
}

async fn open_storage(config: &AppConfig, db: Option<&Path>) -> Result<Storage> {
    let path = resolve_db_path(config, db)?;
    Ok(Storage::open(&path).await?)
}

async fn open_storage_readonly(config: &AppConfig, db: Option<&Path>) -> Result<Storage> {
    let path = resolve_db_path(config, db)?;
    if !path.exists() {
        return Err(eyre!(
            "no database at '{}'; run `prospector search` first",
            path.display()
        ));
    }
    Ok(Storage::open_readonly(&path).await?)
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

struct SearchOptions {
    owner: String,
    count: Option<usize>,
    shuffle: bool,
    concurrency: Option<usize>,
    db: Option<PathBuf>,
}

async fn cmd_search(query: &str, options: SearchOptions) -> Result<()> {
    let config = load_config()?;
    validate_api_key(&config)?;

    let storage = Arc::new(open_storage(&config, options.db.as_deref()).await?);
    let llm = Arc::new(LlmClient::from_config(&config)?);
    let scraper = SiteScraper::new(&ScrapeConfig::from(&config))?;
    let cache = Arc::new(TtlLruCache::new(&CacheConfig::from(&config)));

    let mut enrichment = EnrichmentConfig::from(&config);
    if let Some(k) = options.concurrency {
        enrichment.concurrency = k;
    }
    let max_text_chars = enrichment.max_text_chars;

    let enricher = Enricher::new(
        Arc::new(scraper.clone()),
        llm.clone(),
        cache,
        storage.clone(),
        enrichment,
    )
    .with_contacts(Arc::new(WebContactFinder::new(scraper, llm.clone(), max_text_chars)))
    .with_aggregate(llm.clone());

    let pipeline = SearchPipeline::new(llm, storage, enricher, SearchSettings::from(&config));

    let request = SearchRequest {
        owner_id: options.owner,
        query: query.to_string(),
        desired_count: options.count.unwrap_or(config.search.desired_count),
        randomize: options.shuffle && config.search.randomize,
    };

    info!(
        query,
        owner = %request.owner_id,
        count = request.desired_count,
        randomize = request.randomize,
        "starting search"
    );

    let reporter = CliProgress::new();
    let report = pipeline.run_search(&request, &reporter).await?;
    reporter.finish();

    print_report(&report);

    if !report.background.is_empty() {
        let spinner = CliProgress::new();
        spinner.phase("Finding contacts and summarising results");
        report.background.wait().await;
        spinner.finish();
    }

    println!("  Details: prospector companies {}", report.search_id);
    println!();
    Ok(())
}

fn print_report(report: &SearchReport) {
    let stats = &report.stats;
    println!();
    println!("  Search:     {}", report.search_id);
    println!("  Niche:      {}", report.niche_key);
    println!("  Discovered: {}", report.discovered);
    println!(
        "  Selected:   {} of {} requested (fresh {}, repeat {}, saved {})",
        report.outcomes.len(),
        stats.requested,
        stats.fresh,
        stats.repeat_seen,
        stats.repeat_unseen_saved,
    );
    println!();

    for (outcome, tier) in report.outcomes.iter().zip(&report.tiers) {
        println!("  [{:<5}] {}", tier.as_str(), outcome_line(outcome));
    }
    if report.outcomes.is_empty() {
        println!("  No companies found.");
    }
    println!();
}

fn outcome_line(outcome: &CompanyOutcome) -> String {
    let website = outcome.website().unwrap_or("-");
    match outcome {
        CompanyOutcome::Success { name, extracted, .. } => {
            format!("✓ {name} ({website}): {}", extracted.summary)
        }
        CompanyOutcome::Failure { name, error_message, .. } => {
            format!("✗ {name} ({website}): {error_message}")
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn company_done(&self, outcome: &CompanyOutcome, done: usize, total: usize) {
        let mark = if outcome.is_success() { "✓" } else { "✗" };
        self.spinner
            .set_message(format!("Enriching [{done}/{total}] {mark} {}", outcome.name()));
    }
}

// ---------------------------------------------------------------------------
// History commands
// ---------------------------------------------------------------------------

async fn cmd_searches(owner: Option<&str>, limit: u32, db: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config, db).await?;
    let searches = storage.list_searches(owner, limit).await?;

    if searches.is_empty() {
        println!("No searches yet.");
        return Ok(());
    }

    for s in searches {
        println!(
            "{}  {}  {:<10} {}",
            s.id,
            s.created_at.format("%Y-%m-%d %H:%M"),
            s.owner_id,
            s.query
        );
    }
    Ok(())
}

async fn cmd_companies(search_id: &str, json: bool, db: Option<&Path>) -> Result<()> {
    let id: SearchId = search_id
        .parse()
        .map_err(|e| eyre!("invalid search ID '{search_id}': {e}"))?;

    let config = load_config()?;
    let storage = open_storage_readonly(&config, db).await?;
    let search = storage
        .get_search(&id)
        .await?
        .ok_or_else(|| eyre!("search {id} not found"))?;
    let companies = storage.list_companies_by_search(&id).await?;

    if json {
        let outcomes: Vec<&CompanyOutcome> = companies.iter().map(|c| &c.outcome).collect();
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(());
    }

    println!();
    println!("  Query:  {}", search.query);
    println!("  Niche:  {}", search.niche_key);
    println!("  When:   {}", search.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(insight) = &search.aggregate_insight {
        println!();
        println!("  {insight}");
    }
    println!();

    for company in &companies {
        println!("  {}", outcome_line(&company.outcome));
        for person in storage.list_people_by_company(&company.id).await? {
            let role = person.role.as_deref().unwrap_or("");
            let reach = person
                .email
                .as_deref()
                .or(person.phone.as_deref())
                .unwrap_or("");
            println!("      {} {role} <{reach}>", person.name);
        }
    }
    println!();
    Ok(())
}

async fn cmd_save(domain: &str, owner: &str, db: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    let normalized = normalize_domain(domain);
    if storage.save_domain(owner, domain).await? {
        println!("Saved {normalized}");
    } else {
        println!("{normalized} was already saved");
    }
    Ok(())
}

async fn cmd_unsave(domain: &str, owner: &str, db: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config, db).await?;
    let normalized = normalize_domain(domain);
    if storage.unsave_domain(owner, domain).await? {
        println!("Removed {normalized}");
    } else {
        println!("{normalized} was not saved");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
