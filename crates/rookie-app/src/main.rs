// Rookie mock draft entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Parse the command line
// 3. Load config
// 4. Open database
// 5. Dispatch the command, resolving the Sleeper league for commands that
//    need league data

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rookie_app::config::{self, Config};
use rookie_app::sleeper::SleeperClient;
use rookie_core::db::Database;
use rookie_core::jobs::{
    BatchOutcome, InMemoryLogStore, JobConfig, JobRunner, LiveLogStore, LogKind, RunnerSettings,
};
use rookie_core::league::LeagueProvider;
use rookie_core::mock::generator::GeneratorOptions;
use rookie_core::mock::prompt::LEAGUE_HINTS;
use rookie_core::pipeline::{calculate_draft_order_for_league, resolve_league_id, resolve_league_year};
use rookie_core::pool::{load_pool_from_file, POOL_DOCUMENT_KEY};
use rookie_llm::client::LlmClient;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "rookie-mock")]
#[command(about = "Rookie draft order and AI mock drafts for a Sleeper league", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate and publish a mock draft (the default)
    Mock {
        /// Overrides generator.rounds
        #[arg(long)]
        rounds: Option<u32>,
        /// Overrides generator.max_picks
        #[arg(long)]
        max_picks: Option<usize>,
        /// Overrides generator.seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the round-one draft order with current pick owners as JSON
    Order {
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Store a prospect ranking file as the database fallback pool
    ImportPool { path: PathBuf },
    /// List published mock drafts
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Rookie mock starting up");

    // 2. Parse the command line
    let command = Cli::parse().command.unwrap_or(Command::Mock {
        rounds: None,
        max_picks: None,
        seed: None,
    });

    // 3. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} rounds, max {} picks",
        config.league.name, config.generator.rounds, config.generator.max_picks
    );

    // 4. Open database
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 5. Dispatch the command
    match command {
        Command::ImportPool { path } => import_pool(&db, &path),
        Command::List => list_drafts(&db),
        Command::Order { seed } => {
            let provider = SleeperClient::new();
            let league_id = resolve_league(&config, &provider).await?;
            let mut rng = rng_for(seed.or(config.generator.seed));
            let report = calculate_draft_order_for_league(&provider, &league_id, &mut rng).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Mock {
            rounds,
            max_picks,
            seed,
        } => {
            // A missing key is fatal before any league data is fetched.
            let api_key = config.require_api_key()?;
            let provider = SleeperClient::new();
            let league_id = resolve_league(&config, &provider).await?;
            let overrides = MockOverrides {
                rounds,
                max_picks,
                seed,
            };
            run_mock(&config, &db, &provider, &league_id, &api_key, overrides).await
        }
    }
}

/// Command-line overrides of the `[generator]` table.
struct MockOverrides {
    rounds: Option<u32>,
    max_picks: Option<usize>,
    seed: Option<u64>,
}

/// The configured league id, or the commissioner's league found by name.
async fn resolve_league(config: &Config, provider: &dyn LeagueProvider) -> anyhow::Result<String> {
    if let Some(id) = config.league.league_id.as_deref().filter(|id| !id.trim().is_empty()) {
        return Ok(id.trim().to_string());
    }
    let user_id = config.league.commissioner_user_id.as_deref().unwrap_or_default();
    let league_year = resolve_league_year(provider).await?;
    resolve_league_id(provider, user_id, &config.league.name_patterns, league_year).await
}

fn rng_for(seed: Option<u64>) -> ChaCha8Rng {
    seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64)
}

async fn run_mock(
    config: &Config,
    db: &Database,
    provider: &dyn LeagueProvider,
    league_id: &str,
    api_key: &str,
    overrides: MockOverrides,
) -> anyhow::Result<()> {
    let llm = LlmClient::from_config(Some(api_key), &config.llm);
    info!(model = %config.llm.model, active = llm.is_active(), "LLM client initialized");

    let logs = InMemoryLogStore::new(
        config.jobs.max_log_entries,
        Duration::from_secs(config.jobs.log_ttl_secs),
    );

    let generator = &config.generator;
    let settings = RunnerSettings {
        batch_picks: generator.batch_picks,
        batch_time_budget: generator.batch_time_budget(),
        lease: Duration::from_secs(config.jobs.lease_secs),
        pool_path: config.data_paths.player_pool.as_ref().map(PathBuf::from),
        author: config.article.author.clone(),
        generator: GeneratorOptions {
            per_pick_timeout: generator.per_pick_timeout(),
            max_retries: generator.per_pick_max_retries,
            retry_backoff: generator.retry_backoff(),
            league_hints: config
                .league
                .hints
                .clone()
                .unwrap_or_else(|| LEAGUE_HINTS.to_string()),
            ..GeneratorOptions::default()
        },
        ..RunnerSettings::new(league_id)
    };
    let runner = JobRunner::new(db, provider, &llm, &logs, settings);

    let job_config = JobConfig {
        title: config.article.title.clone(),
        description: config.article.description.clone(),
        rounds: overrides.rounds.unwrap_or(generator.rounds),
        max_picks: overrides.max_picks.unwrap_or(generator.max_picks),
        trace: generator.trace,
        model: config.llm.model.clone(),
        seed: overrides.seed.or(generator.seed),
    };
    let job_id = runner.create_job(&job_config, config.article.author.as_deref())?;
    println!("Mock draft job {job_id} started for league {league_id}");

    // Tail the live log while batches run.
    let run = runner.run_to_completion(job_id);
    tokio::pin!(run);
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut since = None;
    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome,
            _ = ticker.tick() => since = print_logs(&logs, job_id, since),
        }
    };
    print_logs(&logs, job_id, since);

    match outcome {
        Ok(BatchOutcome::Done {
            draft_id,
            generated_picks,
        }) => {
            println!("Published mock draft {draft_id} ({generated_picks} picks)");
            if let Some(path) = &config.output.article_path {
                let article = db
                    .load_job(job_id)?
                    .map(|job| job.result.article)
                    .unwrap_or_default();
                write_article(Path::new(path), &article)?;
                info!(job_id, "article written to {path}");
                println!("Article written to {path}");
            }
            Ok(())
        }
        Ok(BatchOutcome::Busy) => {
            println!("Job {job_id} is held by another runner");
            Ok(())
        }
        Ok(BatchOutcome::Finished(status)) => {
            println!("Job {job_id} already finished ({})", status.as_str());
            Ok(())
        }
        Ok(BatchOutcome::Pending { next_index, .. }) => {
            println!("Job {job_id} paused at pick index {next_index}");
            Ok(())
        }
        Err(e) => {
            error!(job_id, "mock draft failed: {e:#}");
            Err(e.context(format!("mock draft job {job_id} failed")))
        }
    }
}

/// Print log lines newer than `since`; returns the newest timestamp seen.
fn print_logs(
    logs: &dyn LiveLogStore,
    job_id: i64,
    since: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let entries = logs.since(job_id, since);
    for entry in &entries {
        let tag = match entry.kind {
            LogKind::Info => "info",
            LogKind::Running => "run",
            LogKind::Pick => "pick",
            LogKind::Done => "done",
            LogKind::Error => "error",
        };
        match &entry.pick_number {
            Some(pick) => println!("[{tag}] {pick} {}", entry.message),
            None => println!("[{tag}] {}", entry.message),
        }
    }
    entries.last().map(|e| e.at).or(since)
}

fn write_article(path: &Path, article: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, article).with_context(|| format!("failed to write {}", path.display()))
}

fn import_pool(db: &Database, path: &Path) -> anyhow::Result<()> {
    let pool = load_pool_from_file(path)?;
    db.save_document(POOL_DOCUMENT_KEY, &serde_json::to_value(pool.prospects())?)?;
    info!(prospects = pool.len(), "player pool imported from {}", path.display());
    println!("Imported {} prospects from {}", pool.len(), path.display());
    Ok(())
}

fn list_drafts(db: &Database) -> anyhow::Result<()> {
    for draft in db.list_mock_drafts()? {
        let marker = if draft.active { "*" } else { " " };
        println!("{marker} {:>4}  {}  {}", draft.id, draft.date, draft.title);
    }
    Ok(())
}

/// Initialize tracing to log to a file (the terminal shows the live log).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("rookie-mock.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("rookie_mock=info,rookie_core=info,rookie_llm=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
