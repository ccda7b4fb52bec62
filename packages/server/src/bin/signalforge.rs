//! SignalForge command line
//!
//! One binary for the long-running service (scheduler and/or REST API) and
//! the operator commands around it.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use server_core::kernel::{connect_repository, start_scheduler, telegram_notifier, ServerDeps};
use server_core::server::{serve, AppState};
use server_core::Config;
use signal_pipeline::{
    render_job_alert, CancellationToken, JobFilter, JobStore, Notifier, RunOutcome, ScoredJob,
    SignalStore, TrendEngine,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info,signal_pipeline=debug,server_core=debug,sqlx=warn";

#[derive(Parser)]
#[command(name = "signalforge")]
#[command(about = "Real-time signal engine for jobs, trends, and market patterns")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RunMode {
    Scheduler,
    Api,
    Both,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and create the database schema
    Init,

    /// Run the service
    Run {
        #[arg(long, value_enum, default_value_t = RunMode::Both)]
        mode: RunMode,
    },

    /// Run the pipeline once
    Collect,

    /// Send the top stored postings through the notifier (does not mark them alerted)
    TestAlert {
        #[arg(long, default_value_t = 5)]
        count: u32,
    },

    /// Show database statistics
    Stats,

    /// List stored jobs, best score first
    ListJobs {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        min_score: u8,
        #[arg(long)]
        location: Option<String>,
    },

    /// Analyze trends over every stored posting
    Trends,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env before logging so LOG_LEVEL can come from it
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Run { mode } => cmd_run(mode).await,
        Commands::Collect => cmd_collect().await,
        Commands::TestAlert { count } => cmd_test_alert(count).await,
        Commands::Stats => cmd_stats().await,
        Commands::ListJobs {
            limit,
            min_score,
            location,
        } => cmd_list_jobs(limit, min_score, location).await,
        Commands::Trends => cmd_trends().await,
        Commands::Version => {
            println!("SignalForge v{}", env!("CARGO_PKG_VERSION"));
            println!("Real-time signal engine for jobs, trends, and market patterns");
            Ok(())
        }
    }
}

fn init_logging() {
    // RUST_LOG wins, then LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| match std::env::var("LOG_LEVEL") {
            Ok(level) if !level.trim().is_empty() => EnvFilter::try_new(level.to_lowercase()),
            _ => EnvFilter::try_new(DEFAULT_LOG_FILTER),
        })
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn load_deps() -> Result<ServerDeps> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    ServerDeps::from_config(config).await
}

async fn cmd_init() -> Result<()> {
    tracing::info!("Initializing SignalForge...");
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;

    connect_repository(&config.database_url).await?;

    tracing::info!(database = %config.database_url, "Database schema ready");
    tracing::info!(alert_threshold = config.alert_threshold, "SignalForge initialized");
    Ok(())
}

async fn cmd_run(mode: RunMode) -> Result<()> {
    let deps = load_deps().await?;
    let shutdown = CancellationToken::new();
    tracing::info!(?mode, "Starting SignalForge");

    let mut scheduler = match mode {
        RunMode::Scheduler | RunMode::Both => Some(
            start_scheduler(
                deps.orchestrator.clone(),
                deps.config.collector_interval(),
                shutdown.clone(),
            )
            .await
            .context("Failed to start scheduler")?,
        ),
        RunMode::Api => None,
    };

    let ctrl_c = {
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down SignalForge...");
            shutdown.cancel();
        }
    };

    match mode {
        RunMode::Api | RunMode::Both => {
            tokio::spawn(ctrl_c);
            let state = AppState::from_deps(&deps, shutdown.clone());
            serve(state, &deps.config.bind_address()).await?;
        }
        RunMode::Scheduler => ctrl_c.await,
    }

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.shutdown().await.context("Failed to stop scheduler")?;
    }

    // Let an in-flight run reach a stopping point
    for _ in 0..100 {
        if !deps.orchestrator.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}

async fn cmd_collect() -> Result<()> {
    let deps = load_deps().await?;
    tracing::info!("Running collectors...");

    match deps.orchestrator.run_once(&CancellationToken::new()).await? {
        RunOutcome::Completed(report) => {
            println!("Run {}", report.run_id);
            println!("  collected:       {}", report.collected);
            println!("  processed:       {}", report.processed);
            println!("  created:         {}", report.created);
            println!("  updated:         {}", report.updated);
            println!("  unchanged:       {}", report.unchanged);
            println!("  alert candidates {}", report.candidates);
            println!("  alerted:         {}", report.alerted);
            println!("  anomalies:       {}", report.anomalies);
            if report.is_degraded() {
                println!(
                    "  failures:        producers={} normalization={} persist={} alerts={}",
                    report.producer_failures,
                    report.normalization_failures,
                    report.persist_failures,
                    report.alert_failures
                );
            }
        }
        RunOutcome::AlreadyRunning => println!("A run is already in progress"),
    }
    Ok(())
}

async fn cmd_test_alert(count: u32) -> Result<()> {
    let deps = load_deps().await?;

    let filter = JobFilter {
        limit: count.max(1),
        ..Default::default()
    };
    let jobs = deps.repository.list_jobs(&filter).await?;
    if jobs.is_empty() {
        tracing::warn!("No jobs found in database. Run 'signalforge collect' first.");
        return Ok(());
    }
    tracing::info!(count = jobs.len(), "Testing alert system with stored jobs");

    if let Some(telegram) = telegram_notifier(&deps.config)? {
        let bot = telegram
            .test_connection()
            .await
            .context("Telegram connection check failed")?;
        tracing::info!(bot = %bot, "Telegram bot connected");
    }

    let pacing = deps.config.pipeline_config().alert_pacing;
    let mut sent = 0;
    for (i, job) in jobs.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pacing).await;
        }
        let message = render_job_alert(&job.to_scored());
        match deps.notifier.send(&message).await {
            Ok(()) => {
                sent += 1;
                tracing::info!(job_id = %job.id, score = job.score, "Sent alert for {} at {}", job.title, job.company);
            }
            Err(e) => tracing::warn!(job_id = %job.id, error = %e, "Failed to send alert for {}", job.title),
        }
    }

    println!("{}/{} alerts sent", sent, jobs.len());
    Ok(())
}

async fn cmd_stats() -> Result<()> {
    let deps = load_deps().await?;
    let since = chrono::Utc::now() - chrono::Duration::days(7);
    let stats = deps
        .repository
        .job_stats(deps.config.alert_threshold, since)
        .await?;
    let signals = deps.repository.count_signals().await?;

    println!("SignalForge Statistics");
    println!("  Total jobs:      {}", stats.total_jobs);
    println!("  High score jobs: {} (>= {})", stats.high_score_jobs, deps.config.alert_threshold);
    println!("  Alerted jobs:    {}", stats.alerted_jobs);
    println!("  Recent jobs (7d): {}", stats.recent_jobs);
    println!("  Total signals:   {}", signals);
    Ok(())
}

async fn cmd_list_jobs(limit: u32, min_score: u8, location: Option<String>) -> Result<()> {
    let deps = load_deps().await?;
    let filter = JobFilter {
        limit: limit.max(1),
        min_score: (min_score > 0).then_some(min_score),
        location,
        ..Default::default()
    };

    let jobs = deps.repository.list_jobs(&filter).await?;
    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    println!("Found {} jobs:\n", jobs.len());
    for job in &jobs {
        println!("{}", "=".repeat(80));
        println!("{} - {}", job.company, job.title);
        println!("  Location: {}", job.location);
        println!("  Score:    {}", job.score);
        println!("  URL:      {}", job.url);
        println!("  Posted:   {}", job.posted_at.to_rfc3339());
        if !job.stack.is_empty() {
            println!("  Stack:    {}", job.stack);
        }
    }
    Ok(())
}

async fn cmd_trends() -> Result<()> {
    let deps = load_deps().await?;

    let mut jobs: Vec<ScoredJob> = Vec::new();
    let mut filter = JobFilter {
        limit: 200,
        ..Default::default()
    };
    loop {
        let page = deps.repository.list_jobs(&filter).await?;
        let done = page.len() < filter.limit as usize;
        jobs.extend(page.iter().map(|job| job.to_scored()));
        if done {
            break;
        }
        filter.offset += filter.limit;
    }

    if jobs.is_empty() {
        tracing::warn!("No jobs in database. Run 'signalforge collect' first.");
        return Ok(());
    }

    let report = TrendEngine::new().analyze(&jobs);
    let line = "=".repeat(80);

    println!("{}\nJOB MARKET TRENDS ANALYSIS\n{}\n", line, line);
    println!("Total jobs analyzed: {}", report.total_analyzed);
    println!("Recent jobs (3 days): {}", report.recent_count);
    println!("Mean score: {:.1}\n", report.mean_score);

    for (heading, unit, entries) in [
        ("TOP TRENDING KEYWORDS", "jobs", &report.trending_keywords),
        ("TOP TECHNOLOGIES", "mentions", &report.top_technologies),
        ("TOP HIRING COMPANIES", "positions", &report.top_hiring_companies),
        ("TOP LOCATIONS", "jobs", &report.top_locations),
    ] {
        println!("{}:", heading);
        for entry in entries {
            println!("  {}: {} {}", entry.value, entry.count, unit);
        }
        println!();
    }

    if !report.anomalies.is_empty() {
        println!("ANOMALIES DETECTED ({}):", report.anomalies.len());
        for anomaly in report.anomalies.iter().take(5) {
            let job = &anomaly.job.job;
            println!("  {} at {}", job.title, job.company);
            println!("     Score: {} - {}", anomaly.job.score, anomaly.reason);
        }
    }
    Ok(())
}
