use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use connectors::config::SyncConfig;
use connectors::sinks::{
    Airtable, DryRunContentSink, MemoryMetricsSink, Sheets, SubjectEntry, SubjectStore,
};
use connectors::sources::RocketApi;
use connectors::{RunSummary, SyncOptions, Syncer};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "instasync",
    about = "Sync Instagram follower counts and posts into Airtable and Google Sheets"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync metrics and posts for every tracked account (the default).
    Sync(SyncArgs),

    /// List the accounts configured in the Airtable accounts table.
    Accounts,
}

#[derive(Args, Default)]
struct SyncArgs {
    /// Only sync these usernames (repeatable).
    #[arg(long = "account", value_name = "USERNAME")]
    accounts: Vec<String>,

    /// Stop each account's pagination after this many pages.
    #[arg(long)]
    max_pages: Option<usize>,

    /// Do not fetch or write follower counts.
    #[arg(long)]
    skip_metrics: bool,

    /// Do not fetch or write posts.
    #[arg(long)]
    skip_posts: bool,

    /// Read from Airtable and RocketAPI but write nothing; report what would change.
    #[arg(long)]
    dry_run: bool,
}

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => run_sync(SyncArgs::default()),
        Some(Commands::Sync(args)) => run_sync(args),
        Some(Commands::Accounts) => run_accounts(),
    }
}

fn run_sync(args: SyncArgs) -> Result<()> {
    let config = SyncConfig::from_env()?;
    let airtable = Airtable::new(&config.airtable).context("build Airtable client")?;
    let rocketapi = RocketApi::new(&config.rocketapi).context("build RocketAPI client")?;
    let sheets = config
        .sheets
        .as_ref()
        .map(Sheets::new)
        .transpose()
        .context("build Google Sheets client")?;

    println!("Fetching all Instagram accounts from Airtable...");
    let entries = airtable
        .list_subjects()
        .context("fetch accounts from Airtable")?;
    let entries = select_accounts(entries, &args.accounts);
    println!("Found {} accounts.", entries.len());

    let options = SyncOptions {
        max_pages: args.max_pages.or(config.max_pages),
        metrics: !args.skip_metrics,
        posts: !args.skip_posts,
    };

    let summary = if args.dry_run {
        let content = DryRunContentSink::new(&airtable);
        let metrics = MemoryMetricsSink::default();
        let summary = Syncer::new(&rocketapi, &content, options)
            .with_metrics_sink(&metrics)
            .run(entries);
        for m in metrics.snapshots() {
            println!("[dry-run] @{} followers={}", m.username, m.followers);
        }
        for post in content.would_create() {
            println!("[dry-run] create {}", post.permalink);
        }
        for post in content.would_update() {
            println!("[dry-run] update {}", post.permalink);
        }
        summary
    } else {
        let mut syncer = Syncer::new(&rocketapi, &airtable, options).with_metrics_sink(&airtable);
        if let Some(sheets) = sheets.as_ref() {
            syncer = syncer.with_metrics_sink(sheets);
        }
        syncer.run(entries)
    };

    println!("{}", summary_line(&summary));
    Ok(())
}

fn run_accounts() -> Result<()> {
    let config = SyncConfig::from_env()?;
    let airtable = Airtable::new(&config.airtable).context("build Airtable client")?;
    let entries = airtable
        .list_subjects()
        .context("fetch accounts from Airtable")?;

    for entry in &entries {
        match entry.username.as_deref() {
            Some(username) => println!(
                "{}\t@{}\tuser_id={}\tsheet={}",
                entry.record_id,
                username,
                entry.user_id.as_deref().unwrap_or("-"),
                entry.destination.as_deref().unwrap_or("-"),
            ),
            None => println!("{}\t(no username; will be skipped)", entry.record_id),
        }
    }
    println!("{} accounts", entries.len());
    Ok(())
}

/// Narrows `entries` to the requested usernames; no filter keeps everything.
fn select_accounts(entries: Vec<SubjectEntry>, wanted: &[String]) -> Vec<SubjectEntry> {
    if wanted.is_empty() {
        return entries;
    }
    let normalize = |name: &str| name.trim().trim_start_matches('@').to_lowercase();
    let wanted: Vec<String> = wanted.iter().map(|w| normalize(w.as_str())).collect();

    for name in &wanted {
        let known = entries
            .iter()
            .any(|e| e.username.as_deref().map(normalize).as_ref() == Some(name));
        if !known {
            warn!(username = %name, "requested account is not in the accounts table");
        }
    }

    entries
        .into_iter()
        .filter(|e| {
            e.username
                .as_deref()
                .map(|u| wanted.contains(&normalize(u)))
                .unwrap_or(false)
        })
        .collect()
}

fn summary_line(summary: &RunSummary) -> String {
    format!(
        "Sync complete: synced={} failed={} skipped={} posts_created={} posts_updated={} posts_skipped={} pages={}",
        summary.subjects_synced,
        summary.subjects_failed,
        summary.subjects_skipped,
        summary.posts_created,
        summary.posts_updated,
        summary.posts_skipped,
        summary.pages,
    )
}
