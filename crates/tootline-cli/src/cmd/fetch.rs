//! Fetch subcommand - crawl a timeline back to a threshold date

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tootline::{FetchConfig, TimelineClient};

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Instance base URL, e.g. https://mastodon.social
    #[arg(short, long)]
    pub instance: String,

    /// Account handle to crawl (user or user@host)
    #[arg(short, long)]
    pub account: String,

    /// Threshold date (YYYY-MM-DD): stop once a post older than this is seen
    #[arg(short, long, value_parser = parse_date)]
    pub until: NaiveDate,

    /// Resume cursor (id of the oldest post already seen)
    #[arg(long)]
    pub cursor: Option<String>,

    /// Write fetched posts as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Posts per page (server caps at 40)
    #[arg(long)]
    pub page_limit: Option<u32>,

    /// Hard cap on total posts fetched in one run, reblogs included
    #[arg(long)]
    pub fetch_cap: Option<usize>,

    /// Wall-clock budget in seconds for the whole crawl
    #[arg(long)]
    pub time_budget: Option<u64>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date format: {e}"))
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .expect("valid spinner template"),
    );
    pb
}

pub fn run(args: FetchArgs) -> Result<()> {
    let token = std::env::var("MASTODON_ACCESS_TOKEN").ok();

    let mut config = FetchConfig::default();
    if let Some(limit) = args.page_limit {
        config.page_limit = limit;
    }
    if let Some(cap) = args.fetch_cap {
        config.total_fetch_cap = cap;
    }
    if let Some(secs) = args.time_budget {
        config.time_budget = Duration::from_secs(secs);
    }

    let has_token = token.is_some();
    let client = TimelineClient::with_config(&args.instance, token, config);

    if has_token {
        let me = client
            .verify_credentials()
            .context("Access token rejected by instance")?;
        log::debug!("authenticated as @{}", me.acct);
    }

    let account = client
        .lookup_account(&args.account)
        .with_context(|| format!("Cannot resolve account {}", args.account))?;
    log::info!("crawling @{} (id {})", account.acct, account.id);

    let until: DateTime<Utc> = args.until.and_time(NaiveTime::MIN).and_utc();

    let pb = spinner();
    let mut on_progress = |count: usize| {
        pb.set_message(format!("{count} posts collected"));
        pb.tick();
    };
    let outcome = client
        .statuses_until(&account.id, until, args.cursor.as_deref(), Some(&mut on_progress))
        .context("Crawl failed")?;
    pb.finish_and_clear();

    if outcome.reached_threshold {
        log::info!(
            "reached {}: {} posts collected",
            args.until,
            outcome.statuses.len()
        );
    } else {
        log::warn!(
            "stopped before {} (budget or end of timeline): {} posts collected",
            args.until,
            outcome.statuses.len()
        );
    }
    if outcome.fell_back {
        log::warn!("token lacked permission for this timeline, used public access");
    }
    if let Some(cursor) = &outcome.last_cursor {
        log::info!("resume cursor: {cursor}");
    }

    if let Some(path) = &args.output {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Cannot create {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &outcome.statuses)
            .context("Cannot serialize posts")?;
        log::info!("wrote {} posts to {}", outcome.statuses.len(), path.display());
    } else {
        println!("{} posts fetched", outcome.statuses.len());
    }

    Ok(())
}
