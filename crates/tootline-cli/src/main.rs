//! tootline - incremental Mastodon timeline fetcher
//!
//! Crawls an account's statuses back to a threshold date, or searches an
//! author's posts, printing results and resume cursors for the caller to
//! persist.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;

#[derive(Parser)]
#[command(name = "tootline")]
#[command(about = "Incremental Mastodon timeline fetcher")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl an account's statuses back to a threshold date
    Fetch(cmd::fetch::FetchArgs),
    /// Search an author's statuses for a free-text query
    Search(cmd::search::SearchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args),
        Command::Search(args) => cmd::search::run(args),
    }
}

fn init_logging(debug: bool) {
    use std::io::Write;

    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();
}
