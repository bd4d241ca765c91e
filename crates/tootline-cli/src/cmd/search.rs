//! Search subcommand - free-text query scoped to one author

use anyhow::{Context, Result};
use clap::Args;
use tootline::TimelineClient;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Instance base URL, e.g. https://mastodon.social
    #[arg(short, long)]
    pub instance: String,

    /// Author handle to scope the search to (user or user@host)
    #[arg(short, long)]
    pub account: String,

    /// Free-text query
    #[arg(short, long)]
    pub query: String,

    /// Maximum results
    #[arg(short, long, default_value_t = 20)]
    pub limit: u32,
}

pub fn run(args: SearchArgs) -> Result<()> {
    let token = std::env::var("MASTODON_ACCESS_TOKEN").ok();
    let client = TimelineClient::new(&args.instance, token);

    let statuses = client
        .search_statuses(&args.query, &args.account, args.limit)
        .context("Search failed")?;

    if statuses.is_empty() {
        println!("no matches");
        return Ok(());
    }
    for status in &statuses {
        println!(
            "{}  {}  {}",
            status.created_at.format("%Y-%m-%d %H:%M"),
            status.id,
            status.content.as_deref().map(strip_tags).unwrap_or_default()
        );
    }
    Ok(())
}

/// Drop HTML tags for one-line terminal display; entities are left as-is
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
