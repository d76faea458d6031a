use anyhow::{Result, bail};
use clap::Parser;
use futures::{StreamExt, stream};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::Deserialize;
use server::milestones::MILESTONES;

/// Fires concurrent page views at one article and checks that none were lost.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:1111")]
    url: String,

    #[arg(long)]
    article_id: u32,

    #[arg(long, default_value_t = 100)]
    requests: u64,

    #[arg(long, default_value_t = 16)]
    concurrency: usize,
}

#[derive(Deserialize)]
struct PageViewCount {
    page_views: u64,
}

async fn page_views(client: &Client, url: &str) -> Result<u64> {
    let count: PageViewCount = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(count.page_views)
}

async fn record_view(client: &Client, url: &str) -> Result<u64> {
    let count: PageViewCount = client
        .post(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(count.page_views)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = Client::new();
    let views_url = format!(
        "{}/articles/{}/views",
        args.url.trim_end_matches('/'),
        args.article_id
    );

    let before = page_views(&client, &views_url).await?;
    println!("Article {} starts at {before} views", args.article_id);

    let pb = ProgressBar::new(args.requests);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut failures = 0;
    let mut milestones_crossed = Vec::new();

    let mut results = stream::iter(0..args.requests)
        .map(|_| record_view(&client, &views_url))
        .buffer_unordered(args.concurrency.max(1));

    while let Some(result) = results.next().await {
        match result {
            Ok(count) if MILESTONES.contains(&count) => milestones_crossed.push(count),
            Ok(_) => {}
            Err(e) => {
                failures += 1;
                pb.set_message(format!("error: {e}"));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Done");

    let after = page_views(&client, &views_url).await?;
    let recorded = args.requests - failures;
    milestones_crossed.sort_unstable();

    println!("\nRequests: {}", args.requests);
    println!("Failed: {failures}");
    println!("Final views: {after}");
    println!("Milestones handed out: {milestones_crossed:?}");

    if after != before + recorded {
        bail!(
            "Lost updates: expected {} views, found {after}",
            before + recorded
        );
    }

    println!("No lost updates.");
    Ok(())
}
