use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use prmine_core::api::GithubTransport;
use prmine_core::config::PrMineConfig;
use prmine_core::progress::IndicatifReporter;
use prmine_core::store::SqliteStore;
use prmine_core::sync::SyncEngine;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Path to the configuration file
    #[arg(long, default_value = "prmine.toml")]
    pub config: PathBuf,

    /// Custom database location (overrides the config)
    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

pub async fn run(args: SyncArgs) -> anyhow::Result<()> {
    let config = PrMineConfig::load(&args.config)?;
    let db_path = args.db_path.unwrap_or_else(|| config.store.db_path.clone());

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Cannot open database: {}", db_path.display()))?;
    let transport = GithubTransport::new();
    let progress = IndicatifReporter::new();

    let mut engine = SyncEngine::new(&store, &transport, &config);
    let stats = engine.run(&progress).await.context("Sync failed")?;

    let counts = store.stats()?;
    println!(
        "Synced {} pull requests across {} pages in {:.1?}",
        stats.pull_requests, stats.pages, stats.duration
    );
    println!();
    println!("  Pull requests:  {}", counts.pull_requests);
    println!("  Authors:        {}", counts.authors);
    println!("  Commits:        {}", counts.commits);
    println!("  Reviews:        {}", counts.reviews);
    println!("  Review threads: {}", counts.review_threads);
    println!("  Comments:       {}", counts.comments);
    println!("  Files:          {}", counts.files);
    println!("  Labels:         {}", counts.labels);
    Ok(())
}
