use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use prmine_core::config::PrMineConfig;
use prmine_core::store::SqliteStore;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to the configuration file
    #[arg(long, default_value = "prmine.toml")]
    pub config: PathBuf,

    /// Custom database location (overrides the config)
    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[allow(clippy::unused_async)]
pub async fn run(args: InitArgs) -> anyhow::Result<()> {
    let config = PrMineConfig::load(&args.config)?;
    let db_path = args.db_path.unwrap_or(config.store.db_path);

    SqliteStore::open(&db_path)
        .with_context(|| format!("Cannot open database: {}", db_path.display()))?;

    println!("Initialized database at {}", db_path.display());
    Ok(())
}
