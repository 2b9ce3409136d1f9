pub mod init;
pub mod sync;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or verify the database schema (idempotent)
    Init(init::InitArgs),
    /// Mine pull-request activity into the database
    Sync(sync::SyncArgs),
}

pub async fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Init(args) => init::run(args).await,
        Command::Sync(args) => sync::run(args).await,
    }
}
