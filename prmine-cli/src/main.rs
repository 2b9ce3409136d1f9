use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "prmine",
    version,
    about = "Mine pull-request activity into a SQLite database"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory for per-run error logs
    #[arg(long, default_value = "logs", global = true)]
    log_dir: std::path::PathBuf,
}

/// Classify an error into an exit code.
///
/// Exit codes:
///   0: success
///   1: general/unknown error
///   2: configuration error
///   4: database error
///   5: API error (auth, rate limit, transport)
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    let lower = format!("{err:#}").to_lowercase();

    if lower.contains("config") || lower.contains("parse error") {
        2
    } else if lower.contains("database") || lower.contains("sqlite") || lower.contains("store") {
        4
    } else if lower.contains("rate limit")
        || lower.contains("unauthorized")
        || lower.contains("credential")
        || lower.contains("api error")
        || lower.contains("transport")
    {
        5
    } else {
        1
    }
}

/// Create `logs/sync_<timestamp>.log` for this run's error diagnostics.
fn open_run_log(dir: &Path) -> std::io::Result<File> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Local::now().format("%Y_%m_%d__%H_%M_%S");
    File::create(dir.join(format!("sync_{stamp}.log")))
}

fn init_tracing(filter: &str, run_log: Option<File>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);
    let registry = tracing_subscriber::registry().with(stderr_layer);

    // The run log only carries error-level diagnostics; it is not
    // required for correctness, so failure to open it never aborts.
    if let Some(file) = run_log {
        registry
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::ERROR),
            )
            .init();
    } else {
        registry.init();
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    let run_log = match &cli.command {
        commands::Command::Sync(_) => match open_run_log(&cli.log_dir) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Warning: cannot open run log: {e}");
                None
            }
        },
        commands::Command::Init(_) => None,
    };

    init_tracing(filter, run_log);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(commands::run(cli.command)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
