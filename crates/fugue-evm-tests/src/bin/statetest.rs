//! Runs GeneralStateTests-style fixtures against the fugue EVM.

use anyhow::{bail, Context, Result};
use clap::Parser;
use fugue_evm::Fork;
use fugue_evm_tests::TestRunner;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// fugue state test runner
#[derive(Parser, Debug)]
#[command(name = "fugue-statetest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Fixture file or directory
    path: PathBuf,

    /// Fork to test (fixture naming, e.g. Cancun, Merge, EIP158)
    #[arg(long, default_value = "Cancun")]
    fork: String,

    /// Log every test case
    #[arg(short, long)]
    verbose: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let fork: Fork = cli
        .fork
        .parse()
        .with_context(|| format!("parsing fork `{}`", cli.fork))?;
    let runner = TestRunner::new(fork, cli.verbose);
    let stats = runner
        .run(&cli.path)
        .with_context(|| format!("running {}", cli.path.display()))?;

    println!("{stats}");
    if !stats.is_clean() {
        bail!("{} failed, {} unreadable", stats.failed, stats.broken_files.len());
    }
    Ok(())
}
