use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sesmerge_autoroute::Autorouter;

use crate::config::Config;
use crate::output::{session_path, write_atomic};

#[derive(Args, Debug, Clone)]
#[command(about = "Run the autorouter on a .dsn design and save the session")]
pub struct AutorouteArgs {
    /// Specctra design exported from the board
    #[arg(value_name = "DSN", value_hint = clap::ValueHint::FilePath)]
    pub dsn: PathBuf,

    /// Where to write the session [default: <DSN stem>.ses]
    #[arg(short, long, value_name = "OUT")]
    pub output: Option<PathBuf>,

    /// TOML settings file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

pub fn execute(args: AutorouteArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let ses = run_autorouter(&args.dsn, &config)?;

    let output = args.output.unwrap_or_else(|| session_path(&args.dsn));
    write_atomic(&output, &ses)?;
    println!("{} {}", "Routed".green().bold(), output.display());
    Ok(())
}

/// Route the design at `dsn` and return the session bytes.
pub fn run_autorouter(dsn: &std::path::Path, config: &Config) -> Result<Vec<u8>> {
    let design = std::fs::read(dsn)
        .with_context(|| format!("Failed to read design {}", dsn.display()))?;
    let router = Autorouter::locate(&config.autorouter)?;
    router
        .route(&design)
        .with_context(|| format!("Failed to autoroute {}", dsn.display()))
}
