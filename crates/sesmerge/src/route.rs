use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::apply::{MergeArgs, merge_into_board};
use crate::autoroute::run_autorouter;
use crate::config::Config;

#[derive(Args, Debug, Clone)]
#[command(about = "Autoroute a .dsn design and merge the result into its board")]
pub struct RouteArgs {
    /// Board to merge into
    #[arg(value_name = "BOARD", value_hint = clap::ValueHint::FilePath)]
    pub board: PathBuf,

    /// Specctra design exported from BOARD
    #[arg(value_name = "DSN", value_hint = clap::ValueHint::FilePath)]
    pub dsn: PathBuf,

    #[command(flatten)]
    pub merge: MergeArgs,
}

pub fn execute(args: RouteArgs) -> Result<()> {
    let config = Config::load(args.merge.config.as_deref())?;
    let ses = run_autorouter(&args.dsn, &config)?;
    log::debug!("Autorouter returned {} bytes of session", ses.len());
    merge_into_board(&args.board, &ses, &config, &args.merge)
}
