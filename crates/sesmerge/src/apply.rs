use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sesmerge_board::{BoardDocument, NetMap, project};
use sesmerge_core::{MergeReport, apply_session};

use crate::config::Config;
use crate::output::{routed_board_path, write_atomic};

#[derive(Args, Debug, Clone)]
#[command(about = "Merge a routed .ses session into a .kicad_pcb board")]
pub struct ApplyArgs {
    /// Board to merge into
    #[arg(value_name = "BOARD", value_hint = clap::ValueHint::FilePath)]
    pub board: PathBuf,

    /// Session file written by the autorouter
    #[arg(value_name = "SES", value_hint = clap::ValueHint::FilePath)]
    pub ses: PathBuf,

    #[command(flatten)]
    pub merge: MergeArgs,
}

/// Options shared by `apply` and `route`.
#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    /// Where to write the routed board [default: <BOARD stem>-routed.kicad_pcb]
    #[arg(short, long, value_name = "OUT")]
    pub output: Option<PathBuf>,

    /// TOML settings file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON pad-to-net assignments applied before merging
    #[arg(long, value_name = "FILE")]
    pub net_map: Option<PathBuf>,

    /// Project .kicad_prl to rewrite next to the output with the drawing sheet hidden
    #[arg(long, value_name = "FILE")]
    pub prl: Option<PathBuf>,

    /// Print the merge report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ApplyArgs) -> Result<()> {
    let config = Config::load(args.merge.config.as_deref())?;
    let ses = std::fs::read(&args.ses)
        .with_context(|| format!("Failed to read session {}", args.ses.display()))?;
    merge_into_board(&args.board, &ses, &config, &args.merge)
}

/// Merge `ses` into the board at `board_path` and write every output.
///
/// Nothing is written unless all steps succeed.
pub fn merge_into_board(
    board_path: &Path,
    ses: &[u8],
    config: &Config,
    args: &MergeArgs,
) -> Result<()> {
    let board_text = std::fs::read_to_string(board_path)
        .with_context(|| format!("Failed to read board {}", board_path.display()))?;
    let mut board = BoardDocument::parse(&board_text)
        .with_context(|| format!("Failed to load board {}", board_path.display()))?;

    if let Some(path) = &args.net_map {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read net map {}", path.display()))?;
        let net_map = NetMap::from_json(&text)
            .with_context(|| format!("Failed to load net map {}", path.display()))?;
        let applied = net_map.apply(&mut board);
        log::info!(
            "Net map: {} pads assigned, {} unknown footprints, {} unknown pads",
            applied.assigned,
            applied.unknown_footprints.len(),
            applied.unknown_pads.len()
        );
    }

    let routed = apply_session(board, ses, &config.merge).context("Failed to merge session")?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| routed_board_path(board_path));

    let prl = match &args.prl {
        Some(path) => {
            let existing = match std::fs::read_to_string(path) {
                Ok(text) => Some(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", path.display()));
                }
            };
            let prl_path = output.with_extension("kicad_prl");
            let name = prl_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Some((prl_path, project::hide_drawing_sheet(existing.as_deref(), &name)))
        }
        None => None,
    };

    write_atomic(&output, routed.text.as_bytes())?;
    if let Some((path, text)) = &prl {
        write_atomic(path, text.as_bytes())?;
    }

    print_report(&routed.report, &output, args.json)
}

fn print_report(report: &MergeReport, output: &Path, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{} {}", "Routed".green().bold(), output.display());
    println!("  {report}");
    for diagnostic in &report.diagnostics {
        println!("  {} {diagnostic}", "warning:".yellow());
    }
    Ok(())
}
