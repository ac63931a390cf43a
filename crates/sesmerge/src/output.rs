//! Output file naming and writing.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use atomicwrites::{AtomicFile, OverwriteBehavior};

/// `boards/main.kicad_pcb` -> `boards/main-routed.kicad_pcb`.
pub fn routed_board_path(board: &Path) -> PathBuf {
    let stem = board
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "board".to_string());
    board.with_file_name(format!("{stem}-routed.kicad_pcb"))
}

/// `main.dsn` -> `main.ses`.
pub fn session_path(dsn: &Path) -> PathBuf {
    dsn.with_extension("ses")
}

/// Write `contents` so that readers never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(contents)?;
            f.flush()
        })
        .map_err(|err| anyhow!("Failed to write {}: {err}", path.display()))?;
    log::debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}
