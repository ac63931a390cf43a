//! Merge an autorouter's session result into a KiCad board.
//!
//! The board and the session locate the same anchor footprint in different
//! frames. [`apply_session`] derives the offset between them from that anchor,
//! adds every routed wire as tracks and every via as vias, and serializes the
//! board. When the board still has no vias afterwards, vias are injected from
//! the session text directly.
//!
//! ```no_run
//! use sesmerge_core::{MergeConfig, apply_session_text};
//!
//! let board = std::fs::read_to_string("board.kicad_pcb")?;
//! let ses = std::fs::read_to_string("board.ses")?;
//! let routed = apply_session_text(&board, &ses, &MergeConfig::default())?;
//! std::fs::write("board-routed.kicad_pcb", routed.text)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod inject;
pub mod merge;
pub mod pipeline;
pub mod reconcile;

pub use config::{DefaultVia, MergeConfig};
pub use error::{Error, MergeError};
pub use inject::{Injection, inject_vias};
pub use merge::{MergeStats, merge};
pub use pipeline::{Diagnostic, MergeReport, RoutedBoard, apply_session, apply_session_text};
pub use reconcile::{AffineOffset, AnchorStatus, Reconciliation, reconcile};
