//! The full merge: session bytes in, routed board text out.

use std::borrow::Cow;
use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;
use sesmerge_board::BoardDocument;

use crate::config::MergeConfig;
use crate::error::Error;
use crate::inject::inject_vias;
use crate::merge::merge;
use crate::reconcile::{AffineOffset, AnchorStatus, reconcile};

/// Non-fatal conditions met during a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The anchor footprint was not found; the identity offset was used.
    AnchorMissing { reference: String, status: AnchorStatus },
    /// A fallback via named a net the board does not have.
    ViaSkipped { net: String },
    /// Wire or via records that appeared outside of any net.
    DiscardedRecords { count: usize },
    /// The session was not valid UTF-8; bad sequences were replaced.
    LossyDecoding,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::AnchorMissing { reference, status } => {
                let side = match status {
                    AnchorStatus::MissingFromBoard => "the board",
                    AnchorStatus::MissingFromSession => "the session",
                    _ => "board and session",
                };
                write!(f, "anchor {reference} missing from {side}; coordinates only flipped")
            }
            Diagnostic::ViaSkipped { net } => write!(f, "via on unknown net '{net}' skipped"),
            Diagnostic::DiscardedRecords { count } => {
                write!(f, "{count} record(s) outside any net ignored")
            }
            Diagnostic::LossyDecoding => write!(f, "session contained invalid UTF-8"),
        }
    }
}

/// What a merge did to the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub nets_created: usize,
    pub tracks_added: usize,
    pub vias_added: usize,
    pub vias_injected: usize,
    pub vias_skipped: usize,
    pub fallback_ran: bool,
    pub anchor: AnchorStatus,
    pub offset: AffineOffset,
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tracks, {} vias, {} new nets",
            self.tracks_added,
            self.vias_added + self.vias_injected,
            self.nets_created
        )?;
        if self.fallback_ran {
            write!(f, " ({} vias injected)", self.vias_injected)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RoutedBoard {
    pub text: String,
    pub report: MergeReport,
}

/// Merge raw session bytes into `board` and serialize the result.
///
/// Fails without producing any text when the session cannot be parsed or a
/// route cannot be placed on the board.
pub fn apply_session(
    mut board: BoardDocument,
    ses_bytes: &[u8],
    config: &MergeConfig,
) -> Result<RoutedBoard, Error> {
    let mut diagnostics = Vec::new();

    let ses_text = String::from_utf8_lossy(ses_bytes);
    if let Cow::Owned(_) = ses_text {
        warn!("Session is not valid UTF-8; invalid bytes were replaced");
        diagnostics.push(Diagnostic::LossyDecoding);
    }

    let session = sesmerge_ses::parse_session(&ses_text, &config.parse_options())?;
    if session.discarded > 0 {
        diagnostics.push(Diagnostic::DiscardedRecords {
            count: session.discarded,
        });
    }

    let reconciliation = reconcile(&board, &session, &config.anchor_reference);
    if !reconciliation.status.is_found() {
        diagnostics.push(Diagnostic::AnchorMissing {
            reference: reconciliation.anchor.clone(),
            status: reconciliation.status.clone(),
        });
    }

    let stats = merge(
        &mut board,
        &session.routes,
        &reconciliation.offset,
        config.default_via.into(),
    )?;
    let mut text = board.to_text();

    let mut report = MergeReport {
        nets_created: stats.nets_created,
        tracks_added: stats.tracks_added,
        vias_added: stats.vias_added,
        vias_injected: 0,
        vias_skipped: 0,
        fallback_ran: false,
        anchor: reconciliation.status,
        offset: reconciliation.offset,
        diagnostics,
    };

    if config.via_fallback && board.vias().is_empty() {
        debug!("Board has no vias after merge; trying text injection");
        let anchor_on_board = board
            .footprint(&config.anchor_reference)
            .map(|fp| fp.position);
        let injection = inject_vias(
            &text,
            &ses_text,
            &board.net_codes(),
            anchor_on_board,
            config,
        )?;
        text = injection.text;
        report.fallback_ran = true;
        report.vias_injected = injection.injected;
        report.vias_skipped = injection.skipped.len();
        report
            .diagnostics
            .extend(injection.skipped.into_iter().map(|net| Diagnostic::ViaSkipped { net }));
    }

    info!("Merged session: {report}");
    Ok(RoutedBoard { text, report })
}

/// [`apply_session`] on board text.
pub fn apply_session_text(
    board_text: &str,
    ses_text: &str,
    config: &MergeConfig,
) -> Result<RoutedBoard, Error> {
    let board = BoardDocument::parse(board_text)?;
    apply_session(board, ses_text.as_bytes(), config)
}
