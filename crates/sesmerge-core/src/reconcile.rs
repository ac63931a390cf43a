//! Anchor-based translation from the autorouter frame to the board frame.
//!
//! The session and the board place the same anchor footprint at different
//! coordinates, and the session's Y axis points up where the board's points
//! down. With the anchor at `(bx, by)` on the board and `(sx, sy)` in the
//! session:
//!
//! ```text
//! board_x = x + (bx - sx)
//! board_y = (by + sy) - y
//! ```

use std::fmt;

use log::warn;
use serde::Serialize;
use sesmerge_board::{BoardDocument, Mm, Point2D};
use sesmerge_ses::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AffineOffset {
    pub dx: Mm,
    pub y_ref: Mm,
}

impl AffineOffset {
    /// `dx = 0`, `y_ref = 0`: the axis flip still applies.
    pub const IDENTITY: AffineOffset = AffineOffset {
        dx: Mm::ZERO,
        y_ref: Mm::ZERO,
    };

    /// Offset that maps the anchor's session position onto its board position.
    pub fn from_anchor(board: Point2D, session: Point2D) -> Self {
        Self {
            dx: board.x - session.x,
            y_ref: board.y + session.y,
        }
    }

    pub fn apply(&self, point: Point2D) -> Point2D {
        Point2D {
            x: point.x + self.dx,
            y: self.y_ref - point.y,
        }
    }
}

impl fmt::Display for AffineOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dx={} y_ref={}", self.dx, self.y_ref)
    }
}

/// Where the anchor was (or was not) found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnchorStatus {
    Found { board: Point2D, session: Point2D },
    MissingFromBoard,
    MissingFromSession,
    MissingFromBoth,
}

impl AnchorStatus {
    pub fn is_found(&self) -> bool {
        matches!(self, AnchorStatus::Found { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub anchor: String,
    pub offset: AffineOffset,
    pub status: AnchorStatus,
}

/// Derive the frame offset from `anchor` in both documents.
///
/// A missing anchor is not fatal: the identity offset is used and the
/// condition is logged and reported through [`Reconciliation::status`].
pub fn reconcile(board: &BoardDocument, session: &Session, anchor: &str) -> Reconciliation {
    let on_board = board.footprint(anchor).map(|fp| fp.position);
    let in_session = session.placement(anchor).map(|p| p.position);

    let status = match (on_board, in_session) {
        (Some(board), Some(session)) => AnchorStatus::Found { board, session },
        (None, Some(_)) => AnchorStatus::MissingFromBoard,
        (Some(_), None) => AnchorStatus::MissingFromSession,
        (None, None) => AnchorStatus::MissingFromBoth,
    };

    let offset = match &status {
        AnchorStatus::Found { board, session } => {
            let offset = AffineOffset::from_anchor(*board, *session);
            log::debug!("Anchor {anchor}: board {board}, session {session}, {offset}");
            offset
        }
        missing => {
            warn!("Anchor footprint {anchor} not usable ({missing:?}); using identity offset");
            AffineOffset::IDENTITY
        }
    };

    Reconciliation {
        anchor: anchor.to_string(),
        offset,
        status,
    }
}
