//! KiCad board model used by the SES merger.
//!
//! A [`BoardDocument`] is loaded from `.kicad_pcb` text, extended with nets,
//! tracks and vias, and written back in pcbnew's own layout. Anything the
//! model does not interpret is carried through verbatim.

pub mod document;
pub mod geometry;
pub mod model;
pub mod netmap;
pub mod nets;
pub mod project;

pub use document::{BoardDocument, PadAssignment};
pub use geometry::{CopperLayer, Mm, Point2D};
pub use model::{Footprint, Net, NetCode, Pad, Track, Via};
pub use netmap::{NetMap, NetMapReport};
pub use nets::NetTable;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Failed to read board: {0}")]
    Syntax(#[from] sesmerge_sexpr::ParseError),

    #[error("Not a KiCad board: root element is ({0} ...)")]
    NotABoard(String),

    #[error("Footprint reference {0} appears more than once")]
    DuplicateReference(String),

    #[error("Net '{name}' is declared with code {first} and with code {second}")]
    NetCodeConflict {
        name: String,
        first: NetCode,
        second: NetCode,
    },

    #[error("Net code {code} is declared for both '{first}' and '{second}'")]
    NetCodeReused {
        code: NetCode,
        first: String,
        second: String,
    },

    #[error("Invalid net code {0}")]
    InvalidNetCode(i64),

    #[error("Net code {0} is not declared in the board")]
    UnknownNet(NetCode),

    #[error("Invalid net map: {0}")]
    NetMap(#[from] serde_json::Error),
}
