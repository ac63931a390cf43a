//! Specctra Session (SES) reader.
//!
//! An autorouter reports its result as SES text: per-net wire paths and vias,
//! plus the component placements it routed against. This crate recovers that
//! subset in two stages, a [`Tokenizer`] producing typed [`Event`]s and a
//! [`Reducer`] folding them into [`NetRoute`]s with coordinates converted to
//! millimetres (still in the autorouter's frame).
//!
//! ```
//! let routes = sesmerge_ses::parse(
//!     "(session s (routes (resolution mm 10) (network_out
//!        (net GPIO1 (wire (path F.Cu 2 0 0 100 0)) (via 100 0)))))",
//! ).unwrap();
//! assert_eq!(routes[0].net_name, "GPIO1");
//! assert_eq!(routes[0].wires[0].points.len(), 2);
//! assert_eq!(routes[0].vias.len(), 1);
//! ```

mod lexer;
pub mod padstack;
pub mod reducer;
pub mod tokenizer;
pub mod units;

pub use padstack::{ViaSize, size_from_padstack};
pub use reducer::{NetRoute, Placement, Reducer, Session, ViaEntry, WirePath};
pub use tokenizer::{Event, Tokenizer};
pub use units::{LengthUnit, Resolution};

use thiserror::Error;

/// Default bound on how many lines one wire or via block may span.
pub const DEFAULT_MAX_BLOCK_LINES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: unexpected ')' with no open block")]
    UnexpectedClose { line: usize },

    #[error("line {line}: ({keyword} ...) is never closed")]
    Unclosed { keyword: String, line: usize },

    #[error("line {line}: ({keyword} ...) is still open after {limit} lines")]
    RunawayBlock {
        keyword: String,
        line: usize,
        limit: usize,
    },

    #[error("line {line}: '{token}' is not a number")]
    InvalidNumber { token: String, line: usize },

    #[error("line {line}: incomplete ({keyword} ...): {detail}")]
    IncompleteRecord {
        keyword: String,
        line: usize,
        detail: String,
    },

    #[error("line {line}: unknown resolution unit '{unit}'")]
    UnknownUnit { unit: String, line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub max_block_lines: usize,
    /// Read vias and placements only; wire blocks are not interpreted.
    pub skip_wires: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_block_lines: DEFAULT_MAX_BLOCK_LINES,
            skip_wires: false,
        }
    }
}

/// Parse a whole session: resolution, placements and routes.
///
/// Any structural error aborts the parse; no partial session is returned.
pub fn parse_session(text: &str, options: &ParseOptions) -> Result<Session, ParseError> {
    let mut reducer = Reducer::new();
    let mut events = 0usize;
    for event in Tokenizer::new(text, options.max_block_lines).skip_wires(options.skip_wires) {
        reducer.apply(event?);
        events += 1;
    }
    let session = reducer.finish();
    log::debug!(
        "Parsed session: {events} events, {} nets, {} wires, {} vias, {} placements",
        session.routes.len(),
        session.wire_count(),
        session.via_count(),
        session.placements.len()
    );
    if session.discarded > 0 {
        log::debug!("Discarded {} records outside of any net", session.discarded);
    }
    Ok(session)
}

/// Parse the routes of a session with default options.
pub fn parse(text: &str) -> Result<Vec<NetRoute>, ParseError> {
    Ok(parse_session(text, &ParseOptions::default())?.routes)
}

/// Every via with the name of its net, grouped by net in first-seen order.
///
/// Wire blocks are skipped without being checked.
pub fn parse_vias(text: &str, options: &ParseOptions) -> Result<Vec<(String, ViaEntry)>, ParseError> {
    let options = ParseOptions {
        skip_wires: true,
        ..*options
    };
    let session = parse_session(text, &options)?;
    Ok(session
        .routes
        .into_iter()
        .flat_map(|route| {
            let name = route.net_name;
            route.vias.into_iter().map(move |via| (name.clone(), via))
        })
        .collect())
}
