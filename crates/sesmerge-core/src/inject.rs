//! Textual via injection into an already serialized board.
//!
//! Used when the object-level merge left the board without a single via. The
//! session is read again for via records only, and each via whose net is in
//! the board's net table is written as a `(via ...)` block just before the
//! board's closing parenthesis.

use std::collections::BTreeMap;

use log::{debug, warn};
use sesmerge_board::{NetCode, Point2D, Via};
use sesmerge_ses::ParseOptions;
use sesmerge_sexpr::PatchSet;
use sesmerge_sexpr::formatter::{FormatMode, format_block};

use crate::config::MergeConfig;
use crate::error::{Error, MergeError};
use crate::reconcile::AffineOffset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub text: String,
    pub injected: usize,
    /// Net names of vias skipped because the board has no such net.
    pub skipped: Vec<String>,
}

/// Append the session's vias to `board_text`.
///
/// `anchor_on_board` is the anchor footprint's board position; the transform
/// is rebuilt from it and the session's own placement of the same anchor.
/// Wire blocks in `ses_text` are skipped unread, so only malformed vias,
/// placements or structure can fail this pass.
pub fn inject_vias(
    board_text: &str,
    ses_text: &str,
    net_codes: &BTreeMap<String, NetCode>,
    anchor_on_board: Option<Point2D>,
    config: &MergeConfig,
) -> Result<Injection, Error> {
    let options = ParseOptions {
        skip_wires: true,
        ..config.parse_options()
    };
    let session = sesmerge_ses::parse_session(ses_text, &options)?;
    let anchor_in_session = session
        .placement(&config.anchor_reference)
        .map(|p| p.position);

    let offset = match (anchor_on_board, anchor_in_session) {
        (Some(board), Some(ses)) => AffineOffset::from_anchor(board, ses),
        _ => {
            warn!(
                "Via injection: anchor {} not found on both sides; using identity offset",
                config.anchor_reference
            );
            AffineOffset::IDENTITY
        }
    };

    let mut blocks = String::new();
    let mut injected = 0;
    let mut skipped = Vec::new();

    for route in &session.routes {
        for entry in &route.vias {
            let Some(&net) = net_codes.get(&route.net_name) else {
                warn!(
                    "Via injection: net '{}' is not on the board; skipping via",
                    route.net_name
                );
                skipped.push(route.net_name.clone());
                continue;
            };

            let size = entry.size_or(config.default_via.into());
            let mut via = Via {
                position: offset.apply(entry.position),
                diameter: size.diameter,
                drill: size.drill,
                net,
                uuid: None,
            };
            via.uuid = Some(via.stable_uuid(injected));
            blocks.push_str(&format_block(
                &via.to_sexpr(),
                FormatMode::CompactTextProperties,
                1,
            ));
            injected += 1;
        }
    }

    if injected == 0 {
        debug!("Via injection: nothing to add");
        return Ok(Injection {
            text: board_text.to_string(),
            injected,
            skipped,
        });
    }

    let close = board_text
        .rfind(')')
        .ok_or(MergeError::UnterminatedBoard)?;
    // Blocks start on a fresh line.
    if !board_text[..close].ends_with('\n') {
        blocks.insert(0, '\n');
    }
    let mut patches = PatchSet::new();
    patches.insert(close, blocks);

    debug!("Via injection: added {injected} vias, skipped {}", skipped.len());
    Ok(Injection {
        text: patches.apply(board_text),
        injected,
        skipped,
    })
}
