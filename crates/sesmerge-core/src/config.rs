use serde::{Deserialize, Serialize};
use sesmerge_board::Mm;
use sesmerge_ses::{DEFAULT_MAX_BLOCK_LINES, ParseOptions, ViaSize};

/// Settings for one merge run. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    /// Footprint reference present in both the board and the session.
    pub anchor_reference: String,
    /// Inject vias from the session text when the merged board has none.
    pub via_fallback: bool,
    /// Longest a single wire or via block may run, in lines.
    pub max_block_lines: usize,
    /// Size for vias whose padstack name does not encode one.
    pub default_via: DefaultVia,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            anchor_reference: "U1".to_string(),
            via_fallback: true,
            max_block_lines: DEFAULT_MAX_BLOCK_LINES,
            default_via: DefaultVia::default(),
        }
    }
}

impl MergeConfig {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_block_lines: self.max_block_lines,
            ..ParseOptions::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultVia {
    pub diameter: Mm,
    pub drill: Mm,
}

impl Default for DefaultVia {
    fn default() -> Self {
        let size = ViaSize::default();
        Self {
            diameter: size.diameter,
            drill: size.drill,
        }
    }
}

impl From<DefaultVia> for ViaSize {
    fn from(via: DefaultVia) -> Self {
        ViaSize::new(via.diameter, via.drill)
    }
}
