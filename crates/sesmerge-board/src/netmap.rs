//! Pad-to-net assignments imported from JSON.
//!
//! Two shapes are accepted:
//!
//! ```json
//! [{"ref": "U1", "pad": "12", "net": "GPIO9"}]
//! {"U1": {"12": "GPIO9", "13": "GND"}}
//! ```
//!
//! Pad numbers and net names may be JSON numbers; they are compared as text.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::BoardError;
use crate::document::{BoardDocument, PadAssignment};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NetMapFile {
    Entries(Vec<Entry>),
    ByReference(BTreeMap<String, Value>),
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default, alias = "reference")]
    r#ref: Option<Value>,
    #[serde(default)]
    pad: Option<Value>,
    #[serde(default)]
    net: Option<Value>,
}

/// Ordered `(reference, pad) -> net` assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetMap {
    assignments: BTreeMap<(String, String), String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetMapReport {
    pub assigned: usize,
    pub unknown_footprints: Vec<String>,
    pub unknown_pads: Vec<String>,
}

impl NetMap {
    pub fn from_json(text: &str) -> Result<Self, BoardError> {
        let file: NetMapFile = serde_json::from_str(text)?;
        let mut assignments = BTreeMap::new();

        match file {
            NetMapFile::Entries(entries) => {
                for entry in entries {
                    let (Some(reference), Some(pad), Some(net)) = (
                        entry.r#ref.as_ref().and_then(scalar_text),
                        entry.pad.as_ref().and_then(scalar_text),
                        entry.net.as_ref().and_then(scalar_text),
                    ) else {
                        debug!("Skipping incomplete net map entry");
                        continue;
                    };
                    if reference.is_empty() || net.is_empty() {
                        continue;
                    }
                    assignments.insert((reference, pad), net);
                }
            }
            NetMapFile::ByReference(by_ref) => {
                for (reference, pads) in by_ref {
                    let Value::Object(pads) = pads else {
                        debug!("Skipping net map entry {reference}: not an object");
                        continue;
                    };
                    for (pad, net) in pads {
                        if let Some(net) = scalar_text(&net) {
                            assignments.insert((reference.clone(), pad), net);
                        }
                    }
                }
            }
        }

        Ok(Self { assignments })
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Assign every pad net through the board's net registry. Entries naming
    /// unknown footprints or pads are skipped.
    pub fn apply(&self, board: &mut BoardDocument) -> NetMapReport {
        let mut report = NetMapReport::default();
        for ((reference, pad), net) in &self.assignments {
            match board.assign_pad_net(reference, pad, net) {
                PadAssignment::Assigned(_) => report.assigned += 1,
                PadAssignment::UnknownFootprint => {
                    warn!("Net map: no footprint {reference} on the board");
                    report.unknown_footprints.push(reference.clone());
                }
                PadAssignment::UnknownPad => {
                    warn!("Net map: footprint {reference} has no pad {pad}");
                    report.unknown_pads.push(format!("{reference}:{pad}"));
                }
            }
        }
        report
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = r#"(kicad_pcb
        (net 0 "")
        (footprint "MCU" (property "Reference" "U1") (at 150 26)
            (pad "12" smd rect (at 0 0))
            (pad "13" smd rect (at 1 0))
        )
    )"#;

    #[test]
    fn reads_list_form() {
        let map = NetMap::from_json(
            r#"[{"ref":"U1","pad":"12","net":"GPIO9"},{"ref":"U1","pad":13,"net":"GND"},{"ref":"U1"}]"#,
        )
        .unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn applies_nested_form() {
        let map =
            NetMap::from_json(r#"{"U1":{"12":"GPIO9","14":"X"},"J9":{"1":"Y"},"bad":3}"#).unwrap();
        let mut board = BoardDocument::parse(BOARD).unwrap();
        let report = map.apply(&mut board);

        assert_eq!(report.assigned, 1);
        assert_eq!(report.unknown_footprints, vec!["J9"]);
        assert_eq!(report.unknown_pads, vec!["U1:14"]);
        assert!(board.net_code("GPIO9").is_some());
        assert!(board.net_code("Y").is_none());
    }

    #[test]
    fn rejects_other_json() {
        assert!(matches!(
            NetMap::from_json("\"nope\""),
            Err(BoardError::NetMap(_))
        ));
    }
}
