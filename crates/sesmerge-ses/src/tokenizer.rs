//! Finite-state scanner turning SES text into a typed event stream.
//!
//! Only the blocks needed to recover routing are interpreted:
//!
//! ```text
//! (resolution um 10)
//! (component "QFN32" (place U1 1500000 -260000 front 0))
//! (net GND
//!   (wire (path F.Cu 2500 0 0 10000 0))
//!   (via "Via[0-1]_600:300_um" 10000 0)
//! )
//! ```
//!
//! Blocks may be split over any number of lines. Every other list is skipped,
//! and lists nested inside a captured block (`(net GND)` inside a wire, `(PN ..)`
//! inside a place) are ignored without affecting the record.
//!
//! A `(net ...)` opened inside another net starts a new scope; once it closes,
//! records belong to the enclosing net again.

use std::collections::VecDeque;
use std::iter::Enumerate;
use std::str::Lines;

use log::trace;
use rust_decimal::Decimal;

use crate::ParseError;
use crate::lexer::{Lexeme, lex_line};
use crate::units::{LengthUnit, Resolution};

/// A `(path layer width x1 y1 x2 y2 ...)` record, in raw SES units.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRecord {
    pub layer: String,
    pub width: Decimal,
    pub coords: Vec<(Decimal, Decimal)>,
    pub line: usize,
}

/// A `(via [padstack] x y)` record, in raw SES units.
#[derive(Debug, Clone, PartialEq)]
pub struct ViaRecord {
    pub padstack: Option<String>,
    pub x: Decimal,
    pub y: Decimal,
    pub line: usize,
}

/// A `(place REF x y [side] [rotation])` record, in raw SES units.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceRecord {
    pub reference: String,
    pub x: Decimal,
    pub y: Decimal,
    pub side: Option<String>,
    pub rotation: Option<Decimal>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Resolution { resolution: Resolution, line: usize },
    Place(PlaceRecord),
    NetOpen { name: String, line: usize },
    Wire(WireRecord),
    Via(ViaRecord),
}

/// Atoms gathered at the top level of a captured block.
#[derive(Debug, Clone, Default)]
struct Capture {
    atoms: Vec<(String, usize)>,
}

#[derive(Debug, Clone)]
enum State {
    /// `(` seen, keyword not yet read.
    Opening,
    /// `(net` seen, name not yet read.
    NetHeader,
    InNet(String),
    InWireAwaitingPath,
    InPath(Capture),
    InVia(Capture),
    InPlace(Capture),
    InResolution(Capture),
    /// A list this reader does not interpret.
    Skipping,
}

impl State {
    fn is_capture(&self) -> bool {
        matches!(
            self,
            State::InPath(_) | State::InVia(_) | State::InPlace(_) | State::InResolution(_)
        )
    }

    /// Blocks whose extent is bounded by the lookahead limit.
    fn is_bounded(&self) -> bool {
        matches!(
            self,
            State::InWireAwaitingPath | State::InPath(_) | State::InVia(_)
        )
    }
}

#[derive(Debug, Clone)]
struct Frame {
    state: State,
    keyword: String,
    opened_line: usize,
}

/// Streams [`Event`]s out of SES text, one line at a time.
pub struct Tokenizer<'a> {
    lines: Enumerate<Lines<'a>>,
    stack: Vec<Frame>,
    lexemes: Vec<Lexeme>,
    ready: VecDeque<Event>,
    max_block_lines: usize,
    skip_wires: bool,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str, max_block_lines: usize) -> Self {
        Self {
            lines: text.lines().enumerate(),
            stack: Vec::new(),
            lexemes: Vec::new(),
            ready: VecDeque::new(),
            max_block_lines,
            skip_wires: false,
            finished: false,
        }
    }

    /// Ignore `(wire ...)` blocks entirely, including malformed ones.
    pub fn skip_wires(mut self, skip: bool) -> Self {
        self.skip_wires = skip;
        self
    }

    fn feed_line(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        if let Some(frame) = self.stack.iter().find(|frame| {
            frame.state.is_bounded() && line_no - frame.opened_line > self.max_block_lines
        }) {
            return Err(ParseError::RunawayBlock {
                keyword: frame.keyword.clone(),
                line: frame.opened_line,
                limit: self.max_block_lines,
            });
        }

        self.lexemes.clear();
        lex_line(line, &mut self.lexemes);
        let lexemes = std::mem::take(&mut self.lexemes);
        for lexeme in &lexemes {
            match lexeme {
                Lexeme::Open => self.open(line_no),
                Lexeme::Close => self.close(line_no)?,
                Lexeme::Atom(atom) => self.atom(atom, line_no),
            }
        }
        self.lexemes = lexemes;
        Ok(())
    }

    fn open(&mut self, line_no: usize) {
        let inside_capture = self
            .stack
            .last()
            .is_some_and(|frame| frame.state.is_capture());
        self.stack.push(Frame {
            state: if inside_capture {
                State::Skipping
            } else {
                State::Opening
            },
            keyword: String::new(),
            opened_line: line_no,
        });
    }

    fn atom(&mut self, atom: &str, line_no: usize) {
        let in_net = self
            .stack
            .iter()
            .any(|frame| matches!(frame.state, State::InNet(_) | State::NetHeader));
        let parent = self
            .stack
            .len()
            .checked_sub(2)
            .and_then(|i| self.stack.get(i));
        let parent_is_wire = parent.is_some_and(|p| matches!(p.state, State::InWireAwaitingPath));
        // `(net X)` annotations inside a wire, skipped or not, are not scopes.
        let parent_keyword_is_wire = parent.is_some_and(|p| p.keyword == "wire");
        let skip_wires = self.skip_wires;

        let Some(frame) = self.stack.last_mut() else {
            trace!("line {line_no}: ignoring top-level atom '{atom}'");
            return;
        };

        match &mut frame.state {
            State::Opening => {
                frame.keyword = atom.to_string();
                frame.state = match atom {
                    "net" if !parent_keyword_is_wire => State::NetHeader,
                    "wire" if skip_wires => State::Skipping,
                    "wire" => State::InWireAwaitingPath,
                    "path" if parent_is_wire => State::InPath(Capture::default()),
                    "via" => State::InVia(Capture::default()),
                    "place" if !in_net => State::InPlace(Capture::default()),
                    "resolution" => State::InResolution(Capture::default()),
                    _ => State::Skipping,
                };
            }
            State::NetHeader => {
                frame.state = State::InNet(atom.to_string());
                self.ready.push_back(Event::NetOpen {
                    name: atom.to_string(),
                    line: line_no,
                });
            }
            State::InPath(capture)
            | State::InVia(capture)
            | State::InPlace(capture)
            | State::InResolution(capture) => {
                capture.atoms.push((atom.to_string(), line_no));
            }
            State::InNet(_) | State::InWireAwaitingPath | State::Skipping => {}
        }
    }

    fn close(&mut self, line_no: usize) -> Result<(), ParseError> {
        let Some(frame) = self.stack.pop() else {
            return Err(ParseError::UnexpectedClose { line: line_no });
        };
        let line = frame.opened_line;

        match frame.state {
            State::InPath(capture) => {
                let record = wire_record(&capture, line)?;
                self.ready.push_back(Event::Wire(record));
            }
            State::InVia(capture) => {
                let record = via_record(&capture, line)?;
                self.ready.push_back(Event::Via(record));
            }
            State::InPlace(capture) => match place_record(&capture, line)? {
                Some(record) => self.ready.push_back(Event::Place(record)),
                None => trace!("line {line}: place without coordinates"),
            },
            State::InResolution(capture) => {
                let resolution = resolution_record(&capture, line)?;
                self.ready.push_back(Event::Resolution { resolution, line });
            }
            State::NetHeader => {
                return Err(ParseError::IncompleteRecord {
                    keyword: frame.keyword,
                    line,
                    detail: "missing net name".to_string(),
                });
            }
            State::InWireAwaitingPath => {
                trace!("line {line}: wire without a path");
            }
            State::InNet(name) => {
                let outer = self.stack.iter().rev().find_map(|frame| match &frame.state {
                    State::InNet(outer) => Some(outer.clone()),
                    _ => None,
                });
                if let Some(outer) = outer {
                    trace!("line {line_no}: net {name} closed, back in net {outer}");
                    self.ready.push_back(Event::NetOpen {
                        name: outer,
                        line: line_no,
                    });
                }
            }
            State::Opening | State::Skipping => {}
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ParseError> {
        match self.stack.first() {
            Some(frame) => Err(ParseError::Unclosed {
                keyword: frame.keyword.clone(),
                line: frame.opened_line,
            }),
            None => Ok(()),
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Event, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }

            let step = match self.lines.next() {
                Some((index, line)) => self.feed_line(index + 1, line),
                None => {
                    self.finished = true;
                    self.finish()
                }
            };
            if let Err(err) = step {
                self.finished = true;
                self.ready.clear();
                return Some(Err(err));
            }
        }
    }
}

fn number(atom: &(String, usize)) -> Result<Decimal, ParseError> {
    let (text, line) = atom;
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| ParseError::InvalidNumber {
            token: text.clone(),
            line: *line,
        })
}

fn incomplete(keyword: &str, line: usize, detail: String) -> ParseError {
    ParseError::IncompleteRecord {
        keyword: keyword.to_string(),
        line,
        detail,
    }
}

fn wire_record(capture: &Capture, line: usize) -> Result<WireRecord, ParseError> {
    let atoms = &capture.atoms;
    let coords = atoms.get(2..).unwrap_or_default();
    if atoms.len() < 2 || coords.len() < 4 || coords.len() % 2 != 0 {
        return Err(incomplete(
            "path",
            line,
            format!(
                "expected layer, width and an even number of at least 4 coordinates, got {} atoms",
                atoms.len()
            ),
        ));
    }

    let coords = coords
        .chunks_exact(2)
        .map(|pair| -> Result<_, ParseError> { Ok((number(&pair[0])?, number(&pair[1])?)) })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WireRecord {
        layer: atoms[0].0.clone(),
        width: number(&atoms[1])?,
        coords,
        line,
    })
}

fn via_record(capture: &Capture, line: usize) -> Result<ViaRecord, ParseError> {
    let (padstack, x, y) = match capture.atoms.as_slice() {
        [x, y] => (None, x, y),
        [name, x, y] => (Some(name.0.clone()), x, y),
        other => {
            return Err(incomplete(
                "via",
                line,
                format!("expected [padstack] x y, got {} atoms", other.len()),
            ));
        }
    };
    Ok(ViaRecord {
        padstack,
        x: number(x)?,
        y: number(y)?,
        line,
    })
}

fn place_record(capture: &Capture, line: usize) -> Result<Option<PlaceRecord>, ParseError> {
    let [reference, x, y, rest @ ..] = capture.atoms.as_slice() else {
        return Ok(None);
    };
    let rotation = rest.get(1).map(number).transpose()?;
    Ok(Some(PlaceRecord {
        reference: reference.0.clone(),
        x: number(x)?,
        y: number(y)?,
        side: rest.first().map(|side| side.0.clone()),
        rotation,
        line,
    }))
}

fn resolution_record(capture: &Capture, line: usize) -> Result<Resolution, ParseError> {
    let [unit, per_unit] = capture.atoms.as_slice() else {
        return Err(incomplete(
            "resolution",
            line,
            "expected unit and step count".to_string(),
        ));
    };
    let unit = LengthUnit::from_name(&unit.0).ok_or_else(|| ParseError::UnknownUnit {
        unit: unit.0.clone(),
        line,
    })?;
    let per_unit = per_unit
        .0
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ParseError::InvalidNumber {
            token: per_unit.0.clone(),
            line: per_unit.1,
        })?;
    Ok(Resolution::new(unit, per_unit))
}

/// Collect every event, stopping at the first error.
pub fn tokenize(text: &str, max_block_lines: usize) -> Result<Vec<Event>, ParseError> {
    Tokenizer::new(text, max_block_lines).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn emits_net_wire_and_via_events() {
        let events = tokenize(
            "(session x (routes (network_out (net GND (wire (path F.Cu 200 0 0 1000 1000)) (via V_600:300_um 1000 1000)))))",
            64,
        )
        .unwrap();
        assert_eq!(
            events,
            vec![
                Event::NetOpen {
                    name: "GND".to_string(),
                    line: 1
                },
                Event::Wire(WireRecord {
                    layer: "F.Cu".to_string(),
                    width: d(200),
                    coords: vec![(d(0), d(0)), (d(1000), d(1000))],
                    line: 1,
                }),
                Event::Via(ViaRecord {
                    padstack: Some("V_600:300_um".to_string()),
                    x: d(1000),
                    y: d(1000),
                    line: 1,
                }),
            ]
        );
    }

    #[test]
    fn nested_lists_in_captures_are_ignored() {
        let events = tokenize(
            "(component QFN (place U1 100 50 front 90 (PN \"ESP32\")))\n(net A (wire (path F.Cu 10 0 0 5 5) (net A) (type route)))",
            64,
        )
        .unwrap();
        assert!(matches!(
            &events[0],
            Event::Place(PlaceRecord { reference, side: Some(side), rotation: Some(rot), .. })
                if reference == "U1" && side == "front" && *rot == d(90)
        ));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn place_outside_component_is_recorded() {
        let events = tokenize("(placement (resolution mm 10) (place U1 100 50 front 0))", 64).unwrap();
        assert!(matches!(
            &events[1],
            Event::Place(PlaceRecord { reference, x, y, .. })
                if reference == "U1" && *x == d(100) && *y == d(50)
        ));
        // Inside a net, `place` is not a placement.
        let events = tokenize("(net A (place U1 1 2))", 64).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn nested_net_opens_its_own_scope() {
        let events = tokenize(
            "(network_out\n(net A\n(wire (path F.Cu 10 0 0 5 5))\n(net B\n(via 1 2)\n)\n(via 3 4)\n))",
            64,
        )
        .unwrap();
        let names: Vec<_> = events
            .iter()
            .map(|event| match event {
                Event::NetOpen { name, .. } => format!("net {name}"),
                Event::Wire(_) => "wire".to_string(),
                Event::Via(via) => format!("via {}", via.x),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(
            names,
            vec!["net A", "wire", "net B", "via 1", "net A", "via 3"]
        );
    }

    #[test]
    fn skipped_wires_are_not_validated() {
        let text = "(net A (wire (path F.Cu 10 0 0 x) (net A)) (via 1 2))";
        assert!(tokenize(text, 64).is_err());

        let events: Vec<_> = Tokenizer::new(text, 64)
            .skip_wires(true)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Event::Via(via) if via.x == d(1)));
    }

    #[test]
    fn reports_structural_errors_with_lines() {
        assert_eq!(
            tokenize("(net A\n(wire (path F.Cu 10 0 0 5 5)))\n)", 64),
            Err(ParseError::UnexpectedClose { line: 3 })
        );
        assert_eq!(
            tokenize("(net A\n(via 1 2)", 64),
            Err(ParseError::Unclosed {
                keyword: "net".to_string(),
                line: 1
            })
        );
        assert_eq!(
            tokenize("(net A (via 1 x))", 64),
            Err(ParseError::InvalidNumber {
                token: "x".to_string(),
                line: 1
            })
        );
        assert!(matches!(
            tokenize("(net A (wire (path F.Cu 10 0 0 5)))", 64),
            Err(ParseError::IncompleteRecord { keyword, .. }) if keyword == "path"
        ));
    }

    #[test]
    fn bounds_block_length() {
        let text = "(net A\n(wire (path F.Cu 10\n0\n0\n5\n5\n)))";
        assert!(tokenize(text, 64).is_ok());
        assert_eq!(
            tokenize(text, 3),
            Err(ParseError::RunawayBlock {
                keyword: "wire".to_string(),
                line: 2,
                limit: 3
            })
        );
    }

    #[test]
    fn reads_resolution() {
        let events = tokenize("(routes (resolution mm 10))", 64).unwrap();
        assert_eq!(
            events,
            vec![Event::Resolution {
                resolution: Resolution::new(LengthUnit::Mm, 10),
                line: 1
            }]
        );
        assert!(matches!(
            tokenize("(resolution parsec 1)", 64),
            Err(ParseError::UnknownUnit { .. })
        ));
    }
}
