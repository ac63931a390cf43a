//! Folds tokenizer events into per-net routes.

use std::collections::HashMap;

use log::debug;
use rust_decimal::Decimal;
use sesmerge_board::{Mm, Point2D};

use crate::padstack::{ViaSize, size_from_padstack};
use crate::tokenizer::{Event, PlaceRecord, ViaRecord, WireRecord};
use crate::units::Resolution;

/// A routed polyline, in SES-frame millimetres.
#[derive(Debug, Clone, PartialEq)]
pub struct WirePath {
    /// Layer name as written by the autorouter.
    pub layer: String,
    pub width: Mm,
    /// At least two points.
    pub points: Vec<Point2D>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViaEntry {
    pub padstack: Option<String>,
    pub position: Point2D,
    /// Size encoded in the padstack name, if any.
    pub size: Option<ViaSize>,
}

impl ViaEntry {
    pub fn size_or(&self, default: ViaSize) -> ViaSize {
        self.size.unwrap_or(default)
    }
}

/// Everything routed for one net.
#[derive(Debug, Clone, PartialEq)]
pub struct NetRoute {
    pub net_name: String,
    pub wires: Vec<WirePath>,
    pub vias: Vec<ViaEntry>,
}

/// A component placement in the SES frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub reference: String,
    pub position: Point2D,
    pub side: Option<String>,
    /// Degrees.
    pub rotation: Option<Decimal>,
}

/// Parsed session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Last declared resolution.
    pub resolution: Resolution,
    pub placements: Vec<Placement>,
    pub routes: Vec<NetRoute>,
    /// Records seen before any `(net ...)`.
    pub discarded: usize,
}

impl Session {
    pub fn placement(&self, reference: &str) -> Option<&Placement> {
        self.placements.iter().find(|p| p.reference == reference)
    }

    pub fn route(&self, net_name: &str) -> Option<&NetRoute> {
        self.routes.iter().find(|r| r.net_name == net_name)
    }

    pub fn via_count(&self) -> usize {
        self.routes.iter().map(|r| r.vias.len()).sum()
    }

    pub fn wire_count(&self) -> usize {
        self.routes.iter().map(|r| r.wires.len()).sum()
    }
}

#[derive(Debug, Default)]
pub struct Reducer {
    session: Session,
    by_name: HashMap<String, usize>,
    current: Option<usize>,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: Event) {
        match event {
            Event::Resolution { resolution, line } => {
                debug!("line {line}: resolution {resolution}");
                self.session.resolution = resolution;
            }
            Event::Place(record) => {
                let placement = self.placement(record);
                self.session.placements.push(placement);
            }
            Event::NetOpen { name, .. } => {
                // A repeated net name continues the earlier route.
                let index = match self.by_name.get(&name) {
                    Some(&index) => index,
                    None => {
                        self.session.routes.push(NetRoute {
                            net_name: name.clone(),
                            wires: Vec::new(),
                            vias: Vec::new(),
                        });
                        let index = self.session.routes.len() - 1;
                        self.by_name.insert(name, index);
                        index
                    }
                };
                self.current = Some(index);
            }
            Event::Wire(record) => {
                let wire = self.wire(record);
                match self.current_route("wire") {
                    Some(route) => route.wires.push(wire),
                    None => self.session.discarded += 1,
                }
            }
            Event::Via(record) => {
                let via = self.via(record);
                match self.current_route("via") {
                    Some(route) => route.vias.push(via),
                    None => self.session.discarded += 1,
                }
            }
        }
    }

    fn current_route(&mut self, what: &str) -> Option<&mut NetRoute> {
        let route = self.current.and_then(|i| self.session.routes.get_mut(i));
        if route.is_none() {
            debug!("Discarding {what} outside of any net");
        }
        route
    }

    fn point(&self, x: Decimal, y: Decimal) -> Point2D {
        let res = self.session.resolution;
        Point2D {
            x: res.to_mm(x),
            y: res.to_mm(y),
        }
    }

    fn wire(&self, record: WireRecord) -> WirePath {
        WirePath {
            layer: record.layer,
            width: self.session.resolution.to_mm(record.width),
            points: record
                .coords
                .into_iter()
                .map(|(x, y)| self.point(x, y))
                .collect(),
        }
    }

    fn via(&self, record: ViaRecord) -> ViaEntry {
        let size = record.padstack.as_deref().and_then(size_from_padstack);
        ViaEntry {
            padstack: record.padstack,
            position: self.point(record.x, record.y),
            size,
        }
    }

    fn placement(&self, record: PlaceRecord) -> Placement {
        Placement {
            position: self.point(record.x, record.y),
            reference: record.reference,
            side: record.side,
            rotation: record.rotation,
        }
    }

    pub fn finish(self) -> Session {
        self.session
    }
}
