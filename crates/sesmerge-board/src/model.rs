//! Board items and their `.kicad_pcb` list forms.

use std::fmt;

use rust_decimal::Decimal;
use sesmerge_sexpr::{Sexpr, kv};
use uuid::Uuid;

use crate::geometry::{CopperLayer, Mm, Point2D};

/// Namespace for generated item identifiers (RFC 4122 URL namespace).
const UUID_NAMESPACE_URL: Uuid = Uuid::from_u128(0x6ba7b811_9dad_11d1_80b4_00c04fd430c8);

/// Integer code of a net in the board's net table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct NetCode(pub u32);

impl NetCode {
    /// Code 0 is KiCad's "no net".
    pub const UNCONNECTED: NetCode = NetCode(0);
}

impl fmt::Display for NetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Net {
    pub code: NetCode,
    pub name: String,
}

impl Net {
    pub fn to_sexpr(&self) -> Sexpr {
        Sexpr::list(vec![
            Sexpr::symbol("net"),
            Sexpr::int(i64::from(self.code.0)),
            Sexpr::string(self.name.clone()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    pub number: String,
    pub net: Option<NetCode>,
    /// Index of the `(pad ...)` list inside its footprint.
    pub(crate) node_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub reference: String,
    pub position: Point2D,
    /// Degrees.
    pub rotation: Option<Decimal>,
    pub layer: Option<String>,
    pub pads: Vec<Pad>,
    /// Index of the `(footprint ...)` list inside the board root.
    pub(crate) node_index: usize,
}

impl Footprint {
    pub fn pad(&self, number: &str) -> Option<&Pad> {
        self.pads.iter().find(|pad| pad.number == number)
    }
}

/// A straight copper segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub start: Point2D,
    pub end: Point2D,
    pub width: Mm,
    pub layer: CopperLayer,
    pub net: NetCode,
    pub uuid: Option<String>,
}

impl Track {
    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub(crate) fn stable_uuid(&self, ordinal: usize) -> String {
        stable_uuid(&format!(
            "segment/{ordinal}/{}/{}/{}/{}/{}",
            self.start, self.end, self.width, self.layer, self.net
        ))
    }

    pub fn to_sexpr(&self) -> Sexpr {
        let mut items = vec![
            Sexpr::symbol("segment"),
            point_list("start", self.start),
            point_list("end", self.end),
            kv("width", mm_atom(self.width)),
            kv("layer", Sexpr::string(self.layer.kicad_name())),
            kv("net", self.net.0),
        ];
        if let Some(uuid) = &self.uuid {
            items.push(kv("uuid", Sexpr::string(uuid.clone())));
        }
        Sexpr::list(items)
    }
}

/// A through via spanning both outer copper layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Via {
    pub position: Point2D,
    pub diameter: Mm,
    pub drill: Mm,
    pub net: NetCode,
    pub uuid: Option<String>,
}

impl Via {
    pub fn layer_span(&self) -> (CopperLayer, CopperLayer) {
        (CopperLayer::Front, CopperLayer::Back)
    }

    /// Content-derived identifier; `ordinal` separates otherwise identical vias.
    pub fn stable_uuid(&self, ordinal: usize) -> String {
        stable_uuid(&format!(
            "via/{ordinal}/{}/{}/{}/{}",
            self.position, self.diameter, self.drill, self.net
        ))
    }

    pub fn to_sexpr(&self) -> Sexpr {
        let (top, bottom) = self.layer_span();
        let mut items = vec![
            Sexpr::symbol("via"),
            point_list("at", self.position),
            kv("size", mm_atom(self.diameter)),
            kv("drill", mm_atom(self.drill)),
            Sexpr::list(vec![
                Sexpr::symbol("layers"),
                Sexpr::string(top.kicad_name()),
                Sexpr::string(bottom.kicad_name()),
            ]),
            kv("net", self.net.0),
        ];
        if let Some(uuid) = &self.uuid {
            items.push(kv("uuid", Sexpr::string(uuid.clone())));
        }
        Sexpr::list(items)
    }
}

fn stable_uuid(key: &str) -> String {
    Uuid::new_v5(&UUID_NAMESPACE_URL, format!("sesmerge:{key}").as_bytes()).to_string()
}

fn mm_atom(value: Mm) -> Sexpr {
    Sexpr::number_text(value.to_string())
}

fn point_list(tag: &str, point: Point2D) -> Sexpr {
    Sexpr::list(vec![Sexpr::symbol(tag), mm_atom(point.x), mm_atom(point.y)])
}

/// Read a numeric atom exactly as written.
pub(crate) fn mm_value(node: &Sexpr) -> Option<Mm> {
    Mm::parse(&node.number_lexeme()?)
}

/// `(tag x y ...)` -> point.
pub(crate) fn point_value(list: &[Sexpr]) -> Option<Point2D> {
    Some(Point2D {
        x: mm_value(list.get(1)?)?,
        y: mm_value(list.get(2)?)?,
    })
}

/// Item identifier, `(uuid ...)` on KiCad 7+ and `(tstamp ...)` before that.
pub(crate) fn item_uuid(items: &[Sexpr]) -> Option<String> {
    sesmerge_sexpr::find_child_list(items, "uuid")
        .or_else(|| sesmerge_sexpr::find_child_list(items, "tstamp"))
        .and_then(|list| list.get(1)?.as_atom().map(str::to_string))
}
