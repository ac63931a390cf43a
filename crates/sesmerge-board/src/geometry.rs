//! Fixed-point board geometry.
//!
//! Coordinates are kept as exact decimals so that unit conversion and frame
//! translation never introduce float noise into the written board.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A length in millimetres.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Mm(Decimal);

impl Mm {
    pub const ZERO: Mm = Mm(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Mm(value)
    }

    /// `mantissa * 10^-scale` millimetres, e.g. `Mm::from_parts(6, 1)` is 0.6 mm.
    pub fn from_parts(mantissa: i64, scale: u32) -> Self {
        Mm(Decimal::new(mantissa, scale))
    }

    /// Micrometres to millimetres.
    pub fn from_um(um: u32) -> Self {
        Mm(Decimal::from(um) / Decimal::from(1000))
    }

    /// Parse a KiCad numeric lexeme (`150`, `26.035`, `1e-3`).
    pub fn parse(text: &str) -> Option<Self> {
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
            .map(Mm)
    }

    pub const fn value(self) -> Decimal {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0.to_string().parse().unwrap_or(0.0)
    }
}

impl fmt::Display for Mm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // normalize() also folds -0 into 0.
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Mm {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Mm)
    }
}

impl Add for Mm {
    type Output = Mm;

    fn add(self, rhs: Mm) -> Mm {
        Mm(self.0 + rhs.0)
    }
}

impl Sub for Mm {
    type Output = Mm;

    fn sub(self, rhs: Mm) -> Mm {
        Mm(self.0 - rhs.0)
    }
}

impl Neg for Mm {
    type Output = Mm;

    fn neg(self) -> Mm {
        Mm(-self.0)
    }
}

impl From<Decimal> for Mm {
    fn from(value: Decimal) -> Self {
        Mm(value)
    }
}

impl From<i64> for Mm {
    fn from(value: i64) -> Self {
        Mm(Decimal::from(value))
    }
}

impl From<i32> for Mm {
    fn from(value: i32) -> Self {
        Mm(Decimal::from(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: Mm,
    pub y: Mm,
}

impl Point2D {
    pub fn new(x: impl Into<Mm>, y: impl Into<Mm>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }

    /// Straight-line distance, in millimetres.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = (other.x - self.x).to_f64();
        let dy = (other.y - self.y).to_f64();
        dx.hypot(dy)
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The two outer copper layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CopperLayer {
    Front,
    Back,
}

impl CopperLayer {
    pub fn kicad_name(self) -> &'static str {
        match self {
            CopperLayer::Front => "F.Cu",
            CopperLayer::Back => "B.Cu",
        }
    }

    /// Resolve a layer name as written by KiCad or by an autorouter
    /// (`F.Cu`, `Top`, `front`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "f.cu" | "top" | "front" | "component" => Some(CopperLayer::Front),
            "b.cu" | "bottom" | "back" | "solder" => Some(CopperLayer::Back),
            _ => None,
        }
    }
}

impl fmt::Display for CopperLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kicad_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_normalized_values() {
        assert_eq!(Mm::parse("150.000000").unwrap().to_string(), "150");
        assert_eq!(Mm::from_parts(6, 1).to_string(), "0.6");
        assert_eq!(Mm::from_um(300).to_string(), "0.3");
        assert_eq!((Mm::from(5) - Mm::from(5)).to_string(), "0");
        assert_eq!((-Mm::ZERO).to_string(), "0");
    }

    #[test]
    fn arithmetic_is_exact() {
        let a = Mm::parse("0.1").unwrap();
        let b = Mm::parse("0.2").unwrap();
        assert_eq!(a + b, Mm::parse("0.3").unwrap());
        assert_eq!(Mm::parse("1e-3").unwrap().to_string(), "0.001");
    }

    #[test]
    fn resolves_layer_aliases() {
        assert_eq!(CopperLayer::from_name("F.Cu"), Some(CopperLayer::Front));
        assert_eq!(CopperLayer::from_name("BOTTOM"), Some(CopperLayer::Back));
        assert_eq!(CopperLayer::from_name("In1.Cu"), None);
        assert_eq!(CopperLayer::Back.to_string(), "B.Cu");
    }

    #[test]
    fn measures_distance() {
        let a = Point2D::new(140, 31);
        let b = Point2D::new(150, 31);
        assert!((a.distance_to(&b) - 10.0).abs() < 1e-9);
    }
}
