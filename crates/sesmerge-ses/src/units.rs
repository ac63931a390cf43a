use std::fmt;

use rust_decimal::Decimal;
use sesmerge_board::Mm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Inch,
    Mil,
    Cm,
    Mm,
    Um,
}

impl LengthUnit {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "inch" => Some(Self::Inch),
            "mil" => Some(Self::Mil),
            "cm" => Some(Self::Cm),
            "mm" => Some(Self::Mm),
            "um" => Some(Self::Um),
            _ => None,
        }
    }

    /// Size of one unit in millimetres.
    fn in_mm(self) -> Decimal {
        match self {
            Self::Inch => Decimal::new(254, 1),
            Self::Mil => Decimal::new(254, 4),
            Self::Cm => Decimal::TEN,
            Self::Mm => Decimal::ONE,
            Self::Um => Decimal::new(1, 3),
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inch => "inch",
            Self::Mil => "mil",
            Self::Cm => "cm",
            Self::Mm => "mm",
            Self::Um => "um",
        })
    }
}

/// `(resolution <unit> <n>)`: `n` integer steps per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub unit: LengthUnit,
    pub per_unit: u32,
}

impl Resolution {
    pub fn new(unit: LengthUnit, per_unit: u32) -> Self {
        Self { unit, per_unit }
    }

    /// Convert a raw SES quantity to millimetres.
    pub fn to_mm(&self, raw: Decimal) -> Mm {
        Mm::new(raw * self.unit.in_mm() / Decimal::from(self.per_unit.max(1)))
    }
}

impl Default for Resolution {
    /// 10 steps per micrometre, i.e. 10 000 per millimetre.
    fn default() -> Self {
        Self::new(LengthUnit::Um, 10)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.unit, self.per_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_ten_thousand_per_mm() {
        let res = Resolution::default();
        assert_eq!(res.to_mm(Decimal::from(200)).to_string(), "0.02");
        assert_eq!(res.to_mm(Decimal::from(10_000)).to_string(), "1");
    }

    #[test]
    fn converts_declared_units() {
        let mm10 = Resolution::new(LengthUnit::Mm, 10);
        assert_eq!(mm10.to_mm(Decimal::from(100)).to_string(), "10");

        let mil = Resolution::new(LengthUnit::Mil, 1);
        assert_eq!(mil.to_mm(Decimal::from(10)).to_string(), "0.254");
        assert_eq!(LengthUnit::from_name("UM"), Some(LengthUnit::Um));
        assert_eq!(LengthUnit::from_name("furlong"), None);
    }
}
