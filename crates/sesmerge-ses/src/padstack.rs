use once_cell::sync::Lazy;
use regex::Regex;
use sesmerge_board::Mm;

/// `Via[0-1]_600:300_um`: diameter and drill in micrometres.
static SIZED_PADSTACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"_(\d+):(\d+)_um$").expect("padstack pattern is a valid regex")
});

/// Via copper diameter and drill hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViaSize {
    pub diameter: Mm,
    pub drill: Mm,
}

impl ViaSize {
    pub fn new(diameter: Mm, drill: Mm) -> Self {
        Self { diameter, drill }
    }
}

impl Default for ViaSize {
    /// 0.6 mm copper, 0.3 mm drill.
    fn default() -> Self {
        Self {
            diameter: Mm::from_parts(6, 1),
            drill: Mm::from_parts(3, 1),
        }
    }
}

/// Recover the via size encoded in a padstack name, if any.
pub fn size_from_padstack(name: &str) -> Option<ViaSize> {
    let caps = SIZED_PADSTACK.captures(name)?;
    let diameter = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let drill = caps.get(2)?.as_str().parse::<u32>().ok()?;
    Some(ViaSize {
        diameter: Mm::from_um(diameter),
        drill: Mm::from_um(drill),
    })
}
