use std::collections::{BTreeMap, HashSet};

use log::{debug, trace, warn};
use sesmerge_sexpr::formatter::{FormatMode, format_tree};
use sesmerge_sexpr::{Sexpr, find_child_list};

use crate::BoardError;
use crate::geometry::{CopperLayer, Mm, Point2D};
use crate::model::{Footprint, Net, NetCode, Pad, Track, Via, item_uuid, mm_value, point_value};
use crate::nets::NetTable;

/// Top-level sections that come before the net table in a board file.
const HEADER_TAGS: &[&str] = &[
    "version",
    "generator",
    "generator_version",
    "general",
    "paper",
    "title_block",
    "layers",
    "setup",
    "property",
];

/// Outcome of assigning a net to a footprint pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadAssignment {
    Assigned(NetCode),
    UnknownFootprint,
    UnknownPad,
}

/// A loaded `.kicad_pcb` document.
///
/// The parsed tree is kept so that everything this model does not understand
/// (zones, graphics, setup) is written back untouched. Items added through
/// [`BoardDocument::add_track`] and [`BoardDocument::add_via`] are appended
/// when serializing.
#[derive(Debug, Clone)]
pub struct BoardDocument {
    root: Sexpr,
    footprints: Vec<Footprint>,
    nets: NetTable,
    tracks: Vec<Track>,
    vias: Vec<Via>,
    loaded_tracks: usize,
    loaded_vias: usize,
    /// (footprint, pad) indices whose net was changed.
    pad_edits: Vec<(usize, usize)>,
}

impl BoardDocument {
    pub fn parse(text: &str) -> Result<Self, BoardError> {
        let root = sesmerge_sexpr::parse(text)?;
        if root.tag() != Some("kicad_pcb") {
            return Err(BoardError::NotABoard(
                root.tag().unwrap_or("<atom>").to_string(),
            ));
        }
        let items = root.as_list().unwrap_or_default();

        let mut nets = NetTable::default();
        for list in items.iter().filter_map(Sexpr::as_list) {
            if list.first().and_then(Sexpr::as_sym) != Some("net") {
                continue;
            }
            let (Some(code), Some(name)) = (
                list.get(1).and_then(Sexpr::as_int),
                list.get(2).and_then(Sexpr::as_atom),
            ) else {
                debug!("Skipping malformed net declaration at byte {}", list[0].span.start);
                continue;
            };
            let code = u32::try_from(code).map_err(|_| BoardError::InvalidNetCode(code))?;
            nets.declare(NetCode(code), name)?;
        }

        let mut footprints = Vec::new();
        let mut tracks = Vec::new();
        let mut vias = Vec::new();
        let mut seen_refs = HashSet::new();

        for (index, node) in items.iter().enumerate() {
            let Some(list) = node.as_list() else {
                continue;
            };
            match list.first().and_then(Sexpr::as_sym) {
                Some("footprint") | Some("module") => {
                    let Some(footprint) = parse_footprint(list, index, &nets) else {
                        trace!("Skipping footprint without reference at byte {}", node.span.start);
                        continue;
                    };
                    if is_annotated(&footprint.reference)
                        && !seen_refs.insert(footprint.reference.clone())
                    {
                        return Err(BoardError::DuplicateReference(footprint.reference));
                    }
                    footprints.push(footprint);
                }
                Some("segment") => match parse_segment(list) {
                    Some(track) => tracks.push(track),
                    None => trace!("Skipping segment off the outer layers at byte {}", node.span.start),
                },
                Some("via") => match parse_via(list) {
                    Some(via) => vias.push(via),
                    None => debug!("Skipping malformed via at byte {}", node.span.start),
                },
                _ => {}
            }
        }

        debug!(
            "Loaded board: {} footprints, {} nets, {} tracks, {} vias",
            footprints.len(),
            nets.len(),
            tracks.len(),
            vias.len()
        );

        Ok(Self {
            loaded_tracks: tracks.len(),
            loaded_vias: vias.len(),
            root,
            footprints,
            nets,
            tracks,
            vias,
            pad_edits: Vec::new(),
        })
    }

    pub fn footprints(&self) -> &[Footprint] {
        &self.footprints
    }

    pub fn footprint(&self, reference: &str) -> Option<&Footprint> {
        self.footprints.iter().find(|fp| fp.reference == reference)
    }

    pub fn nets(&self) -> &NetTable {
        &self.nets
    }

    pub fn net_code(&self, name: &str) -> Option<NetCode> {
        self.nets.code_of(name)
    }

    /// Name to code for every net, including ones created since loading.
    pub fn net_codes(&self) -> BTreeMap<String, NetCode> {
        self.nets.name_to_code()
    }

    pub fn get_or_create_net(&mut self, name: &str) -> NetCode {
        self.nets.get_or_create(name).0
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn vias(&self) -> &[Via] {
        &self.vias
    }

    pub fn added_tracks(&self) -> &[Track] {
        &self.tracks[self.loaded_tracks..]
    }

    pub fn added_vias(&self) -> &[Via] {
        &self.vias[self.loaded_vias..]
    }

    pub fn add_track(&mut self, mut track: Track) -> Result<&Track, BoardError> {
        if !self.nets.contains(track.net) {
            return Err(BoardError::UnknownNet(track.net));
        }
        if track.uuid.is_none() {
            track.uuid = Some(track.stable_uuid(self.tracks.len()));
        }
        self.tracks.push(track);
        Ok(&self.tracks[self.tracks.len() - 1])
    }

    pub fn add_via(&mut self, mut via: Via) -> Result<&Via, BoardError> {
        if !self.nets.contains(via.net) {
            return Err(BoardError::UnknownNet(via.net));
        }
        if via.uuid.is_none() {
            via.uuid = Some(via.stable_uuid(self.vias.len()));
        }
        self.vias.push(via);
        Ok(&self.vias[self.vias.len() - 1])
    }

    /// Connect a footprint pad to a net, creating the net if needed.
    pub fn assign_pad_net(&mut self, reference: &str, pad: &str, net_name: &str) -> PadAssignment {
        let Some(fp_index) = self.footprints.iter().position(|fp| fp.reference == reference)
        else {
            return PadAssignment::UnknownFootprint;
        };
        let Some(pad_index) = self.footprints[fp_index]
            .pads
            .iter()
            .position(|p| p.number == pad)
        else {
            return PadAssignment::UnknownPad;
        };

        let code = self.get_or_create_net(net_name);
        self.footprints[fp_index].pads[pad_index].net = Some(code);
        if !self.pad_edits.contains(&(fp_index, pad_index)) {
            self.pad_edits.push((fp_index, pad_index));
        }
        PadAssignment::Assigned(code)
    }

    /// Serialize in pcbnew's layout.
    ///
    /// New nets are declared right after the existing net table so that they
    /// precede every reference; new tracks and vias go at the end.
    pub fn to_text(&self) -> String {
        let mut root = self.root.clone();
        if let Some(items) = root.as_list_mut() {
            self.write_pad_nets(items);

            let at = net_insertion_index(items);
            let created = self.nets.created().iter().map(|net| net.to_sexpr());
            items.splice(at..at, created);

            items.extend(self.added_tracks().iter().map(Track::to_sexpr));
            items.extend(self.added_vias().iter().map(Via::to_sexpr));
        }
        format_tree(&root, FormatMode::CompactTextProperties)
    }

    fn write_pad_nets(&self, items: &mut [Sexpr]) {
        for &(fp_index, pad_index) in &self.pad_edits {
            let footprint = &self.footprints[fp_index];
            let pad = &footprint.pads[pad_index];
            let Some(code) = pad.net else {
                continue;
            };
            let name = self.nets.name_of(code).unwrap_or_default();
            let net = Net {
                code,
                name: name.to_string(),
            }
            .to_sexpr();

            let Some(pad_list) = items
                .get_mut(footprint.node_index)
                .and_then(Sexpr::as_list_mut)
                .and_then(|fp| fp.get_mut(pad.node_index))
                .and_then(Sexpr::as_list_mut)
            else {
                warn!(
                    "Pad {}:{} no longer present in the board tree",
                    footprint.reference, pad.number
                );
                continue;
            };
            match pad_list.iter_mut().find(|child| child.tag() == Some("net")) {
                Some(existing) => *existing = net,
                None => pad_list.push(net),
            }
        }
    }
}

fn net_insertion_index(items: &[Sexpr]) -> usize {
    let last_net = items.iter().rposition(|item| item.tag() == Some("net"));
    let last_header = || {
        items
            .iter()
            .rposition(|item| item.tag().is_some_and(|tag| HEADER_TAGS.contains(&tag)))
    };
    last_net
        .or_else(last_header)
        .map(|index| index + 1)
        .unwrap_or(1.min(items.len()))
}

fn is_annotated(reference: &str) -> bool {
    !reference.is_empty() && !reference.contains(['?', '*'])
}

/// `(property "Reference" "U1")` on KiCad 7+, `(fp_text reference "U1")` before.
fn footprint_reference(items: &[Sexpr]) -> Option<String> {
    keyed_value(items, "property", "Reference").or_else(|| keyed_value(items, "fp_text", "reference"))
}

/// Value of the first `(tag key value ...)` child.
fn keyed_value(items: &[Sexpr], tag: &str, key: &str) -> Option<String> {
    items.iter().filter_map(Sexpr::as_list).find_map(|list| {
        if list.first()?.as_sym()? != tag || list.get(1)?.as_atom()? != key {
            return None;
        }
        list.get(2)?.as_atom().map(str::to_string)
    })
}

fn parse_footprint(items: &[Sexpr], node_index: usize, nets: &NetTable) -> Option<Footprint> {
    let reference = footprint_reference(items)?;

    let mut position = Point2D::default();
    let mut rotation = None;
    let mut layer = None;
    let mut pads = Vec::new();

    for (index, child) in items.iter().enumerate().skip(1) {
        let Some(list) = child.as_list() else {
            continue;
        };
        match list.first().and_then(Sexpr::as_sym) {
            Some("at") => {
                position = point_value(list).unwrap_or_default();
                rotation = list.get(3).and_then(mm_value).map(Mm::value);
            }
            Some("layer") => {
                layer = list.get(1).and_then(Sexpr::as_atom).map(str::to_string);
            }
            Some("pad") => {
                if let Some(pad) = parse_pad(list, index, nets) {
                    pads.push(pad);
                }
            }
            _ => {}
        }
    }

    Some(Footprint {
        reference,
        position,
        rotation,
        layer,
        pads,
        node_index,
    })
}

fn parse_pad(list: &[Sexpr], node_index: usize, nets: &NetTable) -> Option<Pad> {
    let number = list.get(1)?;
    let number = number
        .as_atom()
        .map(str::to_string)
        .or_else(|| number.number_lexeme())?;

    // `(net 3 "GND")`, or `(net "GND")` on boards without a net table.
    let net = find_child_list(list, "net").and_then(|net| {
        let value = net.get(1)?;
        match value.as_int() {
            Some(code) => u32::try_from(code).ok().map(NetCode),
            None => nets.code_of(value.as_atom()?),
        }
    });

    Some(Pad {
        number,
        net,
        node_index,
    })
}

fn parse_segment(list: &[Sexpr]) -> Option<Track> {
    let layer = find_child_list(list, "layer")?.get(1)?.as_atom()?;
    Some(Track {
        start: point_value(find_child_list(list, "start")?)?,
        end: point_value(find_child_list(list, "end")?)?,
        width: mm_value(find_child_list(list, "width")?.get(1)?)?,
        layer: CopperLayer::from_name(layer)?,
        net: net_of(list),
        uuid: item_uuid(list),
    })
}

fn parse_via(list: &[Sexpr]) -> Option<Via> {
    Some(Via {
        position: point_value(find_child_list(list, "at")?)?,
        diameter: mm_value(find_child_list(list, "size")?.get(1)?)?,
        drill: mm_value(find_child_list(list, "drill")?.get(1)?)?,
        net: net_of(list),
        uuid: item_uuid(list),
    })
}

fn net_of(list: &[Sexpr]) -> NetCode {
    find_child_list(list, "net")
        .and_then(|net| net.get(1)?.as_int())
        .and_then(|code| u32::try_from(code).ok())
        .map(NetCode)
        .unwrap_or(NetCode::UNCONNECTED)
}
