//! Turn parsed routes into board tracks and vias.

use std::collections::HashMap;

use log::{debug, trace};
use serde::Serialize;
use sesmerge_board::{BoardDocument, CopperLayer, NetCode, Track, Via};
use sesmerge_ses::{NetRoute, ViaSize};

use crate::error::{Error, MergeError};
use crate::reconcile::AffineOffset;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub nets_created: usize,
    pub tracks_added: usize,
    pub vias_added: usize,
}

/// Everything one route contributes, built before anything is committed.
/// Items carry no net until the route is accepted.
struct PlannedRoute {
    tracks: Vec<Track>,
    vias: Vec<Via>,
}

/// Add every route's copper to `board`.
///
/// Each route is checked and converted in full before any of its items are
/// added, so a bad wire never leaves half a net behind. Routes already merged
/// stay merged when a later one fails.
pub fn merge(
    board: &mut BoardDocument,
    routes: &[NetRoute],
    offset: &AffineOffset,
    default_via: ViaSize,
) -> Result<MergeStats, Error> {
    let mut stats = MergeStats::default();
    let mut resolved: HashMap<&str, NetCode> = HashMap::new();

    for route in routes {
        let name = route.net_name.as_str();
        let planned = plan_route(route, offset, default_via)?;

        let created = board.net_code(name).is_none();
        let code = board.get_or_create_net(name);
        match resolved.insert(name, code) {
            Some(first) if first != code => {
                return Err(MergeError::NetCodeConflict {
                    name: name.to_string(),
                    first,
                    second: code,
                }
                .into());
            }
            _ => {}
        }
        if created {
            stats.nets_created += 1;
        }

        trace!(
            "Net '{name}' ({code}): {} tracks, {} vias",
            planned.tracks.len(),
            planned.vias.len()
        );
        stats.tracks_added += planned.tracks.len();
        stats.vias_added += planned.vias.len();
        for track in planned.tracks {
            board.add_track(Track { net: code, ..track })?;
        }
        for via in planned.vias {
            board.add_via(Via { net: code, ..via })?;
        }
    }

    debug!(
        "Merged {} routes: {} new nets, {} tracks, {} vias",
        routes.len(),
        stats.nets_created,
        stats.tracks_added,
        stats.vias_added
    );
    Ok(stats)
}

fn plan_route(
    route: &NetRoute,
    offset: &AffineOffset,
    default_via: ViaSize,
) -> Result<PlannedRoute, MergeError> {
    let mut tracks = Vec::new();
    for wire in &route.wires {
        let layer = CopperLayer::from_name(&wire.layer).ok_or_else(|| MergeError::UnknownLayer {
            net: route.net_name.clone(),
            layer: wire.layer.clone(),
        })?;
        if wire.points.len() < 2 {
            return Err(MergeError::DegeneratePath {
                net: route.net_name.clone(),
                points: wire.points.len(),
            });
        }

        let points: Vec<_> = wire.points.iter().map(|p| offset.apply(*p)).collect();
        tracks.extend(points.windows(2).map(|pair| Track {
            start: pair[0],
            end: pair[1],
            width: wire.width,
            layer,
            net: NetCode::UNCONNECTED,
            uuid: None,
        }));
    }

    let vias = route
        .vias
        .iter()
        .map(|entry| {
            let size = entry.size_or(default_via);
            Via {
                position: offset.apply(entry.position),
                diameter: size.diameter,
                drill: size.drill,
                net: NetCode::UNCONNECTED,
                uuid: None,
            }
        })
        .collect();

    Ok(PlannedRoute { tracks, vias })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sesmerge_board::{Mm, Point2D};
    use sesmerge_ses::{ViaEntry, WirePath};

    const BOARD: &str = r#"(kicad_pcb (net 0 "") (net 1 "GND")
        (footprint "MCU" (property "Reference" "U1") (at 150 26)))"#;

    fn wire(layer: &str, points: &[(i64, i64)]) -> WirePath {
        WirePath {
            layer: layer.to_string(),
            width: Mm::from_parts(2, 1),
            points: points.iter().map(|&(x, y)| Point2D::new(x, y)).collect(),
        }
    }

    #[test]
    fn polyline_becomes_consecutive_tracks() {
        let mut board = BoardDocument::parse(BOARD).unwrap();
        let routes = vec![NetRoute {
            net_name: "GPIO1".to_string(),
            wires: vec![wire("F.Cu", &[(0, 0), (10, 0), (10, 10)])],
            vias: vec![ViaEntry {
                padstack: None,
                position: Point2D::new(10, 10),
                size: None,
            }],
        }];
        let offset = AffineOffset::from_anchor(Point2D::new(150, 26), Point2D::new(10, 5));

        let stats = merge(&mut board, &routes, &offset, ViaSize::default()).unwrap();
        assert_eq!(
            stats,
            MergeStats {
                nets_created: 1,
                tracks_added: 2,
                vias_added: 1
            }
        );

        let tracks = board.added_tracks();
        assert_eq!(tracks[0].start, Point2D::new(140, 31));
        assert_eq!(tracks[1].end, Point2D::new(150, 21));
        assert_eq!(tracks[0].net, NetCode(2));
        assert_eq!(board.added_vias()[0].position, Point2D::new(150, 21));
        assert_eq!(board.added_vias()[0].diameter, Mm::from_parts(6, 1));
    }

    #[test]
    fn existing_nets_are_reused() {
        let mut board = BoardDocument::parse(BOARD).unwrap();
        let routes = vec![NetRoute {
            net_name: "GND".to_string(),
            wires: vec![wire("B.Cu", &[(0, 0), (1, 0)])],
            vias: Vec::new(),
        }];
        let stats = merge(&mut board, &routes, &AffineOffset::IDENTITY, ViaSize::default()).unwrap();
        assert_eq!(stats.nets_created, 0);
        assert_eq!(board.added_tracks()[0].net, NetCode(1));
        assert_eq!(board.added_tracks()[0].layer, CopperLayer::Back);
    }

    #[test]
    fn bad_route_adds_nothing() {
        let mut board = BoardDocument::parse(BOARD).unwrap();
        let routes = vec![
            NetRoute {
                net_name: "A".to_string(),
                wires: vec![wire("F.Cu", &[(0, 0), (1, 0)])],
                vias: Vec::new(),
            },
            NetRoute {
                net_name: "B".to_string(),
                wires: vec![
                    wire("F.Cu", &[(0, 0), (1, 0)]),
                    wire("In2.Cu", &[(0, 0), (1, 0)]),
                ],
                vias: Vec::new(),
            },
        ];

        let err = merge(&mut board, &routes, &AffineOffset::IDENTITY, ViaSize::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Merge(MergeError::UnknownLayer { ref net, .. }) if net == "B"
        ));
        // Route A stays; route B left no tracks and no net behind.
        assert_eq!(board.added_tracks().len(), 1);
        assert_eq!(board.net_code("B"), None);
    }
}
