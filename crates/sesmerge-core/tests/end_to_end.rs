use std::collections::BTreeMap;

use sesmerge_board::{BoardDocument, CopperLayer, Mm, NetCode, Point2D};
use sesmerge_core::{
    AnchorStatus, Diagnostic, Error, MergeConfig, apply_session, apply_session_text, inject_vias,
};

const BOARD: &str = include_str!("resources/board.kicad_pcb");
const GPIO_SES: &str = include_str!("resources/gpio.ses");
const NO_VIAS_SES: &str = include_str!("resources/no_vias.ses");

#[test]
fn routes_gpio_net_into_board() {
    let routed = apply_session_text(BOARD, GPIO_SES, &MergeConfig::default()).unwrap();
    let report = &routed.report;

    assert_eq!(report.nets_created, 1);
    assert_eq!(report.tracks_added, 1);
    assert_eq!(report.vias_added, 1);
    assert!(!report.fallback_ran);
    assert!(report.anchor.is_found());
    assert!(report.diagnostics.is_empty());

    let board = BoardDocument::parse(&routed.text).unwrap();
    let gpio = board.net_code("GPIO1").unwrap();
    assert_eq!(gpio, NetCode(2));

    let tracks: Vec<_> = board.tracks().iter().filter(|t| t.net == gpio).collect();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].start, Point2D::new(150, 26));
    assert_eq!(tracks[0].end, Point2D::new(160, 26));
    assert_eq!(tracks[0].width, Mm::parse("0.2").unwrap());
    assert_eq!(tracks[0].layer, CopperLayer::Front);
    assert!((tracks[0].length() - 10.0).abs() < 1e-9);

    let vias = board.vias();
    assert_eq!(vias.len(), 1);
    assert_eq!(vias[0].position, Point2D::new(160, 26));
    assert_eq!(vias[0].net, gpio);
    assert_eq!(vias[0].diameter, Mm::parse("0.6").unwrap());
}

#[test]
fn new_net_follows_existing_net_table() {
    let routed = apply_session_text(BOARD, GPIO_SES, &MergeConfig::default()).unwrap();
    assert!(
        routed
            .text
            .contains("\t(net 1 \"GND\")\n\t(net 2 \"GPIO1\")\n\t(footprint")
    );
    assert!(routed.text.ends_with(")\n"));
}

#[test]
fn merged_board_reserializes_unchanged() {
    let routed = apply_session_text(BOARD, GPIO_SES, &MergeConfig::default()).unwrap();
    let again = BoardDocument::parse(&routed.text).unwrap().to_text();
    assert_eq!(again, routed.text);
}

#[test]
fn merge_is_deterministic() {
    let first = apply_session_text(BOARD, GPIO_SES, &MergeConfig::default()).unwrap();
    let second = apply_session_text(BOARD, GPIO_SES, &MergeConfig::default()).unwrap();
    assert_eq!(first.text, second.text);
}

#[test]
fn fallback_without_session_vias_adds_nothing() {
    let routed = apply_session_text(BOARD, NO_VIAS_SES, &MergeConfig::default()).unwrap();
    let report = &routed.report;

    assert!(report.fallback_ran);
    assert_eq!(report.vias_injected, 0);
    assert_eq!(report.nets_created, 0);
    assert_eq!(report.tracks_added, 1);

    let board = BoardDocument::parse(&routed.text).unwrap();
    assert!(board.vias().is_empty());
    assert_eq!(board.tracks()[0].start, Point2D::new(148, 26));
    assert_eq!(board.tracks()[0].end, Point2D::new(148, 30));
    assert_eq!(board.tracks()[0].net, NetCode(1));
}

#[test]
fn fallback_can_be_disabled() {
    let config = MergeConfig {
        via_fallback: false,
        ..MergeConfig::default()
    };
    let routed = apply_session_text(BOARD, NO_VIAS_SES, &config).unwrap();
    assert!(!routed.report.fallback_ran);
}

#[test]
fn missing_anchor_uses_flip_only() {
    let config = MergeConfig {
        anchor_reference: "U9".to_string(),
        ..MergeConfig::default()
    };
    let routed = apply_session_text(BOARD, GPIO_SES, &config).unwrap();

    assert_eq!(routed.report.anchor, AnchorStatus::MissingFromBoth);
    assert!(matches!(
        routed.report.diagnostics.as_slice(),
        [Diagnostic::AnchorMissing { reference, .. }] if reference == "U9"
    ));

    let board = BoardDocument::parse(&routed.text).unwrap();
    let track = &board.tracks()[0];
    assert_eq!(track.start, Point2D::new(0, 0));
    assert_eq!(track.end, Point2D::new(10, 0));
}

#[test]
fn injection_skips_nets_missing_from_board() {
    let ses = r#"(session s
  (placement (resolution mm 10) (component X (place U1 0 0 front 0)))
  (routes (resolution mm 10) (network_out
    (net GND (via 10 -20))
    (net NOPE (via 0 0)))))"#;
    let codes = BTreeMap::from([("".to_string(), NetCode(0)), ("GND".to_string(), NetCode(1))]);

    let injection = inject_vias(
        BOARD,
        ses,
        &codes,
        Some(Point2D::new(150, 26)),
        &MergeConfig::default(),
    )
    .unwrap();

    assert_eq!(injection.injected, 1);
    assert_eq!(injection.skipped, vec!["NOPE".to_string()]);

    let board = BoardDocument::parse(&injection.text).unwrap();
    assert_eq!(board.vias().len(), 1);
    assert_eq!(board.vias()[0].position, Point2D::new(151, 28));
    assert_eq!(board.vias()[0].net, NetCode(1));
    assert!(board.vias()[0].uuid.is_some());
}

#[test]
fn malformed_session_aborts_merge() {
    let truncated = &GPIO_SES[..GPIO_SES.find("(via").unwrap()];
    let err = apply_session_text(BOARD, truncated, &MergeConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Session(_)), "{err}");
}

#[test]
fn inner_layer_wire_is_rejected() {
    let ses = "(session s (routes (resolution mm 10) (network_out
        (net GND (wire (path In1.Cu 2 0 0 10 0))))))";
    let err = apply_session_text(BOARD, ses, &MergeConfig::default()).unwrap_err();
    assert!(err.to_string().contains("In1.Cu"), "{err}");
}

#[test]
fn accepts_raw_session_bytes() {
    let board = BoardDocument::parse(BOARD).unwrap();
    let routed = apply_session(board, GPIO_SES.as_bytes(), &MergeConfig::default()).unwrap();
    assert_eq!(routed.report.tracks_added, 1);
}

#[test]
fn placement_outside_component_anchors_the_merge() {
    let ses = "(session s
  (placement (resolution mm 10) (place U1 0 0 front 0))
  (routes (resolution mm 10) (network_out
    (net GPIO1 (wire (path F.Cu 2 0 0 100 0))))))";
    let routed = apply_session_text(BOARD, ses, &MergeConfig::default()).unwrap();
    assert!(routed.report.anchor.is_found());

    let board = BoardDocument::parse(&routed.text).unwrap();
    assert_eq!(board.tracks()[0].start, Point2D::new(150, 26));
    assert_eq!(board.tracks()[0].end, Point2D::new(160, 26));
}

#[test]
fn via_in_nested_net_lands_on_that_net() {
    let ses = "(session s
  (placement (resolution mm 10) (component X (place U1 0 0 front 0)))
  (routes (resolution mm 10) (network_out
    (net A
      (wire (path F.Cu 2 0 0 100 0))
      (net B
        (via 100 0)
      )
    ))))";
    let routed = apply_session_text(BOARD, ses, &MergeConfig::default()).unwrap();
    assert_eq!(routed.report.nets_created, 2);

    let board = BoardDocument::parse(&routed.text).unwrap();
    let a = board.net_code("A").unwrap();
    let b = board.net_code("B").unwrap();
    assert_eq!(board.tracks()[0].net, a);
    assert_eq!(board.vias().len(), 1);
    assert_eq!(board.vias()[0].net, b);
}
