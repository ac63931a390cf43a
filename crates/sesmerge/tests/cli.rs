use std::process::Output;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use serial_test::serial;

const BOARD: &str = include_str!("resources/board.kicad_pcb");
const GPIO_SES: &str = include_str!("resources/gpio.ses");

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("board.kicad_pcb").write_str(BOARD).unwrap();
    temp.child("board.ses").write_str(GPIO_SES).unwrap();
    temp
}

fn sesmerge(temp: &TempDir, args: &[&str]) -> Output {
    Command::cargo_bin("sesmerge")
        .unwrap()
        .current_dir(temp.path())
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("SESMERGE_AUTOROUTER")
        .args(args)
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
#[serial]
fn apply_writes_routed_board_next_to_input() {
    let temp = workspace();
    let output = sesmerge(&temp, &["apply", "board.kicad_pcb", "board.ses"]);
    assert!(output.status.success(), "{}", stderr(&output));

    insta::assert_snapshot!(stdout(&output), @r"
    Routed board-routed.kicad_pcb
      1 tracks, 1 vias, 1 new nets
    ");

    let routed = std::fs::read_to_string(temp.path().join("board-routed.kicad_pcb")).unwrap();
    assert!(routed.contains("\t(net 2 \"GPIO1\")\n"));
    assert!(routed.contains("\t(segment\n\t\t(start 150 26)\n\t\t(end 160 26)\n"));
    assert!(routed.contains("\t(via\n\t\t(at 160 26)\n"));
}

#[test]
#[serial]
fn apply_json_report() {
    let temp = workspace();
    let output = sesmerge(
        &temp,
        &["apply", "board.kicad_pcb", "board.ses", "-o", "out.kicad_pcb", "--json"],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["tracks_added"], 1);
    assert_eq!(report["vias_added"], 1);
    assert_eq!(report["nets_created"], 1);
    assert_eq!(report["fallback_ran"], false);
    assert_eq!(report["anchor"]["status"], "found");
    assert!(temp.path().join("out.kicad_pcb").is_file());
}

#[test]
#[serial]
fn apply_reports_missing_anchor() {
    let temp = workspace();
    temp.child("sesmerge.toml")
        .write_str("[merge]\nanchor_reference = \"U7\"\n")
        .unwrap();
    let output = sesmerge(
        &temp,
        &["apply", "board.kicad_pcb", "board.ses", "--config", "sesmerge.toml"],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(
        stdout(&output).contains("warning: anchor U7 missing from board and session"),
        "{}",
        stdout(&output)
    );
}

#[test]
#[serial]
fn apply_with_net_map_and_prl() {
    let temp = workspace();
    temp.child("nets.json")
        .write_str(r#"{"SW1": {"1": "BTN"}}"#)
        .unwrap();
    temp.child("board.kicad_prl")
        .write_str(r#"{"board": {"visible_items": ["tracks", "drawing_sheet"]}}"#)
        .unwrap();

    let output = sesmerge(
        &temp,
        &[
            "apply",
            "board.kicad_pcb",
            "board.ses",
            "-o",
            "routed.kicad_pcb",
            "--net-map",
            "nets.json",
            "--prl",
            "board.kicad_prl",
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let routed = std::fs::read_to_string(temp.path().join("routed.kicad_pcb")).unwrap();
    assert!(routed.contains("(net 2 \"BTN\")"));
    assert!(routed.contains("(net 3 \"GPIO1\")"));

    let prl: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(temp.path().join("routed.kicad_prl")).unwrap(),
    )
    .unwrap();
    assert_eq!(prl["board"]["visible_items"], serde_json::json!(["tracks"]));
    assert_eq!(prl["meta"]["filename"], "routed.kicad_prl");
}

#[test]
#[serial]
fn malformed_session_writes_nothing() {
    let temp = workspace();
    temp.child("broken.ses")
        .write_str("(session s (routes (network_out (net A (wire (path F.Cu 1 0 0 1 0))")
        .unwrap();

    let output = sesmerge(&temp, &["apply", "board.kicad_pcb", "broken.ses"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Error:"), "{}", stderr(&output));
    assert!(stderr(&output).contains("never closed"), "{}", stderr(&output));
    assert!(!temp.path().join("board-routed.kicad_pcb").exists());
}

#[test]
#[serial]
fn rejects_unknown_config_keys() {
    let temp = workspace();
    temp.child("bad.toml").write_str("[merge]\nanchor = \"U1\"\n").unwrap();
    let output = sesmerge(
        &temp,
        &["apply", "board.kicad_pcb", "board.ses", "--config", "bad.toml"],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid config bad.toml"), "{}", stderr(&output));
}

#[cfg(unix)]
#[test]
#[serial]
fn autoroute_uses_configured_command() {
    use std::os::unix::fs::PermissionsExt;

    let temp = workspace();
    temp.child("board.dsn").write_str("(pcb board)").unwrap();
    let script = temp.child("fake-router");
    script
        .write_str(&format!(
            "#!/bin/sh\nwhile [ $# -gt 0 ]; do\n  [ \"$1\" = \"-do\" ] && out=\"$2\"\n  shift\ndone\ncat > \"$out\" <<'SES'\n{GPIO_SES}SES\n"
        ))
        .unwrap();
    std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
    temp.child("sesmerge.toml")
        .write_str(&format!(
            "[autorouter]\ncommand = \"{}\"\ntimeout_secs = 30\n",
            script.path().display()
        ))
        .unwrap();

    let output = sesmerge(
        &temp,
        &["route", "board.kicad_pcb", "board.dsn", "--config", "sesmerge.toml"],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let routed = std::fs::read_to_string(temp.path().join("board-routed.kicad_pcb")).unwrap();
    assert!(routed.contains("(net 2 \"GPIO1\")"));

    std::fs::remove_file(temp.path().join("board.ses")).unwrap();
    let output = sesmerge(&temp, &["autoroute", "board.dsn", "--config", "sesmerge.toml"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        std::fs::read_to_string(temp.path().join("board.ses")).unwrap(),
        GPIO_SES
    );
}

#[test]
#[serial]
fn autoroute_without_autorouter_explains_search() {
    let temp = workspace();
    temp.child("board.dsn").write_str("(pcb board)").unwrap();
    temp.child("sesmerge.toml")
        .write_str("[autorouter]\ncommand = \"/nonexistent/router\"\n")
        .unwrap();

    let output = sesmerge(&temp, &["autoroute", "board.dsn", "--config", "sesmerge.toml"]);
    if output.status.success() {
        // A real `freerouting` on PATH took over.
        return;
    }
    let err = stderr(&output);
    assert!(err.contains("could not find an autorouter"), "{err}");
    assert!(err.contains("configured command"), "{err}");
    assert_eq!(
        std::fs::read_to_string(temp.path().join("board.ses")).unwrap(),
        GPIO_SES
    );
}
