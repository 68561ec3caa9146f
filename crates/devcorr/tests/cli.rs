use assert_cmd::Command;
use devcorr::io::{CorrectionReport, ReportPayload};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn rows_json() -> String {
    let rows: Vec<String> = (1..=12)
        .map(|i| {
            let v = 0.01 * (i as f64 - 6.5);
            format!(
                r#"{{"row_index":{i},"positions":{{"left":{{"x":{v},"y":0.02}},"center":{{"y":0.02}},"right":{{"x":{v},"y":0.02}}}}}}"#
            )
        })
        .collect();
    format!("[{}]", rows.join(","))
}

fn corners(id: &str, xy: [[f64; 2]; 4]) -> String {
    let names = ["top_left", "top_right", "bottom_left", "bottom_right"];
    let points: Vec<String> = names
        .iter()
        .zip(xy)
        .map(|(n, [x, y])| format!(r#""{n}":{{"position":"{n}","x":{x},"y":{y}}}"#))
        .collect();
    format!(r#"{{"layer_id":"{id}","points":{{{}}}}}"#, points.join(","))
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write input");
    path
}

fn read_report(path: &Path) -> CorrectionReport {
    CorrectionReport::load_json(path).expect("report")
}

#[test]
fn simulate_writes_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write(
        dir.path(),
        "simulate.json",
        &format!(
            r#"{{"rows":{},"offsets":{{"global":{{"rotation":-0.009,"translate_x":0.0,"translate_y":-0.02}}}}}}"#,
            rows_json()
        ),
    );
    let output = dir.path().join("report.json");

    Command::cargo_bin("devcorr")
        .expect("binary")
        .args(["simulate", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let report = read_report(&output);
    assert!(report.error.is_none());
    let Some(ReportPayload::Simulate(sim)) = report.result else {
        panic!("expected simulate payload");
    };
    assert_eq!(sim.per_row.len(), 12);
    // tilt and offset are gone; the rotation leaves a small left/right split on y
    assert!(sim.after.worst_x < 1e-9);
    assert!(sim.after.worst_y < 0.001);
    assert!(sim.before.worst > 0.05);
}

#[test]
fn recommend_prints_to_stdout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write(
        dir.path(),
        "recommend.json",
        &format!(
            r#"{{"rows":{},"secondary_available":true,"standalone":true}}"#,
            rows_json()
        ),
    );

    Command::cargo_bin("devcorr")
        .expect("binary")
        .args(["recommend", "--input"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""operation": "recommend""#))
        .stdout(predicate::str::contains("standalone"));
}

#[test]
fn optimize_uses_config_ranges() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write(
        dir.path(),
        "optimize.json",
        &format!(
            r#"{{"mode":"joint_alignment","base":{},"overlay":{}}}"#,
            corners("carbon", [[0.05, 0.01], [0.06, 0.02], [0.04, 0.0], [0.05, 0.01]]),
            corners("insulation", [[-0.05, 0.03], [-0.04, 0.04], [-0.06, 0.02], [-0.05, 0.03]]),
        ),
    );
    let config = write(
        dir.path(),
        "engine.json",
        r#"{"ranges":{"base":{"rotation_min":0.0,"rotation_max":0.0,"x_min":0.0,"x_max":0.0,"y_min":0.0,"y_max":0.0}}}"#,
    );
    let output = dir.path().join("report.json");

    Command::cargo_bin("devcorr")
        .expect("binary")
        .args(["optimize", "--input"])
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let Some(ReportPayload::Optimize(res)) = read_report(&output).result else {
        panic!("expected optimize payload");
    };
    let base = res.offsets[&devcorr::LayerId::from("carbon")];
    assert_eq!(base, devcorr::OffsetVector::ZERO);
    assert!(res.objective_after < res.objective_before);
}

#[test]
fn anchored_reports_engine_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write(
        dir.path(),
        "anchored.json",
        &format!(
            r#"{{"layer":{},"target":[0.01,0.02]}}"#,
            corners("insulation", [[0.0, 0.0]; 4])
        ),
    );
    let config = write(
        dir.path(),
        "engine.json",
        r#"{"sweep":{"step":0.0,"max_steps":10}}"#,
    );

    Command::cargo_bin("devcorr")
        .expect("binary")
        .args(["anchored", "--input"])
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("rotation step"));
}

#[test]
fn missing_input_fails() {
    Command::cargo_bin("devcorr")
        .expect("binary")
        .args(["simulate", "--input", "/nonexistent/devcorr.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("devcorr:"));
}
