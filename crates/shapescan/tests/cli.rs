use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use shapescan::core::SheetLayout;
use shapescan::load::encode_png;
use shapescan::synth::{render_scene, CameraPose, SceneSpec};
use shapescan::{load_image, LoadParams, ScanConfig};

fn shapescan() -> Command {
    Command::cargo_bin("shapescan").expect("binary built")
}

fn write_scene(path: &Path, with_object: bool) {
    let layout = SheetLayout::a4_v1();
    let pose = CameraPose {
        rotation_deg: 5.0,
        tilt_deg: 8.0,
        ..CameraPose::default()
    };
    let spec = if with_object {
        SceneSpec::rectangle(1500, 2000, pose, &layout, 50.0, 30.0)
    } else {
        SceneSpec::empty_sheet(1500, 2000, pose)
    };
    let scene = render_scene(&spec, &layout).unwrap();
    fs::write(path, encode_png(&scene.photo).unwrap()).unwrap();
}

#[test]
fn config_prints_defaults() {
    shapescan()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"px_per_mm\": 10.0"))
        .stdout(predicate::str::contains("\"version\": \"a4-v1\""));
}

#[test]
fn config_file_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("default.json");
    shapescan()
        .args(["config", "--out"])
        .arg(&path)
        .assert()
        .success();
    assert_eq!(ScanConfig::load_json(&path).unwrap(), ScanConfig::default());
}

#[test]
fn sheet_renders_a4_at_the_requested_density() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sheet.png");
    shapescan()
        .args(["sheet", "--px-per-mm", "2", "--out"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("420 x 594"));
    let img = load_image(&fs::read(&path).unwrap(), &LoadParams::default()).unwrap();
    assert_eq!((img.image.width(), img.image.height()), (420, 594));
}

#[test]
fn scan_writes_both_documents_and_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("photo.png");
    write_scene(&photo, true);
    let out_dir = dir.path().join("out");
    let report = dir.path().join("report.json");

    shapescan()
        .args(["--log-level", "warn", "scan"])
        .arg(&photo)
        .arg("--out-dir")
        .arg(&out_dir)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("scale 10 px/mm"));

    let svg = fs::read_to_string(out_dir.join("output.svg")).unwrap();
    assert!(svg.contains("<svg") && svg.contains("mm\""));
    let dxf = fs::read_to_string(out_dir.join("output.dxf")).unwrap();
    assert!(dxf.contains("$INSUNITS") && dxf.contains("POLYLINE"));

    let raw = fs::read_to_string(report).unwrap();
    let report: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(report["scale"], 10.0);
    assert_eq!(report["contours_count"], 1);
    assert_eq!(report["request_id"], "photo");
}

#[test]
fn scan_failures_print_the_error_kind() {
    let dir = tempfile::tempdir().unwrap();

    let junk = dir.path().join("junk.jpg");
    fs::write(&junk, b"not a photo").unwrap();
    shapescan()
        .arg("scan")
        .arg(&junk)
        .arg("--out-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error [invalid_image]"));

    let empty = dir.path().join("empty.png");
    write_scene(&empty, false);
    shapescan()
        .arg("scan")
        .arg(&empty)
        .arg("--out-dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error [no_object_detected]"));
    assert!(!dir.path().join("output.svg").exists());

    shapescan()
        .arg("scan")
        .arg(dir.path().join("missing.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}
