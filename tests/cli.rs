use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn build_assets() -> TempDir {
    // A single triangle stands in for the motorcycle, a quad for the lot.
    let triangle = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
    let quad = "v -1 0 -1\nv 1 0 -1\nv 1 0 1\nv -1 0 1\nf 1 2 3 4\n";

    let dir = TempDir::new().expect("temp assets dir");
    fs::write(dir.path().join("motorcycle.obj"), triangle).expect("write motorcycle");
    fs::write(dir.path().join("parking_lot.obj"), quad).expect("write parking lot");
    dir
}

#[test]
fn cli_prints_the_scene_summary_headless() {
    let assets = build_assets();
    let mut cmd = Command::cargo_bin("moto-showcase").expect("binary exists");
    cmd.arg(assets.path()).arg("--headless");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 2 objects (3 point lights)"))
        .stdout(contains(" - motorcycle (motorcycle.obj, 1 triangles)"))
        .stdout(contains(" - parking_lot (parking_lot.obj, 2 triangles)"))
        .stdout(contains("Time of day: 8.00h (Day)"));
}

#[test]
fn cli_honours_the_start_time_flag() {
    let assets = build_assets();
    let mut cmd = Command::cargo_bin("moto-showcase").expect("binary exists");
    cmd.arg(assets.path())
        .arg("--headless")
        .args(["--time", "23.5"]);
    cmd.assert()
        .success()
        .stdout(contains("Time of day: 23.50h (Night)"));
}

#[test]
fn cli_fails_on_a_missing_assets_directory() {
    let mut cmd = Command::cargo_bin("moto-showcase").expect("binary exists");
    cmd.arg("/nonexistent-assets").arg("--headless");
    cmd.assert()
        .failure()
        .stderr(contains("failed to load mesh for motorcycle"));
}

#[test]
fn cli_rejects_unknown_flags() {
    let mut cmd = Command::cargo_bin("moto-showcase").expect("binary exists");
    cmd.arg("--frobnicate");
    cmd.assert().failure().stderr(contains("Unknown argument"));
}
