use std::fs;
use std::path::Path;
use std::process::Command;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_fleetcore")
}

const CATALOG: &str = r#"
ships:
  - id: cruiser
    channel: laser
    damage: 20
    hp: 100
  - id: bastion
    channel: kinetic
    damage: 1
    hp: 1000
    shields: { laser: 10 }
gems:
  - id: ruby
    modifier: { damage_pct: 0.1 }
counters:
  - attacker: wedge
    defender: line
    multiplier: 1.3
"#;

const SCENARIO: &str = r#"
catalog_path: catalog.yaml
start: "2027-01-01T00:00:00Z"
max_rounds: 3
attacker:
  id: blue
  ships: { cruiser: 10 }
  loadouts: { cruiser: [ruby] }
  formation: { formation_type: wedge }
defender:
  id: red
  ships: { bastion: 5 }
  formation: { formation_type: line }
"#;

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path.to_string_lossy().into_owned()
}

#[test]
fn unknown_command_prints_usage() {
    let output = Command::new(bin()).output().expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: fleetcore"));
}

#[test]
fn simulate_runs_scenario_and_emits_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "catalog.yaml", CATALOG);
    let scenario = write(dir.path(), "scenario.yaml", SCENARIO);

    let output = Command::new(bin())
        .args(["simulate", &scenario])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("simulate should emit json");
    let rounds = payload["rounds"].as_array().expect("rounds array");
    assert_eq!(rounds.len(), 3);
    // 10 × 20 × 1.1 gem × 1.3 counter = 286 raw, shield 10 → 114.4
    let dealt = rounds[0]["attacker_damage_dealt"].as_f64().expect("number");
    assert!((dealt - 114.4).abs() < 1e-9, "dealt {dealt}");
    assert!(payload["winner"].is_null());
}

#[test]
fn simulate_round_override() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "catalog.yaml", CATALOG);
    let scenario = write(dir.path(), "scenario.yaml", SCENARIO);

    let output = Command::new(bin())
        .args(["simulate", &scenario, "1"])
        .output()
        .expect("simulate should run");
    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["rounds"].as_array().map(Vec::len), Some(1));
}

#[test]
fn breakdown_lists_layers_per_group() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "catalog.yaml", CATALOG);
    let scenario = write(dir.path(), "scenario.yaml", SCENARIO);

    let output = Command::new(bin())
        .args(["breakdown", &scenario])
        .output()
        .expect("breakdown should run");
    assert_eq!(output.status.code(), Some(0));
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["fleet"], "blue");
    assert_eq!(rows[0]["layers"][0]["source"], "equipment");
    assert_eq!(rows[0]["layers"][0]["source_id"], "ruby");
}

#[test]
fn validate_reports_errors_with_exit_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = write(dir.path(), "good.yaml", CATALOG);
    let bad = write(
        dir.path(),
        "bad.yaml",
        "ships:\n  - id: husk\n    channel: laser\n    damage: 1\n    hp: 0\n",
    );

    let output = Command::new(bin())
        .args(["validate", &good])
        .output()
        .expect("validate should run");
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("validation passed"));

    let output = Command::new(bin())
        .args(["validate", &bad])
        .output()
        .expect("validate should run");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("hp must be positive"));
}

#[test]
fn missing_scenario_file_fails_cleanly() {
    let output = Command::new(bin())
        .args(["simulate", "/nonexistent/scenario.yaml"])
        .output()
        .expect("simulate should run");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load scenario"));
}
