//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const HEADER: &str = "StudentID,Grade,Course,TermName,TestRITScore,TestStartDate";

/// A `ritlens` command isolated from any config on the host.
fn ritlens(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("ritlens").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("RITLENS_ROW_CAP")
        .env_remove("RITLENS_STORE_DIR");
    cmd
}

/// Four grade-4 students, both courses, Fall and Spring.
fn sample_export() -> String {
    let students = [
        ("20190001", 205, 215),
        ("20190002", 192, 200),
        ("20190003", 185, 180),
        ("20190004", 199, 212),
    ];
    let mut s = String::from(HEADER);
    for (id, fall, spring) in students {
        for course in ["Reading", "Language Usage"] {
            s.push_str(&format!("\n{id},4,{course},Fall 2025-2026,{fall},9/10/2025"));
            s.push_str(&format!("\n{id},4,{course},Spring 2025-2026,{spring},4/15/2026"));
        }
    }
    s.push('\n');
    s
}

fn write_export(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn validate_well_formed_export() {
    let dir = TempDir::new().unwrap();
    let export = write_export(dir.path(), "export.csv", &sample_export());

    ritlens(dir.path())
        .arg("validate")
        .arg("--input")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("16 row(s), 16 valid, 0 invalid"))
        .stdout(predicate::str::contains("Spring 2025-2026"))
        .stdout(predicate::str::contains("Export valid"));
}

#[test]
fn validate_reports_bad_rows() {
    let dir = TempDir::new().unwrap();
    let content = format!("{HEADER}\n20190001,4,Reading,Fall 2025-2026,999,9/10/2025\n20190002,4,Reading,Fall 2025-2026,201,9/10/2025\n");
    let export = write_export(dir.path(), "export.csv", &content);

    ritlens(dir.path())
        .arg("validate")
        .arg("--input")
        .arg(&export)
        .assert()
        .failure()
        .stdout(predicate::str::contains("line 2 ERROR: TestRITScore"))
        .stderr(predicate::str::contains("1 invalid row(s) found"));
}

#[test]
fn validate_missing_course_column() {
    let dir = TempDir::new().unwrap();
    let export = write_export(
        dir.path(),
        "export.csv",
        "StudentID,Grade,TermName,TestRITScore\n20190001,4,Fall 2025-2026,200\n",
    );

    ritlens(dir.path())
        .arg("validate")
        .arg("--input")
        .arg(&export)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Course"))
        .stderr(predicate::str::contains("not a usable export"));
}

#[test]
fn validate_nonexistent_file() {
    let dir = TempDir::new().unwrap();
    ritlens(dir.path())
        .arg("validate")
        .arg("--input")
        .arg("nonexistent.csv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn ingest_writes_store() {
    let dir = TempDir::new().unwrap();
    let export = write_export(dir.path(), "export.csv", &sample_export());
    let store = dir.path().join("store");

    ritlens(dir.path())
        .arg("ingest")
        .arg("--input")
        .arg(&export)
        .arg("--store")
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("16 inserted"))
        .stdout(predicate::str::contains("4 new student(s)"));

    assert!(store.join("records.json").exists());
    assert!(store.join("students.json").exists());
}

#[test]
fn ingest_twice_replaces() {
    let dir = TempDir::new().unwrap();
    let export = write_export(dir.path(), "export.csv", &sample_export());
    let store = dir.path().join("store");

    for _ in 0..2 {
        ritlens(dir.path())
            .arg("ingest")
            .arg("--input")
            .arg(&export)
            .arg("--store")
            .arg(&store)
            .assert()
            .success();
    }

    let records: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.join("records.json")).unwrap())
            .unwrap();
    assert_eq!(records.as_array().unwrap().len(), 16);
}

#[test]
fn ingest_json_summary_and_skipped_file() {
    let dir = TempDir::new().unwrap();
    let export = write_export(dir.path(), "export.csv", &sample_export());
    let store = dir.path().join("store");

    let output = ritlens(dir.path())
        .arg("ingest")
        .arg("--input")
        .arg(&export)
        .arg(dir.path().join("missing.csv"))
        .arg("--store")
        .arg(&store)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["store"]["inserted"], 16);
    assert_eq!(summary["files"][0]["valid"], 16);
    assert_eq!(summary["skipped"].as_array().unwrap().len(), 1);
}

#[test]
fn ingest_with_no_valid_records_fails() {
    let dir = TempDir::new().unwrap();
    let export = write_export(dir.path(), "empty.csv", &format!("{HEADER}\n"));

    ritlens(dir.path())
        .arg("ingest")
        .arg("--input")
        .arg(&export)
        .arg("--store")
        .arg(dir.path().join("store"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no valid records"));

    assert!(!dir.path().join("store").exists());
}

#[test]
fn report_over_ingested_store() {
    let dir = TempDir::new().unwrap();
    let export = write_export(dir.path(), "export.csv", &sample_export());
    let store = dir.path().join("store");

    ritlens(dir.path())
        .args(["ingest", "--input"])
        .arg(&export)
        .arg("--store")
        .arg(&store)
        .assert()
        .success();

    let report_path = dir.path().join("out/report.json");
    ritlens(dir.path())
        .arg("report")
        .arg("--store")
        .arg(&store)
        .args(["--term", "Spring 2025-2026", "--grade", "4"])
        .args(["--from", "Fall 2025-2026", "--cohort", "2019"])
        .arg("--output")
        .arg(&report_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Benchmark"))
        .stdout(predicate::str::contains("50.0"))
        .stdout(predicate::str::contains("improved"))
        .stdout(predicate::str::contains("Cohort 2019"))
        .stdout(predicate::str::contains("no norm row for: Reading"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["norm_comparisons"].as_array().unwrap().len(), 2);
    assert!(report["norm_comparisons"][0]["national_norm"].is_null());
    assert_eq!(report["norm_comparisons"][0]["students"], 4);
    assert_eq!(report["distribution"]["e1"]["count"], 2);
    assert_eq!(report["distribution"]["classified"], 4);
    assert_eq!(report["transition"]["students"], 4);
}

#[test]
fn report_rejects_bad_term() {
    let dir = TempDir::new().unwrap();
    ritlens(dir.path())
        .args(["report", "--term", "Summer 2025", "--grade", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --term"));
}

#[test]
fn report_on_missing_store_fails() {
    let dir = TempDir::new().unwrap();
    ritlens(dir.path())
        .arg("report")
        .arg("--store")
        .arg(dir.path().join("nowhere"))
        .args(["--term", "Spring 2025-2026", "--grade", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    ritlens(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created ritlens.toml"))
        .stdout(predicate::str::contains("Created norms/sample-norms.csv"));

    assert!(dir.path().join("ritlens.toml").exists());
    assert!(dir.path().join("norms/sample-norms.csv").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    // First init
    ritlens(dir.path()).arg("init").assert().success();

    // Second init should skip
    ritlens(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_config_drives_report() {
    let dir = TempDir::new().unwrap();
    ritlens(dir.path()).arg("init").assert().success();

    let export = write_export(dir.path(), "export.csv", &sample_export());
    ritlens(dir.path())
        .args(["ingest", "--input"])
        .arg(&export)
        .assert()
        .success();
    assert!(dir.path().join("ritlens-store/records.json").exists());

    // the sample norm table has a grade 4 Spring row, so the comparison renders
    ritlens(dir.path())
        .args(["report", "--term", "Spring 2025-2026", "--grade", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("School"))
        .stdout(predicate::str::contains("204.8"));
}

#[test]
fn help_output() {
    let dir = TempDir::new().unwrap();
    ritlens(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Assessment export parser and analytics"));
}

#[test]
fn version_output() {
    let dir = TempDir::new().unwrap();
    ritlens(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ritlens"));
}
