use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn scout(cwd: &Path, home: &Path, docs: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("docscout");
    cmd.current_dir(cwd)
        .env("DOCSCOUT_HOME", home)
        .env("DOCSCOUT_SOURCE_DIR", docs);
    cmd
}

/// Two runs: Doc1 and Doc2 appear on 06-01, Doc1 changes and Doc2 leaves on 06-02.
fn seed_history(cwd: &Path, home: &Path, docs: &Path) {
    fs::create_dir_all(docs).expect("mkdir docs");
    fs::write(docs.join("Doc1.pdf"), b"v1").expect("write");
    fs::write(docs.join("Doc2.pdf"), b"two").expect("write");
    scout(cwd, home, docs)
        .args(["run", "--date", "2025-06-01"])
        .assert()
        .success();

    fs::write(docs.join("Doc1.pdf"), b"v2").expect("rewrite");
    fs::remove_file(docs.join("Doc2.pdf")).expect("remove");
    scout(cwd, home, docs)
        .args(["run", "--date", "2025-06-02"])
        .assert()
        .success();
}

#[test]
fn log_filters_by_date_kind_and_document() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("home");
    let docs = tmp.path().join("docs");
    seed_history(tmp.path(), &home, &docs);

    scout(tmp.path(), &home, &docs)
        .arg("log")
        .assert()
        .success()
        .stdout(predicate::str::contains("shown=4 total=4"));

    scout(tmp.path(), &home, &docs)
        .args(["log", "--since", "2025-06-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("UPDATED Doc1"))
        .stdout(predicate::str::contains("REMOVED Doc2"))
        .stdout(predicate::str::contains(" NEW ").not());

    scout(tmp.path(), &home, &docs)
        .args(["log", "--kind", "new", "--document", "Doc2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shown=1 total=4"));

    scout(tmp.path(), &home, &docs)
        .args(["log", "--kind", "moved"])
        .assert()
        .code(1);
}

#[test]
fn verify_passes_on_consistent_stores_and_flags_orphans() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("home");
    let docs = tmp.path().join("docs");
    seed_history(tmp.path(), &home, &docs);

    scout(tmp.path(), &home, &docs)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("stores consistent"));

    fs::write(home.join("_archive").join("stray.pdf"), b"x").expect("write stray");
    scout(tmp.path(), &home, &docs)
        .arg("verify")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("stray.pdf"));
}

#[test]
fn status_reports_store_sizes_as_json() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("home");
    let docs = tmp.path().join("docs");
    seed_history(tmp.path(), &home, &docs);

    let output = scout(tmp.path(), &home, &docs)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).expect("json report");
    assert_eq!(report["command"], "status");
    assert_eq!(report["ok"], true);
    let details: Vec<&str> = report["details"]
        .as_array()
        .expect("details")
        .iter()
        .filter_map(|d| d.as_str())
        .collect();
    assert!(details.contains(&"source_kind=directory"));
    assert!(details.contains(&"checkpoint_documents=1"));
    assert!(details.contains(&"log_entries=4"));
    assert!(details.contains(&"archive_files=1"));
    assert!(details.contains(&"lock=free"));
}

#[test]
fn status_flags_unrecognised_scout_variables() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("home");
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).expect("mkdir docs");

    scout(tmp.path(), &home, &docs)
        .env(format!("{}WROKERS", "DOCSCOUT_"), "8")
        .arg("status")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("unrecognised environment variable"));
}
