//! Command-line behavior of the `lib-solver` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ENV_VARS: [&str; 6] = [
    "VDB_SYSTEM_LOAD_LIBRARY",
    "VDB_DISABLE_DOWNLOAD",
    "VDB_DISABLE_LATEST_SEARCH",
    "VDB_LOAD_LIBRARY_LOCATIONS",
    "NCBI_HOME",
    "VDB_LOG",
];

fn lib_solver(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lib-solver").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--home").arg(home.path());
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("lib-solver")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("cache"))
        .stdout(predicate::str::contains("--no-download"));
}

#[test]
fn test_empty_cache_text() {
    let home = TempDir::new().unwrap();
    lib_solver(&home)
        .args(["cache", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached libraries."));
}

#[test]
fn test_empty_cache_json() {
    let home = TempDir::new().unwrap();
    lib_solver(&home)
        .args(["cache", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn test_cache_show_and_clear() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("LibManager.properties"),
        "#test\n/dll/ngs-sdk/64/saved/path=/opt/libngs-sdk.so\n/dll/ngs-sdk/64/saved/version=2.10.0\n\
         /dll/ngs-sdk/32/saved/path=/opt/ngs-sdk.dll\n/dll/ngs-sdk/32/saved/version=2.10.0\n",
    )
    .unwrap();

    if cfg!(target_pointer_width = "64") {
        lib_solver(&home)
            .args(["cache", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ngs-sdk (64-bit)"))
            .stdout(predicate::str::contains("saved: /opt/libngs-sdk.so (2.10.0)"));

        lib_solver(&home)
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared 1 cache record(s)"));

        lib_solver(&home)
            .args(["cache", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached libraries."));
    }
}

#[test]
fn test_failed_resolution_exits_non_zero() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    lib_solver(&home)
        .current_dir(work.path())
        .args(["--no-download", "--locations", "W", "resolve", "widget", "2.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("auto-download is disabled"))
        .stderr(predicate::str::contains("install ngs and ncbi-vdb manually"));

    assert!(home.path().join("LibManager.properties").is_file());
}

#[test]
fn test_locations_respect_codes() {
    let home = TempDir::new().unwrap();
    lib_solver(&home)
        .args(["--locations", "NK", "locations"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("N install home"))
        .stdout(predicate::str::contains("K cache"));
}

#[test]
fn test_locations_json() {
    let home = TempDir::new().unwrap();
    lib_solver(&home)
        .args(["--no-download", "locations", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"install_home\""))
        .stdout(predicate::str::contains("\"download\"").not());
}

#[test]
fn test_bad_location_codes() {
    let home = TempDir::new().unwrap();
    lib_solver(&home)
        .args(["--locations", "xyz", "locations"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No known location code"));
}

#[test]
fn test_probe_rejects_non_library() {
    let home = TempDir::new().unwrap();
    let lib = home.path().join("libngs-sdk.so");
    std::fs::write(&lib, b"not a library").unwrap();

    lib_solver(&home)
        .arg("probe")
        .arg("ngs-sdk")
        .arg(&lib)
        .assert()
        .failure()
        .stdout(predicate::str::contains("LibManager:").not());
}

#[test]
fn test_delete_without_downloads() {
    let home = TempDir::new().unwrap();
    lib_solver(&home)
        .args(["delete", "ngs-sdk"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ngs-sdk: removed 0 file(s)"));
}
