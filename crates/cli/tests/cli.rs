use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Binary wired to a temp SQLite file, a temp blob dir and in-memory metrics
fn postsaga(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("postsaga");
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env(
            "POSTSAGA__RELATIONAL__DB_PATH",
            dir.path().join("posts.sqlite"),
        )
        .env("POSTSAGA__BLOB__BACKEND", "fs")
        .env("POSTSAGA__BLOB__FS__ROOT", dir.path().join("blobs"))
        .env("POSTSAGA__METRICS__BACKEND", "memory");
    cmd
}

fn write_upload(dir: &TempDir, name: &str, content: &str) {
    let uploads = dir.path().join("uploads");
    fs::create_dir_all(&uploads).expect("create uploads dir");
    fs::write(uploads.join(name), content).expect("write upload");
}

fn create(dir: &TempDir, post_id: &str, file_name: &str) {
    postsaga(dir)
        .args(["create", "--post-id", post_id, "--user-id", "u1"])
        .args(["--title", "Pizza night", "--dir"])
        .arg(dir.path().join("uploads"))
        .args(["--file-name", file_name])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Created post {}", post_id)));
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("run postsaga");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("postsaga");
    cmd.current_dir(dir.path())
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("[metrics.influx]"));
    assert!(content.contains("call_timeout_secs = 10"));

    let mut again = cargo_bin_cmd!("postsaga");
    again
        .current_dir(dir.path())
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn create_then_show_round_trip() {
    let dir = TempDir::new().expect("temp dir");
    write_upload(&dir, "f.jpg", "jpeg bytes");
    create(&dir, "p1", "f.jpg");

    let saved = dir.path().join("out").join("copy.jpg");
    let value = json_output(
        postsaga(&dir)
            .args(["show", "p1", "--json", "--save"])
            .arg(&saved),
    );

    assert_eq!(value["status"], "active");
    assert_eq!(value["file_name"], "f.jpg");
    assert_eq!(value["attachment"]["state"], "loaded");
    assert_eq!(value["attachment"]["size"], 10);
    assert_eq!(fs::read_to_string(&saved).expect("saved file"), "jpeg bytes");
    assert!(dir.path().join("blobs").join("f.jpg").exists());
}

#[test]
fn deleted_post_shows_as_deleted() {
    let dir = TempDir::new().expect("temp dir");
    write_upload(&dir, "f.jpg", "x");
    create(&dir, "p1", "f.jpg");

    postsaga(&dir)
        .args(["delete", "p1", "--user-id", "u1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted post p1"));
    postsaga(&dir)
        .args(["delete", "p1", "--user-id", "u1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already applied"));

    let value = json_output(postsaga(&dir).args(["show", "p1", "--json"]));
    assert_eq!(value["post_id"], "p1");
    assert_eq!(value["status"], "Deleted");
    assert!(!dir.path().join("blobs").join("f.jpg").exists());

    let listed = json_output(postsaga(&dir).args(["list", "--json"]));
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
}

#[test]
fn upvotes_are_counted_once_per_user() {
    let dir = TempDir::new().expect("temp dir");
    write_upload(&dir, "f.jpg", "x");
    create(&dir, "p1", "f.jpg");

    for _ in 0..2 {
        postsaga(&dir)
            .args(["upvote", "p1", "--user-id", "u2"])
            .assert()
            .success();
    }

    let listed = json_output(postsaga(&dir).args(["list", "--json"]));
    assert_eq!(listed[0]["post_id"], "p1");
    assert_eq!(listed[0]["upvotes"], 1);
}

#[test]
fn edit_renames_attachment() {
    let dir = TempDir::new().expect("temp dir");
    write_upload(&dir, "a.jpg", "old");
    write_upload(&dir, "b.jpg", "new");
    create(&dir, "p1", "a.jpg");

    postsaga(&dir)
        .args(["edit", "p1", "--user-id", "u1", "--title", "Taco night"])
        .args(["--file-name", "b.jpg", "--dir"])
        .arg(dir.path().join("uploads"))
        .assert()
        .success();

    let blobs = dir.path().join("blobs");
    assert!(!blobs.join("a.jpg").exists());
    assert_eq!(fs::read_to_string(blobs.join("b.jpg")).expect("b.jpg"), "new");

    let value = json_output(postsaga(&dir).args(["show", "p1", "--json"]));
    assert_eq!(value["title"], "Taco night");
    assert_eq!(value["file_name"], "b.jpg");
}

#[test]
fn title_only_edit_keeps_attachment() {
    let dir = TempDir::new().expect("temp dir");
    write_upload(&dir, "a.jpg", "keep");
    create(&dir, "p1", "a.jpg");

    postsaga(&dir)
        .args(["edit", "p1", "--user-id", "u1", "--title", "Taco night"])
        .assert()
        .success();

    let value = json_output(postsaga(&dir).args(["show", "p1", "--json"]));
    assert_eq!(value["title"], "Taco night");
    assert_eq!(value["file_name"], "a.jpg");
    assert_eq!(value["attachment"]["state"], "loaded");
    assert!(dir.path().join("blobs").join("a.jpg").exists());

    postsaga(&dir)
        .args(["edit", "p1", "--user-id", "u1", "--title", "Taco night", "--detach"])
        .assert()
        .success();

    let value = json_output(postsaga(&dir).args(["show", "p1", "--json"]));
    assert_eq!(value["file_name"], "");
    assert!(value.get("attachment").is_none());
    assert!(!dir.path().join("blobs").join("a.jpg").exists());
}

#[test]
fn duplicate_create_fails() {
    let dir = TempDir::new().expect("temp dir");
    write_upload(&dir, "f.jpg", "x");
    create(&dir, "p1", "f.jpg");

    postsaga(&dir)
        .args(["create", "--post-id", "p1", "--user-id", "u9", "--title", "Again"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn unknown_post_edit_fails() {
    let dir = TempDir::new().expect("temp dir");

    postsaga(&dir)
        .args(["edit", "ghost", "--user-id", "u1", "--title", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn doctor_reports_in_memory_metrics_as_warning() {
    let dir = TempDir::new().expect("temp dir");

    let value = json_output(postsaga(&dir).args(["doctor", "--json"]));

    assert_eq!(value["config"]["status"], "ok");
    assert_eq!(value["relational"]["status"], "ok");
    assert_eq!(value["blob"]["status"], "ok");
    assert_eq!(value["metrics"]["status"], "warn");
    assert_eq!(value["overall"], "warn");
}
