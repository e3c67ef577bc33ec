use std::path::Path;
use std::process::{Command, Output};

fn tasks(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tasks"))
        .args(args)
        .env("TASKS_DATA_DIR", home.join("data"))
        .env("TASKS_CONFIG_PATH", home.join("config.json"))
        .env("TASKS_DISABLE_NOTIFICATIONS", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run tasks")
}

fn signup(home: &Path, email: &str) {
    let output = tasks(home, &["signup", email, "--password", "secret1"]);
    assert!(output.status.success());
}

fn fields(home: &Path) -> Vec<(String, bool, Option<String>)> {
    let output = tasks(home, &["list", "--json"]);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    value["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|task| {
            (
                task["text"].as_str().unwrap().to_string(),
                task["done"].as_bool().unwrap(),
                task["deadline"].as_str().map(str::to_string),
            )
        })
        .collect()
}

#[test]
fn export_then_import_round_trip() {
    let home = tempfile::tempdir().unwrap();
    let backups = home.path().join("backups");
    signup(home.path(), "ada@example.com");
    tasks(home.path(), &["add", "Buy milk", "--deadline", "2030-01-02"]);
    tasks(home.path(), &["add", "Call mom", "--deadline", "2030-01-03T09:15"]);
    let read = tasks(home.path(), &["add", "Read", "--json"]);
    let read: serde_json::Value = serde_json::from_slice(&read.stdout).unwrap();
    tasks(home.path(), &["toggle", read["id"].as_str().unwrap()]);
    let before = fields(home.path());

    let exported = tasks(
        home.path(),
        &["export", "--dir", backups.to_str().unwrap(), "--json"],
    );
    let exported: serde_json::Value = serde_json::from_slice(&exported.stdout).unwrap();
    assert_eq!(exported["count"], 3);
    let path = exported["path"].as_str().unwrap().to_string();
    let file_name = Path::new(&path).file_name().unwrap().to_string_lossy();
    assert!(file_name.starts_with("tasks-backup-"));
    assert!(file_name.ends_with(".json"));

    signup(home.path(), "bob@example.com");
    let imported = tasks(home.path(), &["import", &path]);
    assert!(imported.status.success());
    assert!(String::from_utf8_lossy(&imported.stdout).contains("Imported 3 task(s)."));
    assert_eq!(fields(home.path()), before);
}

#[test]
fn import_keeps_only_rows_with_text() {
    let home = tempfile::tempdir().unwrap();
    signup(home.path(), "ada@example.com");
    let file = home.path().join("backup.json");
    std::fs::write(&file, r#"[{"text":"a"},{"text":""},{}]"#).unwrap();

    let output = tasks(home.path(), &["import", file.to_str().unwrap(), "--json"]);
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["imported"], 1);
    assert_eq!(fields(home.path()), vec![("a".to_string(), false, None)]);
}

#[test]
fn import_rejects_bad_documents_without_writing() {
    let home = tempfile::tempdir().unwrap();
    signup(home.path(), "ada@example.com");

    let cases = [
        ("broken.json", "{ nope", "invalid file"),
        ("object.json", r#"{"text":"a"}"#, "invalid backup format"),
        ("empty.json", r#"[{"done":true}]"#, "no valid tasks found"),
    ];
    for (name, content, message) in cases {
        let file = home.path().join(name);
        std::fs::write(&file, content).unwrap();
        let output = tasks(home.path(), &["import", file.to_str().unwrap()]);
        assert!(!output.status.success(), "{name}");
        assert!(
            String::from_utf8_lossy(&output.stderr).contains(message),
            "{name}"
        );
    }
    assert!(fields(home.path()).is_empty());
}

#[test]
fn missing_import_file_is_io_error() {
    let home = tempfile::tempdir().unwrap();
    signup(home.path(), "ada@example.com");

    let output = tasks(home.path(), &["import", "does-not-exist.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("io_error"));
}
