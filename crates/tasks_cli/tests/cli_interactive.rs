use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread::sleep;
use std::time::Duration;

fn run_interactive(home: &Path, input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tasks"))
        .env("TASKS_DATA_DIR", home.join("data"))
        .env("TASKS_CONFIG_PATH", home.join("config.json"))
        .env("TASKS_DISABLE_NOTIFICATIONS", "1")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn interactive session");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin
            .write_all(input.as_bytes())
            .expect("failed to write to stdin");
    }

    child
        .wait_with_output()
        .expect("failed to read interactive output")
}

/// JSON documents printed by `list --json`, in order.
fn json_lists(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .filter(|value| value.get("tasks").is_some())
        .collect()
}

#[test]
fn interactive_help_shows_usage() {
    let home = tempfile::tempdir().unwrap();
    let output = run_interactive(home.path(), "help\nexit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
    assert!(stdout.contains("Not signed in."));
}

#[test]
fn interactive_invalid_command_keeps_running() {
    let home = tempfile::tempdir().unwrap();
    let output = run_interactive(home.path(), "nope\nadd \"unterminated\nwhoami\nexit\n");
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
    assert!(stderr.contains("unterminated quote"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Not signed in.").count(), 2);
}

#[test]
fn interactive_selection_lives_for_the_session() {
    let home = tempfile::tempdir().unwrap();
    let script = "\
signup ada@example.com --password secret1
add \"Buy milk\"
add \"Walk dog\" --deadline 2099-06-01
filter has-deadline
select-all
filter all
list --json
complete-selected
list --json
exit
";
    let output = run_interactive(home.path(), script);
    assert!(output.status.success());

    let lists = json_lists(&output);
    assert_eq!(lists.len(), 2);

    let before = &lists[0]["tasks"];
    assert_eq!(before[0]["selected"], false);
    assert_eq!(before[1]["selected"], true);

    let after = &lists[1]["tasks"];
    assert_eq!(after[0]["done"], false);
    assert_eq!(after[1]["done"], true);
    assert_eq!(after[1]["selected"], false);
    assert_eq!(lists[1]["remaining"], 1);
}

#[test]
fn interactive_logout_empties_the_list() {
    let home = tempfile::tempdir().unwrap();
    let script = "\
signup ada@example.com --password secret1
add private
logout
list
login ada@example.com --password secret1
list --json
exit
";
    let output = run_interactive(home.path(), script);
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not-signed-in"));
    let lists = json_lists(&output);
    assert_eq!(lists[0]["tasks"][0]["text"], "private");
}

#[test]
fn interactive_session_resumes_after_restart() {
    let home = tempfile::tempdir().unwrap();
    run_interactive(
        home.path(),
        "signup ada@example.com --password secret1\nadd persisted\nexit\n",
    );

    let output = run_interactive(home.path(), "exit\n");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Signed in as ada@example.com"));
    assert!(stdout.contains("persisted"));
    assert!(stdout.contains("1 task left"));
}

#[test]
fn interactive_reminders_toggle_and_theme_persists() {
    let home = tempfile::tempdir().unwrap();
    let script = "\
signup ada@example.com --password secret1
remind on
list
remind off
theme light
exit
";
    let output = run_interactive(home.path(), script);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Reminders on, checking every 60s."));
    assert!(stdout.contains("reminders on"));
    assert!(stdout.contains("Reminders off."));
    assert!(stdout.contains("Theme: light"));

    let config = std::fs::read_to_string(home.path().join("config.json")).unwrap();
    let config: serde_json::Value = serde_json::from_str(&config).unwrap();
    assert_eq!(config["theme"], "light");
}

#[test]
fn interactive_dictation_without_command_is_explained() {
    let home = tempfile::tempdir().unwrap();
    let output = run_interactive(home.path(), "dictate\nexit\n");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported_capability"));
    assert!(stderr.contains("speech_command"));
}

#[test]
fn interactive_subcommand_help_goes_to_stdout() {
    let home = tempfile::tempdir().unwrap();
    let output = run_interactive(home.path(), "add --help\nexit\n");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
    assert!(stdout.contains("--deadline"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("ERROR"));
}

#[test]
fn reminder_timer_ticks_until_turned_off() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(
        home.path().join("config.json"),
        r#"{"reminder_interval_secs":1}"#,
    )
    .unwrap();
    run_interactive(
        home.path(),
        "signup ada@example.com --password secret1\nexit\n",
    );

    let mut child = Command::new(env!("CARGO_BIN_EXE_tasks"))
        .env("TASKS_DATA_DIR", home.path().join("data"))
        .env("TASKS_CONFIG_PATH", home.path().join("config.json"))
        .env("TASKS_DISABLE_NOTIFICATIONS", "1")
        .env("RUST_LOG", "tasks=debug")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn interactive session");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin.write_all(b"remind on\n").unwrap();
        stdin.flush().unwrap();
        sleep(Duration::from_millis(1500));
        stdin.write_all(b"remind off\n").unwrap();
        stdin.flush().unwrap();
        sleep(Duration::from_millis(1500));
        stdin.write_all(b"exit\n").unwrap();
    }

    let output = child
        .wait_with_output()
        .expect("failed to read interactive output");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Reminders on, checking every 1s."));
    assert!(stdout.contains("Reminders off."));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("reminder tick").count(), 1);
}
