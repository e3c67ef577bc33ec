use crate::deadline::Deadline;
use crate::error::AppError;
use crate::model::{NewTask, Task, normalize_text};
use serde_json::Value;
use time::Date;

/// Pretty JSON array of the tasks, identity fields included.
pub fn export_json(tasks: &[Task]) -> Result<String, AppError> {
    serde_json::to_string_pretty(tasks).map_err(|err| AppError::invalid_data(err.to_string()))
}

pub fn backup_file_name(date: Date) -> String {
    format!(
        "tasks-backup-{:04}-{:02}-{:02}.json",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

/// Parses a backup document into creatable rows.
///
/// Entries without a non-blank string `text` are dropped, `done` follows
/// JavaScript truthiness and a `deadline` that is not a valid deadline string
/// becomes `None`.
pub fn parse_import(content: &str) -> Result<Vec<NewTask>, AppError> {
    let document: Value =
        serde_json::from_str(content).map_err(|_| AppError::import_format("invalid file"))?;
    let Value::Array(entries) = document else {
        return Err(AppError::import_format("invalid backup format"));
    };

    let rows: Vec<NewTask> = entries.iter().filter_map(import_row).collect();
    if rows.is_empty() {
        return Err(AppError::import_format("no valid tasks found"));
    }
    Ok(rows)
}

fn import_row(entry: &Value) -> Option<NewTask> {
    let text = normalize_text(entry.get("text")?.as_str()?)?;
    let deadline = entry
        .get("deadline")
        .and_then(Value::as_str)
        .and_then(|raw| Deadline::parse(raw).ok())
        .map(|deadline| deadline.to_string());

    Some(NewTask {
        text,
        done: entry.get("done").is_some_and(truthy),
        deadline,
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::{backup_file_name, export_json, parse_import};
    use crate::model::{NewTask, Task};
    use time::macros::date;

    #[test]
    fn drops_entries_without_text() {
        let rows = parse_import(r#"[{"text":"a"},{"text":""},{"done":true}]"#).unwrap();
        assert_eq!(
            rows,
            vec![NewTask {
                text: "a".to_string(),
                done: false,
                deadline: None,
            }]
        );
    }

    #[test]
    fn coerces_done_and_deadline() {
        let rows = parse_import(
            r#"[
                {"text":"one","done":1,"deadline":"2026-10-20"},
                {"text":"two","done":"","deadline":"someday"},
                {"text":"three","done":"yes","deadline":42},
                {"text":"  four  ","done":null,"deadline":"2026-10-20T09:30"},
                {"text":"   "},
                {"text":7}
            ]"#,
        )
        .unwrap();

        let summary: Vec<(&str, bool, Option<&str>)> = rows
            .iter()
            .map(|row| (row.text.as_str(), row.done, row.deadline.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("one", true, Some("2026-10-20")),
                ("two", false, None),
                ("three", true, None),
                ("four", false, Some("2026-10-20T09:30")),
            ]
        );
    }

    #[test]
    fn rejects_unparseable_file() {
        let err = parse_import("{ not json").unwrap_err();
        assert_eq!(err.code(), "import_format");
        assert_eq!(err.message(), "invalid file");
    }

    #[test]
    fn rejects_non_array_document() {
        let err = parse_import(r#"{"text":"a"}"#).unwrap_err();
        assert_eq!(err.message(), "invalid backup format");
    }

    #[test]
    fn reports_when_nothing_is_importable() {
        let err = parse_import(r#"[{"text":""},{}]"#).unwrap_err();
        assert_eq!(err.message(), "no valid tasks found");
        let err = parse_import("[]").unwrap_err();
        assert_eq!(err.message(), "no valid tasks found");
    }

    #[test]
    fn export_is_pretty_task_array() {
        let tasks = vec![Task {
            id: "t1".to_string(),
            text: "Buy milk".to_string(),
            done: true,
            deadline: Some("2026-10-20".to_string()),
            created_at: "2026-10-18T08:00:00Z".to_string(),
        }];
        let exported = export_json(&tasks).unwrap();
        assert!(exported.contains("\n  {"));

        let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(value[0]["id"], "t1");
        assert_eq!(value[0]["text"], "Buy milk");
        assert_eq!(value[0]["done"], true);
        assert_eq!(value[0]["deadline"], "2026-10-20");
        assert_eq!(value[0]["created_at"], "2026-10-18T08:00:00Z");
    }

    #[test]
    fn backup_name_uses_iso_date() {
        assert_eq!(
            backup_file_name(date!(2026 - 03 - 07)),
            "tasks-backup-2026-03-07.json"
        );
    }
}
