pub mod app;
pub mod config;
pub mod deadline;
pub mod error;
pub mod filter;
pub mod identity;
pub mod model;
pub mod notify;
pub mod reminder;
pub mod selection;
pub mod speech;
pub mod storage;
pub mod store;
pub mod transfer;

pub use app::App;
pub use error::AppError;

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::model::Task;

    #[test]
    fn task_has_required_fields() {
        let task: Task = serde_json::from_str(
            r#"{"id":"task-1","text":"demo","created_at":"2026-10-18T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(task.id, "task-1");
        assert_eq!(task.text, "demo");
        assert!(!task.done);
        assert_eq!(task.deadline, None);
        assert_eq!(task.created_at, "2026-10-18T00:00:00Z");
    }

    #[test]
    fn app_error_exposes_code() {
        let err = AppError::invalid_input("missing text");
        assert_eq!(err.code(), "invalid_input");
        assert_eq!(err.to_string(), "invalid_input - missing text");
    }
}
