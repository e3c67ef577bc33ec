use crate::error::AppError;
use crate::model::{Created, NewTask, Task, TaskPatch, WriteOp};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub mod json_store;
pub mod memory;

pub use json_store::JsonBackend;
pub use memory::MemoryBackend;

/// Per-user task document store.
///
/// Implementations assign `id` and `created_at` on create and apply
/// `batch_write` atomically: every operation lands or none does.
pub trait TaskBackend {
    /// All tasks in ascending `created_at` order.
    fn list_tasks(&mut self) -> Result<Vec<Task>, AppError>;

    fn create_task(&mut self, fields: &NewTask) -> Result<Created, AppError>;

    fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<(), AppError>;

    fn delete_task(&mut self, id: &str) -> Result<(), AppError>;

    /// Returns one `Created` per `WriteOp::Create`, in operation order.
    fn batch_write(&mut self, ops: &[WriteOp]) -> Result<Vec<Created>, AppError>;
}

pub(crate) fn server_timestamp() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Applies `ops` to `tasks`. Callers hand in a scratch copy so a failure
/// part-way leaves the committed collection untouched.
pub(crate) fn apply_ops(tasks: &mut Vec<Task>, ops: &[WriteOp]) -> Result<Vec<Created>, AppError> {
    let created_at = server_timestamp()?;
    let mut created = Vec::new();

    for op in ops {
        match op {
            WriteOp::Create(fields) => {
                let record = Created {
                    id: new_id(),
                    created_at: created_at.clone(),
                };
                tasks.push(Task {
                    id: record.id.clone(),
                    text: fields.text.clone(),
                    done: fields.done,
                    deadline: fields.deadline.clone(),
                    created_at: record.created_at.clone(),
                });
                created.push(record);
            }
            WriteOp::Update { id, patch } => {
                let task = tasks
                    .iter_mut()
                    .find(|task| &task.id == id)
                    .ok_or_else(|| AppError::not_found(format!("task {id} not found")))?;
                patch.apply(task);
            }
            // Deleting a missing document is not an error.
            WriteOp::Delete { id } => tasks.retain(|task| &task.id != id),
        }
    }

    Ok(created)
}

/// Stable sort by parsed `created_at`; unparseable stamps sort first.
pub(crate) fn sort_by_created_at(tasks: &mut [Task]) {
    tasks.sort_by_cached_key(|task| OffsetDateTime::parse(&task.created_at, &Rfc3339).ok());
}
