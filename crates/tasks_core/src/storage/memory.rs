use crate::error::AppError;
use crate::model::{Created, NewTask, Task, TaskPatch, WriteOp};
use crate::storage::{TaskBackend, apply_ops, sort_by_created_at};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// In-process backend. Clones share the same collection, so a caller can
/// keep a handle for inspection after boxing one into an `App`.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tasks: Rc<RefCell<Vec<Task>>>,
    offline: Rc<Cell<bool>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let backend = Self::default();
        backend.tasks.replace(tasks);
        backend
    }

    /// While offline every call fails with an `io_error`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.borrow().clone()
    }

    fn ensure_online(&self) -> Result<(), AppError> {
        if self.offline.get() {
            return Err(AppError::io("backend unavailable"));
        }
        Ok(())
    }

    fn commit(&self, ops: &[WriteOp]) -> Result<Vec<Created>, AppError> {
        self.ensure_online()?;
        let mut scratch = self.tasks.borrow().clone();
        let created = apply_ops(&mut scratch, ops)?;
        self.tasks.replace(scratch);
        Ok(created)
    }
}

impl TaskBackend for MemoryBackend {
    fn list_tasks(&mut self) -> Result<Vec<Task>, AppError> {
        self.ensure_online()?;
        let mut tasks = self.snapshot();
        sort_by_created_at(&mut tasks);
        Ok(tasks)
    }

    fn create_task(&mut self, fields: &NewTask) -> Result<Created, AppError> {
        self.commit(&[WriteOp::Create(fields.clone())])?
            .pop()
            .ok_or_else(|| AppError::invalid_data("create produced no record"))
    }

    fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<(), AppError> {
        self.commit(&[WriteOp::Update {
            id: id.to_string(),
            patch: patch.clone(),
        }])?;
        Ok(())
    }

    fn delete_task(&mut self, id: &str) -> Result<(), AppError> {
        self.commit(&[WriteOp::Delete { id: id.to_string() }])?;
        Ok(())
    }

    fn batch_write(&mut self, ops: &[WriteOp]) -> Result<Vec<Created>, AppError> {
        self.commit(ops)
    }
}
