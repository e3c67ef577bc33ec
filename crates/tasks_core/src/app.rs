use crate::deadline::normalize_deadline;
use crate::error::AppError;
use crate::filter::{Filter, project};
use crate::model::{NewTask, Task, TaskPatch, WriteOp, normalize_text};
use crate::notify::Notifier;
use crate::reminder::Reminders;
use crate::selection::{SelectAllState, Selection};
use crate::storage::{TaskBackend, server_timestamp};
use crate::store::TaskStore;
use crate::transfer::{export_json, parse_import};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Owns every piece of session state and routes each user action through
/// the same cycle: local mutation first, then the backend write.
///
/// A failed backend write is returned as `AppError::RemoteWrite` and the
/// local mutation is kept.
pub struct App {
    store: TaskStore,
    selection: Selection,
    filter: Filter,
    reminders: Reminders,
    backend: Option<Box<dyn TaskBackend>>,
    notifier: Box<dyn Notifier>,
    next_local_id: u64,
}

impl App {
    /// A signed-out controller. Task actions fail until `attach` is called.
    pub fn new(notifier: Box<dyn Notifier>, reminders: Reminders) -> Self {
        Self {
            store: TaskStore::new(),
            selection: Selection::new(),
            filter: Filter::All,
            reminders,
            backend: None,
            notifier,
            next_local_id: 0,
        }
    }

    /// Binds the signed-in user's backend and loads their tasks.
    pub fn attach(&mut self, backend: Box<dyn TaskBackend>) -> Result<usize, AppError> {
        self.backend = Some(backend);
        self.load()
    }

    pub fn is_attached(&self) -> bool {
        self.backend.is_some()
    }

    pub fn ensure_attached(&self) -> Result<(), AppError> {
        match self.backend {
            Some(_) => Ok(()),
            None => Err(not_signed_in()),
        }
    }

    /// Replaces the collection with the backend's copy and resets the
    /// session state derived from it.
    pub fn load(&mut self) -> Result<usize, AppError> {
        let tasks = self.backend()?.list_tasks()?;
        let count = tasks.len();
        self.store.load(tasks);
        self.selection.clear();
        self.reminders.reset();
        self.filter = Filter::All;
        info!(count, "tasks loaded");
        Ok(count)
    }

    /// Drops the backend and empties everything held for the previous user.
    pub fn sign_out(&mut self) {
        self.backend = None;
        self.store.clear();
        self.selection.clear();
        self.reminders.reset();
        self.filter = Filter::All;
        debug!("session state cleared");
    }

    pub fn tasks(&self) -> &[Task] {
        self.store.tasks()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.store.get(id)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    /// Tasks passing the current filter, in store order.
    pub fn visible(&self) -> Vec<&Task> {
        project(self.store.tasks(), self.filter)
    }

    pub fn active_count(&self) -> usize {
        self.store.active_count()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn reminders(&self) -> &Reminders {
        &self.reminders
    }

    /// Adds a task. Blank text is ignored and yields `Ok(None)`.
    pub fn add_task(
        &mut self,
        text: &str,
        deadline: Option<&str>,
    ) -> Result<Option<Task>, AppError> {
        let Some(text) = normalize_text(text) else {
            return Ok(None);
        };
        let deadline = normalize_deadline(deadline)?;
        self.backend()?;

        self.next_local_id += 1;
        let provisional_id = format!("local-{}", self.next_local_id);
        self.store.add(Task {
            id: provisional_id.clone(),
            text: text.clone(),
            done: false,
            deadline: deadline.clone(),
            created_at: server_timestamp()?,
        });

        let fields = NewTask {
            text,
            done: false,
            deadline,
        };
        let created = self
            .backend()?
            .create_task(&fields)
            .map_err(|err| remote_failure("could not add task", &err))?;

        self.store.reconcile(&provisional_id, &created);
        debug!(task_id = %created.id, "task added");
        Ok(self.store.get(&created.id).cloned())
    }

    /// Flips `done` and returns the new value.
    pub fn toggle(&mut self, id: &str) -> Result<bool, AppError> {
        self.backend()?;
        let done = self
            .store
            .toggle(id)
            .ok_or_else(|| AppError::not_found(format!("task {id} not found")))?;

        self.backend()?
            .update_task(id, &TaskPatch::done(done))
            .map_err(|err| remote_failure("could not update task", &err))?;
        debug!(task_id = %id, done, "task toggled");
        Ok(done)
    }

    /// Replaces text and deadline. Blank text is a validation error and
    /// nothing is written.
    pub fn update(&mut self, id: &str, text: &str, deadline: Option<&str>) -> Result<(), AppError> {
        let Some(text) = normalize_text(text) else {
            return Err(AppError::validation("task text cannot be empty"));
        };
        let deadline = normalize_deadline(deadline)?;
        self.backend()?;

        let previous = self
            .store
            .get(id)
            .ok_or_else(|| AppError::not_found(format!("task {id} not found")))?
            .deadline
            .clone();
        if previous != deadline {
            self.reminders.forget(id);
        }
        self.store.update(id, &text, deadline.as_deref());

        self.backend()?
            .update_task(id, &TaskPatch::content(&text, deadline.as_deref()))
            .map_err(|err| remote_failure("could not update task", &err))?;
        debug!(task_id = %id, "task updated");
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Task, AppError> {
        self.backend()?;
        let removed = self
            .store
            .remove(id)
            .ok_or_else(|| AppError::not_found(format!("task {id} not found")))?;
        self.selection.remove(id);
        self.reminders.forget(id);

        self.backend()?
            .delete_task(id)
            .map_err(|err| remote_failure("could not delete task", &err))?;
        debug!(task_id = %id, "task deleted");
        Ok(removed)
    }

    /// Toggles membership of an existing task in the selection.
    pub fn toggle_selected(&mut self, id: &str) -> Result<bool, AppError> {
        if !self.store.contains(id) {
            return Err(AppError::not_found(format!("task {id} not found")));
        }
        Ok(self.selection.toggle(id))
    }

    /// Selects or deselects every task passing the current filter.
    pub fn set_all_visible_selected(&mut self, checked: bool) {
        let visible = project(self.store.tasks(), self.filter);
        self.selection
            .set_all_visible(visible.iter().map(|task| task.id.as_str()), checked);
    }

    pub fn select_all_state(&self) -> SelectAllState {
        self.selection
            .select_all_state(self.visible().iter().map(|task| task.id.as_str()))
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Sets `done` on every selected task in one batch and clears the
    /// selection once the batch lands.
    pub fn complete_selected(&mut self, done: bool) -> Result<usize, AppError> {
        let ids = self.selected_ids()?;
        self.backend()?;
        let changed = self.store.set_done_many(&ids, done);

        let ops: Vec<WriteOp> = ids
            .iter()
            .map(|id| WriteOp::Update {
                id: id.clone(),
                patch: TaskPatch::done(done),
            })
            .collect();
        self.backend()?
            .batch_write(&ops)
            .map_err(|err| remote_failure("could not update selected tasks", &err))?;

        self.selection.clear();
        debug!(count = changed, done, "selected tasks updated");
        Ok(changed)
    }

    pub fn delete_selected(&mut self) -> Result<usize, AppError> {
        let ids = self.selected_ids()?;
        self.delete_many(&ids, "could not delete selected tasks")
    }

    /// Deletes every done task in one batch. Returns 0 when none are done.
    pub fn clear_completed(&mut self) -> Result<usize, AppError> {
        let ids = self.store.completed_ids();
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_many(&ids, "could not clear completed tasks")
    }

    /// Creates every importable row of a backup document in one batch and
    /// appends them. Nothing is written when the document is rejected.
    pub fn import_json(&mut self, content: &str) -> Result<usize, AppError> {
        let rows = parse_import(content)?;
        let ops: Vec<WriteOp> = rows.iter().cloned().map(WriteOp::Create).collect();
        let created = self
            .backend()?
            .batch_write(&ops)
            .map_err(|err| remote_failure("could not import tasks", &err))?;

        for (row, record) in rows.into_iter().zip(created) {
            self.store.add(Task {
                id: record.id,
                text: row.text,
                done: row.done,
                deadline: row.deadline,
                created_at: record.created_at,
            });
        }
        let count = ops.len();
        info!(count, "tasks imported");
        Ok(count)
    }

    pub fn export_json(&self) -> Result<String, AppError> {
        export_json(self.store.tasks())
    }

    /// Turns reminders on and runs the first check right away.
    pub fn enable_reminders(&mut self, now: OffsetDateTime) -> Result<Vec<String>, AppError> {
        self.reminders.enable(self.notifier.as_ref())?;
        Ok(self.reminder_tick(now))
    }

    pub fn disable_reminders(&mut self) {
        self.reminders.disable();
    }

    /// One periodic reminder check. Does nothing while reminders are off.
    pub fn reminder_tick(&mut self, now: OffsetDateTime) -> Vec<String> {
        self.reminders
            .check(self.store.tasks(), now, self.notifier.as_ref())
    }

    fn backend(&mut self) -> Result<&mut Box<dyn TaskBackend>, AppError> {
        self.backend.as_mut().ok_or_else(not_signed_in)
    }

    fn selected_ids(&self) -> Result<Vec<String>, AppError> {
        if self.selection.is_empty() {
            return Err(AppError::validation("no tasks selected"));
        }
        Ok(self.selection.ids())
    }

    fn delete_many(&mut self, ids: &[String], action: &str) -> Result<usize, AppError> {
        self.backend()?;
        let removed = self.store.remove_many(ids);
        for task in &removed {
            self.selection.remove(&task.id);
            self.reminders.forget(&task.id);
        }

        let ops: Vec<WriteOp> = ids
            .iter()
            .map(|id| WriteOp::Delete { id: id.clone() })
            .collect();
        self.backend()?
            .batch_write(&ops)
            .map_err(|err| remote_failure(action, &err))?;
        debug!(count = removed.len(), "tasks deleted");
        Ok(removed.len())
    }
}

fn not_signed_in() -> AppError {
    AppError::auth("not-signed-in", "Sign in to manage tasks.")
}

fn remote_failure(action: &str, cause: &AppError) -> AppError {
    warn!(error = %cause, "{action}");
    AppError::remote_write(action, cause)
}
