use crate::model::{Created, Task};
use std::collections::HashSet;

/// In-memory mirror of the user's task collection.
///
/// Order is the load order (ascending `created_at`); `add` appends and every
/// other mutation keeps positions. The store never talks to the backend, so
/// every method here is a purely local transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn add(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Swaps a provisional local identity for the one the backend assigned.
    pub fn reconcile(&mut self, provisional_id: &str, created: &Created) -> bool {
        match self.tasks.iter_mut().find(|task| task.id == provisional_id) {
            Some(task) => {
                task.id = created.id.clone();
                task.created_at = created.created_at.clone();
                true
            }
            None => false,
        }
    }

    /// Flips `done` and returns the new value.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        task.done = !task.done;
        Some(task.done)
    }

    pub fn update(&mut self, id: &str, text: &str, deadline: Option<&str>) -> bool {
        match self.tasks.iter_mut().find(|task| task.id == id) {
            Some(task) => {
                task.text = text.to_string();
                task.deadline = deadline.map(str::to_string);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|task| task.id == id)?;
        Some(self.tasks.remove(index))
    }

    /// Removes every listed task and returns the removed records in store order.
    pub fn remove_many(&mut self, ids: &[String]) -> Vec<Task> {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let (removed, kept) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| ids.contains(task.id.as_str()));
        self.tasks = kept;
        removed
    }

    /// Sets `done` on every listed task and returns how many were found.
    pub fn set_done_many(&mut self, ids: &[String], done: bool) -> usize {
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut changed = 0;
        for task in &mut self.tasks {
            if ids.contains(task.id.as_str()) {
                task.done = done;
                changed += 1;
            }
        }
        changed
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn completed_ids(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|task| task.done)
            .map(|task| task.id.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|task| !task.done).count()
    }
}
