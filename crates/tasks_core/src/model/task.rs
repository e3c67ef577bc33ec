use serde::{Deserialize, Serialize};

/// Task text is capped at this many characters; longer input is truncated.
pub const MAX_TEXT_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub deadline: Option<String>,
    pub created_at: String,
}

/// Fields sent to the backend when creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub deadline: Option<String>,
}

/// Partial update. `deadline: Some(None)` clears the deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub done: Option<bool>,
    pub deadline: Option<Option<String>>,
}

impl TaskPatch {
    pub fn done(done: bool) -> Self {
        Self {
            done: Some(done),
            ..Self::default()
        }
    }

    pub fn content(text: &str, deadline: Option<&str>) -> Self {
        Self {
            text: Some(text.to_string()),
            done: None,
            deadline: Some(deadline.map(str::to_string)),
        }
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(done) = self.done {
            task.done = done;
        }
        if let Some(deadline) = &self.deadline {
            task.deadline = deadline.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Create(NewTask),
    Update { id: String, patch: TaskPatch },
    Delete { id: String },
}

/// Server-assigned identity of a newly created task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: String,
    pub created_at: String,
}

/// Trims the text and applies the length cap. Returns `None` for blank input.
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_TEXT_CHARS).collect())
}
