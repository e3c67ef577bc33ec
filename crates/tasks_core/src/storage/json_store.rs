use crate::error::AppError;
use crate::model::{Created, NewTask, Task, TaskPatch, WriteOp};
use crate::storage::{TaskBackend, apply_ops, sort_by_created_at};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "tasks.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredTasks {
    schema_version: u32,
    tasks: Vec<Task>,
}

/// One pretty-printed JSON document per user at
/// `<data_dir>/users/<uid>/tasks.json`.
#[derive(Debug, Clone)]
pub struct JsonBackend {
    path: PathBuf,
}

impl JsonBackend {
    pub fn open(data_dir: &Path, uid: &str) -> Result<Self, AppError> {
        let uid = uid.trim();
        let valid = !uid.is_empty()
            && uid
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(AppError::invalid_input("user id is not a valid path segment"));
        }

        Ok(Self {
            path: data_dir.join("users").join(uid).join(STORE_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&self, ops: &[WriteOp]) -> Result<Vec<Created>, AppError> {
        let mut tasks = load_tasks(&self.path)?;
        let created = apply_ops(&mut tasks, ops)?;
        save_tasks(&self.path, &tasks)?;
        debug!(path = %self.path.display(), ops = ops.len(), "committed writes");
        Ok(created)
    }
}

impl TaskBackend for JsonBackend {
    fn list_tasks(&mut self) -> Result<Vec<Task>, AppError> {
        let mut tasks = load_tasks(&self.path)?;
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

pub fn load_tasks(path: &Path) -> Result<Vec<Task>, AppError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let stored: StoredTasks =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    Ok(stored.tasks)
}

pub fn save_tasks(path: &Path, tasks: &[Task]) -> Result<(), AppError> {
    let stored = StoredTasks {
        schema_version: SCHEMA_VERSION,
        tasks: tasks.to_vec(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;
    write_private(path, &content)
}

/// Replaces `path` with `content`, creating parent directories, readable by
/// the owner only. The document is written to a sibling temp file and renamed
/// into place, so readers see the old file or the new one.
pub(crate) fn write_private(path: &Path, content: &str) -> Result<(), AppError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;

    let mut file = NamedTempFile::new_in(parent).map_err(|err| AppError::io(err.to_string()))?;
    file.write_all(content.as_bytes())
        .map_err(|err| AppError::io(err.to_string()))?;
    file.as_file()
        .sync_all()
        .map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        file.as_file()
            .set_permissions(permissions)
            .map_err(|err| AppError::io(err.to_string()))?;
    }

    file.persist(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err.error)))?;
    Ok(())
}
