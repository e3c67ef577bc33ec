mod task;

pub use task::{Created, MAX_TEXT_CHARS, NewTask, Task, TaskPatch, WriteOp, normalize_text};
