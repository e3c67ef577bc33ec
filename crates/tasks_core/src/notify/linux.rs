use crate::error::AppError;
use crate::notify::{Notifier, Permission};
use notify_rust::Notification;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct LinuxNotifier;

impl Notifier for LinuxNotifier {
    fn request_permission(&self) -> Permission {
        match notify_rust::get_server_information() {
            Ok(_) => Permission::Granted,
            Err(err) => {
                tracing::warn!(error = %err, "no notification server reachable");
                Permission::Unsupported("no desktop notification server is running".to_string())
            }
        }
    }

    fn show(&self, title: &str, body: &str, tag: &str) -> Result<(), AppError> {
        Notification::new()
            .appname("tasks")
            .summary(title)
            .body(body)
            .id(replace_id(tag))
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }
}

/// The notification server replaces notifications that share an id.
fn replace_id(tag: &str) -> u32 {
    let mut hasher = DefaultHasher::new();
    tag.hash(&mut hasher);
    // Zero asks the server for a fresh id.
    (hasher.finish() as u32).max(1)
}
