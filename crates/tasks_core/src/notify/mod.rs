use crate::error::AppError;
use tracing::warn;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxNotifier;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsNotifier;

const DISABLE_ENV_VAR: &str = "TASKS_DISABLE_NOTIFICATIONS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The platform has no notification surface at all.
    Unsupported(String),
}

/// Local notification surface used by the reminder scheduler.
pub trait Notifier {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    /// Shows a notification. Notifications sharing a `tag` replace each other
    /// where the platform supports it.
    fn show(&self, title: &str, body: &str, tag: &str) -> Result<(), AppError>;
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn show(&self, _title: &str, _body: &str, _tag: &str) -> Result<(), AppError> {
        Ok(())
    }
}

/// Stands in for the platform notifier when it cannot be created. Reminders
/// refuse to turn on against it.
pub struct UnavailableNotifier {
    reason: String,
}

impl UnavailableNotifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Notifier for UnavailableNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Unsupported(self.reason.clone())
    }

    fn show(&self, _title: &str, _body: &str, _tag: &str) -> Result<(), AppError> {
        Err(AppError::unsupported(self.reason.clone()))
    }
}

/// The notifier for this process. `TASKS_DISABLE_NOTIFICATIONS` silences
/// delivery; a platform without notifications yields an
/// [`UnavailableNotifier`].
pub fn notifier_from_env() -> Box<dyn Notifier> {
    if std::env::var(DISABLE_ENV_VAR).is_ok() {
        return Box::new(NoopNotifier);
    }

    platform_notifier().unwrap_or_else(|err| {
        warn!(error = %err, "notifications unavailable");
        Box::new(UnavailableNotifier::new(err.message()))
    })
}

#[cfg(target_os = "linux")]
pub fn platform_notifier() -> Result<Box<dyn Notifier>, AppError> {
    Ok(Box::new(LinuxNotifier))
}

#[cfg(windows)]
pub fn platform_notifier() -> Result<Box<dyn Notifier>, AppError> {
    Ok(Box::new(WindowsNotifier))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_notifier() -> Result<Box<dyn Notifier>, AppError> {
    Err(AppError::unsupported(
        "desktop notifications are not supported on this platform",
    ))
}
