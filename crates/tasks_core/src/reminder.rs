use crate::deadline::Deadline;
use crate::error::AppError;
use crate::model::Task;
use crate::notify::{Notifier, Permission};
use std::collections::HashSet;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

pub const DEFAULT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    DueSoon,
    Overdue,
}

impl ReminderKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::DueSoon => "Task due soon",
            Self::Overdue => "Task overdue",
        }
    }
}

/// Whether an undone task sits inside the notifying window: due within the
/// hour, or overdue by less than a day.
pub fn reminder_due(task: &Task, now: OffsetDateTime) -> Option<ReminderKind> {
    if task.done {
        return None;
    }
    let deadline = Deadline::parse(task.deadline.as_deref()?).ok()?;
    let remaining = deadline.remaining(now);

    if remaining.is_negative() {
        (remaining > -Duration::DAY).then_some(ReminderKind::Overdue)
    } else {
        (remaining <= Duration::HOUR).then_some(ReminderKind::DueSoon)
    }
}

/// One-shot deadline reminders. Each task id is notified at most once per
/// session unless it is forgotten.
#[derive(Debug, Clone)]
pub struct Reminders {
    state: ReminderState,
    notified: HashSet<String>,
    interval: std::time::Duration,
}

impl Default for Reminders {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Reminders {
    pub fn new(interval: std::time::Duration) -> Self {
        Self {
            state: ReminderState::Disabled,
            notified: HashSet::new(),
            interval,
        }
    }

    pub fn state(&self) -> ReminderState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == ReminderState::Enabled
    }

    /// Period of the recurring check while enabled.
    pub fn interval(&self) -> std::time::Duration {
        self.interval
    }

    pub fn enable(&mut self, notifier: &dyn Notifier) -> Result<(), AppError> {
        if self.is_enabled() {
            return Ok(());
        }
        match notifier.request_permission() {
            Permission::Granted => {
                self.state = ReminderState::Enabled;
                info!("deadline reminders enabled");
                Ok(())
            }
            Permission::Denied => Err(AppError::permission_denied(
                "notification permission was denied; reminders stay off",
            )),
            Permission::Unsupported(reason) => Err(AppError::unsupported(format!(
                "{reason}; reminders stay off"
            ))),
        }
    }

    pub fn disable(&mut self) {
        if self.is_enabled() {
            info!("deadline reminders disabled");
        }
        self.state = ReminderState::Disabled;
    }

    /// Runs one scan and returns the ids notified by it.
    pub fn check(
        &mut self,
        tasks: &[Task],
        now: OffsetDateTime,
        notifier: &dyn Notifier,
    ) -> Vec<String> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let mut fired = Vec::new();
        for task in tasks {
            if self.notified.contains(&task.id) {
                continue;
            }
            let Some(kind) = reminder_due(task, now) else {
                continue;
            };

            let label = crate::deadline::classify(task.deadline.as_deref(), now)
                .map(|status| status.label)
                .unwrap_or_default();
            let body = format!("{} ({label})", task.text);
            match notifier.show(kind.title(), &body, &task.id) {
                Ok(()) => {
                    debug!(task_id = %task.id, ?kind, "reminder shown");
                    self.notified.insert(task.id.clone());
                    fired.push(task.id.clone());
                }
                Err(err) => warn!(task_id = %task.id, error = %err, "reminder failed"),
            }
        }
        fired
    }

    pub fn was_notified(&self, id: &str) -> bool {
        self.notified.contains(id)
    }

    /// Makes the task eligible for a reminder again.
    pub fn forget(&mut self, id: &str) {
        self.notified.remove(id);
    }

    pub fn reset(&mut self) {
        self.notified.clear();
    }
}
