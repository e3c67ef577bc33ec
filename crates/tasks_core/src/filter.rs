use crate::error::AppError;
use crate::model::Task;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Done,
    HasDeadline,
    NoDeadline,
}

impl Filter {
    pub const ALL: [Filter; 5] = [
        Filter::All,
        Filter::Active,
        Filter::Done,
        Filter::HasDeadline,
        Filter::NoDeadline,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Done => "done",
            Self::HasDeadline => "has-deadline",
            Self::NoDeadline => "no-deadline",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.done,
            Self::Done => task.done,
            Self::HasDeadline => task.deadline.is_some(),
            Self::NoDeadline => task.deadline.is_none(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Filter {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|filter| filter.name() == normalized)
            .ok_or_else(|| {
                AppError::invalid_input(format!(
                    "unknown filter '{raw}' (expected all, active, done, has-deadline or no-deadline)"
                ))
            })
    }
}

/// Visible subsequence of `tasks` under `filter`, in store order.
pub fn project(tasks: &[Task], filter: Filter) -> Vec<&Task> {
    tasks.iter().filter(|task| filter.matches(task)).collect()
}
