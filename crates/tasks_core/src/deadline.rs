use crate::error::AppError;
use std::fmt;
use time::macros::{format_description, time};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::warn;

/// A stored deadline: either a whole day or a local wall-clock instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Due at 23:59:59 local time on that day.
    Date(Date),
    DateTime(PrimitiveDateTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Urgency {
    Overdue,
    DueToday,
    DueSoon,
    Upcoming,
}

impl Urgency {
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::DueToday => "today",
            Self::DueSoon => "soon",
            Self::Upcoming => "upcoming",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineStatus {
    pub label: String,
    pub urgency: Urgency,
}

impl Deadline {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if let Ok(date) = Date::parse(trimmed, format_description!("[year]-[month]-[day]")) {
            return Ok(Self::Date(date));
        }

        let datetime_formats = [
            format_description!("[year]-[month]-[day]T[hour]:[minute]"),
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            format_description!("[year]-[month]-[day] [hour]:[minute]"),
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ];
        datetime_formats
            .iter()
            .find_map(|format| PrimitiveDateTime::parse(trimmed, format).ok())
            .map(Self::DateTime)
            .ok_or_else(|| {
                AppError::invalid_input("deadline must be YYYY-MM-DD or YYYY-MM-DDTHH:MM")
            })
    }

    pub fn has_time(&self) -> bool {
        matches!(self, Self::DateTime(_))
    }

    /// The instant the deadline falls due, interpreted in `offset`.
    pub fn due_at(&self, offset: UtcOffset) -> OffsetDateTime {
        match self {
            Self::Date(date) => date.with_time(time!(23:59:59)).assume_offset(offset),
            Self::DateTime(datetime) => datetime.assume_offset(offset),
        }
    }

    /// Signed time left until the deadline; negative once it has passed.
    pub fn remaining(&self, now: OffsetDateTime) -> Duration {
        self.due_at(now.offset()) - now
    }

    pub fn status(&self, now: OffsetDateTime) -> DeadlineStatus {
        let due = self.due_at(now.offset());
        let suffix = self.time_suffix();
        let diff = due - now;

        if diff.is_negative() {
            let overdue_days = (-diff).whole_days();
            let label = if overdue_days < 1 {
                format!("Overdue{suffix}")
            } else {
                format!("Overdue by {overdue_days}d")
            };
            return DeadlineStatus {
                label,
                urgency: Urgency::Overdue,
            };
        }

        if diff <= Duration::HOUR {
            return DeadlineStatus {
                label: "Due in < 1hr".to_string(),
                urgency: Urgency::DueToday,
            };
        }

        if diff <= Duration::DAY {
            let hours = ceil_units(diff, Duration::HOUR);
            let unit = if hours == 1 { "hr" } else { "hrs" };
            return DeadlineStatus {
                label: format!("Due in {hours}{unit}{suffix}"),
                urgency: Urgency::DueToday,
            };
        }

        let days = ceil_units(diff, Duration::DAY);
        if days <= 2 {
            return DeadlineStatus {
                label: format!("Due in {days}d{suffix}"),
                urgency: Urgency::DueSoon,
            };
        }

        let month = due.month().to_string();
        let mut label = format!("Due {} {}", &month[..3], due.day());
        if due.year() != now.year() {
            label.push_str(&format!(", {}", due.year()));
        }
        label.push_str(&suffix);
        DeadlineStatus {
            label,
            urgency: Urgency::Upcoming,
        }
    }

    fn time_suffix(&self) -> String {
        match self {
            Self::Date(_) => String::new(),
            Self::DateTime(datetime) => {
                format!(" · {:02}:{:02}", datetime.hour(), datetime.minute())
            }
        }
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write_date(f, *date),
            Self::DateTime(datetime) => {
                write_date(f, datetime.date())?;
                write!(f, "T{:02}:{:02}", datetime.hour(), datetime.minute())?;
                if datetime.second() != 0 {
                    write!(f, ":{:02}", datetime.second())?;
                }
                Ok(())
            }
        }
    }
}

fn write_date(f: &mut fmt::Formatter<'_>, date: Date) -> fmt::Result {
    write!(
        f,
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

/// Ceiling of `span / unit` for a non-negative span.
fn ceil_units(span: Duration, unit: Duration) -> i64 {
    let span = span.whole_nanoseconds();
    let unit = unit.whole_nanoseconds();
    ((span + unit - 1) / unit) as i64
}

/// Validates user input and returns the canonical stored form.
pub fn normalize_deadline(raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Ok(Some(Deadline::parse(value)?.to_string())),
    }
}

/// Badge for a task's stored deadline, `None` when there is no deadline.
pub fn classify(deadline: Option<&str>, now: OffsetDateTime) -> Option<DeadlineStatus> {
    let raw = deadline?;
    match Deadline::parse(raw) {
        Ok(parsed) => Some(parsed.status(now)),
        Err(_) => {
            warn!(deadline = raw, "ignoring malformed stored deadline");
            None
        }
    }
}

pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}
