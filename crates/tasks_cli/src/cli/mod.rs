use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tasks_core::config::ConfigOverrides;
use tasks_core::error::AppError;

#[derive(Parser, Debug)]
#[command(author, version, about = "To-do list with deadlines and reminders", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,

    /// More log output on stderr (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less log output on stderr (repeatable)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account and sign in
    ///
    /// Example: tasks signup ada@example.com --password secret1
    Signup {
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in
    ///
    /// Example: tasks login ada@example.com --password secret1
    Login {
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Use the federated identity provider instead of a password
        #[arg(long, conflicts_with_all = ["email", "password"])]
        federated: bool,
    },
    /// Sign out and clear the local list
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Add a task
    ///
    /// Example: tasks add "Buy milk" --deadline 2026-10-20
    /// Example: tasks add "Call mom" --deadline "2026-10-19 18:00"
    Add {
        text: Option<String>,
        #[arg(long, value_name = "YYYY-MM-DD[THH:MM]")]
        deadline: Option<String>,
        /// Take the text from voice input
        #[arg(long, conflicts_with = "text")]
        dictate: bool,
    },
    /// Replace a task's text, optionally changing its deadline
    ///
    /// Example: tasks edit 3f2c "Buy oat milk" --clear-deadline
    Edit {
        id: String,
        text: String,
        #[arg(long, value_name = "YYYY-MM-DD[THH:MM]")]
        deadline: Option<String>,
        #[arg(long, conflicts_with = "deadline")]
        clear_deadline: bool,
    },
    /// Flip a task between active and done
    Toggle { id: String },
    /// Delete a task
    Delete { id: String },
    /// List tasks
    ///
    /// Example: tasks list --filter has-deadline
    List {
        /// all, active, done, has-deadline or no-deadline
        #[arg(long)]
        filter: Option<String>,
    },
    /// Switch the list filter
    ///
    /// Example: filter active
    Filter { name: String },
    /// Toggle tasks in the selection
    Select {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Select every visible task, or deselect them with --off
    SelectAll {
        #[arg(long)]
        off: bool,
    },
    /// Empty the selection
    SelectNone,
    /// Mark the selected tasks done (or active with --undo)
    ///
    /// Ids given here are added to the selection first.
    CompleteSelected {
        ids: Vec<String>,
        #[arg(long)]
        undo: bool,
    },
    /// Delete the selected tasks
    ///
    /// Ids given here are added to the selection first.
    DeleteSelected { ids: Vec<String> },
    /// Delete every done task
    ClearCompleted,
    /// Write a backup file of all tasks
    ///
    /// Example: tasks export --dir ~/backups
    Export {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Add the tasks of a backup file
    ///
    /// Example: tasks import tasks-backup-2026-10-18.json
    Import { file: PathBuf },
    /// Turn deadline reminders on or off
    Remind { state: Switch },
    /// Send reminders for tasks that are due now
    Notify,
    /// Show or set the color theme
    Theme { name: Option<String> },
    /// Transcribe one utterance with the configured speech command
    Dictate,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    Theme,
    ReminderInterval,
    DataDir,
    SpeechCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let (key_raw, value_raw) = raw
        .trim()
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match field.as_str() {
        "theme" => ConfigOverrideTarget::Theme,
        "reminder_interval_secs" | "reminder_interval" => ConfigOverrideTarget::ReminderInterval,
        "data_dir" => ConfigOverrideTarget::DataDir,
        "speech_command" => ConfigOverrideTarget::SpeechCommand,
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride { target, value })
}

/// Folds every `--config-override` argument into one override set; later
/// arguments win.
pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry).map_err(AppError::invalid_input)?;
        match parsed.target {
            ConfigOverrideTarget::Theme => overrides.theme = Some(parsed.value),
            ConfigOverrideTarget::ReminderInterval => {
                let secs = parsed.value.parse::<u64>().map_err(|_| {
                    AppError::invalid_input("reminder_interval_secs must be a whole number")
                })?;
                overrides.reminder_interval_secs = Some(secs);
            }
            ConfigOverrideTarget::DataDir => overrides.data_dir = Some(PathBuf::from(parsed.value)),
            ConfigOverrideTarget::SpeechCommand => overrides.speech_command = Some(parsed.value),
        }
    }
    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, ConfigOverrideTarget, collect_overrides, parse_config_override};
    use clap::Parser;

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" THEME = Light ").unwrap();
        assert_eq!(parsed.target, ConfigOverrideTarget::Theme);
        assert_eq!(parsed.value, "Light");

        let parsed = parse_config_override("reminder-interval-secs=30").unwrap();
        assert_eq!(parsed.target, ConfigOverrideTarget::ReminderInterval);
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("unknown.field=value").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("theme").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
        let err = parse_config_override(" = dark").unwrap_err();
        assert!(err.contains("cannot be empty"));
    }

    #[test]
    fn collect_overrides_keeps_last_value() {
        let raw = vec![
            "theme=light".to_string(),
            "speech_command = whisper-stream --live".to_string(),
            "theme=dark".to_string(),
        ];
        let overrides = collect_overrides(&raw).unwrap();
        assert_eq!(overrides.theme.as_deref(), Some("dark"));
        assert_eq!(
            overrides.speech_command.as_deref(),
            Some("whisper-stream --live")
        );
    }

    #[test]
    fn collect_overrides_validates_interval() {
        let err = collect_overrides(&["reminder_interval_secs=soon".to_string()]).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn edit_rejects_deadline_with_clear() {
        let result = Cli::try_parse_from([
            "tasks",
            "edit",
            "t1",
            "text",
            "--deadline",
            "2026-10-20",
            "--clear-deadline",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["tasks", "list", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::List { filter: None }));
    }
}
