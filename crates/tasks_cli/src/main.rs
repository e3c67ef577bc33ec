use clap::{CommandFactory, Parser};
use serde_json::json;
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Instant;
use tasks_cli::cli::{Cli, Command, Switch, collect_overrides};
use tasks_cli::render;
use tasks_core::App;
use tasks_core::config::{self, Config, ConfigOverrides, Palette};
use tasks_core::deadline::local_now;
use tasks_core::error::AppError;
use tasks_core::filter::Filter;
use tasks_core::identity::{IdentityProvider, LocalIdentity, Session};
use tasks_core::notify::notifier_from_env;
use tasks_core::reminder::Reminders;
use tasks_core::speech::{dictate, recognizer_from_config};
use tasks_core::storage::JsonBackend;
use tasks_core::transfer::backup_file_name;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    OneShot,
    Interactive,
}

/// Everything a command needs: the effective config, the identity provider
/// and the application controller bound to the signed-in user.
struct Runtime {
    mode: Mode,
    file_config: Config,
    config: Config,
    data_dir: PathBuf,
    identity: LocalIdentity,
    app: App,
    session_changes: Receiver<Option<Session>>,
}

impl Runtime {
    fn open(mode: Mode, overrides: &ConfigOverrides) -> Result<Self, AppError> {
        let loaded = config::load_config_with_fallback();
        if let Some(err) = &loaded.error {
            warn!(error = %err, "config unreadable, using defaults");
        }
        let config = config::merge_overrides(&loaded.config, overrides);
        let data_dir = config::data_dir(&config)?;
        debug!(data_dir = %data_dir.display(), "opening data directory");

        let app = App::new(
            notifier_from_env(),
            Reminders::new(config.reminder_interval()),
        );

        let (sender, session_changes) = mpsc::channel();
        let mut identity = LocalIdentity::open(&data_dir)?;
        identity.on_session_change(Box::new(move |session| {
            sender.send(session.cloned()).ok();
        }));

        let mut runtime = Self {
            mode,
            file_config: loaded.config,
            config,
            data_dir,
            identity,
            app,
            session_changes,
        };
        runtime.sync_session()?;
        Ok(runtime)
    }

    /// Applies queued sign-in and sign-out notifications to the controller.
    fn sync_session(&mut self) -> Result<(), AppError> {
        while let Ok(change) = self.session_changes.try_recv() {
            match change {
                Some(session) => {
                    let backend = JsonBackend::open(&self.data_dir, &session.uid)?;
                    let count = self.app.attach(Box::new(backend))?;
                    info!(uid = %session.uid, count, "session started");
                }
                None => self.app.sign_out(),
            }
        }
        Ok(())
    }
}

fn init_tracing(verbose: u8, quiet: u8) {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

/// Prints an error. Validation problems are hints, not failures; the return
/// value says whether the command failed.
fn report_error(err: &AppError) -> bool {
    if matches!(err, AppError::Validation(_)) {
        eprintln!("hint: {}", err.message());
        return false;
    }
    eprintln!("ERROR: {err}");
    true
}

fn palette(config: &Config, json: bool) -> Palette {
    if json || !std::io::stdout().is_terminal() {
        Palette::plain()
    } else {
        config::palette_for_theme(config.theme.as_deref())
    }
}

fn print_list(runtime: &Runtime, config: &Config, json: bool) {
    let now = local_now();
    if json {
        println!("{}", render::list_json(&runtime.app, now));
    } else {
        println!(
            "{}",
            render::render_list(&runtime.app, &palette(config, json), now)
        );
    }
}

fn print_session(session: Option<&Session>, json: bool) {
    if json {
        let value = match session {
            Some(session) => json!({ "signed_in": true, "uid": session.uid, "email": session.email }),
            None => json!({ "signed_in": false }),
        };
        println!("{value}");
    } else {
        match session {
            Some(session) => println!("Signed in as {}", session.email),
            None => println!("Not signed in."),
        }
    }
}

fn print_count(json: bool, key: &str, count: usize, message: String) {
    if json {
        println!("{}", json!({ key: count }));
    } else {
        println!("{message}");
    }
}

fn take_dictation(config: &Config) -> Result<String, AppError> {
    let mut recognizer = recognizer_from_config(config)?;
    let live = std::io::stderr().is_terminal();
    if live {
        eprintln!("Listening...");
    }
    let text = dictate(recognizer.as_mut(), |dictation| {
        if live {
            eprint!("\r\x1b[2K{}", dictation.display_text());
            std::io::stderr().flush().ok();
        }
    })?;
    if live {
        eprintln!();
    }
    Ok(text)
}

/// Makes sure every id is selected before a bulk action.
fn select_ids(app: &mut App, ids: &[String]) -> Result<(), AppError> {
    for id in ids {
        if !app.selection().has(id) {
            app.toggle_selected(id)?;
        }
    }
    Ok(())
}

fn changes_list(command: &Command) -> bool {
    matches!(
        command,
        Command::Add { .. }
            | Command::Edit { .. }
            | Command::Toggle { .. }
            | Command::Delete { .. }
            | Command::CompleteSelected { .. }
            | Command::DeleteSelected { .. }
            | Command::ClearCompleted
            | Command::Import { .. }
            | Command::Login { .. }
            | Command::Signup { .. }
    )
}

fn reads_list(command: &Command) -> bool {
    matches!(
        command,
        Command::List { .. }
            | Command::Filter { .. }
            | Command::Select { .. }
            | Command::SelectAll { .. }
            | Command::SelectNone
            | Command::Export { .. }
    )
}

fn run_command(runtime: &mut Runtime, cli: Cli) -> Result<(), AppError> {
    runtime.sync_session()?;
    let overrides = collect_overrides(&cli.config_override)?;
    let config = config::merge_overrides(&runtime.config, &overrides);
    let json = cli.json;
    let rerender = runtime.mode == Mode::Interactive && !json && changes_list(&cli.command);
    if reads_list(&cli.command) {
        runtime.app.ensure_attached()?;
    }

    match cli.command {
        Command::Signup { email, password } => {
            let session = runtime.identity.sign_up(
                email.as_deref().unwrap_or_default(),
                password.as_deref().unwrap_or_default(),
            )?;
            runtime.sync_session()?;
            print_session(Some(&session), json);
        }
        Command::Login {
            email,
            password,
            federated,
        } => {
            let session = if federated {
                runtime.identity.sign_in_with_federated_provider()?
            } else {
                runtime.identity.sign_in(
                    email.as_deref().unwrap_or_default(),
                    password.as_deref().unwrap_or_default(),
                )?
            };
            runtime.sync_session()?;
            print_session(Some(&session), json);
        }
        Command::Logout => {
            runtime.identity.sign_out()?;
            runtime.sync_session()?;
            print_session(None, json);
        }
        Command::Whoami => {
            print_session(runtime.identity.current_session().as_ref(), json);
        }
        Command::Add {
            text,
            deadline,
            dictate,
        } => {
            let text = if dictate {
                take_dictation(&config)?
            } else {
                text.unwrap_or_default()
            };
            match runtime.app.add_task(&text, deadline.as_deref())? {
                Some(task) if json => println!("{}", render::task_json(&task, local_now())),
                Some(task) => println!("Added task: {} ({})", task.text, task.id),
                None => {
                    return Err(AppError::validation("nothing to add, the task text is empty"));
                }
            }
        }
        Command::Edit {
            id,
            text,
            deadline,
            clear_deadline,
        } => {
            let deadline = if clear_deadline {
                None
            } else if deadline.is_some() {
                deadline
            } else {
                runtime.app.task(&id).and_then(|task| task.deadline.clone())
            };
            runtime.app.update(&id, &text, deadline.as_deref())?;
            if let Some(task) = runtime.app.task(&id) {
                if json {
                    println!("{}", render::task_json(task, local_now()));
                } else {
                    println!("Updated task: {} ({})", task.text, task.id);
                }
            }
        }
        Command::Toggle { id } => {
            let done = runtime.app.toggle(&id)?;
            if let Some(task) = runtime.app.task(&id) {
                if json {
                    println!("{}", render::task_json(task, local_now()));
                } else if done {
                    println!("Marked done: {} ({})", task.text, task.id);
                } else {
                    println!("Marked active: {} ({})", task.text, task.id);
                }
            }
        }
        Command::Delete { id } => {
            let task = runtime.app.remove(&id)?;
            if json {
                println!("{}", render::task_json(&task, local_now()));
            } else {
                println!("Deleted task: {} ({})", task.text, task.id);
            }
        }
        Command::List { filter } => {
            if let Some(name) = filter {
                runtime.app.set_filter(name.parse::<Filter>()?);
            }
            print_list(runtime, &config, json);
        }
        Command::Filter { name } => {
            runtime.app.set_filter(name.parse::<Filter>()?);
            print_list(runtime, &config, json);
        }
        Command::Select { ids } => {
            for id in &ids {
                runtime.app.toggle_selected(id)?;
            }
            print_list(runtime, &config, json);
        }
        Command::SelectAll { off } => {
            runtime.app.set_all_visible_selected(!off);
            print_list(runtime, &config, json);
        }
        Command::SelectNone => {
            runtime.app.clear_selection();
            print_list(runtime, &config, json);
        }
        Command::CompleteSelected { ids, undo } => {
            select_ids(&mut runtime.app, &ids)?;
            let count = runtime.app.complete_selected(!undo)?;
            let state = if undo { "active" } else { "done" };
            print_count(json, "updated", count, format!("Marked {count} task(s) {state}."));
        }
        Command::DeleteSelected { ids } => {
            select_ids(&mut runtime.app, &ids)?;
            let count = runtime.app.delete_selected()?;
            print_count(json, "deleted", count, format!("Deleted {count} task(s)."));
        }
        Command::ClearCompleted => {
            let count = runtime.app.clear_completed()?;
            print_count(
                json,
                "deleted",
                count,
                format!("Cleared {count} completed task(s)."),
            );
        }
        Command::Export { dir } => {
            let content = runtime.app.export_json()?;
            let dir = dir.unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(backup_file_name(local_now().date()));
            std::fs::write(&path, content)?;
            let count = runtime.app.tasks().len();
            info!(path = %path.display(), count, "tasks exported");
            if json {
                println!("{}", json!({ "path": path.display().to_string(), "count": count }));
            } else {
                println!("Exported {count} task(s) to {}", path.display());
            }
        }
        Command::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|err| AppError::io(format!("{}: {err}", file.display())))?;
            let count = runtime.app.import_json(&content)?;
            print_count(json, "imported", count, format!("Imported {count} task(s)."));
        }
        Command::Remind { state } => match state {
            Switch::On => {
                let fired = runtime.app.enable_reminders(local_now())?;
                if json {
                    println!("{}", json!({ "reminders": "on", "notified": fired }));
                } else {
                    let secs = runtime.app.reminders().interval().as_secs();
                    println!("Reminders on, checking every {secs}s.");
                    if runtime.mode == Mode::OneShot {
                        println!("Reminders keep running only in an interactive session.");
                    }
                }
            }
            Switch::Off => {
                runtime.app.disable_reminders();
                if json {
                    println!("{}", json!({ "reminders": "off" }));
                } else {
                    println!("Reminders off.");
                }
            }
        },
        Command::Notify => {
            let was_enabled = runtime.app.reminders().is_enabled();
            let fired = runtime.app.enable_reminders(local_now())?;
            if !was_enabled {
                runtime.app.disable_reminders();
            }
            print_count(
                json,
                "notified",
                fired.len(),
                format!("Sent {} reminder(s).", fired.len()),
            );
        }
        Command::Theme { name } => {
            let theme = match name {
                Some(raw) => {
                    let theme = config::canonical_theme_name(&raw)
                        .ok_or_else(|| AppError::invalid_input("theme must be light or dark"))?;
                    runtime.file_config.theme = Some(theme.clone());
                    config::save_config(&runtime.file_config)?;
                    runtime.config.theme = Some(theme.clone());
                    theme
                }
                None => config.theme.clone().unwrap_or_else(|| "dark".to_string()),
            };
            if json {
                println!("{}", json!({ "theme": theme }));
            } else {
                println!("Theme: {theme}");
            }
        }
        Command::Dictate => {
            let text = take_dictation(&config)?;
            if json {
                println!("{}", json!({ "text": text }));
            } else {
                println!("{text}");
            }
        }
    }

    if rerender && runtime.app.is_attached() {
        print_list(runtime, &config, json);
    }
    Ok(())
}

enum Event {
    Line(String),
    Closed,
}

fn spawn_stdin_reader(events: Sender<Event>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if events.send(Event::Line(line)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
        events.send(Event::Closed).ok();
    });
}

/// Returns false when the session should end.
fn handle_line(runtime: &mut Runtime, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }

    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return false;
    }

    if line == "help" || line == "?" {
        print_help();
        return true;
    }

    let args = match split_command_line(line) {
        Ok(args) => args,
        Err(err) => {
            report_error(&err);
            return true;
        }
    };

    if args.is_empty() {
        return true;
    }

    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push("tasks".to_string());
    argv.extend(args);

    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            print!("{err}");
            return true;
        }
        Err(err) => {
            report_error(&normalize_parse_error(err));
            return true;
        }
    };

    if let Err(err) = run_command(runtime, cli) {
        report_error(&err);
    }
    true
}

/// The session loop. Commands from stdin and reminder ticks are handled
/// one at a time on this thread.
fn run_interactive() -> Result<(), AppError> {
    let mut runtime = Runtime::open(Mode::Interactive, &ConfigOverrides::default())?;
    let config = runtime.config.clone();
    print_session(runtime.identity.current_session().as_ref(), false);
    if runtime.app.is_attached() {
        print_list(&runtime, &config, false);
    } else {
        println!("Use `signup EMAIL --password PASSWORD` or `login EMAIL --password PASSWORD`.");
    }

    let (sender, events) = mpsc::channel();
    spawn_stdin_reader(sender);
    let mut next_tick: Option<Instant> = None;

    loop {
        let event = match next_tick {
            Some(at) => match events.recv_timeout(at.saturating_duration_since(Instant::now())) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match events.recv() {
                Ok(event) => Some(event),
                Err(_) => break,
            },
        };

        match event {
            Some(Event::Line(line)) => {
                if !handle_line(&mut runtime, &line) {
                    break;
                }
            }
            Some(Event::Closed) => break,
            None => {
                let fired = runtime.app.reminder_tick(local_now());
                debug!(count = fired.len(), "reminder tick");
                next_tick = None;
            }
        }

        if runtime.app.reminders().is_enabled() {
            let interval = runtime.app.reminders().interval();
            next_tick.get_or_insert_with(|| Instant::now() + interval);
        } else {
            next_tick = None;
        }
    }

    Ok(())
}

fn main() {
    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        init_tracing(0, 0);
        if let Err(err) = run_interactive() {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => {
            print!("{err}");
            return;
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    init_tracing(cli.verbose, cli.quiet);

    let result = collect_overrides(&cli.config_override)
        .and_then(|overrides| Runtime::open(Mode::OneShot, &overrides))
        .and_then(|mut runtime| run_command(&mut runtime, cli));

    if let Err(err) = result
        && report_error(&err)
    {
        std::process::exit(1);
    }
}
