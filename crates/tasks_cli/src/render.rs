use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;
use tasks_core::App;
use tasks_core::config::Palette;
use tasks_core::deadline::classify;
use tasks_core::model::Task;
use tasks_core::selection::SelectAllState;
use time::OffsetDateTime;

pub fn remaining_label(active: usize) -> String {
    if active == 1 {
        "1 task left".to_string()
    } else {
        format!("{active} tasks left")
    }
}

fn select_all_label(state: SelectAllState) -> &'static str {
    match state {
        SelectAllState::Unchecked => "[ ]",
        SelectAllState::Indeterminate => "[-]",
        SelectAllState::Checked => "[x]",
    }
}

/// The visible tasks as a table followed by the footer line.
pub fn render_list(app: &App, palette: &Palette, now: OffsetDateTime) -> String {
    let visible = app.visible();
    let mut out = String::new();

    if visible.is_empty() {
        out.push_str(&palette.mutedize("(no tasks)"));
    } else {
        let mut builder = Builder::default();
        builder.push_record([
            select_all_label(app.select_all_state()).to_string(),
            "done".to_string(),
            "task".to_string(),
            "deadline".to_string(),
            "id".to_string(),
        ]);

        for task in &visible {
            let selected = if app.selection().has(&task.id) {
                "[x]"
            } else {
                "[ ]"
            };
            let text = if task.done {
                palette.mutedize(&task.text)
            } else {
                task.text.clone()
            };
            let badge = classify(task.deadline.as_deref(), now)
                .map(|status| palette.badge(status.urgency, &status.label))
                .unwrap_or_default();

            builder.push_record([
                selected.to_string(),
                if task.done { "✓" } else { "" }.to_string(),
                text,
                badge,
                task.id.clone(),
            ]);
        }

        let mut table = builder.build();
        table.with(Style::rounded());
        out.push_str(&table.to_string());
    }

    out.push('\n');
    out.push_str(&footer(app));
    out
}

fn footer(app: &App) -> String {
    let mut line = format!("{} · filter: {}", remaining_label(app.active_count()), app.filter());
    let selected = app.selection().count();
    if selected > 0 {
        line.push_str(&format!(" · {selected} selected"));
    }
    if app.reminders().is_enabled() {
        line.push_str(" · reminders on");
    }
    line
}

/// JSON form of a task with its deadline badge resolved at `now`.
pub fn task_json(task: &Task, now: OffsetDateTime) -> Value {
    let badge = classify(task.deadline.as_deref(), now).map(|status| {
        json!({
            "label": status.label,
            "urgency": status.urgency.class_name(),
        })
    });
    json!({
        "id": task.id,
        "text": task.text,
        "done": task.done,
        "deadline": task.deadline,
        "created_at": task.created_at,
        "badge": badge,
    })
}

pub fn list_json(app: &App, now: OffsetDateTime) -> Value {
    let tasks: Vec<Value> = app
        .visible()
        .into_iter()
        .map(|task| {
            let mut value = task_json(task, now);
            value["selected"] = Value::Bool(app.selection().has(&task.id));
            value
        })
        .collect();

    json!({
        "filter": app.filter().name(),
        "remaining": app.active_count(),
        "tasks": tasks,
    })
}
