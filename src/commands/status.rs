use chrono::Utc;
use comfy_table::Table;

use crate::commands::HookContext;
use crate::core::error::Result;
use crate::core::model;
use crate::core::queue::EventQueue;
use crate::core::state::{ObservabilityState, SessionRecord};

fn session_row(id: &str, session: &SessionRecord) -> Vec<String> {
    let age_minutes = (Utc::now() - session.start_time).num_minutes().max(0);
    let stats = session.stats.clone().unwrap_or_default();
    let id_short: String = id.chars().take(12).collect();

    vec![
        id_short,
        session.start_time.format("%Y-%m-%d %H:%M").to_string(),
        format!("{}m", age_minutes),
        session
            .model
            .as_deref()
            .map(model::short_label)
            .unwrap_or_else(|| "-".to_string()),
        session.tool_count.to_string(),
        stats.error_count.to_string(),
        format!("{:.1}", stats.avg_tool_time_ms()),
        session.tool_starts.len().to_string(),
        format!("{:.0}%", session.completion_rate() * 100.0),
    ]
}

/// Sessions table, newest first.
pub fn render(state: &ObservabilityState) -> Table {
    let mut sessions: Vec<(&String, &SessionRecord)> = state.sessions.iter().collect();
    sessions.sort_by(|a, b| b.1.start_time.cmp(&a.1.start_time));

    let mut table = Table::new();
    table.set_header(vec![
        "Session", "Started", "Age", "Model", "Tools", "Errors", "Avg ms", "In flight", "Todos",
    ]);
    for (id, session) in sessions {
        table.add_row(session_row(id, session));
    }
    table
}

pub fn run() -> Result<()> {
    let ctx = HookContext::load()?;
    let state = ctx.store.load();
    let queue = EventQueue::for_project(&ctx.project_dir);

    println!("State file: {}", ctx.store.path().display());
    if state.sessions.is_empty() {
        println!("No tracked sessions.");
    } else {
        println!("{}", render(&state));
    }
    if queue.is_empty() {
        println!("Queued events: 0");
    } else {
        println!(
            "Queued events: {} ({})",
            queue.len(),
            queue.path().display()
        );
    }
    println!("Server: {}", ctx.config.server.url);
    Ok(())
}
