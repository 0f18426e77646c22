use crate::commands::audit_log::{self, AuditKind};
use crate::commands::{read_payload, HookContext};
use crate::core::collector;
use crate::core::error::Result;
use crate::core::hook_input::HookPayload;
use crate::core::tool_input::ToolInput;

const FAILURE_EVENT: &str = "PostToolUseFailure";

/// Audit log, end-time recording and the duration handoff.
/// Returns the measured duration, if a matching start was found.
pub fn handle(payload: &HookPayload, ctx: &HookContext) -> Result<Option<f64>> {
    audit_log::append(
        &ctx.project_dir,
        &payload.session_id,
        AuditKind::PostToolUse,
        &payload.raw,
    )?;

    let Some(tool_name) = payload.tool_name.as_deref() else {
        return Ok(None);
    };
    let session_id = payload.session_id.as_str();

    let duration = ctx.store.record_tool_end(session_id, tool_name)?;
    match duration {
        Some(ms) => collector::write_duration(&ctx.project_dir, session_id, tool_name, ms)?,
        None => tracing::debug!("no recorded start for {}, duration unknown", tool_name),
    }

    if let ToolInput::TodoWrite(todo) = ToolInput::parse(tool_name, &payload.tool_input) {
        ctx.store.record_todos(session_id, todo.todos)?;
    }
    if payload.hook_event_name.as_deref() == Some(FAILURE_EVENT) {
        ctx.store.record_tool_error(session_id)?;
    }

    Ok(duration)
}

pub fn run() -> i32 {
    let Some(payload) = read_payload() else {
        return 0;
    };
    let result = HookContext::load().and_then(|ctx| handle(&payload, &ctx));
    if let Err(e) = result {
        tracing::warn!("post-tool-use: {}", e);
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ToolPulseConfig;
    use crate::core::state::StateStore;
    use crate::core::tool_input::TodoStatus;
    use serde_json::json;

    fn context(tmp: &tempfile::TempDir) -> HookContext {
        HookContext {
            project_dir: tmp.path().join("project"),
            config: ToolPulseConfig::default(),
            store: StateStore::new(tmp.path().join("state.json")),
        }
    }

    #[test]
    fn test_end_after_start_hands_off_duration() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let input = json!({"file_path": "/repo/src/main.rs"});
        ctx.store.record_tool_start("s1", "Read", &input).unwrap();

        let payload = HookPayload::from_value(json!({
            "session_id": "s1",
            "hook_event_name": "PostToolUse",
            "tool_name": "Read",
            "tool_input": input
        }));
        let duration = handle(&payload, &ctx).unwrap();
        assert!(duration.is_some());

        let stats = ctx.store.session("s1").unwrap().stats.unwrap();
        assert_eq!(stats.tools_executed, 1);
        assert_eq!(stats.files_read, 1);
        assert_eq!(
            collector::take_duration(&ctx.project_dir, "s1", "Read"),
            duration
        );
    }

    #[test]
    fn test_end_without_start_is_logged_only() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let payload = HookPayload::from_value(json!({
            "session_id": "s1",
            "tool_name": "Bash",
            "tool_input": {"command": "ls"}
        }));

        assert_eq!(handle(&payload, &ctx).unwrap(), None);
        assert!(ctx.store.session("s1").is_none());
        assert_eq!(collector::take_duration(&ctx.project_dir, "s1", "Bash"), None);
    }

    #[test]
    fn test_todo_write_replaces_todos() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let payload = HookPayload::from_value(json!({
            "session_id": "s1",
            "tool_name": "TodoWrite",
            "tool_input": {"todos": [
                {"content": "write tests", "status": "in_progress", "activeForm": "Writing tests"}
            ]}
        }));

        handle(&payload, &ctx).unwrap();
        let todos = ctx.store.session("s1").unwrap().todos;
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].status, TodoStatus::InProgress);
    }

    #[test]
    fn test_failure_event_counts_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let payload = HookPayload::from_value(json!({
            "session_id": "s1",
            "hook_event_name": "PostToolUseFailure",
            "tool_name": "Bash",
            "tool_input": {"command": "false"}
        }));

        handle(&payload, &ctx).unwrap();
        let stats = ctx.store.session("s1").unwrap().stats.unwrap();
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.tools_executed, 0);
    }
}
