use crate::commands::audit_log::{self, AuditKind};
use crate::commands::{read_payload, HookContext};
use crate::core::error::Result;
use crate::core::guard::{self, Verdict};
use crate::core::hook_input::HookPayload;
use crate::core::tool_input::ToolInput;

/// Exit status that tells the host runtime to block the tool call.
pub const EXIT_BLOCKED: i32 = 2;

/// Policy gate, audit log, then start-time recording.
/// A blocked call is neither logged nor timed.
pub fn handle(payload: &HookPayload, ctx: &HookContext) -> Result<Verdict> {
    let tool_name = payload.tool_name.as_deref().unwrap_or_default();

    if let ToolInput::Bash(bash) = ToolInput::parse(tool_name, &payload.tool_input) {
        let verdict = guard::check_command(&bash.command, &ctx.config.guard.allowed_rm_directories);
        if verdict.is_blocked() {
            return Ok(verdict);
        }
    }

    audit_log::append(
        &ctx.project_dir,
        &payload.session_id,
        AuditKind::PreToolUse,
        &payload.raw,
    )?;

    if !tool_name.is_empty() {
        if let Err(e) = ctx
            .store
            .record_tool_start(&payload.session_id, tool_name, &payload.tool_input)
        {
            tracing::warn!("failed to record tool start: {}", e);
        }
    }

    Ok(Verdict::Allow)
}

fn report_block(reason: &str, allowed_dirs: &[String]) {
    eprintln!("BLOCKED: {}", reason);
    eprintln!(
        "Tip: rm -rf is only allowed in these directories: {}",
        allowed_dirs.join(", ")
    );
}

/// Returns the process exit code: 0 to continue, [`EXIT_BLOCKED`] to block.
pub fn run() -> i32 {
    let Some(payload) = read_payload() else {
        return 0;
    };
    let ctx = match HookContext::load() {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!("pre-tool-use: {}", e);
            return 0;
        }
    };

    match handle(&payload, &ctx) {
        Ok(Verdict::Block { reason }) => {
            report_block(&reason, &ctx.config.guard.allowed_rm_directories);
            EXIT_BLOCKED
        }
        Ok(Verdict::Allow) => 0,
        Err(e) => {
            tracing::warn!("pre-tool-use: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ToolPulseConfig;
    use crate::core::state::StateStore;
    use serde_json::json;

    fn context(tmp: &tempfile::TempDir) -> HookContext {
        HookContext {
            project_dir: tmp.path().join("project"),
            config: ToolPulseConfig::default(),
            store: StateStore::new(tmp.path().join("state.json")),
        }
    }

    #[test]
    fn test_dangerous_command_is_blocked_without_side_effects() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let payload = HookPayload::from_value(json!({
            "session_id": "s1",
            "tool_name": "Bash",
            "tool_input": {"command": "rm -rf /"}
        }));

        assert!(handle(&payload, &ctx).unwrap().is_blocked());
        assert!(ctx.store.session("s1").is_none());
        assert!(!ctx.project_dir.join(".toolpulse").exists());
    }

    #[test]
    fn test_mistyped_session_id_does_not_skip_gate() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let payload = HookPayload::from_value(json!({
            "session_id": 42,
            "tool_name": "Bash",
            "tool_input": {"command": "bash -c 'rm -rf ~'"}
        }));

        assert!(handle(&payload, &ctx).unwrap().is_blocked());
    }

    #[test]
    fn test_allowed_call_is_logged_and_timed() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let payload = HookPayload::from_value(json!({
            "session_id": "s1",
            "tool_name": "Bash",
            "tool_input": {"command": "rm -rf ./trees/old"}
        }));

        assert_eq!(handle(&payload, &ctx).unwrap(), Verdict::Allow);
        let session = ctx.store.session("s1").unwrap();
        assert_eq!(session.tool_starts.len(), 1);
        assert_eq!(session.tool_history, vec!["Bash"]);

        let log = ctx
            .project_dir
            .join(".toolpulse/logs/s1")
            .join(AuditKind::PreToolUse.file_name());
        assert_eq!(audit_log::read_log(&log).len(), 1);
    }

    #[test]
    fn test_non_tool_event_is_only_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let payload = HookPayload::from_value(json!({"session_id": "s1"}));

        assert_eq!(handle(&payload, &ctx).unwrap(), Verdict::Allow);
        assert!(ctx.store.session("s1").is_none());
    }
}
