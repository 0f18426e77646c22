use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::core::error::Result;
use crate::core::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    PreToolUse,
    PostToolUse,
}

impl AuditKind {
    pub fn file_name(self) -> &'static str {
        match self {
            AuditKind::PreToolUse => "pre_tool_use.json",
            AuditKind::PostToolUse => "post_tool_use.json",
        }
    }
}

/// Entries of an audit log. A missing or corrupt file reads as empty.
pub fn read_log(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Vec<Value>>(&content).ok())
        .unwrap_or_default()
}

/// Append the raw hook payload to the session's audit log for `kind`.
pub fn append(project_dir: &Path, session_id: &str, kind: AuditKind, record: &Value) -> Result<PathBuf> {
    let dir = util::ensure_session_log_dir(project_dir, session_id)?;
    let path = dir.join(kind.file_name());

    let mut entries = read_log(&path);
    entries.push(record.clone());
    util::write_atomic(&path, serde_json::to_string_pretty(&entries)?.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_accumulates_entries() {
        let tmp = tempfile::tempdir().unwrap();
        append(tmp.path(), "s1", AuditKind::PreToolUse, &json!({"n": 1})).unwrap();
        let path = append(tmp.path(), "s1", AuditKind::PreToolUse, &json!({"n": 2})).unwrap();

        assert!(path.ends_with(".toolpulse/logs/s1/pre_tool_use.json"));
        assert_eq!(read_log(&path), vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn test_corrupt_log_starts_fresh() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = util::ensure_session_log_dir(tmp.path(), "s1").unwrap();
        std::fs::write(dir.join("post_tool_use.json"), "{ broken").unwrap();

        let path = append(tmp.path(), "s1", AuditKind::PostToolUse, &json!({"n": 1})).unwrap();
        assert_eq!(read_log(&path), vec![json!({"n": 1})]);
    }

    #[test]
    fn test_logs_are_per_kind_and_session() {
        let tmp = tempfile::tempdir().unwrap();
        let pre = append(tmp.path(), "a/b", AuditKind::PreToolUse, &json!({})).unwrap();
        let post = append(tmp.path(), "c", AuditKind::PostToolUse, &json!({})).unwrap();

        assert_ne!(pre.parent(), post.parent());
        assert!(pre.to_string_lossy().contains("a_b"));
    }
}
