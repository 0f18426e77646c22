//! Shared helpers for paths and timestamps used by the hooks and the collector.
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::{Result, ToolPulseError};

/// Project-scoped data directory name (queue, audit logs, duration handoff).
pub const DATA_DIR: &str = ".toolpulse";

/// Convert an absolute path to one relative to `base`.
/// Returns the path unchanged if it doesn't live under `base` or is already relative.
pub fn make_relative(path: &str, base: &str) -> String {
    let path = path.trim();
    let base = base.trim_end_matches('/');
    if base.is_empty() || base == "." {
        return path.to_string();
    }
    if let Some(rel) = path.strip_prefix(base) {
        // "/repo-other/x" must not count as living under "/repo"
        if let Some(rel) = rel.strip_prefix('/') {
            if !rel.is_empty() {
                return rel.to_string();
            }
        }
    }
    path.to_string()
}

/// Session ids end up in file names; keep them to a safe alphabet.
pub fn sanitize_session_id(session_id: &str) -> String {
    let cleaned: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Milliseconds since the Unix epoch, as sent in the envelope `timestamp`.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn data_dir_in(project_dir: &Path) -> PathBuf {
    project_dir.join(DATA_DIR)
}

/// Per-session log directory: `<project>/.toolpulse/logs/<session>/`.
pub fn session_log_dir(project_dir: &Path, session_id: &str) -> PathBuf {
    data_dir_in(project_dir)
        .join("logs")
        .join(sanitize_session_id(session_id))
}

/// Create the project data directory and keep it out of version control.
pub fn ensure_data_dir_in(project_dir: &Path) -> Result<PathBuf> {
    let dir = data_dir_in(project_dir);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(ToolPulseError::io(&dir))?;
    }

    let gitignore = project_dir.join(".gitignore");
    let needs_entry = if gitignore.exists() {
        let content = std::fs::read_to_string(&gitignore).unwrap_or_default();
        !content
            .lines()
            .any(|l| l.trim() == ".toolpulse/" || l.trim() == ".toolpulse")
    } else {
        // Only touch .gitignore in git checkouts
        project_dir.join(".git").exists()
    };
    if needs_entry {
        if let Ok(mut f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&gitignore)
        {
            let _ = writeln!(f, "\n# toolpulse telemetry data (auto-generated)\n.toolpulse/");
        }
    }
    Ok(dir)
}

/// Create (if needed) and return the per-session log directory.
pub fn ensure_session_log_dir(project_dir: &Path, session_id: &str) -> Result<PathBuf> {
    ensure_data_dir_in(project_dir)?;
    let dir = session_log_dir(project_dir, session_id);
    std::fs::create_dir_all(&dir).map_err(ToolPulseError::io(&dir))?;
    Ok(dir)
}

/// Replace `path` with `contents` via a temp file in the same directory.
/// Readers never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(ToolPulseError::io(dir))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(ToolPulseError::io(dir))?;
    tmp.write_all(contents).map_err(ToolPulseError::io(path))?;
    tmp.flush().map_err(ToolPulseError::io(path))?;
    tmp.persist(path)
        .map_err(|e| ToolPulseError::io(path)(e.error))?;
    Ok(())
}
