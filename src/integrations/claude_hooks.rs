use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::core::error::{Result, ToolPulseError};
use crate::core::util;

const MARKER: &str = "toolpulse";

/// Hook events we register for, with their tool matcher and whether the
/// local pre/post hook runs before `send-event`.
const HOOK_EVENTS: &[(&str, Option<&str>, Option<&str>)] = &[
    ("PreToolUse", Some(""), Some("pre-tool-use")),
    ("PostToolUse", Some(""), Some("post-tool-use")),
    ("PostToolUseFailure", Some(""), Some("post-tool-use")),
    ("UserPromptSubmit", None, None),
    ("SessionStart", None, None),
    ("SessionEnd", None, None),
    ("Stop", None, None),
    ("SubagentStop", None, None),
    ("Notification", None, None),
    ("PreCompact", None, None),
];

/// `<project>/.claude/settings.json`, or `~/.claude/settings.json` with `global`.
pub fn settings_path(global: bool, project_dir: &Path) -> Result<PathBuf> {
    let base = if global {
        dirs::home_dir().ok_or(ToolPulseError::NoHomeDir)?
    } else {
        project_dir.to_path_buf()
    };
    Ok(base.join(".claude").join("settings.json"))
}

fn binary_path() -> String {
    std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| MARKER.to_string())
}

fn read_settings(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(json!({}));
    }
    let content = std::fs::read_to_string(path).map_err(ToolPulseError::io(path))?;
    Ok(serde_json::from_str(&content).unwrap_or_else(|_| json!({})))
}

fn is_ours(entry: &Value) -> bool {
    serde_json::to_string(entry)
        .unwrap_or_default()
        .contains(MARKER)
}

/// Add our hook entries to the settings file. Returns `false` if they were
/// already present.
pub fn install_into(path: &Path, binary: &str, source_app: &str) -> Result<bool> {
    let mut settings = read_settings(path)?;
    if !settings.is_object() {
        settings = json!({});
    }
    let already = settings
        .get("hooks")
        .and_then(|h| h.as_object())
        .is_some_and(|hooks| hooks.values().flat_map(|v| v.as_array()).flatten().any(is_ours));
    if already {
        return Ok(false);
    }

    if !settings.get("hooks").is_some_and(|h| h.is_object()) {
        settings["hooks"] = json!({});
    }
    for (event, matcher, local_hook) in HOOK_EVENTS {
        let mut commands = Vec::new();
        if let Some(sub) = local_hook {
            commands.push(json!({"type": "command", "command": format!("{} {}", binary, sub)}));
        }
        commands.push(json!({
            "type": "command",
            "command": format!(
                "{} send-event --source-app {} --event-type {}",
                binary, source_app, event
            )
        }));

        let mut entry = json!({ "hooks": commands });
        if let Some(m) = matcher {
            entry["matcher"] = json!(m);
        }

        let hooks = &mut settings["hooks"];
        if !hooks.get(*event).is_some_and(|v| v.is_array()) {
            hooks[*event] = json!([]);
        }
        if let Some(arr) = hooks.get_mut(*event).and_then(|v| v.as_array_mut()) {
            arr.push(entry);
        }
    }

    util::write_atomic(path, serde_json::to_string_pretty(&settings)?.as_bytes())?;
    Ok(true)
}

/// Remove our hook entries, dropping events left empty. Returns `false` if
/// there was nothing to remove.
pub fn uninstall_from(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let mut settings = read_settings(path)?;
    let mut removed = false;

    if let Some(hooks) = settings.get_mut("hooks").and_then(|h| h.as_object_mut()) {
        for entries in hooks.values_mut() {
            if let Some(arr) = entries.as_array_mut() {
                let before = arr.len();
                arr.retain(|entry| !is_ours(entry));
                removed |= arr.len() != before;
            }
        }
        hooks.retain(|_, v| v.as_array().is_none_or(|a| !a.is_empty()));
    }
    if settings
        .get("hooks")
        .and_then(|h| h.as_object())
        .is_some_and(|o| o.is_empty())
    {
        if let Some(obj) = settings.as_object_mut() {
            obj.remove("hooks");
        }
    }

    if removed {
        util::write_atomic(path, serde_json::to_string_pretty(&settings)?.as_bytes())?;
    }
    Ok(removed)
}

pub fn install(global: bool, project_dir: &Path) -> Result<()> {
    let path = settings_path(global, project_dir)?;
    let source_app = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| MARKER.to_string());

    if install_into(&path, &binary_path(), &source_app)? {
        println!("  \x1b[1;32m[done]\x1b[0m Installed hooks \x1b[2m({})\x1b[0m", path.display());
    } else {
        println!("  \x1b[2m[skip]\x1b[0m Hooks already installed in {}", path.display());
    }
    Ok(())
}

pub fn uninstall(global: bool, project_dir: &Path) -> Result<()> {
    let path = settings_path(global, project_dir)?;
    if uninstall_from(&path)? {
        println!("  \x1b[1;32m[done]\x1b[0m Removed hooks \x1b[2m({})\x1b[0m", path.display());
    } else {
        println!("  \x1b[2m[skip]\x1b[0m No toolpulse hooks in {}", path.display());
    }
    Ok(())
}
