//! Best-effort environment probes. Each probe returns `None` when the tool it
//! asks about is missing or misbehaves; nothing here can fail the collection.

use serde::Serialize;
use std::path::Path;
use std::process::Command;

/// Run a command and return its trimmed output, or `None` on any failure.
/// Some tools (old `python --version`) print to stderr, so that is used when
/// stdout is empty.
pub fn command_output(program: &str, args: &[&str], cwd: Option<&Path>) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd.output().ok().filter(|o| o.status.success())?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let text = if stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).trim().to_string()
    } else {
        stdout
    };
    Some(text).filter(|s| !s.is_empty())
}

fn python_version() -> Option<String> {
    ["python3", "python"].iter().find_map(|cmd| {
        command_output(cmd, &["--version"], None)
            .map(|v| v.trim_start_matches("Python ").to_string())
    })
}

fn node_version() -> Option<String> {
    command_output("node", &["--version"], None).map(|v| v.trim_start_matches('v').to_string())
}

/// `go version go1.22.1 darwin/arm64` → `1.22.1`
fn go_version() -> Option<String> {
    command_output("go", &["version"], None)?
        .split_whitespace()
        .nth(2)
        .map(|v| v.trim_start_matches("go").to_string())
}

/// `rustc 1.79.0 (129f3b996 2024-06-10)` → `1.79.0`
fn rust_version() -> Option<String> {
    command_output("rustc", &["--version"], None)?
        .split_whitespace()
        .nth(1)
        .map(String::from)
}

fn os_version() -> Option<String> {
    if cfg!(windows) {
        return None;
    }
    command_output("uname", &["-r"], None)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentContext {
    pub os: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    pub shell: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rust_version: Option<String>,
}

pub fn environment_context() -> EnvironmentContext {
    let shell = std::env::var("SHELL")
        .ok()
        .and_then(|s| s.rsplit('/').next().map(String::from))
        .unwrap_or_default();
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    EnvironmentContext {
        os: std::env::consts::OS.to_string(),
        os_version: os_version(),
        shell,
        user,
        python_version: python_version(),
        node_version: node_version(),
        go_version: go_version(),
        rust_version: rust_version(),
    }
}
