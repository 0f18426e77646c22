use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:4000/events";
const RC_FILE: &str = ".toolpulserc";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ToolPulseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
    #[serde(default)]
    pub agent_version: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CaptureConfig {
    /// Attach the full transcript as `chat` on every event.
    #[serde(default)]
    pub add_chat: bool,
    /// Ask an LLM provider for a one-line event summary.
    #[serde(default)]
    pub summarize: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardConfig {
    /// Directory prefixes where `rm -rf` is permitted.
    #[serde(default = "default_allowed_rm_directories")]
    pub allowed_rm_directories: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_max_session_age_hours")]
    pub max_session_age_hours: i64,
    /// The stale-session sweep runs on roughly one in this many events.
    #[serde(default = "default_sweep_one_in")]
    pub sweep_one_in: u32,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_agent_type() -> String {
    "claude".to_string()
}

fn default_allowed_rm_directories() -> Vec<String> {
    vec!["trees/".to_string()]
}

fn default_max_session_age_hours() -> i64 {
    24
}

fn default_sweep_one_in() -> u32 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            url: default_server_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            agent_type: default_agent_type(),
            agent_version: None,
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        GuardConfig {
            allowed_rm_directories: default_allowed_rm_directories(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            max_session_age_hours: default_max_session_age_hours(),
            sweep_one_in: default_sweep_one_in(),
        }
    }
}

/// The directory the agent is working in: `$CLAUDE_PROJECT_DIR`, else cwd.
pub fn project_dir() -> PathBuf {
    std::env::var_os("CLAUDE_PROJECT_DIR")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn find_config_file(project_dir: &Path) -> Option<PathBuf> {
    let repo_config = project_dir.join(RC_FILE);
    if repo_config.exists() {
        return Some(repo_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(RC_FILE);
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

pub fn load_config(project_dir: &Path) -> ToolPulseConfig {
    match find_config_file(project_dir) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("failed to parse {}: {}", path.display(), e);
                ToolPulseConfig::default()
            }),
            Err(e) => {
                tracing::warn!("failed to read {}: {}", path.display(), e);
                ToolPulseConfig::default()
            }
        },
        None => ToolPulseConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ToolPulseConfig::default();
        assert_eq!(config.server.url, "http://localhost:4000/events");
        assert_eq!(config.server.timeout_secs, 5);
        assert_eq!(config.server.max_retries, 3);
        assert_eq!(config.agent.agent_type, "claude");
        assert!(config.agent.agent_version.is_none());
        assert!(!config.capture.add_chat);
        assert!(!config.capture.summarize);
        assert_eq!(config.guard.allowed_rm_directories, vec!["trees/"]);
        assert_eq!(config.state.max_session_age_hours, 24);
        assert_eq!(config.state.sweep_one_in, 100);
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[server]
url = "http://collector.internal:9000/events"
timeout_secs = 2
max_retries = 5

[agent]
agent_type = "codex"
agent_version = "0.64.0"

[capture]
add_chat = true

[guard]
allowed_rm_directories = ["trees/", "build/"]
"#;
        let config: ToolPulseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.url, "http://collector.internal:9000/events");
        assert_eq!(config.server.timeout_secs, 2);
        assert_eq!(config.server.max_retries, 5);
        assert_eq!(config.agent.agent_type, "codex");
        assert_eq!(config.agent.agent_version.as_deref(), Some("0.64.0"));
        assert!(config.capture.add_chat);
        assert!(!config.capture.summarize);
        assert_eq!(config.guard.allowed_rm_directories.len(), 2);
        assert_eq!(config.state.sweep_one_in, 100);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[server]
timeout_secs = 1
"#;
        let config: ToolPulseConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.timeout_secs, 1);
        assert_eq!(config.server.url, DEFAULT_SERVER_URL);
        assert_eq!(config.guard.allowed_rm_directories, vec!["trees/"]);
    }

    #[test]
    fn test_project_rc_file_is_preferred() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(RC_FILE),
            "[state]\nmax_session_age_hours = 6\n",
        )
        .unwrap();
        let config = load_config(tmp.path());
        assert_eq!(config.state.max_session_age_hours, 6);
    }

    #[test]
    fn test_invalid_rc_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(RC_FILE), "[server\nurl = ").unwrap();
        let config = load_config(tmp.path());
        assert_eq!(config.server.url, DEFAULT_SERVER_URL);
    }
}
