//! Cross-invocation session state.
//!
//! Every hook runs in a fresh process, so anything that must survive between the
//! pre-tool and post-tool hooks lives in one JSON document under the user's home
//! directory. All mutations are load → change in memory → save, and saves go
//! through a temp file + rename so a concurrent reader never sees a torn file.
//! Two processes racing on the same document can still lose one update.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::core::error::{Result, ToolPulseError};
use crate::core::tool_input::{TodoItem, ToolInput};
use crate::core::util;

/// In-flight tool starts kept per session.
pub const MAX_TOOL_STARTS: usize = 10;
/// Tool names kept for workflow pattern detection.
pub const MAX_TOOL_HISTORY: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStart {
    pub tool_name: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub tool_input: Value,
}

/// Substrings that mark a shell command as a test run, wherever they appear
/// (`python -m pytest`, `npm run test`, `make test`).
const TEST_MARKERS: &[&str] = &["pytest", "jest", "vitest", "test"];

fn is_test_run(command: &str) -> bool {
    let command = command.to_lowercase();
    TEST_MARKERS.iter().any(|marker| command.contains(marker))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionStats {
    pub tools_executed: u64,
    pub files_read: u64,
    pub files_written: u64,
    pub files_edited: u64,
    pub bash_commands_run: u64,
    pub tests_run: u64,
    pub grep_searches: u64,
    pub glob_searches: u64,
    pub subagents_launched: u64,
    pub web_searches: u64,
    pub web_fetches: u64,
    pub total_tool_time_ms: f64,
    pub error_count: u64,
}

impl SessionStats {
    fn record(&mut self, tool_name: &str, duration_ms: f64, tool_input: &Value) {
        self.tools_executed += 1;
        self.total_tool_time_ms += duration_ms;

        match ToolInput::parse(tool_name, tool_input) {
            ToolInput::Read(_) => self.files_read += 1,
            ToolInput::Write(_) => self.files_written += 1,
            ToolInput::Edit(_) | ToolInput::MultiEdit(_) => self.files_edited += 1,
            ToolInput::Bash(bash) => {
                self.bash_commands_run += 1;
                if is_test_run(&bash.command) {
                    self.tests_run += 1;
                }
            }
            ToolInput::Grep(_) => self.grep_searches += 1,
            ToolInput::Glob(_) => self.glob_searches += 1,
            ToolInput::Task(_) => self.subagents_launched += 1,
            ToolInput::WebSearch(_) => self.web_searches += 1,
            ToolInput::WebFetch(_) => self.web_fetches += 1,
            ToolInput::TodoWrite(_) | ToolInput::Skill(_) | ToolInput::Opaque(_) => {}
        }
    }

    pub fn avg_tool_time_ms(&self) -> f64 {
        if self.tools_executed == 0 {
            return 0.0;
        }
        let avg = self.total_tool_time_ms / self.tools_executed as f64;
        (avg * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub tool_count: u64,
    #[serde(default)]
    pub tool_starts: BTreeMap<String, ToolStart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<SessionStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub todos: Vec<TodoItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tool_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_history: Vec<String>,
    /// Model identifier extracted from the transcript, cached per session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl SessionRecord {
    pub fn new(now: DateTime<Utc>) -> Self {
        SessionRecord {
            start_time: now,
            tool_count: 0,
            tool_starts: BTreeMap::new(),
            stats: None,
            todos: Vec::new(),
            last_tool_timestamp: None,
            tool_history: Vec::new(),
            model: None,
        }
    }

    /// Fraction of todos completed, in [0, 1].
    pub fn completion_rate(&self) -> f64 {
        if self.todos.is_empty() {
            return 0.0;
        }
        let done = self
            .todos
            .iter()
            .filter(|t| t.status == crate::core::tool_input::TodoStatus::Completed)
            .count();
        done as f64 / self.todos.len() as f64
    }
}

/// Fixed-width key so lexical order of the map matches start order.
fn tool_start_key(start: DateTime<Utc>, tool_name: &str) -> String {
    format!(
        "tool_start_{:020}_{}",
        start.timestamp_micros().max(0),
        tool_name
    )
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityState {
    #[serde(default)]
    pub sessions: HashMap<String, SessionRecord>,
}

impl ObservabilityState {
    /// The session record, created with `start_time = now` if absent.
    pub fn session_mut(&mut self, session_id: &str, now: DateTime<Utc>) -> &mut SessionRecord {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord::new(now))
    }

    pub fn start_tool(
        &mut self,
        session_id: &str,
        tool_name: &str,
        tool_input: Value,
        now: DateTime<Utc>,
    ) {
        let session = self.session_mut(session_id, now);
        session.tool_starts.insert(
            tool_start_key(now, tool_name),
            ToolStart {
                tool_name: tool_name.to_string(),
                start_time: now,
                tool_input,
            },
        );

        while session.tool_starts.len() > MAX_TOOL_STARTS {
            let oldest = session
                .tool_starts
                .iter()
                .min_by_key(|(_, start)| start.start_time)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    session.tool_starts.remove(&key);
                }
                None => break,
            }
        }

        session.tool_history.push(tool_name.to_string());
        if session.tool_history.len() > MAX_TOOL_HISTORY {
            let excess = session.tool_history.len() - MAX_TOOL_HISTORY;
            session.tool_history.drain(..excess);
        }
    }

    /// Pair a tool end with its most recent start. Returns the duration in
    /// milliseconds, or `None` (state untouched) when no start matches.
    pub fn finish_tool(
        &mut self,
        session_id: &str,
        tool_name: &str,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        let session = self.sessions.get_mut(session_id)?;
        let (key, start_time) = session
            .tool_starts
            .iter()
            .filter(|(_, start)| start.tool_name == tool_name)
            .max_by_key(|(_, start)| start.start_time)
            .map(|(key, start)| (key.clone(), start.start_time))?;

        let start = session.tool_starts.remove(&key)?;
        let micros = (now - start_time).num_microseconds().unwrap_or(0).max(0);
        let duration_ms = ((micros as f64 / 1000.0) * 100.0).round() / 100.0;

        session
            .stats
            .get_or_insert_with(SessionStats::default)
            .record(tool_name, duration_ms, &start.tool_input);
        session.last_tool_timestamp = Some(now);
        Some(duration_ms)
    }

    pub fn set_todos(&mut self, session_id: &str, todos: Vec<TodoItem>, now: DateTime<Utc>) {
        let session = self.session_mut(session_id, now);
        session.todos = todos;
        session.last_tool_timestamp = Some(now);
    }

    pub fn bump_tool_count(&mut self, session_id: &str, now: DateTime<Utc>) -> u64 {
        let session = self.session_mut(session_id, now);
        session.tool_count += 1;
        session.tool_count
    }

    pub fn bump_error_count(&mut self, session_id: &str, now: DateTime<Utc>) {
        let session = self.session_mut(session_id, now);
        session
            .stats
            .get_or_insert_with(SessionStats::default)
            .error_count += 1;
    }

    /// Drop sessions that started more than `max_age_hours` before `now`.
    pub fn sweep(&mut self, max_age_hours: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(max_age_hours);
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.start_time >= cutoff);
        before - self.sessions.len()
    }
}

/// The on-disk home of [`ObservabilityState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateStore { path: path.into() }
    }

    /// `~/.toolpulse/state.json`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ToolPulseError::NoHomeDir)?;
        Ok(home.join(util::DATA_DIR).join("state.json"))
    }

    pub fn open_default() -> Result<Self> {
        Ok(StateStore::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable state is treated as empty.
    pub fn load(&self) -> ObservabilityState {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return ObservabilityState::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(
                "state file {} is corrupt, starting fresh: {}",
                self.path.display(),
                e
            );
            ObservabilityState::default()
        })
    }

    pub fn save(&self, state: &ObservabilityState) -> Result<()> {
        let json = serde_json::to_vec(state)?;
        util::write_atomic(&self.path, &json)
    }

    /// Load, apply `f`, save.
    pub fn update<R>(&self, f: impl FnOnce(&mut ObservabilityState) -> R) -> Result<R> {
        let mut state = self.load();
        let out = f(&mut state);
        self.save(&state)?;
        Ok(out)
    }

    pub fn session(&self, session_id: &str) -> Option<SessionRecord> {
        self.load().sessions.remove(session_id)
    }

    /// The session record, creating and persisting it on first sight.
    pub fn ensure_session(&self, session_id: &str) -> Result<SessionRecord> {
        let mut state = self.load();
        if let Some(existing) = state.sessions.get(session_id) {
            return Ok(existing.clone());
        }
        let record = state.session_mut(session_id, Utc::now()).clone();
        self.save(&state)?;
        Ok(record)
    }

    pub fn record_tool_start(
        &self,
        session_id: &str,
        tool_name: &str,
        tool_input: &Value,
    ) -> Result<()> {
        self.update(|state| state.start_tool(session_id, tool_name, tool_input.clone(), Utc::now()))
    }

    pub fn record_tool_end(&self, session_id: &str, tool_name: &str) -> Result<Option<f64>> {
        let mut state = self.load();
        let duration = state.finish_tool(session_id, tool_name, Utc::now());
        if duration.is_some() {
            self.save(&state)?;
        }
        Ok(duration)
    }

    pub fn record_tool_error(&self, session_id: &str) -> Result<()> {
        self.update(|state| state.bump_error_count(session_id, Utc::now()))
    }

    pub fn record_todos(&self, session_id: &str, todos: Vec<TodoItem>) -> Result<()> {
        self.update(|state| state.set_todos(session_id, todos, Utc::now()))
    }

    pub fn increment_tool_count(&self, session_id: &str) -> Result<u64> {
        self.update(|state| state.bump_tool_count(session_id, Utc::now()))
    }

    pub fn cache_model(&self, session_id: &str, model: &str) -> Result<()> {
        self.update(|state| {
            state.session_mut(session_id, Utc::now()).model = Some(model.to_string());
        })
    }

    /// Remove sessions older than `max_age_hours`; one save for the whole batch.
    pub fn cleanup_old_sessions(&self, max_age_hours: i64) -> Result<usize> {
        let mut state = self.load();
        let removed = state.sweep(max_age_hours, Utc::now());
        if removed > 0 {
            self.save(&state)?;
            tracing::debug!("removed {} stale session(s)", removed);
        }
        Ok(removed)
    }
}
