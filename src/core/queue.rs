use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::{Result, ToolPulseError};
use crate::core::util;

pub const QUEUE_FILE: &str = "event_queue.jsonl";

/// Line-delimited JSON file holding envelopes that could not be delivered.
#[derive(Debug, Clone)]
pub struct EventQueue {
    path: PathBuf,
}

impl EventQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        EventQueue { path: path.into() }
    }

    /// `<project>/.toolpulse/event_queue.jsonl`
    pub fn for_project(project_dir: &Path) -> Self {
        EventQueue::new(util::data_dir_in(project_dir).join(QUEUE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one envelope as a single line write.
    pub fn append(&self, event: &Value) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(ToolPulseError::io(dir))?;
        }
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(ToolPulseError::io(&self.path))?;
        file.write_all(line.as_bytes())
            .map_err(ToolPulseError::io(&self.path))?;
        file.flush().map_err(ToolPulseError::io(&self.path))?;
        Ok(())
    }

    /// Queued envelopes in order. Corrupt lines are skipped.
    pub fn load(&self) -> Vec<Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("skipping corrupt queue entry: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rewrite the queue with `remaining`, removing the file when empty.
    pub fn replace(&self, remaining: &[Value]) -> Result<()> {
        if remaining.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ToolPulseError::io(&self.path)(e)),
            };
        }
        let mut out = String::new();
        for event in remaining {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        util::write_atomic(&self.path, out.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_and_load_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = EventQueue::for_project(tmp.path());
        assert!(queue.is_empty());

        queue.append(&json!({"n": 1})).unwrap();
        queue.append(&json!({"n": 2})).unwrap();

        let events = queue.load();
        assert_eq!(events, vec![json!({"n": 1}), json!({"n": 2})]);
        let raw = std::fs::read_to_string(queue.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = EventQueue::new(tmp.path().join(QUEUE_FILE));
        std::fs::write(queue.path(), "{\"n\":1}\n{not json\n\n{\"n\":2}\n").unwrap();

        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_replace_with_nothing_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = EventQueue::new(tmp.path().join(QUEUE_FILE));
        queue.append(&json!({"n": 1})).unwrap();

        queue.replace(&[]).unwrap();
        assert!(!queue.path().exists());
        // Removing an absent queue is fine
        queue.replace(&[]).unwrap();
    }

    #[test]
    fn test_replace_keeps_remaining() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = EventQueue::new(tmp.path().join(QUEUE_FILE));
        queue.append(&json!({"n": 1})).unwrap();
        queue.append(&json!({"n": 2})).unwrap();

        queue.replace(&[json!({"n": 2})]).unwrap();
        assert_eq!(queue.load(), vec![json!({"n": 2})]);
    }
}
