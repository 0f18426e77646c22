//! HTTP delivery with retry, queue-on-failure, and opportunistic flush.
//!
//! An event moves pending → delivering → delivered | queued. Queued events go
//! back to delivering when a later send in retry mode succeeds.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::core::config::ServerConfig;
use crate::core::error::Result;
use crate::core::queue::EventQueue;

const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// Not delivered; persisted in the durable queue.
    Queued,
    /// Not delivered and not queued (single-shot sends, or the queue write failed).
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub delivered: usize,
    pub remaining: usize,
}

enum Attempt {
    Ok,
    Rejected(StatusCode),
    Transport(reqwest::Error),
}

pub struct Dispatcher {
    client: Client,
    url: String,
    max_retries: u32,
    backoff: Duration,
    queue: EventQueue,
}

impl Dispatcher {
    pub fn new(
        url: &str,
        timeout: Duration,
        max_retries: u32,
        queue: EventQueue,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("toolpulse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Dispatcher {
            client,
            url: url.to_string(),
            max_retries,
            backoff: DEFAULT_BACKOFF,
            queue,
        })
    }

    pub fn from_config(server: &ServerConfig, queue: EventQueue) -> Result<Self> {
        Dispatcher::new(
            &server.url,
            Duration::from_secs(server.timeout_secs),
            server.max_retries,
            queue,
        )
    }

    /// Base delay between attempts; doubles after each failed attempt.
    #[cfg(test)]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[cfg(test)]
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    fn post(&self, event: &Value) -> Attempt {
        match self.client.post(&self.url).json(event).send() {
            Ok(resp) if resp.status() == StatusCode::OK => Attempt::Ok,
            Ok(resp) => Attempt::Rejected(resp.status()),
            Err(e) => Attempt::Transport(e),
        }
    }

    /// Deliver `event`. With `retry`, transport errors are retried with
    /// backoff, an undelivered event is queued, and a successful send
    /// flushes the queue. Without `retry` there is one attempt and no side
    /// effects beyond the request itself.
    pub fn deliver(&self, event: &Value, retry: bool) -> Outcome {
        let attempts = if retry { self.max_retries.max(1) } else { 1 };

        for attempt in 0..attempts {
            match self.post(event) {
                Attempt::Ok => {
                    if retry {
                        self.flush();
                    }
                    return Outcome::Delivered;
                }
                Attempt::Rejected(status) => {
                    // Server-side rejection is not assumed transient
                    tracing::warn!("server returned status {}", status);
                    break;
                }
                Attempt::Transport(e) => {
                    if attempt + 1 < attempts {
                        let wait = self.backoff * 2u32.pow(attempt);
                        tracing::debug!(
                            "delivery attempt {} failed ({}), retrying in {:?}",
                            attempt + 1,
                            e,
                            wait
                        );
                        std::thread::sleep(wait);
                    } else {
                        tracing::warn!("failed to send event after {} attempt(s): {}", attempt + 1, e);
                    }
                }
            }
        }

        if !retry {
            return Outcome::Failed;
        }
        match self.queue.append(event) {
            Ok(()) => {
                tracing::debug!("event queued at {}", self.queue.path().display());
                Outcome::Queued
            }
            Err(e) => {
                tracing::warn!("failed to queue event: {}", e);
                Outcome::Failed
            }
        }
    }

    pub fn send(&self, event: &Value) -> Outcome {
        self.deliver(event, true)
    }

    /// Replay every queued event once, without backoff. The queue file is
    /// rewritten only if something was delivered.
    pub fn flush(&self) -> FlushReport {
        let queued = self.queue.load();
        if queued.is_empty() {
            return FlushReport::default();
        }

        let remaining: Vec<Value> = queued
            .iter()
            .filter(|event| self.deliver(event, false) != Outcome::Delivered)
            .cloned()
            .collect();
        let report = FlushReport {
            delivered: queued.len() - remaining.len(),
            remaining: remaining.len(),
        };

        if report.delivered > 0 {
            if let Err(e) = self.queue.replace(&remaining) {
                tracing::warn!("failed to rewrite event queue: {}", e);
            }
            tracing::debug!(
                "flushed {} queued event(s), {} remaining",
                report.delivered,
                report.remaining
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread::JoinHandle;

    /// Nothing listens on port 1.
    const UNREACHABLE: &str = "http://127.0.0.1:1/events";

    /// Collection server that answers `requests` requests with `status`.
    fn spawn_server(status: u16, requests: usize) -> (String, mpsc::Receiver<Value>, JoinHandle<()>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            for _ in 0..requests {
                let mut request = match server.recv() {
                    Ok(r) => r,
                    Err(_) => break,
                };
                let mut body = String::new();
                request.as_reader().read_to_string(&mut body).unwrap();
                tx.send(serde_json::from_str(&body).unwrap()).unwrap();
                request
                    .respond(tiny_http::Response::empty(status))
                    .unwrap();
            }
        });
        (format!("http://127.0.0.1:{}/events", port), rx, handle)
    }

    fn dispatcher(url: &str, dir: &std::path::Path) -> Dispatcher {
        Dispatcher::new(url, Duration::from_secs(2), 3, EventQueue::for_project(dir))
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_delivers_to_server() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, rx, handle) = spawn_server(200, 1);

        let outcome = dispatcher(&url, tmp.path()).send(&json!({"hook_event_type": "Stop"}));
        handle.join().unwrap();

        assert_eq!(outcome, Outcome::Delivered);
        assert_eq!(rx.recv().unwrap()["hook_event_type"], "Stop");
        assert!(!EventQueue::for_project(tmp.path()).path().exists());
    }

    #[test]
    fn test_unreachable_server_queues_event() {
        let tmp = tempfile::tempdir().unwrap();
        let d = dispatcher(UNREACHABLE, tmp.path());

        assert_eq!(d.send(&json!({"n": 1})), Outcome::Queued);
        assert_eq!(d.queue().load(), vec![json!({"n": 1})]);
    }

    #[test]
    fn test_rejection_is_not_retried() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, rx, handle) = spawn_server(500, 1);

        let d = dispatcher(&url, tmp.path());
        assert_eq!(d.send(&json!({"n": 1})), Outcome::Queued);
        handle.join().unwrap();

        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(d.queue().len(), 1);
    }

    #[test]
    fn test_single_shot_failure_is_not_queued() {
        let tmp = tempfile::tempdir().unwrap();
        let d = dispatcher(UNREACHABLE, tmp.path());

        assert_eq!(d.deliver(&json!({"n": 1}), false), Outcome::Failed);
        assert!(!d.queue().path().exists());
    }

    #[test]
    fn test_successful_send_flushes_queue() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = EventQueue::for_project(tmp.path());
        queue.append(&json!({"n": 1})).unwrap();
        queue.append(&json!({"n": 2})).unwrap();
        let mut raw = std::fs::read_to_string(queue.path()).unwrap();
        raw.push_str("{corrupt\n");
        std::fs::write(queue.path(), raw).unwrap();

        let (url, rx, handle) = spawn_server(200, 3);
        let outcome = dispatcher(&url, tmp.path()).send(&json!({"n": 0}));
        handle.join().unwrap();

        assert_eq!(outcome, Outcome::Delivered);
        let received: Vec<Value> = rx.try_iter().collect();
        assert_eq!(received, vec![json!({"n": 0}), json!({"n": 1}), json!({"n": 2})]);
        assert!(!queue.path().exists());
    }

    #[test]
    fn test_flush_empty_queue_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let d = dispatcher(UNREACHABLE, tmp.path());

        assert_eq!(d.flush(), FlushReport::default());
        assert!(!d.queue().path().exists());
    }

    #[test]
    fn test_flush_without_deliveries_leaves_file_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let d = dispatcher(UNREACHABLE, tmp.path());
        d.queue().append(&json!({"n": 1})).unwrap();
        let before = std::fs::read_to_string(d.queue().path()).unwrap() + "{corrupt\n";
        std::fs::write(d.queue().path(), &before).unwrap();

        let report = d.flush();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.remaining, 1);
        assert_eq!(std::fs::read_to_string(d.queue().path()).unwrap(), before);
    }
}
