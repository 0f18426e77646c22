//! One-line event summaries from an LLM provider, chosen by which API key is
//! present (`OPENAI_API_KEY` first, then `ANTHROPIC_API_KEY`).

use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::core::error::{Result, ToolPulseError};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODEL: &str = "gpt-4o-mini";

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_MODEL: &str = "claude-haiku-4-5-20251001";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_TOKENS: u32 = 100;
const TEMPERATURE: f64 = 0.3;
const MAX_PAYLOAD_CHARS: usize = 1000;
const MAX_SUMMARY_CHARS: usize = 100;

pub trait Summarizer {
    fn summarize(&self, event_type: &str, payload: &Value) -> Result<String>;
    fn provider(&self) -> &'static str;
}

fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

pub fn build_prompt(event_type: &str, payload: &Value) -> String {
    let pretty = serde_json::to_string_pretty(payload).unwrap_or_default();
    let payload_str = if pretty.chars().count() > MAX_PAYLOAD_CHARS {
        let head: String = pretty.chars().take(MAX_PAYLOAD_CHARS).collect();
        format!("{}...", head)
    } else {
        pretty
    };

    format!(
        "Generate a one-sentence summary of this Claude Code hook event payload for an engineer monitoring the system.

Event Type: {event_type}
Payload:
{payload_str}

Requirements:
- ONE sentence only (no period at the end)
- Focus on the key action or information in the payload
- Be specific and technical
- Keep under 15 words
- Use present tense
- No quotes or formatting
- Return ONLY the summary text

Examples:
- Reads configuration file from project root
- Executes npm install to update dependencies
- Searches web for React documentation
- Edits database schema to add user table
- Agent responds with implementation plan

Generate the summary:"
    )
}

/// Strip quotes, a trailing period and anything after the first line; cap the length.
pub fn clean_summary(raw: &str) -> String {
    let s = raw.trim().trim_matches(|c: char| c == '"' || c == '\'');
    let s = s.strip_suffix('.').unwrap_or(s);
    let s = s.lines().next().unwrap_or_default();

    if s.chars().count() > MAX_SUMMARY_CHARS {
        let head: String = s.chars().take(MAX_SUMMARY_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn non_empty(summary: String) -> Result<String> {
    if summary.is_empty() {
        Err(ToolPulseError::Summarizer("empty summary".to_string()))
    } else {
        Ok(summary)
    }
}

fn check_status(resp: reqwest::blocking::Response, provider: &str) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ToolPulseError::Summarizer(format!(
            "{} returned status {}",
            provider, status
        )));
    }
    Ok(resp.json()?)
}

pub struct OpenAiClient {
    api_key: String,
    api_url: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_endpoint(api_key, OPENAI_API_URL, SUMMARIZE_TIMEOUT)
    }

    pub fn with_endpoint(api_key: &str, api_url: &str, timeout: Duration) -> Result<Self> {
        Ok(OpenAiClient {
            api_key: api_key.to_string(),
            api_url: api_url.to_string(),
            client: http_client(timeout)?,
        })
    }
}

impl Summarizer for OpenAiClient {
    fn summarize(&self, event_type: &str, payload: &Value) -> Result<String> {
        let body = json!({
            "model": OPENAI_MODEL,
            "messages": [{"role": "user", "content": build_prompt(event_type, payload)}],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        });
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let value = check_status(resp, self.provider())?;

        let content = value
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolPulseError::Summarizer("no choices in response".to_string()))?;
        non_empty(clean_summary(content))
    }

    fn provider(&self) -> &'static str {
        "openai"
    }
}

pub struct AnthropicClient {
    api_key: String,
    api_url: String,
    client: Client,
}

impl AnthropicClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_endpoint(api_key, ANTHROPIC_API_URL, SUMMARIZE_TIMEOUT)
    }

    pub fn with_endpoint(api_key: &str, api_url: &str, timeout: Duration) -> Result<Self> {
        Ok(AnthropicClient {
            api_key: api_key.to_string(),
            api_url: api_url.to_string(),
            client: http_client(timeout)?,
        })
    }
}

impl Summarizer for AnthropicClient {
    fn summarize(&self, event_type: &str, payload: &Value) -> Result<String> {
        let body = json!({
            "model": ANTHROPIC_MODEL,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "messages": [{"role": "user", "content": build_prompt(event_type, payload)}],
        });
        let resp = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&body)
            .send()?;
        let value = check_status(resp, self.provider())?;

        let text = value
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            })
            .and_then(|b| b.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| ToolPulseError::Summarizer("no text in response".to_string()))?;
        non_empty(clean_summary(text))
    }

    fn provider(&self) -> &'static str {
        "anthropic"
    }
}

/// Pick a provider from the given keys. Empty keys count as absent.
pub fn from_keys(
    openai_key: Option<&str>,
    anthropic_key: Option<&str>,
) -> Result<Option<Box<dyn Summarizer>>> {
    if let Some(key) = openai_key.filter(|k| !k.is_empty()) {
        return Ok(Some(Box::new(OpenAiClient::new(key)?)));
    }
    if let Some(key) = anthropic_key.filter(|k| !k.is_empty()) {
        return Ok(Some(Box::new(AnthropicClient::new(key)?)));
    }
    Ok(None)
}

pub fn from_env() -> Result<Option<Box<dyn Summarizer>>> {
    let openai = std::env::var("OPENAI_API_KEY").ok();
    let anthropic = std::env::var("ANTHROPIC_API_KEY").ok();
    from_keys(openai.as_deref(), anthropic.as_deref())
}

/// Summary for an event, or `None` when no provider is configured or the call fails.
pub fn summarize_event(event_type: &str, payload: &Value) -> Option<String> {
    let summarizer = match from_env() {
        Ok(Some(s)) => s,
        Ok(None) => {
            tracing::debug!("no summarizer API key set, skipping summary");
            return None;
        }
        Err(e) => {
            tracing::warn!("{}", e);
            return None;
        }
    };
    match summarizer.summarize(event_type, payload) {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::warn!("{} summary failed: {}", summarizer.provider(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;

    /// Answers one request with `body`, forwarding the request headers and body.
    fn spawn_provider(body: &'static str) -> (String, mpsc::Receiver<(Vec<String>, Value)>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let headers = request
                    .headers()
                    .iter()
                    .map(|h| format!("{}: {}", h.field.as_str().as_str().to_lowercase(), h.value))
                    .collect();
                let mut raw = String::new();
                request.as_reader().read_to_string(&mut raw).unwrap();
                tx.send((headers, serde_json::from_str(&raw).unwrap())).unwrap();
                request
                    .respond(tiny_http::Response::from_string(body))
                    .unwrap();
            }
        });
        (format!("http://127.0.0.1:{}/", port), rx)
    }

    #[test]
    fn test_clean_summary() {
        assert_eq!(clean_summary("  \"Reads config file.\"  "), "Reads config file");
        assert_eq!(clean_summary("First line\nSecond line"), "First line");
        let long = "x".repeat(150);
        let cleaned = clean_summary(&long);
        assert_eq!(cleaned.chars().count(), 100);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn test_prompt_truncates_payload() {
        let payload = json!({"content": "y".repeat(5000)});
        let prompt = build_prompt("PostToolUse", &payload);
        assert!(prompt.contains("Event Type: PostToolUse"));
        assert!(prompt.contains("..."));
        assert!(prompt.len() < 2500);
    }

    #[test]
    fn test_provider_priority() {
        let s = from_keys(Some("sk-openai"), Some("sk-ant")).unwrap().unwrap();
        assert_eq!(s.provider(), "openai");
        let s = from_keys(Some(""), Some("sk-ant")).unwrap().unwrap();
        assert_eq!(s.provider(), "anthropic");
        assert!(from_keys(None, None).unwrap().is_none());
    }

    #[test]
    fn test_openai_summary() {
        let (url, rx) = spawn_provider(
            r#"{"choices":[{"message":{"content":"Reads config file from project root."}}]}"#,
        );
        let client = OpenAiClient::with_endpoint("test-openai-key", &url, SUMMARIZE_TIMEOUT).unwrap();

        let summary = client
            .summarize("PostToolUse", &json!({"tool_name": "Read"}))
            .unwrap();
        assert_eq!(summary, "Reads config file from project root");

        let (headers, body) = rx.recv().unwrap();
        assert!(headers.contains(&"authorization: Bearer test-openai-key".to_string()));
        assert_eq!(body["model"], OPENAI_MODEL);
    }

    #[test]
    fn test_anthropic_summary() {
        let (url, rx) = spawn_provider(
            r#"{"content":[{"type":"text","text":"Executes npm install"}]}"#,
        );
        let client = AnthropicClient::with_endpoint("test-ant-key", &url, SUMMARIZE_TIMEOUT).unwrap();

        let summary = client.summarize("PreToolUse", &json!({})).unwrap();
        assert_eq!(summary, "Executes npm install");

        let (headers, body) = rx.recv().unwrap();
        assert!(headers.contains(&"x-api-key: test-ant-key".to_string()));
        assert!(headers.contains(&format!("anthropic-version: {}", ANTHROPIC_API_VERSION)));
        assert_eq!(body["max_tokens"], MAX_TOKENS);
    }

    #[test]
    fn test_unreachable_provider_is_an_error() {
        let client = OpenAiClient::with_endpoint(
            "k",
            "http://127.0.0.1:1/",
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(client.summarize("Stop", &json!({})).is_err());
    }
}
