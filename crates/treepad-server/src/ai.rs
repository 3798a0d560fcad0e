//! Proxy to an external language model for edit suggestions.
//!
//! Two upstream flavours are supported: a Groq-style completion API
//! (bearer key, `{model, prompt, max_tokens, temperature}`) and a
//! GPT-OSS-style endpoint that accepts `{messages}`. Groq wins when both are
//! configured.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AiConfig;

/// Characters of the target file included in the system prompt.
pub const MAX_EXCERPT_CHARS: usize = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub suggested_edit: Option<Value>,
}

#[derive(Debug, Clone, Error)]
pub enum AiError {
    #[error("No LLM configured. Set GROQ_API_KEY or GPT_OSS_URL")]
    NotConfigured,
    #[error("LLM error")]
    Upstream { details: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Provider<'a> {
    Groq { url: &'a str, api_key: &'a str },
    GptOss { url: &'a str },
}

/// Blocking client for the configured upstream.
pub struct AiClient {
    config: AiConfig,
    agent: ureq::Agent,
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("groq", &self.config.groq_api_key.is_some())
            .field("gpt_oss_url", &self.config.gpt_oss_url)
            .finish_non_exhaustive()
    }
}

impl AiClient {
    #[must_use]
    pub fn new(config: AiConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { config, agent }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.provider().is_some()
    }

    fn provider(&self) -> Option<Provider<'_>> {
        if let Some(api_key) = self.config.groq_api_key.as_deref() {
            return Some(Provider::Groq {
                url: &self.config.groq_url,
                api_key,
            });
        }
        self.config
            .gpt_oss_url
            .as_deref()
            .map(|url| Provider::GptOss { url })
    }

    /// Asks the model about `file_path` given the conversation so far.
    pub fn chat(
        &self,
        file_path: &str,
        file_content: &str,
        messages: &[ChatMessage],
    ) -> Result<ChatReply, AiError> {
        let provider = self.provider().ok_or(AiError::NotConfigured)?;
        let mut conversation = Vec::with_capacity(messages.len() + 1);
        conversation.push(ChatMessage {
            role: "system".to_string(),
            content: system_prompt(file_path, excerpt(file_content)),
        });
        conversation.extend_from_slice(messages);

        let reply = match provider {
            Provider::Groq { url, api_key } => {
                let payload = json!({
                    "model": self.config.model,
                    "prompt": conversation,
                    "max_tokens": self.config.max_tokens,
                    "temperature": self.config.temperature,
                });
                let request = self
                    .agent
                    .post(url)
                    .set("Authorization", &format!("Bearer {api_key}"));
                groq_reply_text(&send(request, &payload)?)
            }
            Provider::GptOss { url } => {
                let payload = json!({ "messages": conversation });
                gpt_oss_reply_text(&send(self.agent.post(url), &payload)?)
            }
        };
        debug!(path = %file_path, chars = reply.len(), "llm replied");

        Ok(ChatReply {
            suggested_edit: extract_suggested_edit(&reply),
            reply,
        })
    }
}

fn send(request: ureq::Request, payload: &Value) -> Result<Value, AiError> {
    match request.send_json(payload) {
        Ok(response) => {
            let text = response.into_string().map_err(|err| AiError::Upstream {
                details: err.to_string(),
            })?;
            serde_json::from_str(&text).map_err(|_| AiError::Upstream { details: text })
        }
        Err(ureq::Error::Status(status, response)) => {
            let details = response.into_string().unwrap_or_default();
            warn!(status, "llm request rejected");
            Err(AiError::Upstream { details })
        }
        Err(err) => {
            warn!("llm request failed: {err}");
            Err(AiError::Upstream {
                details: err.to_string(),
            })
        }
    }
}

/// Leading slice of `content`, at most [`MAX_EXCERPT_CHARS`] characters.
#[must_use]
pub fn excerpt(content: &str) -> &str {
    match content.char_indices().nth(MAX_EXCERPT_CHARS) {
        Some((index, _)) => &content[..index],
        None => content,
    }
}

#[must_use]
pub fn system_prompt(file_path: &str, excerpt: &str) -> String {
    format!(
        "You are a code assistant that can suggest edits to files. When suggesting edits \
         return JSON object with key \"edit\" containing {{ type:'replace'|'patch', content: string }}. \
         Otherwise return plain text user-friendly reply. File path: {file_path}. \
         Context (truncated):\n{excerpt}"
    )
}

fn groq_reply_text(data: &Value) -> String {
    let text = data
        .pointer("/choices/0/text")
        .filter(|value| !value.is_null())
        .or_else(|| data.get("output").filter(|value| !value.is_null()));
    text.map_or_else(|| data.to_string(), value_text)
}

fn gpt_oss_reply_text(data: &Value) -> String {
    ["reply", "output", "text"]
        .iter()
        .find_map(|key| data.get(*key).filter(|value| !value.is_null()))
        .map_or_else(|| data.to_string(), value_text)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The `edit` object of a reply that is, or contains, a JSON object.
///
/// A reply that parses as JSON is used as is; otherwise the span from the
/// first `{` to the last `}` is tried.
#[must_use]
pub fn extract_suggested_edit(reply: &str) -> Option<Value> {
    let parsed = match serde_json::from_str::<Value>(reply) {
        Ok(value) => value,
        Err(_) => {
            let start = reply.find('{')?;
            let end = reply.rfind('}')?;
            if end < start {
                return None;
            }
            serde_json::from_str::<Value>(&reply[start..=end]).ok()?
        }
    };
    parsed
        .get("edit")
        .filter(|edit| !matches!(edit, Value::Null | Value::Bool(false)))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage {
            role: "user".to_string(),
            content: "tidy this".to_string(),
        }]
    }

    /// Serves one request with `status`/`body` and hands back what it received.
    fn one_shot_upstream(status: u16, body: &str) -> (String, mpsc::Receiver<(String, Value)>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind stub upstream");
        let addr = server
            .server_addr()
            .to_ip()
            .expect("stub listens on ip");
        let (tx, rx) = mpsc::channel();
        let body = body.to_string();
        thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let auth = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Authorization"))
                    .map(|header| header.value.as_str().to_string())
                    .unwrap_or_default();
                let mut text = String::new();
                let _ = request.as_reader().read_to_string(&mut text);
                let _ = tx.send((auth, serde_json::from_str(&text).unwrap_or(Value::Null)));
                let _ = request
                    .respond(tiny_http::Response::from_string(body).with_status_code(status));
            }
        });
        (format!("http://{addr}/chat"), rx)
    }

    #[test]
    fn excerpt_is_bounded_by_characters() {
        let long = "é".repeat(MAX_EXCERPT_CHARS + 10);
        assert_eq!(excerpt(&long).chars().count(), MAX_EXCERPT_CHARS);
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn prompt_names_file_and_embeds_excerpt() {
        let prompt = system_prompt("notes/todo.md", "- [ ] ship");
        assert!(prompt.contains("File path: notes/todo.md."));
        assert!(prompt.ends_with("Context (truncated):\n- [ ] ship"));
        assert!(prompt.contains("\"edit\""));
    }

    #[test]
    fn edit_is_found_in_plain_or_wrapped_json() {
        assert_eq!(
            extract_suggested_edit(r#"{"edit":{"type":"replace","content":"x"}}"#),
            Some(json!({ "type": "replace", "content": "x" }))
        );
        assert_eq!(
            extract_suggested_edit(
                "Sure, here it is:\n{\"edit\": {\"type\": \"patch\", \"content\": \"@@\"}}\nDone."
            ),
            Some(json!({ "type": "patch", "content": "@@" }))
        );
        assert_eq!(extract_suggested_edit("no json here"), None);
        assert_eq!(extract_suggested_edit(r#"{"answer": 42}"#), None);
        assert_eq!(extract_suggested_edit("} backwards {"), None);
        assert_eq!(extract_suggested_edit(r#"{"edit": null}"#), None);
    }

    #[test]
    fn reply_text_falls_back_through_known_fields() {
        assert_eq!(groq_reply_text(&json!({ "choices": [{ "text": "hi" }] })), "hi");
        assert_eq!(groq_reply_text(&json!({ "output": "out" })), "out");
        assert_eq!(groq_reply_text(&json!({ "other": 1 })), r#"{"other":1}"#);
        assert_eq!(gpt_oss_reply_text(&json!({ "reply": "r", "text": "t" })), "r");
        assert_eq!(gpt_oss_reply_text(&json!({ "text": "t" })), "t");
        assert_eq!(gpt_oss_reply_text(&json!({ "output": 3 })), "3");
    }

    #[test]
    fn unconfigured_client_refuses() {
        let client = AiClient::new(AiConfig::default());
        assert!(!client.is_configured());
        let err = client.chat("a.md", "", &messages()).expect_err("no backend");
        assert_eq!(
            err.to_string(),
            "No LLM configured. Set GROQ_API_KEY or GPT_OSS_URL"
        );
    }

    #[test]
    fn gpt_oss_receives_system_prompt_first() {
        let (url, rx) = one_shot_upstream(
            200,
            r#"{"reply":"{\"edit\":{\"type\":\"replace\",\"content\":\"new\"}}"}"#,
        );
        let client = AiClient::new(AiConfig {
            gpt_oss_url: Some(url),
            ..AiConfig::default()
        });
        let reply = client.chat("a.md", "old", &messages()).expect("chat");
        assert_eq!(
            reply.suggested_edit,
            Some(json!({ "type": "replace", "content": "new" }))
        );

        let (auth, payload) = rx.recv_timeout(Duration::from_secs(5)).expect("request seen");
        assert_eq!(auth, "");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "tidy this");
    }

    #[test]
    fn groq_sends_bearer_key_and_surfaces_upstream_errors() {
        let (url, rx) = one_shot_upstream(429, "rate limited");
        let client = AiClient::new(AiConfig {
            groq_api_key: Some("k-123".to_string()),
            groq_url: url,
            gpt_oss_url: Some("http://127.0.0.1:9/unused".to_string()),
            ..AiConfig::default()
        });
        let err = client.chat("a.md", "", &messages()).expect_err("upstream 429");
        let AiError::Upstream { details } = err else {
            panic!("expected upstream error, got {err:?}");
        };
        assert_eq!(details, "rate limited");

        let (auth, payload) = rx.recv_timeout(Duration::from_secs(5)).expect("request seen");
        assert_eq!(auth, "Bearer k-123");
        assert_eq!(payload["model"], "groq-1");
        assert_eq!(payload["max_tokens"], 2000);
        assert_eq!(payload["prompt"][0]["role"], "system");
    }
}
