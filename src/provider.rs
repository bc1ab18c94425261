use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::settings::Settings;

/// Shown to the user for any remote failure.
pub const GENERIC_ERROR_TEXT: &str = "Hmm something went wrong❗";
pub const SIMULATED_APOLOGY: &str =
    "We apologize for the issue. It's not a problem with your request, but rather a technical difficulty on our end.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Status,
    MalformedResponse,
    Simulated,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("unexpected response: {0}")]
    MalformedResponse(String),
    #[error("{0}")]
    Simulated(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Network(_) => ErrorKind::Network,
            ProviderError::Status(_) => ErrorKind::Status,
            ProviderError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            ProviderError::Simulated(_) => ErrorKind::Simulated,
        }
    }

    /// Text placed in the conversation in place of a reply.
    pub fn user_message(&self) -> &str {
        match self {
            ProviderError::Simulated(text) => text,
            _ => GENERIC_ERROR_TEXT,
        }
    }
}

/// Turns a user message plus the current settings into an assistant reply.
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn respond(&self, message: &str, settings: &Settings) -> Result<String, ProviderError>;
}

/// Stand-in backend: succeeds, then fails, then succeeds again, forever.
pub struct SimulatedProvider {
    delay: Duration,
    calls: AtomicU64,
}

impl SimulatedProvider {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

    pub fn new(delay: Duration) -> Self {
        Self { delay, calls: AtomicU64::new(0) }
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self { Self::new(Self::DEFAULT_DELAY) }
}

#[async_trait]
impl ResponseProvider for SimulatedProvider {
    fn name(&self) -> &'static str { "simulated" }

    async fn respond(&self, message: &str, _settings: &Settings) -> Result<String, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if n % 2 == 0 {
            Ok(format!("{message} i am mimicking an api "))
        } else {
            Err(ProviderError::Simulated(SIMULATED_APOLOGY.into()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RequestShape {
    /// `POST /response` with `{ "message" }`
    #[default]
    Simple,
    /// `POST /multiAgent` with one system prompt per agent
    MultiAgent,
}

impl RequestShape {
    pub fn path(self) -> &'static str {
        match self {
            RequestShape::Simple => "response",
            RequestShape::MultiAgent => "multiAgent",
        }
    }
}

#[derive(Debug, Serialize)]
struct SimpleRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct MultiAgentRequest<'a> {
    system_prompt_analytica: &'a str,
    system_prompt_creativa: &'a str,
    system_prompt_pragmatica: &'a str,
    user_prompt: &'a str,
}

impl<'a> MultiAgentRequest<'a> {
    fn new(message: &'a str, settings: &'a Settings) -> Self {
        let prompt = |i: usize| settings.prompts.get(i).map(String::as_str).unwrap_or("");
        Self {
            system_prompt_analytica: prompt(0),
            system_prompt_creativa: prompt(1),
            system_prompt_pragmatica: prompt(2),
            user_prompt: message,
        }
    }
}

/// Posts each message to an HTTP backend. One attempt, no timeout.
#[derive(Clone)]
pub struct RemoteProvider {
    pub base_url: String,
    pub shape: RequestShape,
    client: reqwest::Client,
}

impl RemoteProvider {
    pub fn new(base_url: impl Into<String>, shape: RequestShape) -> Self {
        Self { base_url: base_url.into(), shape, client: reqwest::Client::new() }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.shape.path())
    }
}

#[async_trait]
impl ResponseProvider for RemoteProvider {
    fn name(&self) -> &'static str { "remote" }

    async fn respond(&self, message: &str, settings: &Settings) -> Result<String, ProviderError> {
        let url = self.endpoint();
        let rb = self.client.post(&url);
        let rb = match self.shape {
            RequestShape::Simple => rb.json(&SimpleRequest { message }),
            RequestShape::MultiAgent => rb.json(&MultiAgentRequest::new(message, settings)),
        };
        tracing::debug!(%url, "posting message to backend");
        let resp = rb.send().await.map_err(|e| ProviderError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status().as_u16()));
        }
        let body: Value = resp.json().await.map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        extract_reply(&body)
    }
}

const AGENT_SECTIONS: [(&str, &str); 4] = [
    ("Analytica", "Analytica's Response"),
    ("Creativa", "Creativa's Response"),
    ("Pragmatica", "Pragmatica's Response"),
    ("Final_Analytica", "Final Conclusion (Analytica)"),
];

/// Pulls the reply out of `{ message }`, `{ message: { content } }` or a
/// multi-agent transcript under `message`.
pub fn extract_reply(body: &Value) -> Result<String, ProviderError> {
    match body.get("message") {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Object(obj)) => {
            if let Some(Value::String(content)) = obj.get("content") {
                return Ok(content.clone());
            }
            let sections: Vec<String> = AGENT_SECTIONS
                .iter()
                .filter_map(|(key, heading)| {
                    obj.get(*key).and_then(Value::as_str).map(|text| format!("### {heading}\n> {text}\n"))
                })
                .collect();
            if sections.is_empty() {
                return Err(ProviderError::MalformedResponse("message object has no reply fields".into()));
            }
            Ok(sections.join("\n---\n\n"))
        }
        Some(_) => Err(ProviderError::MalformedResponse("message is neither text nor object".into())),
        None => Err(ProviderError::MalformedResponse("missing message field".into())),
    }
}
