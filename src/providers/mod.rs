mod lines;
pub mod ollama;
pub mod openai;
pub mod registry;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("missing credential for {provider}: set {env}")]
    MissingCredential { provider: String, env: String },
    #[error("config: {0}")]
    Config(String),
    #[error("other: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[serde(alias = "user")]
    Human,
    #[serde(alias = "assistant")]
    Ai,
}

impl Role {
    /// Role name as OpenAI-compatible endpoints expect it.
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Human => "user",
            Role::Ai => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Role::System),
            "human" | "user" => Ok(Role::Human),
            "ai" | "assistant" => Ok(Role::Ai),
            other => Err(format!("invalid role: {} (use system|human|ai)", other)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::Human => write!(f, "human"),
            Role::Ai => write!(f, "ai"),
        }
    }
}

/// A single chat turn. Fields are private so a message cannot change once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDelta {
    pub delta: Option<String>,
}

pub type ChatStream = BoxStream<'static, Result<ChatDelta, ProviderError>>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn default_model(&self) -> &str;
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
    async fn chat_stream(&self, req: ChatRequest) -> Result<ChatStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_accepts_wire_aliases() {
        let msgs: Vec<Message> = serde_json::from_str(
            r#"[{"role":"user","content":"a"},{"role":"assistant","content":"b"},{"role":"system","content":"c"}]"#,
        )
        .unwrap();
        assert_eq!(msgs[0].role(), Role::Human);
        assert_eq!(msgs[1].role(), Role::Ai);
        assert_eq!(msgs[2].role(), Role::System);
    }

    #[test]
    fn role_serializes_with_domain_names() {
        let text = serde_json::to_string(&Message::ai("hi")).unwrap();
        assert_eq!(text, r#"{"role":"ai","content":"hi"}"#);
        assert_eq!(Role::Ai.wire_name(), "assistant");
        assert_eq!("USER".parse::<Role>().unwrap(), Role::Human);
        assert!("tool".parse::<Role>().is_err());
    }
}
