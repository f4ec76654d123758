use super::{ChatRequest, ChatResponse, ChatStream, LlmProvider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Any endpoint speaking the OpenAI chat-completions dialect (Groq, OpenAI).
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    name: String,
    client: Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: String,
        api_key: String,
        default_model: String,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().build()?;
        Ok(Self {
            name: name.into(),
            client,
            base_url,
            api_key,
            default_model,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Body<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

impl<'a> Body<'a> {
    fn from_request(req: &'a ChatRequest, stream: bool) -> Self {
        let mut messages: Vec<Msg> = Vec::with_capacity(req.messages.len() + 1);
        if let Some(sys) = &req.system {
            messages.push(Msg {
                role: "system",
                content: sys,
            });
        }
        for m in &req.messages {
            messages.push(Msg {
                role: m.role().wire_name(),
                content: m.content(),
            });
        }
        Self {
            model: &req.model,
            messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            stream,
        }
    }
}

/// Pull the text deltas out of complete SSE lines.
pub(crate) fn parse_sse_chunk(text: &str) -> Result<String, ProviderError> {
    #[derive(Deserialize)]
    struct DeltaMsg {
        content: Option<String>,
    }
    #[derive(Deserialize)]
    struct Choice {
        delta: DeltaMsg,
    }
    #[derive(Deserialize)]
    struct Chunk {
        choices: Vec<Choice>,
    }

    let mut acc = String::new();
    for line in text.split('\n') {
        let line = line.trim();
        if !line.starts_with("data:") {
            continue;
        }
        let data = line.trim_start_matches("data:").trim();
        if data == "[DONE]" {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(data)?;
        for c in chunk.choices {
            if let Some(d) = c.delta.content {
                acc.push_str(&d);
            }
        }
    }
    Ok(acc)
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }
    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        #[derive(Deserialize)]
        struct Model {
            id: String,
        }
        #[derive(Deserialize)]
        struct Resp {
            data: Vec<Model>,
        }
        let resp: Resp = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.data.into_iter().map(|m| m.id).collect())
    }

    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Usage {
            prompt_tokens: u32,
            completion_tokens: u32,
            total_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
            usage: Option<Usage>,
        }

        let body = Body::from_request(&req, false);
        let resp: Resp = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let usage = resp.usage.map(|u| super::Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        let content = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        Ok(ChatResponse { content, usage })
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<ChatStream, ProviderError> {
        let body = Body::from_request(&req, true);
        let resp = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        // SSE: "data: {...}" lines and a final "data: [DONE]"
        Ok(super::lines::line_deltas(resp.bytes_stream(), parse_sse_chunk))
    }
}
