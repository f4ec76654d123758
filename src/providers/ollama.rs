use super::{ChatRequest, ChatResponse, ChatStream, LlmProvider, ProviderError, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, default_model: String) -> Result<Self, ProviderError> {
        let client = Client::builder().build()?;
        Ok(Self { client, base_url, default_model })
    }
}

#[derive(Serialize)]
struct Msg<'a> { role: &'a str, content: &'a str }

#[derive(Serialize)]
struct Body<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    stream: bool,
    options: Options,
}

#[derive(Serialize, Default)]
struct Options { temperature: Option<f32>, num_predict: Option<u32> }

impl<'a> Body<'a> {
    fn from_request(req: &'a ChatRequest, stream: bool) -> Self {
        let mut messages: Vec<Msg> = Vec::new();
        if let Some(sys) = &req.system { messages.push(Msg { role: "system", content: sys }); }
        for m in &req.messages { messages.push(Msg { role: m.role().wire_name(), content: m.content() }); }
        Self {
            model: &req.model,
            messages,
            stream,
            options: Options { temperature: req.temperature, num_predict: req.max_tokens },
        }
    }
}

// Ollama streams NDJSON lines; only complete lines reach this parser
fn parse_ndjson_chunk(text: &str) -> Result<String, ProviderError> {
    #[derive(Deserialize)]
    struct ChunkMsg { content: String }
    #[derive(Deserialize)]
    struct Chunk { message: Option<ChunkMsg> }

    let mut acc = String::new();
    for line in text.split('\n') {
        let l = line.trim();
        if l.is_empty() { continue; }
        if let Chunk { message: Some(msg) } = serde_json::from_str::<Chunk>(l)? {
            acc.push_str(&msg.content);
        }
    }
    Ok(acc)
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str { "ollama" }
    fn default_model(&self) -> &str { &self.default_model }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        #[derive(Deserialize)]
        struct Model { name: String }
        #[derive(Deserialize)]
        struct Resp { models: Vec<Model> }
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        let resp: Resp = self.client
            .get(url)
            .send().await?
            .error_for_status()?
            .json().await?;
        Ok(resp.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        #[derive(Deserialize)]
        struct RespMsg { content: String }
        #[derive(Deserialize)]
        struct Resp {
            message: RespMsg,
            #[serde(default)]
            prompt_eval_count: Option<u32>,
            #[serde(default)]
            eval_count: Option<u32>,
        }

        let body = Body::from_request(&req, false);
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let resp: Resp = self.client
            .post(url)
            .json(&body)
            .send().await?
            .error_for_status()?
            .json().await?;
        let usage = match (resp.prompt_eval_count, resp.eval_count) {
            (Some(i), Some(o)) => Some(Usage { input_tokens: i, output_tokens: o, total_tokens: i + o }),
            _ => None,
        };
        Ok(ChatResponse { content: Some(resp.message.content), usage })
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<ChatStream, ProviderError> {
        let body = Body::from_request(&req, true);
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let resp = self.client
            .post(url)
            .json(&body)
            .send().await?
            .error_for_status()?;

        Ok(super::lines::line_deltas(resp.bytes_stream(), parse_ndjson_chunk))
    }
}
