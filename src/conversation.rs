use futures_util::StreamExt;

use crate::error::ChatError;
use crate::providers::{ChatRequest, ChatStream, LlmProvider, Message};
use crate::session::SessionStore;
use crate::tokens::TokenCounter;
use crate::trim::{TrimConfig, trim};

/// One provider, one system instruction, one trimming policy.
///
/// Each turn is: history + new human message, trimmed, sent behind the fixed
/// system instruction; the completion text comes back.
pub struct Conversation<'a, C> {
    provider: &'a dyn LlmProvider,
    model: String,
    system_prompt: String,
    temperature: Option<f32>,
    trim: TrimConfig,
    counter: C,
}

impl<'a, C: TokenCounter> Conversation<'a, C> {
    pub fn new(provider: &'a dyn LlmProvider, trim: TrimConfig, counter: C) -> Self {
        Self {
            model: provider.default_model().to_string(),
            provider,
            system_prompt: crate::config::DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: None,
            trim,
            counter,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Trimmed `history ++ [new]`, exactly what goes after the system instruction.
    pub fn prepare(&self, history: &[Message], new: Message) -> Result<Vec<Message>, ChatError> {
        let mut all = Vec::with_capacity(history.len() + 1);
        all.extend_from_slice(history);
        all.push(new);
        trim(&all, &self.trim, &self.counter)
    }

    fn request(&self, messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            system: Some(self.system_prompt.clone()),
            messages,
            temperature: self.temperature,
            max_tokens: None,
        }
    }

    pub async fn invoke(&self, history: &[Message], new: Message) -> Result<String, ChatError> {
        let messages = self.prepare(history, new)?;
        tracing::info!(
            provider = self.provider.name(),
            model = %self.model,
            messages = messages.len(),
            "calling model"
        );
        let resp = self.provider.chat(self.request(messages)).await?;
        if let Some(usage) = &resp.usage {
            tracing::info!(
                input = usage.input_tokens,
                output = usage.output_tokens,
                total = usage.total_tokens,
                "usage"
            );
        }
        Ok(resp.content.unwrap_or_default())
    }

    /// Run a turn against a stored session and record both sides on success.
    pub async fn send(
        &self,
        store: &mut SessionStore,
        session_id: &str,
        text: &str,
    ) -> Result<String, ChatError> {
        let handle = store.handle(session_id);
        let human = Message::human(text);
        let reply = self
            .invoke(store.session(handle).history(), human.clone())
            .await?;
        let session = store.session_mut(handle);
        session.push(human);
        session.push(Message::ai(reply.clone()));
        Ok(reply)
    }

    pub async fn stream(&self, history: &[Message], new: Message) -> Result<ChatStream, ChatError> {
        let messages = self.prepare(history, new)?;
        tracing::info!(
            provider = self.provider.name(),
            model = %self.model,
            messages = messages.len(),
            "streaming from model"
        );
        Ok(self.provider.chat_stream(self.request(messages)).await?)
    }

    /// Streaming counterpart of `send`: each text delta goes to `on_delta` as it
    /// arrives, and the session only records the turn once the stream ends cleanly.
    pub async fn send_stream(
        &self,
        store: &mut SessionStore,
        session_id: &str,
        text: &str,
        mut on_delta: impl FnMut(&str),
    ) -> Result<String, ChatError> {
        let handle = store.handle(session_id);
        let human = Message::human(text);
        let mut stream = self
            .stream(store.session(handle).history(), human.clone())
            .await?;
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await.transpose()? {
            if let Some(content) = chunk.delta {
                on_delta(&content);
                reply.push_str(&content);
            }
        }
        let session = store.session_mut(handle);
        session.push(human);
        session.push(Message::ai(reply.clone()));
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatDelta, ChatResponse, ProviderError, Role};
    use crate::tokens::ApproxTokenCounter;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<ChatRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for Recording {
        fn name(&self) -> &str {
            "recording"
        }
        fn default_model(&self) -> &str {
            "fake-1"
        }
        async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
            Ok(vec!["fake-1".into()])
        }
        async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
            let n = {
                let mut reqs = self.requests.lock().unwrap();
                reqs.push(req);
                reqs.len()
            };
            if self.fail {
                return Err(ProviderError::Other("unreachable".into()));
            }
            Ok(ChatResponse {
                content: Some(format!("reply {n}")),
                usage: None,
            })
        }
        async fn chat_stream(&self, req: ChatRequest) -> Result<ChatStream, ProviderError> {
            self.requests.lock().unwrap().push(req);
            let mut items: Vec<Result<ChatDelta, ProviderError>> = ["tapi", "oca"]
                .into_iter()
                .map(|d| Ok(ChatDelta { delta: Some(d.to_string()) }))
                .collect();
            if self.fail {
                items.push(Err(ProviderError::Other("connection reset".into())));
            }
            Ok(futures_util::stream::iter(items).boxed())
        }
    }

    fn conversation(provider: &Recording, budget: i64) -> Conversation<'_, ApproxTokenCounter> {
        let trim = TrimConfig::keep_last(budget)
            .with_preserve_system(true)
            .with_start_on(Some(Role::Human));
        Conversation::new(provider, trim, ApproxTokenCounter)
            .with_system_prompt("Be accurate.")
            .with_temperature(Some(1.0))
    }

    #[tokio::test]
    async fn invoke_sends_instruction_and_trimmed_history() {
        let provider = Recording::default();
        let conv = conversation(&provider, 45);
        let history = vec![
            Message::system("You are helpful."),
            Message::human("Hi, I'm John."),
            Message::ai("Hello John!"),
            Message::human("I like tapioca ice cream."),
        ];
        let reply = conv
            .invoke(&history, Message::human("What ice cream do I like?"))
            .await
            .unwrap();
        assert_eq!(reply, "reply 1");

        let reqs = provider.requests.lock().unwrap();
        let req = &reqs[0];
        assert_eq!(req.model, "fake-1");
        assert_eq!(req.system.as_deref(), Some("Be accurate."));
        assert_eq!(req.temperature, Some(1.0));
        assert_eq!(
            req.messages,
            vec![
                Message::system("You are helpful."),
                Message::human("I like tapioca ice cream."),
                Message::human("What ice cream do I like?"),
            ]
        );
    }

    #[tokio::test]
    async fn send_accumulates_history_across_turns() {
        let provider = Recording::default();
        let conv = conversation(&provider, 1000).with_model("other");
        let mut store = SessionStore::new();

        assert_eq!(conv.send(&mut store, "chat1", "first").await.unwrap(), "reply 1");
        assert_eq!(conv.send(&mut store, "chat1", "second").await.unwrap(), "reply 2");
        conv.send(&mut store, "chat2", "elsewhere").await.unwrap();

        let history = store.get("chat1").unwrap().history();
        assert_eq!(
            history,
            &[
                Message::human("first"),
                Message::ai("reply 1"),
                Message::human("second"),
                Message::ai("reply 2"),
            ]
        );
        let reqs = provider.requests.lock().unwrap();
        // second turn saw the first exchange
        assert_eq!(reqs[1].messages.len(), 3);
        assert_eq!(reqs[1].model, "other");
        // other session starts fresh
        assert_eq!(reqs[2].messages, vec![Message::human("elsewhere")]);
    }

    #[tokio::test]
    async fn failed_turn_leaves_session_untouched() {
        let provider = Recording {
            fail: true,
            ..Default::default()
        };
        let conv = conversation(&provider, 100);
        let mut store = SessionStore::new();
        let err = conv.send(&mut store, "s", "hello").await.unwrap_err();
        assert!(matches!(err, ChatError::RemoteCallFailed(_)));
        assert!(store.get("s").unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_budget_fails_before_any_call() {
        let provider = Recording::default();
        let conv = conversation(&provider, 0);
        let err = conv.invoke(&[], Message::human("hi")).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidTrimConfig(_)));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_stream_records_the_assembled_reply() {
        let provider = Recording::default();
        let conv = conversation(&provider, 1000);
        let mut store = SessionStore::new();
        conv.send(&mut store, "chat1", "I like tapioca.").await.unwrap();

        let mut seen = Vec::new();
        let reply = conv
            .send_stream(&mut store, "chat1", "What do I like?", |d| seen.push(d.to_string()))
            .await
            .unwrap();
        assert_eq!(reply, "tapioca");
        assert_eq!(seen, vec!["tapi", "oca"]);
        assert_eq!(
            store.get("chat1").unwrap().history(),
            &[
                Message::human("I like tapioca."),
                Message::ai("reply 1"),
                Message::human("What do I like?"),
                Message::ai("tapioca"),
            ]
        );
        // streamed turn saw the earlier exchange
        assert_eq!(provider.requests.lock().unwrap()[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn broken_stream_leaves_session_untouched() {
        let provider = Recording {
            fail: true,
            ..Default::default()
        };
        let conv = conversation(&provider, 100);
        let mut store = SessionStore::new();
        let mut seen = String::new();
        let err = conv
            .send_stream(&mut store, "s", "hello", |d| seen.push_str(d))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::RemoteCallFailed(_)));
        // partial text was shown but never recorded
        assert_eq!(seen, "tapioca");
        assert!(store.get("s").unwrap().is_empty());
    }
}
