use crate::providers::Message;

/// Per-message overhead the estimator charges for role and framing tokens.
pub const MESSAGE_OVERHEAD: usize = 6;

/// Measures how many tokens a message costs against a trim budget.
pub trait TokenCounter {
    fn count(&self, message: &Message) -> usize;

    fn count_all(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.count(m)).sum()
    }
}

impl<F> TokenCounter for F
where
    F: Fn(&Message) -> usize,
{
    fn count(&self, message: &Message) -> usize {
        self(message)
    }
}

// Very rough token estimator: ~4 chars per token + small overhead per message
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, message: &Message) -> usize {
        MESSAGE_OVERHEAD + estimate_tokens(message.content())
    }
}
