//! Suffix trimming of a chat history to a token budget.
//!
//! The newest messages are kept and the oldest dropped. A leading system message
//! can be pinned, and a cut can be pushed forward to a chosen anchor role so the
//! model never sees a conversation that opens mid-exchange.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::providers::{Message, Role};
use crate::tokens::TokenCounter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrimStrategy {
    /// Keep the most recent messages.
    #[default]
    #[serde(alias = "keep-last")]
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimConfig {
    /// Must be positive; signed so a bad value from config or flags can be reported.
    pub max_tokens: i64,
    pub strategy: TrimStrategy,
    /// Pin a leading system message even when it does not fit.
    pub preserve_system: bool,
    /// Shorten the oldest kept message instead of dropping it whole.
    pub allow_partial: bool,
    /// After a cut, the kept suffix must open with this role.
    pub start_on: Option<Role>,
}

impl TrimConfig {
    pub fn keep_last(max_tokens: i64) -> Self {
        Self {
            max_tokens,
            strategy: TrimStrategy::Last,
            preserve_system: false,
            allow_partial: false,
            start_on: None,
        }
    }

    pub fn with_preserve_system(mut self, preserve: bool) -> Self {
        self.preserve_system = preserve;
        self
    }

    pub fn with_allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    pub fn with_start_on(mut self, role: Option<Role>) -> Self {
        self.start_on = role;
        self
    }

    pub fn budget(&self) -> Result<usize, ChatError> {
        if self.max_tokens <= 0 {
            return Err(ChatError::InvalidTrimConfig(format!(
                "max_tokens must be positive, got {}",
                self.max_tokens
            )));
        }
        usize::try_from(self.max_tokens)
            .map_err(|_| ChatError::InvalidTrimConfig(format!("max_tokens too large: {}", self.max_tokens)))
    }
}

/// Reduce `messages` to fit `config.max_tokens` as measured by `counter`.
///
/// The result is a contiguous suffix of the input, optionally preceded by the
/// pinned leading system message. If the newest message alone is over budget it
/// is returned by itself, so the result can exceed the budget in that case.
pub fn trim<C>(messages: &[Message], config: &TrimConfig, counter: &C) -> Result<Vec<Message>, ChatError>
where
    C: TokenCounter + ?Sized,
{
    let budget = config.budget()?;
    let total = counter.count_all(messages);
    if total <= budget {
        return Ok(messages.to_vec());
    }

    let (pinned, rest) = match messages.split_first() {
        Some((first, rest)) if config.preserve_system && first.role() == Role::System => {
            (Some(first), rest)
        }
        _ => (None, messages),
    };
    let remaining = budget.saturating_sub(pinned.map_or(0, |m| counter.count(m)));

    let kept = match config.strategy {
        TrimStrategy::Last => keep_last(rest, remaining, config, counter),
    };

    let mut out = Vec::with_capacity(kept.len() + 1);
    out.extend(pinned.cloned());
    out.extend(kept);
    tracing::debug!(
        before = total,
        after = counter.count_all(&out),
        budget,
        dropped = messages.len() - out.len(),
        "trimmed history"
    );
    Ok(out)
}

fn keep_last<C>(rest: &[Message], budget: usize, config: &TrimConfig, counter: &C) -> Vec<Message>
where
    C: TokenCounter + ?Sized,
{
    let Some(last) = rest.last() else {
        return Vec::new();
    };
    if counter.count(last) > budget {
        return vec![last.clone()];
    }

    let mut used = 0;
    let mut start = rest.len();
    let mut partial = None;
    for (i, m) in rest.iter().enumerate().rev() {
        let cost = counter.count(m);
        if used + cost > budget {
            if config.allow_partial {
                partial = truncate_front(m, budget - used, counter);
            }
            break;
        }
        used += cost;
        start = i;
    }

    let mut kept: Vec<Message> = partial.into_iter().chain(rest[start..].iter().cloned()).collect();
    if start > 0
        && let Some(role) = config.start_on
    {
        kept = match kept.iter().position(|m| m.role() == role) {
            Some(pos) => kept.split_off(pos),
            None => Vec::new(),
        };
    }
    kept
}

// Drop leading words until the remainder fits; None if no non-empty tail does.
fn truncate_front<C>(message: &Message, available: usize, counter: &C) -> Option<Message>
where
    C: TokenCounter + ?Sized,
{
    let words: Vec<&str> = message.content().split_inclusive(char::is_whitespace).collect();
    (1..words.len())
        .map(|skip| words[skip..].concat())
        .map(|tail| tail.trim_start().to_string())
        .filter(|tail| !tail.is_empty())
        .map(|tail| Message::new(message.role(), tail))
        .find(|candidate| counter.count(candidate) <= available)
}
