use thiserror::Error;

use crate::providers::ProviderError;

/// Failures surfaced by the conversation layer. None are recovered here.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("missing credential: {0}")]
    MissingCredential(String),
    #[error("remote call failed: {0}")]
    RemoteCallFailed(#[source] ProviderError),
    #[error("invalid trim config: {0}")]
    InvalidTrimConfig(String),
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingCredential { provider, env } => {
                ChatError::MissingCredential(format!("{provider} requires {env}"))
            }
            other => ChatError::RemoteCallFailed(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_keeps_its_kind() {
        let err: ChatError = ProviderError::MissingCredential {
            provider: "groq".into(),
            env: "GROQ_API_KEY".into(),
        }
        .into();
        assert!(matches!(err, ChatError::MissingCredential(ref m) if m.contains("GROQ_API_KEY")));
    }

    #[test]
    fn other_provider_errors_are_remote_failures() {
        let err: ChatError = ProviderError::Other("boom".into()).into();
        assert!(matches!(err, ChatError::RemoteCallFailed(ProviderError::Other(_))));
        assert_eq!(err.to_string(), "remote call failed: other: boom");
    }
}
