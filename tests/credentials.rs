use memochat::config::{ApiProviderConfig, Config};
use memochat::providers::registry::ProviderRegistry;
use memochat::{ApproxTokenCounter, ChatError, Conversation, TrimConfig};

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn missing_groq_key_surfaces_as_missing_credential() {
    let cfg = Config {
        groq: Some(ApiProviderConfig::default()),
        ..Default::default()
    };
    let registry = ProviderRegistry::from_config_with_env(&cfg, no_env).unwrap();
    assert!(registry.unavailable().iter().any(|(k, env)| k == "groq" && env == "GROQ_API_KEY"));

    let err = registry
        .get("groq")
        .map(|p| Conversation::new(p, TrimConfig::keep_last(45), ApproxTokenCounter))
        .map_err(ChatError::from)
        .err()
        .unwrap();
    match err {
        ChatError::MissingCredential(msg) => assert!(msg.contains("GROQ_API_KEY")),
        other => panic!("expected MissingCredential, got {other:?}"),
    }
}

#[test]
fn env_key_enables_the_provider_when_config_has_none() {
    let cfg = Config::default();
    let registry = ProviderRegistry::from_config_with_env(&cfg, |name| {
        (name == "OPENAI_API_KEY").then(|| "sk-from-env".to_string())
    })
    .unwrap();
    assert_eq!(registry.list(), vec!["ollama", "openai"]);
    assert_eq!(
        registry.unavailable(),
        vec![("groq".to_string(), "GROQ_API_KEY".to_string())]
    );
}
