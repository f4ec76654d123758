use std::collections::HashMap;

use crate::config::{
    ApiProviderConfig, Config, GROQ_BASE_URL, GROQ_DEFAULT_MODEL, OPENAI_BASE_URL,
    OPENAI_DEFAULT_MODEL,
};

use super::{LlmProvider, ProviderError, ollama::OllamaProvider, openai::OpenAiCompatProvider};

/// Hosted providers that need an API key: (key, env var, base url, default model).
const HOSTED: [(&str, &str, &str, &str); 2] = [
    ("groq", "GROQ_API_KEY", GROQ_BASE_URL, GROQ_DEFAULT_MODEL),
    ("openai", "OPENAI_API_KEY", OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL),
];

pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn LlmProvider>>,
    // Known providers that could not be built for lack of a key, with the env var to set.
    missing: HashMap<String, String>,
}

impl ProviderRegistry {
    pub fn from_config(cfg: &Config) -> Result<Self, ProviderError> {
        Self::from_config_with_env(cfg, |name| std::env::var(name).ok())
    }

    /// Build from `cfg`, resolving fallback API keys through `env` instead of the process environment.
    pub fn from_config_with_env(
        cfg: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderError> {
        let mut registry = Self {
            providers: HashMap::new(),
            missing: HashMap::new(),
        };

        for (key, var, base, model) in HOSTED {
            let pc = match key {
                "groq" => cfg.groq.clone(),
                _ => cfg.openai.clone(),
            }
            .unwrap_or_default();
            registry.add_hosted(key, var, &pc, base, model, &env)?;
        }

        // Local Ollama needs no credential
        let oc = cfg.ollama.clone().unwrap_or_default();
        let p = OllamaProvider::new(oc.effective_base_url(), oc.effective_model())?;
        registry.insert("ollama", Box::new(p));

        Ok(registry)
    }

    fn add_hosted(
        &mut self,
        key: &str,
        env: &str,
        pc: &ApiProviderConfig,
        base: &str,
        model: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<(), ProviderError> {
        match pc.effective_api_key_with(env, lookup) {
            Some(api_key) => {
                let p = OpenAiCompatProvider::new(
                    key,
                    pc.effective_base_url(base),
                    api_key,
                    pc.effective_model(model),
                )?;
                self.insert(key, Box::new(p));
            }
            None => {
                tracing::debug!(provider = key, env, "no api key, provider unavailable");
                self.missing.insert(key.into(), env.into());
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, key: &str, provider: Box<dyn LlmProvider>) {
        self.missing.remove(key);
        self.providers.insert(key.into(), provider);
    }

    pub fn get(&self, key: &str) -> Result<&dyn LlmProvider, ProviderError> {
        if let Some(p) = self.providers.get(key) {
            return Ok(p.as_ref());
        }
        match self.missing.get(key) {
            Some(env) => Err(ProviderError::MissingCredential {
                provider: key.into(),
                env: env.clone(),
            }),
            None => Err(ProviderError::Config(format!("unknown provider: {key}"))),
        }
    }

    pub fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.providers.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Providers known but unusable until their credential is set.
    pub fn unavailable(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .missing
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort();
        out
    }
}
