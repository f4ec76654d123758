use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::providers::Role;
use crate::trim::{TrimConfig, TrimStrategy};

pub const DEFAULT_PROVIDER: &str = "groq";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer all questions accurately.";
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_MAX_TOKENS: i64 = 45;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_DEFAULT_MODEL: &str = "gemma2-9b-it";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.1";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub groq: Option<ApiProviderConfig>,
    pub openai: Option<ApiProviderConfig>,
    pub ollama: Option<OllamaConfig>,
    pub chat: Option<ChatConfig>,
    pub trim: Option<TrimSettings>,
}

/// Settings shared by the OpenAI-compatible hosted providers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OllamaConfig {
    pub base_url: Option<String>,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrimSettings {
    pub max_tokens: Option<i64>,
    pub strategy: Option<TrimStrategy>,
    pub preserve_system: Option<bool>,
    pub allow_partial: Option<bool>,
    pub start_on: Option<Role>,
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load_from(Path::new(p));
        }
        let default = Self::default_path()?;
        if default.exists() {
            Self::load_from(&default)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        parse(&text).with_context(|| "parsing config")
    }

    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| anyhow!("cannot resolve config dir"))?;
        Ok(base.join("memochat").join("config.toml"))
    }

    pub fn write_example_if_absent() -> Result<PathBuf> {
        let path = Self::default_path()?;
        write_example_at(&path)?;
        Ok(path)
    }

    pub fn chat(&self) -> ChatConfig {
        self.chat.clone().unwrap_or_default()
    }

    pub fn trim_config(&self) -> TrimConfig {
        self.trim.clone().unwrap_or_default().to_trim_config()
    }
}

const EXAMPLE: &str = r#"# memochat config (TOML)

[groq]
# api_key can be omitted to use env var GROQ_API_KEY
api_key = ""
base_url = "https://api.groq.com/openai/v1"
default_model = "gemma2-9b-it"

[openai]
# api_key can be omitted to use env var OPENAI_API_KEY
# base_url = "https://api.openai.com/v1"
# default_model = "gpt-4o-mini"

[ollama]
base_url = "http://localhost:11434"
default_model = "llama3.1"

[chat]
provider = "groq"
temperature = 1.0
system_prompt = "You are a helpful assistant. Answer all questions accurately."

[trim]
max_tokens = 45
strategy = "last"
preserve_system = true
allow_partial = false
start_on = "human"
"#;

fn write_example_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, EXAMPLE).with_context(|| format!("writing config at {}", path.display()))?;
    Ok(())
}

fn parse(text: &str) -> Result<Config> {
    toml::from_str(text).map_err(|e| anyhow!(e))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

impl ApiProviderConfig {
    /// Config key wins over the environment; an empty string counts as unset.
    pub fn effective_api_key(&self, env: &str) -> Option<String> {
        self.effective_api_key_with(env, |name| std::env::var(name).ok())
    }
    /// Like `effective_api_key`, with the environment lookup supplied by the caller.
    pub fn effective_api_key_with(
        &self,
        env: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        non_empty(&self.api_key).or_else(|| lookup(env).filter(|v| !v.is_empty()))
    }
    pub fn effective_base_url(&self, fallback: &str) -> String {
        non_empty(&self.base_url).unwrap_or_else(|| fallback.into())
    }
    pub fn effective_model(&self, fallback: &str) -> String {
        non_empty(&self.default_model).unwrap_or_else(|| fallback.into())
    }
}

impl OllamaConfig {
    pub fn effective_base_url(&self) -> String {
        non_empty(&self.base_url).unwrap_or_else(|| OLLAMA_BASE_URL.into())
    }
    pub fn effective_model(&self) -> String {
        non_empty(&self.default_model).unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.into())
    }
}

impl ChatConfig {
    pub fn effective_provider(&self) -> String {
        non_empty(&self.provider).unwrap_or_else(|| DEFAULT_PROVIDER.into())
    }
    pub fn effective_temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
    pub fn effective_system_prompt(&self) -> String {
        non_empty(&self.system_prompt).unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.into())
    }
}

impl TrimSettings {
    pub fn to_trim_config(&self) -> TrimConfig {
        TrimConfig {
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            strategy: self.strategy.unwrap_or_default(),
            preserve_system: self.preserve_system.unwrap_or(true),
            allow_partial: self.allow_partial.unwrap_or(false),
            start_on: self.start_on.or(Some(Role::Human)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_script_defaults() {
        let cfg = parse("").unwrap();
        let trim = cfg.trim_config();
        assert_eq!(trim.max_tokens, 45);
        assert!(trim.preserve_system);
        assert!(!trim.allow_partial);
        assert_eq!(trim.start_on, Some(Role::Human));
        let chat = cfg.chat();
        assert_eq!(chat.effective_provider(), "groq");
        assert_eq!(chat.effective_temperature(), 1.0);
        assert_eq!(chat.effective_system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn example_config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_example_at(&path).unwrap();
        let cfg = Config::load_from(&path).unwrap();
        let groq = cfg.groq.clone().unwrap();
        assert_eq!(groq.effective_model(GROQ_DEFAULT_MODEL), "gemma2-9b-it");
        assert_eq!(groq.effective_base_url("x"), GROQ_BASE_URL);
        assert_eq!(cfg.trim_config().strategy, TrimStrategy::Last);
    }

    #[test]
    fn example_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[trim]\nmax_tokens = 7\n").unwrap();
        write_example_at(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().trim_config().max_tokens, 7);
    }

    #[test]
    fn empty_api_key_falls_through_to_env_lookup() {
        let pc = ApiProviderConfig {
            api_key: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(pc.effective_api_key("MEMOCHAT_TEST_UNSET_VAR"), None);
        let pc = ApiProviderConfig {
            api_key: Some("k".into()),
            ..Default::default()
        };
        assert_eq!(pc.effective_api_key("MEMOCHAT_TEST_UNSET_VAR").as_deref(), Some("k"));
    }

    #[test]
    fn api_key_lookup_is_injectable() {
        let pc = ApiProviderConfig::default();
        let env = |name: &str| (name == "GROQ_API_KEY").then(|| "gsk-env".to_string());
        assert_eq!(pc.effective_api_key_with("GROQ_API_KEY", env).as_deref(), Some("gsk-env"));
        assert_eq!(pc.effective_api_key_with("OPENAI_API_KEY", env), None);
        assert_eq!(pc.effective_api_key_with("GROQ_API_KEY", |_| Some(String::new())), None);
    }

    #[test]
    fn trim_settings_parse_roles_and_negative_budgets() {
        let cfg = parse("[trim]\nmax_tokens = -3\nstart_on = \"ai\"\nallow_partial = true\n").unwrap();
        let trim = cfg.trim_config();
        assert_eq!(trim.max_tokens, -3);
        assert_eq!(trim.start_on, Some(Role::Ai));
        assert!(trim.allow_partial);
    }
}
