use clap::{Args, Parser, Subcommand};
use memochat::Role;

#[derive(Parser, Debug)]
#[command(name = "memochat", author, version, about = "Chat with a hosted LLM, keeping trimmed per-session memory", long_about = None)]
pub struct Cli {
    /// Optional path to a config file (toml)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Defaults to `demo` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask about the built-in sample conversation and print the reply
    Demo(ChatOpts),
    /// Ask a single question
    Ask(AskArgs),
    /// Interactive multi-turn chat with in-memory sessions
    Chat(ChatArgs),
    /// Trim a JSON transcript offline and print the result
    Trim(TrimArgs),
    /// List models for a provider
    ListModels(ListModelsArgs),
    /// Show available providers
    Providers,
    /// Print the default config path
    ConfigPath,
    /// Create an example config file if missing
    InitConfig,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChatOpts {
    /// Provider key, e.g. groq, openai, ollama
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model name; if not given, provider default is used
    #[arg(short, long)]
    pub model: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Token budget for the history sent to the model
    #[arg(long, value_name = "TOKENS", allow_negative_numbers = true)]
    pub max_tokens: Option<i64>,

    /// System instruction placed ahead of the history
    #[arg(long)]
    pub system: Option<String>,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Prompt text (human message)
    #[arg(short = 'q', long)]
    pub prompt: String,

    #[command(flatten)]
    pub opts: ChatOpts,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Session to start in
    #[arg(long, default_value = memochat::demo::SESSION_ID)]
    pub session: String,

    /// Stream tokens as they arrive
    #[arg(long)]
    pub stream: bool,

    #[command(flatten)]
    pub opts: ChatOpts,
}

#[derive(Args, Debug)]
pub struct TrimArgs {
    /// JSON file: an array of {role, content} or {"messages": [...]}
    #[arg(short, long)]
    pub file: String,

    /// Token budget (defaults to the configured one)
    #[arg(long, value_name = "TOKENS", allow_negative_numbers = true)]
    pub max_tokens: Option<i64>,

    /// Shorten the boundary message instead of dropping it
    #[arg(long)]
    pub allow_partial: bool,

    /// Do not pin a leading system message
    #[arg(long)]
    pub no_system: bool,

    /// Role the kept suffix must start with after a cut
    #[arg(long, value_parser = clap::value_parser!(Role))]
    pub start_on: Option<Role>,
}

#[derive(Args, Debug)]
pub struct ListModelsArgs {
    /// Provider key, e.g. groq, openai, ollama
    #[arg(short, long, default_value = memochat::config::DEFAULT_PROVIDER)]
    pub provider: String,
}

/// A line typed at the interactive prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Exit,
    History,
    Sessions,
    Switch(&'a str),
    Say(&'a str),
    Unknown(&'a str),
}

impl<'a> ReplCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(cmd) = line.strip_prefix('/') else {
            return ReplCommand::Say(line);
        };
        let (name, arg) = cmd.split_once(char::is_whitespace).unwrap_or((cmd, ""));
        match (name, arg.trim()) {
            ("exit" | "quit", _) => ReplCommand::Exit,
            ("history", _) => ReplCommand::History,
            ("sessions", _) => ReplCommand::Sessions,
            ("switch", id) if !id.is_empty() => ReplCommand::Switch(id),
            _ => ReplCommand::Unknown(line),
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
