mod cli;

use anyhow::{Context, Result};
use cli::{AskArgs, ChatArgs, ChatOpts, Cli, Commands, ReplCommand, TrimArgs};
use colored::*;
use memochat::config::Config;
use memochat::providers::registry::ProviderRegistry;
use memochat::{ApproxTokenCounter, ChatError, Conversation, Message, SessionStore, demo};
use serde::Deserialize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only replies; RUST_LOG=debug for detail
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Demo(ChatOpts::default())) {
        Commands::Demo(opts) => {
            let registry = ProviderRegistry::from_config(&cfg)?;
            let conv = build_conversation(&registry, &cfg, &opts)?;
            let reply = conv
                .invoke(&demo::history(), Message::human(demo::QUESTION))
                .await?;
            println!("{}", reply);
        }
        Commands::Ask(AskArgs { prompt, opts }) => {
            if prompt.trim().is_empty() {
                anyhow::bail!("prompt is required");
            }
            let registry = ProviderRegistry::from_config(&cfg)?;
            let conv = build_conversation(&registry, &cfg, &opts)?;
            // One-shot: no earlier turns to carry, so the prompt goes out alone
            let reply = conv.invoke(&[], Message::human(prompt)).await?;
            println!("{}", reply);
        }
        Commands::Chat(args) => {
            let registry = ProviderRegistry::from_config(&cfg)?;
            let conv = build_conversation(&registry, &cfg, &args.opts)?;
            repl(&conv, &args).await?;
        }
        Commands::Trim(args) => run_trim(&cfg, &args)?,
        Commands::ListModels(cmd) => {
            let registry = ProviderRegistry::from_config(&cfg)?;
            let provider = registry.get(&cmd.provider).map_err(ChatError::from)?;
            let models = provider.list_models().await.map_err(ChatError::from)?;
            for m in models {
                println!("{}", m);
            }
        }
        Commands::Providers => {
            let registry = ProviderRegistry::from_config(&cfg)?;
            println!("{}", "Available providers:".bold());
            for key in registry.list() {
                match registry.get(&key) {
                    Ok(p) => println!("- {} ({})", key, p.default_model()),
                    Err(_) => println!("- {}", key),
                }
            }
            for (key, env) in registry.unavailable() {
                println!("- {} {}", key, format!("(set {})", env).dimmed());
            }
        }
        Commands::ConfigPath => {
            println!("{}", Config::default_path()?.display());
        }
        Commands::InitConfig => {
            let path = Config::write_example_if_absent()?;
            println!("Wrote example config to {}", path.display());
        }
    }

    Ok(())
}

fn build_conversation<'a>(
    registry: &'a ProviderRegistry,
    cfg: &Config,
    opts: &ChatOpts,
) -> Result<Conversation<'a, ApproxTokenCounter>, ChatError> {
    let chat = cfg.chat();
    let key = opts
        .provider
        .clone()
        .unwrap_or_else(|| chat.effective_provider());
    let provider = registry.get(&key)?;

    let mut trim = cfg.trim_config();
    if let Some(max) = opts.max_tokens {
        trim.max_tokens = max;
    }
    // Reject a bad budget before any network traffic
    trim.budget()?;

    let model = opts
        .model
        .clone()
        .or(chat.model.clone())
        .unwrap_or_else(|| provider.default_model().to_string());
    let system = opts
        .system
        .clone()
        .unwrap_or_else(|| chat.effective_system_prompt());
    tracing::info!(provider = %key, model = %model, budget = trim.max_tokens, "conversation ready");

    Ok(Conversation::new(provider, trim, ApproxTokenCounter)
        .with_model(model)
        .with_system_prompt(system)
        .with_temperature(Some(opts.temperature.unwrap_or(chat.effective_temperature()))))
}

async fn repl(conv: &Conversation<'_, ApproxTokenCounter>, args: &ChatArgs) -> Result<()> {
    let mut store = SessionStore::new();
    let mut current = args.session.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!(
        "{}",
        "Type a message, or /history, /sessions, /switch <id>, /exit".dimmed()
    );

    loop {
        print!("{} ", format!("{}>", current).green().bold());
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match ReplCommand::parse(&line) {
            ReplCommand::Exit => break,
            ReplCommand::History => {
                for m in store.get_or_create(&current).iter() {
                    println!("{}: {}", m.role().to_string().cyan(), m.content());
                }
            }
            ReplCommand::Sessions => {
                for id in store.ids() {
                    let marker = if id == current { "*" } else { " " };
                    println!("{} {}", marker, id);
                }
            }
            ReplCommand::Switch(id) => current = id.to_string(),
            ReplCommand::Unknown(cmd) => eprintln!("{} {}", "unknown command:".yellow(), cmd),
            ReplCommand::Say("") => {}
            ReplCommand::Say(text) => {
                let outcome = if args.stream {
                    conv.send_stream(&mut store, &current, text, |delta| {
                        print!("{}", delta);
                        let _ = std::io::stdout().flush();
                    })
                    .await
                    .map(|_| println!())
                } else {
                    conv.send(&mut store, &current, text)
                        .await
                        .map(|reply| println!("{}", reply))
                };
                if let Err(e) = outcome {
                    tracing::error!(error = %e, "turn failed");
                    eprintln!("{} {}", "error:".red(), e);
                }
            }
        }
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Transcript {
    Bare(Vec<Message>),
    Wrapped { messages: Vec<Message> },
}

fn run_trim(cfg: &Config, args: &TrimArgs) -> Result<()> {
    let text =
        std::fs::read_to_string(&args.file).with_context(|| format!("reading {}", args.file))?;
    let messages = match serde_json::from_str::<Transcript>(&text)
        .with_context(|| format!("parsing transcript {}", args.file))?
    {
        Transcript::Bare(m) | Transcript::Wrapped { messages: m } => m,
    };

    let mut trim = cfg.trim_config();
    if let Some(max) = args.max_tokens {
        trim.max_tokens = max;
    }
    if args.no_system {
        trim.preserve_system = false;
    }
    if args.allow_partial {
        trim.allow_partial = true;
    }
    if args.start_on.is_some() {
        trim.start_on = args.start_on;
    }

    let trimmed = memochat::trim(&messages, &trim, &ApproxTokenCounter)?;
    tracing::info!(before = messages.len(), after = trimmed.len(), "trimmed transcript");
    println!("{}", serde_json::to_string_pretty(&trimmed)?);
    Ok(())
}
