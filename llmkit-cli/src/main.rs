use anyhow::Context;
use clap::{Parser, Subcommand};
use llmkit::{ChatRequest, ConfigManager, LlmConfig, Message, ProviderBuilder, ProviderKind};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "llmkit", version, about = "Send prompts to OpenAI, Gemini or Claude")]
struct Cli {
    /// Config file (default: ~/.llmkit/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single prompt and print the reply
    Ask {
        prompt: String,

        /// Provider to use (openai, gemini, claude); overrides the config
        #[arg(short, long)]
        provider: Option<String>,

        /// Model ID; defaults to the provider's default_model
        #[arg(short, long)]
        model: Option<String>,

        /// System message sent before the prompt (OpenAI-style providers only)
        #[arg(long)]
        system: Option<String>,

        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(long)]
        top_p: Option<f64>,

        /// Stop sequence (repeatable)
        #[arg(long)]
        stop: Vec<String>,

        /// Ask for a JSON object reply
        #[arg(long)]
        json: bool,

        /// Print the response as JSON, raw vendor payload included
        #[arg(long)]
        full: bool,
    },

    /// Print the resolved configuration with API keys masked
    Config,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<LlmConfig> {
    let manager = match path {
        Some(p) => ConfigManager::new(p),
        None => ConfigManager::default_path(),
    };
    tracing::debug!(path = %manager.path().display(), "Loading config");
    let mut config = manager.load()?;
    config.apply_env();
    Ok(config)
}

/// Gemini and Claude reject a `system` role inside the message list, so the
/// flag is refused up front instead of failing after every retry.
fn prompt_messages(
    kind: ProviderKind,
    system: Option<String>,
    prompt: String,
) -> anyhow::Result<Vec<Message>> {
    let mut messages = Vec::new();
    if let Some(sys) = system {
        if kind != ProviderKind::OpenAi {
            anyhow::bail!("--system is only supported by the openai provider, not {}", kind);
        }
        messages.push(Message::system(sys));
    }
    messages.push(Message::user(prompt));
    Ok(messages)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llmkit=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config)?;

    match cli.command {
        Commands::Ask {
            prompt,
            provider,
            model,
            system,
            temperature,
            max_tokens,
            top_p,
            stop,
            json,
            full,
        } => {
            if let Some(name) = provider {
                config.default_provider = name;
            }
            let kind = config.selected_kind();
            let settings = config.settings(kind).clone();

            let model = model
                .or_else(|| settings.default_model.clone())
                .with_context(|| {
                    format!("No model given; pass --model or set {}.default_model", kind)
                })?;

            let messages = prompt_messages(kind, system, prompt)?;
            let mut request = ChatRequest::new(model, messages)
                .with_json_mode(json)
                .with_full_response(full);
            request.temperature = temperature;
            request.max_tokens = max_tokens;
            request.top_p = top_p;
            if !stop.is_empty() {
                request.stop = Some(stop);
            }
            settings.apply_defaults(&mut request);

            tracing::debug!(provider = %kind, model = %request.model, "Sending prompt");
            let provider = ProviderBuilder::new(config).build()?;
            let response = provider.generate_response(&request).await?;

            if full {
                let out = serde_json::json!({
                    "content": response.content(),
                    "model": response.model(),
                    "usage": response.usage(),
                    "raw_response": response.raw_response(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", response.into_content());
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmkit::Role;

    #[test]
    fn system_flag_prepends_system_message_for_openai() {
        let messages =
            prompt_messages(ProviderKind::OpenAi, Some("be brief".into()), "hi".into()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], Message::user("hi"));
    }

    #[test]
    fn system_flag_is_refused_for_gemini_and_claude() {
        for kind in [ProviderKind::Gemini, ProviderKind::Claude] {
            let err = prompt_messages(kind, Some("be brief".into()), "hi".into()).unwrap_err();
            assert!(err.to_string().contains("--system"));
        }
        let messages = prompt_messages(ProviderKind::Claude, None, "hi".into()).unwrap();
        assert_eq!(messages, vec![Message::user("hi")]);
    }

    #[test]
    fn cli_parses_ask_flags() {
        let cli = Cli::try_parse_from([
            "llmkit", "ask", "hello", "-p", "claude", "--stop", "a", "--stop", "b", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Ask { prompt, provider, stop, json, full, .. } => {
                assert_eq!(prompt, "hello");
                assert_eq!(provider.as_deref(), Some("claude"));
                assert_eq!(stop, vec!["a", "b"]);
                assert!(json);
                assert!(!full);
            }
            Commands::Config => panic!("expected ask"),
        }
    }
}
