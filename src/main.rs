// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chorus::chat::run_chat_turn;
use chorus::client::{GenerationConfig, RelayClient};
use chorus::compare::{LaneStatus, run_compare_turn, synthesis};
use chorus::config::CONFIG;
use chorus::provider::MODELS;
use chorus::session::SessionStore;

#[derive(Parser)]
#[command(
    name = "chorus",
    version,
    about = "Side-by-side LLM chat: streaming relay, fan-out comparison, synthesis"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Send one message to a single model through the relay
    Chat {
        message: String,
        #[arg(short, long, default_value = "gpt-4o")]
        model: String,
        /// Continue an existing session instead of starting a new one
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        system_prompt: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Broadcast one message to several models and show every lane
    Compare {
        message: String,
        /// Comma-separated model ids; defaults to the whole catalog
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,
        #[arg(long)]
        session: Option<String>,
        /// Follow the comparison with a streamed synthesis pass
        #[arg(long)]
        synthesize: bool,
        #[arg(long)]
        system_prompt: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Inspect the local session log
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// List the selectable models
    Models,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List saved sessions, most recently updated first
    List,
    /// Delete one session by id
    Delete { id: String },
}

fn generation_config(
    system_prompt: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
) -> GenerationConfig {
    let mut config = GenerationConfig::default();
    if let Some(prompt) = system_prompt {
        config.system_prompt = prompt;
    }
    if let Some(temperature) = temperature {
        config.temperature = temperature;
    }
    if let Some(max_tokens) = max_tokens {
        config.max_tokens = max_tokens;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(CONFIG.log_level.clone())),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| CONFIG.host.clone());
            let port = port.unwrap_or(CONFIG.port);
            chorus::server::run(&host, port).await
        }

        Command::Chat {
            message,
            model,
            session,
            system_prompt,
            temperature,
            max_tokens,
        } => {
            let relay = RelayClient::from_config();
            let store = SessionStore::from_config();
            let config = generation_config(system_prompt, temperature, max_tokens);

            let outcome = run_chat_turn(
                &relay,
                &store,
                session.as_deref(),
                &model,
                &message,
                &config,
                |delta| {
                    print!("{}", delta);
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                },
            )
            .await?;

            println!();
            if outcome.failed {
                println!("(turn failed; saved with placeholder reply)");
            }
            println!("session: {}", outcome.session_id);
            Ok(())
        }

        Command::Compare {
            message,
            models,
            session,
            synthesize,
            system_prompt,
            temperature,
            max_tokens,
        } => {
            let relay = RelayClient::from_config();
            let store = SessionStore::from_config();
            let config = generation_config(system_prompt, temperature, max_tokens);

            let models = if models.is_empty() {
                MODELS.iter().map(|m| m.id.to_string()).collect()
            } else {
                models
            };

            let outcome = run_compare_turn(
                &relay,
                &store,
                session.as_deref(),
                &models,
                &message,
                &config,
                |_, lane| {
                    if lane.status == LaneStatus::Failed {
                        eprintln!("[{}] failed", lane.model);
                    }
                },
            )
            .await?;

            for lane in &outcome.lanes {
                println!("── {} ──", lane.model);
                println!(
                    "{}\n",
                    lane.final_content(chorus::compare::LANE_FAILURE_PLACEHOLDER)
                );
            }
            println!("session: {}", outcome.session_id);

            if synthesize {
                println!("\n── synthesis ({}) ──", CONFIG.synthesis_model);
                synthesis::run_synthesis(&relay, &outcome.latest_replies(), |delta| {
                    print!("{}", delta);
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                })
                .await?;
                println!();
            }
            Ok(())
        }

        Command::Sessions { action } => {
            let store = SessionStore::from_config();
            match action {
                SessionsAction::List => {
                    let summaries = store.list_summaries()?;
                    if summaries.is_empty() {
                        println!("no saved sessions");
                    }
                    for summary in summaries {
                        println!("{}  {}  ({})", summary.id, summary.title, summary.relative_age);
                    }
                }
                SessionsAction::Delete { id } => {
                    if store.delete(&id)? {
                        println!("deleted {}", id);
                    } else {
                        println!("no session with id {}", id);
                    }
                }
            }
            Ok(())
        }

        Command::Models => {
            for model in MODELS {
                println!("{:<28} {:<18} {}", model.id, model.display_name, model.provider.display_name());
            }
            Ok(())
        }
    }
}
