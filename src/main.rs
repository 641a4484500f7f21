mod cli;

use std::io::IsTerminal;
use std::path::Path;

use agent_relay::commands;
use agent_relay::commands::transcript::TranscriptView;
use agent_relay::config::{self, Config};
use agent_relay::session::launcher::ProcessLauncher;
use agent_relay::session::runner::SessionSettings;
use agent_relay::transcript::service::TranscriptService;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, TranscriptCommand};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            task,
            instructions,
            meta,
            resume,
            workspace,
            model,
            reasoning,
            codex_args,
        } => {
            let mut settings = SessionSettings::from_config(&config)?;
            settings.color = std::io::stdout().is_terminal();
            commands::run::run(
                commands::run::RunConfig {
                    task,
                    instructions,
                    meta,
                    resume,
                    workspace,
                    model,
                    reasoning,
                    extra_args: codex_args,
                },
                &settings,
                &ProcessLauncher,
                std::io::stdout(),
                std::io::stderr(),
            )
            .await?;
        }
        Command::Transcript { view } => {
            let (view, args) = match view {
                TranscriptCommand::Show(args) => (TranscriptView::Events, args),
                TranscriptCommand::Todos(args) => (TranscriptView::Todos, args),
                TranscriptCommand::Turns(args) => (TranscriptView::Turns, args),
                TranscriptCommand::Usage(args) => (TranscriptView::Usage, args),
            };
            let service = TranscriptService::new(config.sessions_dir()?);
            commands::transcript::transcript(
                &service,
                view,
                &args.provider,
                &args.session_id,
                std::io::stdout(),
            )?;
        }
    }

    Ok(())
}

/// Diagnostics go to stderr; stdout carries rendered session output only.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => config::load_file(path)?,
        None => config::load(&std::env::current_dir()?)?,
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}
