use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "agent-relay",
    about = "Stream, log, and render headless Codex sessions, and inspect their transcripts",
    version
)]
pub struct Cli {
    /// Config file. Default: .agent-relay/config.toml in the current directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a headless codex session and record it to a JSONL log.
    Run {
        /// Task for the agent.
        #[arg(long)]
        task: Option<String>,

        /// Instructions placed ahead of the task.
        #[arg(long)]
        instructions: Option<String>,

        /// JSON object of extra fields for the session's request event.
        #[arg(long, value_name = "JSON")]
        meta: Option<String>,

        /// Resume an existing codex thread.
        #[arg(long, value_name = "THREAD_ID")]
        resume: Option<String>,

        /// Directory to run the agent in.
        #[arg(long)]
        workspace: Option<PathBuf>,

        #[arg(long)]
        model: Option<String>,

        /// Reasoning effort (for example low, medium, high).
        #[arg(long)]
        reasoning: Option<String>,

        /// Extra arguments to pass through to codex (after --).
        #[arg(last = true)]
        codex_args: Vec<String>,
    },

    /// Inspect a recorded session.
    Transcript {
        #[command(subcommand)]
        view: TranscriptCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TranscriptCommand {
    /// Every event in the log.
    Show(TranscriptArgs),
    /// Todo items with their latest status.
    Todos(TranscriptArgs),
    /// Actions grouped by turn.
    Turns(TranscriptArgs),
    /// Token usage summed over all turns.
    Usage(TranscriptArgs),
}

#[derive(clap::Args, Debug)]
pub struct TranscriptArgs {
    #[arg(value_name = "SESSION_ID")]
    pub session_id: String,

    #[arg(long, default_value = "codex")]
    pub provider: String,
}
