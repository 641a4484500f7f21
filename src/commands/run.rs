use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::session::launcher::Launcher;
use crate::session::runner::{SessionSettings, run_session};
use crate::session::state::{SessionOutcome, SessionRequest};

pub struct RunConfig {
    pub task: Option<String>,
    pub instructions: Option<String>,
    /// Raw JSON object merged into the `thread.request` event.
    pub meta: Option<String>,
    pub resume: Option<String>,
    pub workspace: Option<PathBuf>,
    pub model: Option<String>,
    pub reasoning: Option<String>,
    pub extra_args: Vec<String>,
}

impl RunConfig {
    fn into_request(self) -> Result<SessionRequest> {
        let metadata = match self.meta.as_deref() {
            Some(raw) => SessionRequest::parse_metadata(raw).context("invalid --meta")?,
            None => serde_json::Map::new(),
        };
        Ok(SessionRequest {
            instructions: self.instructions,
            task: self.task,
            metadata,
            resume: self.resume,
            workspace: self.workspace,
            model: self.model,
            reasoning: self.reasoning,
            extra_args: self.extra_args,
        })
    }
}

/// Run one headless session and print where its log ended up.
pub async fn run<L: Launcher, W: Write, E: Write>(
    config: RunConfig,
    settings: &SessionSettings,
    launcher: &L,
    mut writer: W,
    err: E,
) -> Result<SessionOutcome> {
    let request = config.into_request()?;
    let outcome = run_session(launcher, settings, &request, &mut writer, err)
        .await
        .context("codex session failed")?;

    writeln!(writer)?;
    writeln!(writer, "Codex session completed.")?;
    writeln!(writer, "Session ID: {}", outcome.session_id)?;
    writeln!(writer, "JSON log file: {}", outcome.log_path.display())?;
    match outcome.exit_code {
        Some(code) => writeln!(writer, "Exit code: {code}")?,
        None => writeln!(writer, "Exit code: none")?,
    }
    writer.flush()?;
    Ok(outcome)
}
