use std::io::Write;
use std::path::PathBuf;

use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use super::enricher::Enricher;
use super::launcher::{ByteStream, LaunchSpec, Launcher, Spawned};
use super::log::SessionLog;
use super::pipeline::Pipeline;
use super::state::{SessionIdentity, SessionOutcome, SessionRequest};
use crate::config::{Config, Templates};
use crate::display::renderer::Renderer;
use crate::display::sanitize::StreamSanitizer;
use crate::error::SessionError;
use crate::protocol::parse::LineBuffer;

/// Provider name used for the session log directory.
pub const PROVIDER: &str = "codex";

/// The agent CLI that gets spawned.
pub const AGENT_PROGRAM: &str = "codex";

const READ_CHUNK: usize = 8 * 1024;

/// Everything about a session that does not come from the request.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub sessions_dir: PathBuf,
    pub provider: String,
    pub program: String,
    pub model: Option<String>,
    pub reasoning: Option<String>,
    pub workspace: PathBuf,
    pub templates: Templates,
    pub color: bool,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            sessions_dir: config.sessions_dir()?,
            provider: PROVIDER.to_string(),
            program: AGENT_PROGRAM.to_string(),
            model: Some(config.model.clone()),
            reasoning: config.reasoning.clone(),
            workspace: config.workspace_dir(),
            templates: config.templates.clone(),
            color: false,
        })
    }
}

/// Arguments for `codex exec`, in the order the CLI expects them.
///
/// Request values take precedence over the settings.
pub fn build_args(
    settings: &SessionSettings,
    request: &SessionRequest,
    prompt: Option<&str>,
) -> Vec<String> {
    let mut args = vec!["exec".to_string(), "--json".to_string()];

    let model =
        non_blank(request.model.as_deref()).or_else(|| non_blank(settings.model.as_deref()));
    if let Some(model) = model {
        args.push("--model".to_string());
        args.push(model.to_string());
    }

    let reasoning = non_blank(request.reasoning.as_deref())
        .or_else(|| non_blank(settings.reasoning.as_deref()));
    if let Some(reasoning) = reasoning {
        args.push("-c".to_string());
        args.push(format!("model_reasoning_effort={reasoning}"));
    }

    args.extend(request.extra_args.iter().cloned());

    if let Some(id) = non_blank(request.resume.as_deref()) {
        args.push("resume".to_string());
        args.push(id.to_string());
    }
    if let Some(prompt) = prompt {
        args.push(prompt.to_string());
    }
    args
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Run one headless agent session to completion.
///
/// Rendered output goes to `out`, the agent's sanitized stderr to `err`.
/// The log is renamed to the agent's thread id once the agent exits
/// successfully; on failure it stays under the placeholder id.
pub async fn run_session<L, W, E>(
    launcher: &L,
    settings: &SessionSettings,
    request: &SessionRequest,
    out: W,
    mut err: E,
) -> Result<SessionOutcome, SessionError>
where
    L: Launcher,
    W: Write,
    E: Write,
{
    let identity = SessionIdentity::new();
    let log = SessionLog::open(
        &settings.sessions_dir,
        &settings.provider,
        identity.placeholder(),
    )?;

    let enricher = Enricher::new(request, &settings.templates);
    let prompt = enricher.combined_prompt();
    let mut renderer = Renderer::with_writer(out);
    renderer.set_color(settings.color);
    let mut pipeline = Pipeline::new(enricher, log, renderer, identity);
    pipeline.begin()?;

    let workspace = request
        .workspace
        .clone()
        .unwrap_or_else(|| settings.workspace.clone());
    let spec = LaunchSpec {
        program: settings.program.clone(),
        args: build_args(settings, request, prompt.as_deref()),
        cwd: Some(workspace),
        env: Vec::new(),
    };
    info!(
        placeholder = pipeline.identity().placeholder(),
        log = %pipeline.log().path().display(),
        cwd = ?spec.cwd,
        "starting agent session"
    );

    let Spawned {
        mut stdout,
        mut stderr,
        exit,
    } = launcher.spawn(&spec)?;
    drain(&mut pipeline, &mut stdout, &mut stderr, &mut err).await?;
    drop((stdout, stderr));
    let report = exit.await.map_err(SessionError::Stream)?;

    let (identity, log, _) = pipeline.into_parts();
    if !report.success {
        let log_path = log.finalize(None);
        warn!(code = ?report.code, log = %log_path.display(), "agent exited unsuccessfully");
        return Err(SessionError::ProcessFailed {
            code: report.code,
            log_path,
        });
    }

    let log_path = log.finalize(identity.authoritative());
    let session_id = identity.best_id().to_string();
    info!(session_id = %session_id, log = %log_path.display(), "agent session finished");
    Ok(SessionOutcome {
        session_id,
        log_path,
        exit_code: report.code,
    })
}

/// Read both streams as data arrives until each has closed.
async fn drain<W: Write, E: Write>(
    pipeline: &mut Pipeline<W>,
    stdout: &mut ByteStream,
    stderr: &mut ByteStream,
    err: &mut E,
) -> Result<(), SessionError> {
    let mut out_lines = LineBuffer::new();
    let mut err_text = StreamSanitizer::new();
    let mut out_buf = vec![0u8; READ_CHUNK];
    let mut err_buf = vec![0u8; READ_CHUNK];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => {
                let n = read.map_err(SessionError::Stream)?;
                if n == 0 {
                    out_open = false;
                } else {
                    for line in out_lines.push(&out_buf[..n]) {
                        pipeline.handle_line(&line)?;
                    }
                }
            }
            read = stderr.read(&mut err_buf), if err_open => {
                let n = read.map_err(SessionError::Stream)?;
                if n == 0 {
                    err_open = false;
                } else {
                    forward_stderr(err, &err_text.push(&err_buf[..n]))?;
                }
            }
        }
    }

    if let Some(rest) = out_lines.finish() {
        pipeline.handle_line(&rest)?;
    }
    forward_stderr(err, &err_text.finish())
}

fn forward_stderr<E: Write>(err: &mut E, text: &str) -> Result<(), SessionError> {
    if text.is_empty() {
        return Ok(());
    }
    err.write_all(text.as_bytes())
        .and_then(|()| err.flush())
        .map_err(SessionError::Output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings() -> SessionSettings {
        SessionSettings {
            sessions_dir: PathBuf::from("/tmp/sessions"),
            provider: PROVIDER.to_string(),
            program: AGENT_PROGRAM.to_string(),
            model: Some("gpt-5.1-codex-max".to_string()),
            reasoning: None,
            workspace: PathBuf::from("."),
            templates: Templates::default(),
            color: false,
        }
    }

    #[test]
    fn args_for_fresh_session() {
        let args = build_args(&settings(), &SessionRequest::default(), Some("list files"));
        assert_eq!(
            args,
            vec!["exec", "--json", "--model", "gpt-5.1-codex-max", "list files"]
        );
    }

    #[test]
    fn args_for_resumed_session_with_overrides() {
        let request = SessionRequest {
            resume: Some("t1".to_string()),
            model: Some("gpt-5.1-codex-mini".to_string()),
            reasoning: Some("high".to_string()),
            extra_args: vec!["--skip-git-repo-check".to_string()],
            ..Default::default()
        };
        let args = build_args(&settings(), &request, Some("keep going"));
        assert_eq!(
            args,
            vec![
                "exec",
                "--json",
                "--model",
                "gpt-5.1-codex-mini",
                "-c",
                "model_reasoning_effort=high",
                "--skip-git-repo-check",
                "resume",
                "t1",
                "keep going",
            ]
        );
    }

    #[test]
    fn blank_values_are_omitted() {
        let mut s = settings();
        s.model = Some("  ".to_string());
        s.reasoning = Some(String::new());
        let request = SessionRequest {
            resume: Some(" ".to_string()),
            ..Default::default()
        };
        assert_eq!(build_args(&s, &request, None), vec!["exec", "--json"]);
    }

    #[test]
    fn settings_follow_config() {
        let config = Config {
            sessions_path: Some(PathBuf::from("/srv/sessions")),
            workspace_path: Some(PathBuf::from("/work")),
            reasoning: Some("low".to_string()),
            ..Default::default()
        };
        let s = SessionSettings::from_config(&config).unwrap();
        assert_eq!(s.sessions_dir, PathBuf::from("/srv/sessions"));
        assert_eq!(s.workspace, PathBuf::from("/work"));
        assert_eq!(s.provider, "codex");
        assert_eq!(s.reasoning.as_deref(), Some("low"));
    }
}
