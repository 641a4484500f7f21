use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::io::AsyncRead;

use crate::error::SessionError;

/// What to run and where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra environment variables on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    /// The full command line, program first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
}

impl From<std::process::ExitStatus> for ExitReport {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            success: status.success(),
        }
    }
}

pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// A running agent: its two output streams and a future for its exit.
pub struct Spawned {
    pub stdout: ByteStream,
    pub stderr: ByteStream,
    pub exit: BoxFuture<'static, io::Result<ExitReport>>,
}

/// Starts the agent process.
pub trait Launcher {
    fn spawn(&self, spec: &LaunchSpec) -> Result<Spawned, SessionError>;
}

/// Spawns real child processes with piped stdout/stderr.
///
/// The child is killed if the session drops it before it exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn spawn(&self, spec: &LaunchSpec) -> Result<Spawned, SessionError> {
        let spawn_error = |source| SessionError::Spawn {
            program: spec.program.clone(),
            source,
        };

        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(spawn_error)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(io::Error::other("stdout was not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error(io::Error::other("stderr was not piped")))?;

        Ok(Spawned {
            stdout: Box::pin(stdout),
            stderr: Box::pin(stderr),
            exit: async move { child.wait().await.map(ExitReport::from) }.boxed(),
        })
    }
}
