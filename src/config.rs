use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_PATH: &str = ".agent-relay/config.toml";

pub const DEFAULT_MODEL: &str = "gpt-5.1-codex-max";

pub const ENV_SESSION_PATH: &str = "AGENT_RELAY_SESSION_PATH";
pub const ENV_WORKSPACE_PATH: &str = "AGENT_RELAY_WORKSPACE_PATH";
pub const ENV_MODEL: &str = "AGENT_RELAY_MODEL";

/// Relay configuration from `.agent-relay/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the per-provider session log directories.
    /// Defaults to `$HOME/.agent-relay/sessions`.
    #[serde(default)]
    pub sessions_path: Option<PathBuf>,
    /// Directory the agent runs in. Defaults to the current directory.
    #[serde(default)]
    pub workspace_path: Option<PathBuf>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Reasoning effort passed as `model_reasoning_effort`.
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub templates: Templates,
}

/// Prompt templates. `{TASK}` and `{INSTRUCTIONS}` are substituted verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Templates {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sessions_path: None,
            workspace_path: None,
            model: default_model(),
            reasoning: None,
            templates: Templates::default(),
        }
    }
}

impl Config {
    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(path) = non_empty(ENV_SESSION_PATH) {
            self.sessions_path = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty(ENV_WORKSPACE_PATH) {
            self.workspace_path = Some(PathBuf::from(path));
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.model = model;
        }
    }

    /// Resolve the sessions root directory. A leading `~` means `$HOME`.
    pub fn sessions_dir(&self) -> Result<PathBuf> {
        self.sessions_dir_in(std::env::var("HOME").ok().as_deref())
    }

    fn sessions_dir_in(&self, home: Option<&str>) -> Result<PathBuf> {
        let home = || {
            home.map(PathBuf::from).ok_or_else(|| {
                anyhow::anyhow!("HOME not set; set sessions_path or {ENV_SESSION_PATH}")
            })
        };
        match &self.sessions_path {
            Some(path) => match path.strip_prefix("~") {
                Ok(rest) => Ok(home()?.join(rest)),
                Err(_) => Ok(path.clone()),
            },
            None => Ok(home()?.join(".agent-relay").join("sessions")),
        }
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Load configuration from `.agent-relay/config.toml` under `base`.
///
/// Falls back to defaults if the file is missing.
pub fn load(base: &Path) -> Result<Config> {
    load_file(&base.join(CONFIG_PATH))
}

/// Load configuration from an explicit file path, defaulting if it is absent.
pub fn load_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}
