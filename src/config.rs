//! Layered configuration: file (`scopeward.toml`) → environment → CLI.
//! CLI flags always win, then environment variables, then the file,
//! then the hardcoded default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `[models]` — which command each agent role shells out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsSection {
    #[serde(default = "default_primary_cmd")]
    pub primary_cmd: String,
    #[serde(default)]
    pub summarizer_cmd: Option<String>,
    #[serde(default)]
    pub research_cmd: Option<String>,
    #[serde(default)]
    pub supervisor_cmd: Option<String>,
}

impl Default for ModelsSection {
    fn default() -> Self {
        Self {
            primary_cmd: default_primary_cmd(),
            summarizer_cmd: None,
            research_cmd: None,
            supervisor_cmd: None,
        }
    }
}

fn default_primary_cmd() -> String {
    "claude".to_string()
}

/// `[budgets]` — the knobs spec.md calls out as configurable: retry
/// ceiling, review cadence, and the hard iteration stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetsSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_review_interval")]
    pub review_interval: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for BudgetsSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            review_interval: default_review_interval(),
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_review_interval() -> u32 {
    5
}

fn default_max_iterations() -> u32 {
    500
}

/// `[paths]` — where supporting artifacts land relative to `repo_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    #[serde(default)]
    pub checkpoint_path: Option<PathBuf>,
    #[serde(default = "default_rag_root")]
    pub rag_root: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            checkpoint_path: None,
            rag_root: default_rag_root(),
        }
    }
}

fn default_rag_root() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsSection,
    #[serde(default)]
    pub budgets: BudgetsSection,
    #[serde(default)]
    pub paths: PathsSection,
}

impl Config {
    /// Parses a `scopeward.toml` string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse scopeward.toml")
    }

    /// Loads from `path`, or returns defaults if the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).with_context(|| format!("failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize scopeward.toml")?;
        std::fs::write(path, content).with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Applies environment-variable overrides. Env wins over file,
    /// loses to explicit CLI flags (applied afterwards by the caller).
    pub fn apply_env(mut self) -> Self {
        if let Ok(cmd) = std::env::var("SCOPEWARD_PRIMARY_CMD") {
            self.models.primary_cmd = cmd;
        }
        if let Ok(v) = std::env::var("SCOPEWARD_MAX_ATTEMPTS") {
            if let Ok(n) = v.parse() {
                self.budgets.max_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("SCOPEWARD_REVIEW_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.budgets.review_interval = n;
            }
        }
        if let Ok(v) = std::env::var("SCOPEWARD_MAX_ITERATIONS") {
            if let Ok(n) = v.parse() {
                self.budgets.max_iterations = n;
            }
        }
        self
    }

    /// Validates cross-field constraints the TOML schema alone can't express.
    pub fn validate(&self) -> Result<()> {
        if self.budgets.max_attempts == 0 {
            anyhow::bail!("budgets.max_attempts must be at least 1");
        }
        if self.budgets.review_interval == 0 {
            anyhow::bail!("budgets.review_interval must be at least 1");
        }
        if self.budgets.max_iterations == 0 {
            anyhow::bail!("budgets.max_iterations must be at least 1");
        }
        Ok(())
    }
}
