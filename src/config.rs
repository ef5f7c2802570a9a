//! Agent configuration, persisted as TOML.
//!
//! Lookup order: an explicit path, then `$XDG_CONFIG_HOME/kg-agent/config.toml`
//! when it exists, then built-in defaults. `KG_AGENT_*` environment variables
//! are applied on top of whatever was loaded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::prompts::{default_examples, FewShotExample};
use crate::error::KgResult;
use crate::graph::{GraphSource, GraphStore, Prefixes};
use crate::paths::AgentPaths;

/// Errors from configuration loading.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(kg::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(kg::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(kg::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("API key not set: ${env}")]
    #[diagnostic(
        code(kg::config::missing_api_key),
        help("Export {env}, or switch to a local provider with `--provider ollama`.")
    )]
    MissingApiKey { env: String },

    #[error("invalid value for {key}: {message}")]
    #[diagnostic(code(kg::config::invalid_value))]
    InvalidValue { key: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which generative backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Ollama,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::InvalidValue {
                key: "llm.provider".into(),
                message: format!("unknown provider \"{other}\" (expected gemini or ollama)"),
            }),
        }
    }
}

impl Provider {
    /// Model used when none is configured.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::Ollama => "llama3.2",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => f.write_str("gemini"),
            Self::Ollama => f.write_str("ollama"),
        }
    }
}

/// `[llm]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: Provider,
    /// Empty in TOML means the provider's default model.
    #[serde(default)]
    pub model: String,
    /// Overrides the provider's default API root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Bound on every generator call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}

impl LlmConfig {
    /// Switch provider. A model left at the old provider's default follows
    /// to the new provider's default; an explicit model is kept.
    pub fn set_provider(&mut self, provider: Provider) {
        if self.model.is_empty() || self.model == self.provider.default_model() {
            self.model = provider.default_model().into();
        }
        self.provider = provider;
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: Provider::default().default_model().into(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// `[graph]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Ontology file (Turtle or N-Triples).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology: Option<PathBuf>,
    /// Data file loaded on top of the ontology.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PathBuf>,
    /// Single file holding both schema and data; used when `ontology` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined: Option<PathBuf>,
    /// Namespace bound to the empty prefix.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Where augmentation snapshots go; defaults to the XDG data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
    /// Extra `prefix = "namespace"` declarations.
    #[serde(default)]
    pub prefixes: BTreeMap<String, String>,
}

fn default_namespace() -> String {
    "http://example.org/ontology/".into()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            ontology: None,
            data: None,
            combined: None,
            namespace: default_namespace(),
            snapshot_dir: None,
            prefixes: BTreeMap::new(),
        }
    }
}

impl GraphConfig {
    /// The standard prefixes plus any configured extras.
    pub fn prefixes(&self) -> Prefixes {
        self.prefixes
            .iter()
            .fold(Prefixes::standard(&self.namespace), |acc, (prefix, ns)| {
                acc.with(prefix.as_str(), ns.as_str())
            })
    }

    /// Load the configured graph: `ontology` (+ `data`), else `combined`.
    pub fn open(&self) -> KgResult<GraphStore> {
        let store = match (&self.ontology, &self.combined) {
            (Some(ontology), _) => GraphStore::load(
                &GraphSource::file(ontology),
                self.data.as_ref().map(GraphSource::file).as_ref(),
                self.prefixes(),
            )?,
            (None, Some(combined)) => {
                GraphStore::load_combined(&GraphSource::file(combined), self.prefixes())?
            }
            (None, None) => {
                return Err(ConfigError::InvalidValue {
                    key: "graph.ontology".into(),
                    message: "no graph source configured (set --ontology or --graph)".into(),
                }
                .into());
            }
        };
        Ok(store)
    }
}

/// `[augmentation]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Local name prefix of the relations that mark a scope entity in a query.
    #[serde(default = "default_scope_relation_prefix")]
    pub scope_relation_prefix: String,
    /// Write a snapshot after every successful merge.
    #[serde(default = "default_true")]
    pub snapshots: bool,
}

fn default_true() -> bool {
    true
}
fn default_scope_relation_prefix() -> String {
    "hasRecommended".into()
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope_relation_prefix: default_scope_relation_prefix(),
            snapshots: true,
        }
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Full agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub augmentation: AugmentationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Few-shot translation examples.
    #[serde(default = "default_examples")]
    pub examples: Vec<FewShotExample>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            graph: GraphConfig::default(),
            augmentation: AugmentationConfig::default(),
            server: ServerConfig::default(),
            examples: default_examples(),
        }
    }
}

impl AgentConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Parse TOML text; `origin` names the source in errors.
    pub fn from_toml(content: &str, origin: &str) -> ConfigResult<Self> {
        let mut config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        if config.llm.model.is_empty() {
            config.llm.model = config.llm.provider.default_model().into();
        }
        Ok(config)
    }

    /// Resolve the config by lookup order, then apply environment overrides.
    pub fn resolve(explicit: Option<&Path>, paths: Option<&AgentPaths>) -> ConfigResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match paths.map(AgentPaths::config_file).filter(|p| p.is_file()) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "loading global config");
                    Self::load(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `KG_AGENT_*` overrides from `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        if let Some(provider) = lookup("KG_AGENT_PROVIDER") {
            self.llm.set_provider(provider.parse()?);
        }
        if let Some(model) = lookup("KG_AGENT_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("KG_AGENT_LLM_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(timeout) = lookup("KG_AGENT_LLM_TIMEOUT") {
            self.llm.timeout_secs = parse_value("KG_AGENT_LLM_TIMEOUT", &timeout)?;
        }
        if let Some(bind) = lookup("KG_AGENT_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("KG_AGENT_PORT") {
            self.server.port = parse_value("KG_AGENT_PORT", &port)?;
        }
        Ok(())
    }

    /// Snapshot directory: configured, else the XDG default.
    pub fn snapshot_dir(&self, paths: Option<&AgentPaths>) -> Option<PathBuf> {
        if !self.augmentation.snapshots {
            return None;
        }
        self.graph
            .snapshot_dir
            .clone()
            .or_else(|| paths.map(AgentPaths::snapshot_dir))
    }

    /// Create the XDG layout and write this config as the global config file.
    ///
    /// An existing file is kept unless `overwrite` is set. Returns the file
    /// path and whether it was written.
    pub fn install(&self, paths: &AgentPaths, overwrite: bool) -> KgResult<(PathBuf, bool)> {
        paths.ensure_dirs()?;
        let path = paths.config_file();
        if path.exists() && !overwrite {
            tracing::info!(path = %path.display(), "config already present, leaving it");
            return Ok((path, false));
        }
        self.save(&path)?;
        tracing::info!(path = %path.display(), "config written");
        Ok((path, true))
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
