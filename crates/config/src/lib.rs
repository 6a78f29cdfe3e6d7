//! Configuration loading, validation, and management for forgeloop.
//!
//! Loads configuration from `~/.forgeloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use forgeloop_core::ProviderFamily;
use serde::{Deserialize, Serialize};

/// Provider names the router knows a default endpoint for.
pub const WELL_KNOWN_PROVIDERS: &[&str] = &[
    "anthropic",
    "openai",
    "openrouter",
    "ollama",
    "deepseek",
    "groq",
    "together",
    "vllm",
];

/// The root configuration structure.
///
/// Maps directly to `~/.forgeloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key used when a provider has none of its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// System prompt of the top-level agent
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Workspace the tools operate in
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Sub-agent roles reachable through delegation
    #[serde(default = "default_roles")]
    pub roles: BTreeMap<String, RoleConfig>,

    /// Set when `api_key` came from `FORGELOOP_API_KEY`, which outranks
    /// every per-provider key.
    #[serde(skip)]
    api_key_from_env: bool,
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_system_prompt() -> String {
    concat!(
        "You are forgeloop, an engineering agent working inside a project workspace.\n",
        "Use the tools to inspect and change files. Create a project before writing into it.\n",
        "Delegate focused sub-tasks to specialist roles with delegate_task when that helps.\n",
        "When the work is finished, answer with a short summary and no tool calls.",
    )
    .into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("workspace", &self.workspace)
            .field("providers", &self.providers)
            .field("roles", &self.roles)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("family", &self.family)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Provider calls allowed per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Tools executed sequentially before the rest of a turn
    #[serde(default = "default_priority_tools")]
    pub priority_tools: Vec<String>,

    /// Cap on concurrently running non-priority calls (unbounded when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Replaces the built-in step-budget answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_budget_message: Option<String>,

    /// How many levels of sub-agents may be spawned below the top-level agent
    #[serde(default = "default_max_delegation_depth")]
    pub max_delegation_depth: u32,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_priority_tools() -> Vec<String> {
    vec!["create_project".into()]
}
fn default_max_delegation_depth() -> u32 {
    2
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            priority_tools: default_priority_tools(),
            max_concurrency: None,
            step_budget_message: None,
            max_delegation_depth: default_max_delegation_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace root; `~/.forgeloop/workspace` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_command_timeout() -> u64 {
    60
}

impl WorkspaceConfig {
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(AppConfig::workspace_dir)
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            command_timeout_secs: default_command_timeout(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Wire-format family; inferred from the provider name when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<ProviderFamily>,
}

/// Resolve the wire family for a provider name.
pub fn family_for(name: &str, configured: Option<ProviderFamily>) -> ProviderFamily {
    configured.unwrap_or(if name == "anthropic" {
        ProviderFamily::BlockContent
    } else {
        ProviderFamily::FunctionCall
    })
}

/// A sub-agent role: its prompt, its tools, and optionally its own provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Shown to the delegating model
    pub description: String,

    pub system_prompt: String,

    /// Names of the tools this role may use
    pub tools: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Whether this role may delegate further
    #[serde(default)]
    pub can_delegate: bool,
}

fn default_roles() -> BTreeMap<String, RoleConfig> {
    let mut roles = BTreeMap::new();
    roles.insert(
        "coder".into(),
        RoleConfig {
            description: "Implements a focused change in the workspace and reports what it did".into(),
            system_prompt: concat!(
                "You are a coding sub-agent. Complete the task you are given using the tools.\n",
                "Finish with a concise report of the files you changed.",
            )
            .into(),
            tools: vec![
                "create_project".into(),
                "create_file".into(),
                "read_file".into(),
                "list_files".into(),
                "run_command".into(),
            ],
            provider: None,
            model: None,
            max_iterations: default_max_iterations(),
            can_delegate: false,
        },
    );
    roles.insert(
        "reviewer".into(),
        RoleConfig {
            description: "Reads the workspace and reviews it; never modifies files".into(),
            system_prompt: concat!(
                "You are a code reviewer. You can only read files.\n",
                "Report concrete problems with file and line references, most severe first.",
            )
            .into(),
            tools: vec!["read_file".into(), "list_files".into()],
            provider: None,
            model: None,
            max_iterations: default_max_iterations(),
            can_delegate: false,
        },
    );
    roles
}

impl AppConfig {
    /// Load configuration from the default path (~/.forgeloop/config.toml).
    ///
    /// Also checks environment variables, which beat the file:
    /// - `FORGELOOP_API_KEY` (global key, highest priority)
    /// - `<PROVIDER>_API_KEY` for every referenced provider (e.g. `ANTHROPIC_API_KEY`)
    /// - then `providers.<name>.api_key`, then the file's top-level `api_key`
    /// - `FORGELOOP_PROVIDER`, `FORGELOOP_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("FORGELOOP_API_KEY") {
            self.api_key = Some(key);
            self.api_key_from_env = true;
        }
        if let Some(provider) = lookup("FORGELOOP_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("FORGELOOP_MODEL") {
            self.default_model = model;
        }

        for name in self.referenced_providers() {
            if let Some(key) = lookup(&env_key_name(&name)) {
                self.providers.entry(name).or_default().api_key = Some(key);
            }
        }
    }

    /// Every provider name the config points at.
    pub fn referenced_providers(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.providers.keys().cloned().collect();
        names.insert(self.default_provider.clone());
        names.extend(self.roles.values().filter_map(|r| r.provider.clone()));
        names
    }

    /// The API key for `provider`. `FORGELOOP_API_KEY` wins, then the
    /// provider's own key, then the top-level one from the file.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        if self.api_key_from_env && self.api_key.is_some() {
            return self.api_key.clone();
        }
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// The model to use with `provider` when nothing more specific is set.
    pub fn model_for(&self, provider: &str) -> String {
        self.providers
            .get(provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".forgeloop")
    }

    /// Get the default workspace directory path.
    pub fn workspace_dir() -> PathBuf {
        Self::config_dir().join("workspace")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.max_concurrency == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.max_concurrency must be at least 1 when set".into(),
            ));
        }

        for (name, role) in &self.roles {
            if role.tools.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "role '{name}' has no tools"
                )));
            }
            if role.max_iterations == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "role '{name}' must allow at least 1 iteration"
                )));
            }
            if let Some(provider) = &role.provider
                && !self.is_known_provider(provider)
            {
                return Err(ConfigError::ValidationError(format!(
                    "role '{name}' uses unknown provider '{provider}'"
                )));
            }
        }

        Ok(())
    }

    fn is_known_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
            || self.default_provider == name
            || WELL_KNOWN_PROVIDERS.contains(&name)
    }

    /// Check if an API key is available for the default provider.
    pub fn has_api_key(&self) -> bool {
        self.api_key_for(&self.default_provider).is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
            agent: AgentSettings::default(),
            workspace: WorkspaceConfig::default(),
            providers: BTreeMap::new(),
            roles: default_roles(),
            api_key_from_env: false,
        }
    }
}

/// Environment variable holding the key for `provider` (`groq` → `GROQ_API_KEY`).
pub fn env_key_name(provider: &str) -> String {
    let upper: String = provider
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{upper}_API_KEY")
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for forgeloop_core::Error {
    fn from(err: ConfigError) -> Self {
        forgeloop_core::Error::Config {
            message: err.to_string(),
        }
    }
}
