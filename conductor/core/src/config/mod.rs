//! TOML Configuration File Support
//!
//! Centralized configuration loading for the whiteboard conductor, backed by
//! a TOML file at `~/.config/whiteboard/conductor.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the daemon through [`ConfigOverrides`])
//! 2. Environment variables (`WHITEBOARD_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! Turn budgets, max tokens and temperature are fixed per classification
//! bucket and cannot be configured; only model ids and endpoints can.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8787
//!
//! [backends.fast]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [backends.creative]
//! provider = "anthropic"
//! model = "claude-sonnet-4-20250514"
//!
//! [applier]
//! settle_delay_ms = 150
//!
//! [telemetry]
//! enabled = true
//! endpoint = "https://telemetry.example.com/api/public/ingestion"
//! api_key_env = "WHITEBOARD_TELEMETRY_KEY"
//!
//! [limits]
//! max_message_size = 8192
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendConfig, DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_OPENAI_BASE_URL};
use crate::board::DEFAULT_SETTLE_DELAY;
use crate::routing::profile::{CREATIVE_MODEL, FAST_MODEL};
use crate::security::DEFAULT_MAX_MESSAGE_SIZE;

/// Default listen address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8787;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Providers
// =============================================================================

/// Which adapter serves a backend slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible chat completions
    OpenAi,
    /// Anthropic Messages API
    Anthropic,
    /// Offline scripted backend
    Scripted,
}

impl Provider {
    fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_BASE_URL,
            Self::Anthropic => DEFAULT_ANTHROPIC_BASE_URL,
            Self::Scripted => "",
        }
    }

    fn default_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Scripted => "",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "scripted" | "offline" => Ok(Self::Scripted),
            other => Err(ConfigError::ValidationError(format!(
                "unknown provider '{other}' (expected openai, anthropic or scripted)"
            ))),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Address to listen on
    pub bind_address: Option<String>,

    /// Port to listen on
    pub port: Option<u16>,
}

/// One backend slot
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Adapter
    pub provider: Option<Provider>,

    /// API root
    pub base_url: Option<String>,

    /// Model id
    pub model: Option<String>,

    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
}

/// Backends section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsToml {
    /// Backend for simple commands
    pub fast: BackendToml,

    /// Backend for creative commands
    pub creative: BackendToml,
}

/// Applier section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplierToml {
    /// Wait between node creation and connector flush
    pub settle_delay_ms: Option<u64>,
}

/// Telemetry section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryToml {
    /// Export traces over HTTP
    pub enabled: Option<bool>,

    /// Ingest endpoint
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the ingest key
    pub api_key_env: Option<String>,
}

/// Limits section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsToml {
    /// Maximum command size in bytes
    pub max_message_size: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorToml {
    /// Server section
    pub server: ServerToml,

    /// Backends section
    pub backends: BackendsToml,

    /// Applier section
    pub applier: ApplierToml,

    /// Telemetry section
    pub telemetry: TelemetryToml,

    /// Limits section
    pub limits: LimitsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved settings for one backend slot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendSettings {
    /// Adapter
    pub provider: Provider,
    /// API root
    pub base_url: String,
    /// Model id
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl BackendSettings {
    fn new(provider: Provider, model: &str) -> Self {
        Self {
            provider,
            base_url: provider.default_base_url().to_string(),
            model: model.to_string(),
            api_key_env: provider.default_key_env().to_string(),
        }
    }

    fn switch_provider(&mut self, provider: Provider) {
        if provider != self.provider {
            self.base_url = provider.default_base_url().to_string();
            self.api_key_env = provider.default_key_env().to_string();
            self.provider = provider;
        }
    }

    fn apply_toml(&mut self, toml: &BackendToml) {
        if let Some(provider) = toml.provider {
            self.switch_provider(provider);
        }
        if let Some(ref base_url) = toml.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(ref model) = toml.model {
            self.model = model.clone();
        }
        if let Some(ref key_env) = toml.api_key_env {
            self.api_key_env = key_env.clone();
        }
    }

    /// Connection settings, reading the API key from the environment
    #[must_use]
    pub fn backend_config(&self) -> BackendConfig {
        let api_key = if self.api_key_env.is_empty() {
            None
        } else {
            std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
        };
        match self.provider {
            Provider::OpenAi => BackendConfig::OpenAi {
                base_url: self.base_url.clone(),
                api_key,
            },
            Provider::Anthropic => BackendConfig::Anthropic {
                base_url: self.base_url.clone(),
                api_key,
            },
            Provider::Scripted => BackendConfig::Scripted,
        }
    }
}

/// Centralized configuration for the conductor and daemon
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct WhiteboardConfig {
    /// Address to listen on
    pub bind_address: String,

    /// Port to listen on
    pub port: u16,

    /// Backend for simple commands
    pub fast: BackendSettings,

    /// Backend for creative commands
    pub creative: BackendSettings,

    /// Wait between node creation and connector flush
    pub settle_delay: Duration,

    /// Export traces over HTTP
    pub telemetry_enabled: bool,

    /// Ingest endpoint
    pub telemetry_endpoint: Option<String>,

    /// Environment variable holding the ingest key
    pub telemetry_key_env: String,

    /// Maximum command size in bytes
    pub max_message_size: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for WhiteboardConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            fast: BackendSettings::new(Provider::OpenAi, FAST_MODEL),
            creative: BackendSettings::new(Provider::Anthropic, CREATIVE_MODEL),
            settle_delay: DEFAULT_SETTLE_DELAY,
            telemetry_enabled: false,
            telemetry_endpoint: None,
            telemetry_key_env: "WHITEBOARD_TELEMETRY_KEY".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl WhiteboardConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Ingest key, read from the configured environment variable
    #[must_use]
    pub fn telemetry_key(&self) -> Option<String> {
        std::env::var(&self.telemetry_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_message_size must be greater than zero".to_string(),
            ));
        }
        if self.telemetry_enabled && self.telemetry_endpoint.is_none() {
            return Err(ConfigError::ValidationError(
                "telemetry is enabled but no endpoint is set".to_string(),
            ));
        }
        for (slot, settings) in [("fast", &self.fast), ("creative", &self.creative)] {
            if settings.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "backends.{slot}.model must not be empty"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/whiteboard/conductor.toml` or
/// `~/.config/whiteboard/conductor.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("whiteboard").join("conductor.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or an
/// environment variable holds an invalid value. A missing config file is not
/// an error (defaults are used).
pub fn load_config() -> Result<WhiteboardConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<WhiteboardConfig, ConfigError> {
    let mut config = WhiteboardConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ConductorToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config)?;
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut WhiteboardConfig, toml: &ConductorToml) {
    if let Some(ref address) = toml.server.bind_address {
        config.bind_address = address.clone();
    }
    if let Some(port) = toml.server.port {
        config.port = port;
    }

    config.fast.apply_toml(&toml.backends.fast);
    config.creative.apply_toml(&toml.backends.creative);

    if let Some(ms) = toml.applier.settle_delay_ms {
        config.settle_delay = Duration::from_millis(ms);
    }

    if let Some(enabled) = toml.telemetry.enabled {
        config.telemetry_enabled = enabled;
    }
    if toml.telemetry.endpoint.is_some() {
        config.telemetry_endpoint = toml.telemetry.endpoint.clone();
    }
    if let Some(ref key_env) = toml.telemetry.api_key_env {
        config.telemetry_key_env = key_env.clone();
    }

    if let Some(size) = toml.limits.max_message_size {
        config.max_message_size = size;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| {
            ConfigError::ValidationError(format!("{name} has an invalid value: {value}"))
        }),
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut WhiteboardConfig) -> Result<(), ConfigError> {
    let mut touched = false;

    if let Ok(address) = std::env::var("WHITEBOARD_BIND") {
        config.bind_address = address;
        touched = true;
    }
    if let Some(port) = env_parse::<u16>("WHITEBOARD_PORT")? {
        config.port = port;
        touched = true;
    }

    for (slot, settings) in [("FAST", &mut config.fast), ("CREATIVE", &mut config.creative)] {
        if let Ok(provider) = std::env::var(format!("WHITEBOARD_{slot}_PROVIDER")) {
            settings.switch_provider(provider.parse()?);
            touched = true;
        }
        if let Ok(base_url) = std::env::var(format!("WHITEBOARD_{slot}_BASE_URL")) {
            settings.base_url = base_url;
            touched = true;
        }
        if let Ok(model) = std::env::var(format!("WHITEBOARD_{slot}_MODEL")) {
            settings.model = model;
            touched = true;
        }
    }

    if let Some(ms) = env_parse::<u64>("WHITEBOARD_SETTLE_DELAY_MS")? {
        config.settle_delay = Duration::from_millis(ms);
        touched = true;
    }
    if let Ok(enabled) = std::env::var("WHITEBOARD_TELEMETRY") {
        config.telemetry_enabled = enabled != "0" && enabled.to_lowercase() != "false";
        touched = true;
    }
    if let Ok(endpoint) = std::env::var("WHITEBOARD_TELEMETRY_ENDPOINT") {
        config.telemetry_endpoint = Some(endpoint);
        touched = true;
    }
    if let Some(size) = env_parse::<usize>("WHITEBOARD_MAX_MESSAGE_SIZE")? {
        config.max_message_size = size;
        touched = true;
    }

    if touched {
        config.source = ConfigSource::Env;
    }
    Ok(())
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// CLI overrides, applied last
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Listen address
    pub bind_address: Option<String>,
    /// Listen port
    pub port: Option<u16>,
    /// Model id for the fast slot
    pub fast_model: Option<String>,
    /// Model id for the creative slot
    pub creative_model: Option<String>,
    /// Connector settle delay
    pub settle_delay_ms: Option<u64>,
    /// Use the scripted backend for both slots
    pub offline: bool,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the listen address
    #[must_use]
    pub fn with_bind_address(mut self, address: String) -> Self {
        self.bind_address = Some(address);
        self
    }

    /// Override the listen port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Override the fast model id
    #[must_use]
    pub fn with_fast_model(mut self, model: String) -> Self {
        self.fast_model = Some(model);
        self
    }

    /// Override the creative model id
    #[must_use]
    pub fn with_creative_model(mut self, model: String) -> Self {
        self.creative_model = Some(model);
        self
    }

    /// Override the connector settle delay
    #[must_use]
    pub fn with_settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = Some(ms);
        self
    }

    /// Run without calling any model
    #[must_use]
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut WhiteboardConfig) {
        let mut touched = false;
        if let Some(ref address) = self.bind_address {
            config.bind_address = address.clone();
            touched = true;
        }
        if let Some(port) = self.port {
            config.port = port;
            touched = true;
        }
        if let Some(ref model) = self.fast_model {
            config.fast.model = model.clone();
            touched = true;
        }
        if let Some(ref model) = self.creative_model {
            config.creative.model = model.clone();
            touched = true;
        }
        if let Some(ms) = self.settle_delay_ms {
            config.settle_delay = Duration::from_millis(ms);
            touched = true;
        }
        if self.offline {
            config.fast.switch_provider(Provider::Scripted);
            config.creative.switch_provider(Provider::Scripted);
            touched = true;
        }
        if touched {
            config.source = ConfigSource::Cli;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Held by every test that reads or writes `WHITEBOARD_*` variables
    static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

    /// Clean up all environment variables used by config loading.
    fn clear_config_env_vars() {
        for name in [
            "WHITEBOARD_BIND",
            "WHITEBOARD_PORT",
            "WHITEBOARD_FAST_PROVIDER",
            "WHITEBOARD_FAST_BASE_URL",
            "WHITEBOARD_FAST_MODEL",
            "WHITEBOARD_CREATIVE_PROVIDER",
            "WHITEBOARD_CREATIVE_BASE_URL",
            "WHITEBOARD_CREATIVE_MODEL",
            "WHITEBOARD_SETTLE_DELAY_MS",
            "WHITEBOARD_TELEMETRY",
            "WHITEBOARD_TELEMETRY_ENDPOINT",
            "WHITEBOARD_MAX_MESSAGE_SIZE",
        ] {
            std::env::remove_var(name);
        }
    }

    fn write_toml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = WhiteboardConfig::default();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.fast.provider, Provider::OpenAi);
        assert_eq!(config.fast.model, FAST_MODEL);
        assert_eq!(config.creative.provider, Provider::Anthropic);
        assert_eq!(config.creative.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.settle_delay, Duration::from_millis(150));
        assert!(!config.telemetry_enabled);
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.to_string_lossy().contains("whiteboard"));
            assert!(p.to_string_lossy().ends_with("conductor.toml"));
        }
    }

    // =========================================================================
    // TOML Parsing
    // =========================================================================

    #[test]
    fn test_parse_valid_toml() {
        let toml_config: ConductorToml = toml::from_str(
            r#"
[server]
port = 9000

[backends.fast]
provider = "anthropic"
model = "claude-3-5-haiku-latest"

[backends.creative]
base_url = "http://proxy.local"

[applier]
settle_delay_ms = 0

[telemetry]
enabled = true
endpoint = "http://ingest.local/batch"

[limits]
max_message_size = 4096
"#,
        )
        .unwrap();

        let mut config = WhiteboardConfig::default();
        apply_toml_config(&mut config, &toml_config);

        assert_eq!(config.port, 9000);
        assert_eq!(config.fast.provider, Provider::Anthropic);
        assert_eq!(config.fast.base_url, DEFAULT_ANTHROPIC_BASE_URL);
        assert_eq!(config.fast.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.fast.model, "claude-3-5-haiku-latest");
        assert_eq!(config.creative.base_url, "http://proxy.local");
        assert_eq!(config.settle_delay, Duration::ZERO);
        assert!(config.telemetry_enabled);
        assert_eq!(config.max_message_size, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_toml() {
        let toml_config: ConductorToml = toml::from_str("").unwrap();
        let mut config = WhiteboardConfig::default();
        apply_toml_config(&mut config, &toml_config);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.creative.model, CREATIVE_MODEL);
    }

    #[test]
    fn test_unknown_provider_in_toml_is_parse_error() {
        let result: Result<ConductorToml, _> =
            toml::from_str("[backends.fast]\nprovider = \"gemini\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // File Loading
    // =========================================================================

    #[test]
    fn test_missing_file_graceful() {
        let _env = ENV_LOCK.lock();
        clear_config_env_vars();
        let path = PathBuf::from("/nonexistent/whiteboard/conductor.toml");
        let config = load_config_from_path(Some(path)).unwrap();
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_toml_error() {
        let _env = ENV_LOCK.lock();
        let file = write_toml("[server\nport = ");
        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_telemetry_without_endpoint_fails_validation() {
        let mut config = WhiteboardConfig::default();
        config.telemetry_enabled = true;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    // =========================================================================
    // Priority Ordering
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let _env = ENV_LOCK.lock();
        clear_config_env_vars();
        let file = write_toml(
            "[server]\nport = 9000\n\n[backends.fast]\nmodel = \"file-model\"\n",
        );

        std::env::set_var("WHITEBOARD_FAST_MODEL", "env-model");
        let result = load_config_from_path(Some(file.path().to_path_buf()));
        clear_config_env_vars();
        let config = result.unwrap();

        assert_eq!(config.fast.model, "env-model");
        assert_eq!(config.port, 9000);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_file_applies_without_env() {
        let _env = ENV_LOCK.lock();
        clear_config_env_vars();
        let file = write_toml("[backends.fast]\nmodel = \"file-model\"\n");

        let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.fast.model, "file-model");
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = WhiteboardConfig::default();
        config.fast.model = "env-model".to_string();
        config.set_source(ConfigSource::Env);

        ConfigOverrides::new()
            .with_fast_model("cli-model".to_string())
            .with_settle_delay_ms(5)
            .apply(&mut config);

        assert_eq!(config.fast.model, "cli-model");
        assert_eq!(config.settle_delay, Duration::from_millis(5));
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_offline_override_switches_both_slots() {
        let mut config = WhiteboardConfig::default();
        ConfigOverrides::new().with_offline(true).apply(&mut config);
        assert_eq!(config.fast.backend_config(), BackendConfig::Scripted);
        assert_eq!(config.creative.backend_config(), BackendConfig::Scripted);
    }

    #[test]
    fn test_config_overrides_empty_no_change() {
        let mut config = WhiteboardConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("offline".parse::<Provider>().unwrap(), Provider::Scripted);
        assert!("gemini".parse::<Provider>().is_err());
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }
}
