//! Configuration types and loading for the service.

use std::path::Path;

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File, FileFormat};
use reqwest::Url;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::paths::expand_str_path;
use crate::teams::token::MAX_LIFETIME;
use crate::{AppPaths, env_prefix};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(
    title = "Application Configuration",
    description = "Main configuration for the teamsgate service"
)]
pub struct AppConfig {
    /// JSON Schema reference for editor support.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub schema: Option<String>,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// HTTP listener configuration.
    pub server: ServerConfig,

    /// Security service (token issuer) configuration.
    pub security: SecurityConfig,

    /// Microsoft Graph configuration.
    pub graph: GraphConfig,

    /// Token cache configuration.
    pub token: TokenConfig,
}

impl AppConfig {
    /// Load configuration from the discovered config file and environment.
    ///
    /// A missing config file is not an error; defaults and environment
    /// variables are used instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be parsed or the result is invalid.
    pub fn load(paths: &AppPaths) -> Result<Self> {
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// Environment variables use the `TEAMSGATE_` prefix and `__` between
    /// section and key, e.g. `TEAMSGATE_GRAPH__USER_UPN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// validation fails.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        let env_prefix = env_prefix();
        let built = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("token.safety_margin_secs", 30_i64)?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(env_prefix.as_str())
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut config: Self = built.try_deserialize()?;

        if let Some(ref file) = config.logging.file {
            let expanded = expand_str_path(file)?;
            config.logging.file = Some(expanded.display().to_string());
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that URLs parse and numeric settings are in range.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.security.token_url)
            .with_context(|| format!("invalid security.token_url: {}", self.security.token_url))?;
        Url::parse(&self.graph.base_url)
            .with_context(|| format!("invalid graph.base_url: {}", self.graph.base_url))?;

        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }
        if self.security.timeout == 0 {
            bail!("security.timeout must be at least 1 second");
        }
        if self.graph.timeout == 0 {
            bail!("graph.timeout must be at least 1 second");
        }
        if self.graph.user_upn.as_deref().is_some_and(|upn| upn.trim().is_empty()) {
            bail!("graph.user_upn must not be empty when set");
        }
        if self.token.safety_margin_secs >= MAX_LIFETIME.as_secs() {
            bail!(
                "token.safety_margin_secs must be below {} seconds",
                MAX_LIFETIME.as_secs()
            );
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Logging configuration")]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace). `RUST_LOG` takes precedence.
    #[schemars(default = "default_log_level")]
    pub level: LogLevel,

    /// Optional path for log file output. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Log level enumeration for schema validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors.
    Warn,
    /// Emit informational messages and above (default).
    #[default]
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

const fn default_log_level() -> LogLevel {
    LogLevel::Info
}

const DEFAULT_PORT: u16 = 5100;

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "HTTP listener configuration")]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,

    /// Port to listen on.
    #[schemars(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Security service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Security service that issues the Teams bearer token")]
pub struct SecurityConfig {
    /// Token issuance endpoint.
    pub token_url: String,

    /// Request timeout in seconds (default: 3).
    #[schemars(range(min = 1))]
    pub timeout: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            token_url: "http://security:5100/api/token".to_string(),
            timeout: 3,
        }
    }
}

/// Microsoft Graph configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Microsoft Graph API configuration")]
pub struct GraphConfig {
    /// Graph API base URL, without a trailing slash.
    pub base_url: String,

    /// User principal name of the service account. Chats are listed for this
    /// user and it is left out of member lists. Uses `/me` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_upn: Option<String>,

    /// Request timeout in seconds (default: 30).
    #[schemars(range(min = 1))]
    pub timeout: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com/v1.0".to_string(),
            user_upn: None,
            timeout: 30,
        }
    }
}

/// Token cache configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Bearer token cache configuration")]
pub struct TokenConfig {
    /// Seconds before expiry at which a cached token is no longer handed out.
    /// Larger values refresh earlier and call the security service more often;
    /// smaller values risk a token expiring while a Graph call is in flight.
    #[schemars(range(max = 86_399))]
    pub safety_margin_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            safety_margin_secs: 30,
        }
    }
}
