//! Agent configuration
//!
//! `AgentSettings` is the raw form read from flags, environment and an
//! optional TOML file. `AgentConfig` is the validated value the server runs
//! with; it is built once at startup and never changes afterwards.

use crate::auth::AuthConfig;
use crate::command::ShellCommandRunner;
use crate::error::{AgentError, AgentResult, ErrorContext};
use crate::owner::OwnerSource;
use crate::config_error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 31337;
pub const DEFAULT_OWNER_FILE: &str = "owner.txt";
pub const DEFAULT_HEALTH_COMMAND: &str = "true";
pub const DEFAULT_ORIGINS: &str = "0.0.0.0/0,::/0";

/// Raw settings, as written in a config file or passed on the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Host address to listen on
    pub host: String,
    /// Port number to listen on
    pub port: u16,
    /// Text file holding the current owner, used when `owner_cmd` is empty
    pub file: PathBuf,
    /// Command run for /healthcheck
    pub health_cmd: String,
    /// Command run for /status
    pub owner_cmd: String,
    /// Comma-separated CIDR ranges allowed to connect
    pub origin: String,
    /// Shared secret; empty disables token authentication
    pub apikey: String,
    /// TLS private key file
    pub keyfile: String,
    /// TLS certificate file
    pub certfile: String,
    /// TLS private key as an inline PEM string
    pub keystring: String,
    /// TLS certificate as an inline PEM string
    pub certstring: String,
    /// Upper bound on command run time; unbounded when absent
    pub command_timeout_secs: Option<u64>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            file: PathBuf::from(DEFAULT_OWNER_FILE),
            health_cmd: DEFAULT_HEALTH_COMMAND.to_string(),
            owner_cmd: String::new(),
            origin: DEFAULT_ORIGINS.to_string(),
            apikey: String::new(),
            keyfile: String::new(),
            certfile: String::new(),
            keystring: String::new(),
            certstring: String::new(),
            command_timeout_secs: None,
        }
    }
}

impl AgentSettings {
    /// Load settings from a TOML file; keys that are absent keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> AgentResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AgentError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        toml::from_str(&content).map_err(|e| AgentError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Defaults, or the given file when there is one
    pub fn load(path: Option<&Path>) -> AgentResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// How the listener is secured, decided once at startup
#[derive(Clone, PartialEq, Eq)]
pub enum TlsMode {
    Disabled,
    /// PEM key and certificate read from disk
    Files { key: PathBuf, cert: PathBuf },
    /// PEM key and certificate given directly
    Inline { key_pem: String, cert_pem: String },
}

/// PEM bytes ready to be handed to the TLS stack
pub struct TlsMaterial {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

impl TlsMode {
    /// Pick the TLS source. A complete file pair beats a complete inline
    /// pair; anything less than a complete pair is ignored.
    pub fn resolve(keyfile: &str, certfile: &str, keystring: &str, certstring: &str) -> Self {
        if !keyfile.is_empty() && !certfile.is_empty() {
            TlsMode::Files {
                key: PathBuf::from(keyfile),
                cert: PathBuf::from(certfile),
            }
        } else if !keystring.is_empty() && !certstring.is_empty() {
            TlsMode::Inline {
                key_pem: keystring.to_string(),
                cert_pem: certstring.to_string(),
            }
        } else {
            TlsMode::Disabled
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TlsMode::Disabled => "without encryption",
            TlsMode::Files { .. } => "with encryption certificates from filesystem",
            TlsMode::Inline { .. } => "with pinned encryption certificates",
        }
    }

    /// Read the PEM material; `None` when TLS is disabled
    pub fn load(&self) -> AgentResult<Option<TlsMaterial>> {
        match self {
            TlsMode::Disabled => Ok(None),
            TlsMode::Files { key, cert } => Ok(Some(TlsMaterial {
                cert_pem: read_pem(cert, "certificate")?,
                key_pem: read_pem(key, "private key")?,
            })),
            TlsMode::Inline { key_pem, cert_pem } => Ok(Some(TlsMaterial {
                cert_pem: cert_pem.as_bytes().to_vec(),
                key_pem: key_pem.as_bytes().to_vec(),
            })),
        }
    }
}

impl fmt::Debug for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsMode::Disabled => write!(f, "Disabled"),
            TlsMode::Files { key, cert } => f
                .debug_struct("Files")
                .field("key", key)
                .field("cert", cert)
                .finish(),
            TlsMode::Inline { .. } => f
                .debug_struct("Inline")
                .field("key_pem", &"<redacted>")
                .finish_non_exhaustive(),
        }
    }
}

fn read_pem(path: &Path, what: &str) -> AgentResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| AgentError::Tls {
        message: format!("Failed to read TLS {} {}: {}", what, path.display(), e),
        source: Some(Box::new(e)),
        context: ErrorContext::new("tls")
            .with_operation("read_file")
            .with_suggestion("Check --keyfile and --certfile"),
    })
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    pub owner: OwnerSource,
    pub health_command: String,
    pub auth: AuthConfig,
    pub tls: TlsMode,
    pub command_timeout: Option<Duration>,
}

impl AgentConfig {
    /// Validate raw settings.
    ///
    /// Fails on an invalid CIDR range, an empty health-check command or a
    /// zero timeout.
    pub fn from_settings(settings: &AgentSettings) -> AgentResult<Self> {
        if settings.health_cmd.trim().is_empty() {
            return Err(config_error!("health-check command must not be empty", "config"));
        }

        let command_timeout = match settings.command_timeout_secs {
            Some(0) => {
                return Err(config_error!("command timeout must be at least 1 second", "config"));
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        warn_on_partial_tls_pair("keyfile", &settings.keyfile, "certfile", &settings.certfile);
        warn_on_partial_tls_pair(
            "keystring",
            &settings.keystring,
            "certstring",
            &settings.certstring,
        );

        Ok(Self {
            host: settings.host.clone(),
            port: settings.port,
            owner: OwnerSource::resolve(&settings.owner_cmd, settings.file.clone()),
            health_command: settings.health_cmd.clone(),
            auth: AuthConfig::from_origin_list(settings.apikey.clone(), &settings.origin)?,
            tls: TlsMode::resolve(
                &settings.keyfile,
                &settings.certfile,
                &settings.keystring,
                &settings.certstring,
            ),
            command_timeout,
        })
    }

    /// Listen address
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Command runner honouring the configured timeout
    pub fn command_runner(&self) -> ShellCommandRunner {
        match self.command_timeout {
            Some(timeout) => ShellCommandRunner::new().with_timeout(timeout),
            None => ShellCommandRunner::new(),
        }
    }
}

fn warn_on_partial_tls_pair(first: &str, first_value: &str, second: &str, second_value: &str) {
    if first_value.is_empty() != second_value.is_empty() {
        warn!(
            "Only one of --{} and --{} was given; that pair is ignored",
            first, second
        );
    }
}
