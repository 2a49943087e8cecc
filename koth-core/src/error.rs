//! Unified error handling for the agent
//!
//! Separates startup misconfiguration, which stops the process, from
//! per-request failures, which the HTTP layer turns into a 500 response.

use crate::command::CommandResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, warn};

pub type AgentResult<T> = Result<T, AgentError>;

/// Where an error originated and what an operator can do about it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Component where the error originated
    pub component: String,
    /// Operation being performed when the error occurred
    pub operation: Option<String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("TLS error: {message}")]
    Tls {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Failed to read owner file {}: {source}", path.display())]
    OwnerFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` failed with exit code {}", result.exit_code)]
    CommandFailed {
        command: String,
        result: CommandResult,
    },
}

impl AgentError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            AgentError::Config { context, .. } => Some(context),
            AgentError::Tls { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether the error should stop the process.
    ///
    /// Only startup misconfiguration qualifies; everything that can happen
    /// while serving a request is reported to the caller instead.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, AgentError::Config { .. } | AgentError::Tls { .. })
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let component = self.context().map(|c| c.component.as_str());
        match self {
            AgentError::Config { .. } | AgentError::Tls { .. } => {
                error!(component = ?component, error = %self, "Configuration error");
            }
            AgentError::CommandFailed { result, .. } => {
                warn!(
                    error = %self,
                    stderr = %result.stderr.trim_end(),
                    "Command did not succeed"
                );
            }
            _ => {
                error!(component = ?component, error = %self, "Error occurred");
            }
        }
    }
}

/// Create a configuration error for a component
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::AgentError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the command line flags and config file"),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::AgentError::Config {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the command line flags and config file"),
        }
    };
}
