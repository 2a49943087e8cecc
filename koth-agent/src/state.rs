//! Shared application state
//!
//! Handlers only read from it, so cloning per request is cheap and no
//! locking is involved.

use koth_core::{AgentConfig, CommandRunner};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    /// Configuration, fixed at startup
    pub config: Arc<AgentConfig>,
    /// Executes the owner and health-check commands
    pub runner: Arc<dyn CommandRunner>,
}

impl AppState {
    /// State with a shell runner honouring the configured timeout
    pub fn new(config: AgentConfig) -> Self {
        let runner = Arc::new(config.command_runner());
        Self::with_runner(config, runner)
    }

    /// State with a caller-supplied runner
    pub fn with_runner(config: AgentConfig, runner: Arc<dyn CommandRunner>) -> Self {
        info!(
            token_required = config.auth.token_required(),
            allowed_origins = config.auth.allowed_origins().len(),
            command_timeout = ?config.command_timeout,
            "Application state initialized"
        );

        Self {
            config: Arc::new(config),
            runner,
        }
    }
}
