//! KotH Agent server
//!
//! Binds the listener and serves the router, over TLS when configured.

use crate::{create_app, tls, AppState, WebError, WebResult};
use axum::serve;
use koth_core::{AgentConfig, AgentSettings};
use rustls::ServerConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Main agent server
pub struct AgentServer {
    state: AppState,
    tls_config: Option<Arc<ServerConfig>>,
}

impl AgentServer {
    /// Create a new server.
    ///
    /// TLS material is loaded here, so a bad key pair fails before anything
    /// is bound.
    pub fn new(config: AgentConfig) -> WebResult<Self> {
        Self::with_state(AppState::new(config))
    }

    /// Create a server around prepared state
    pub fn with_state(state: AppState) -> WebResult<Self> {
        let tls_config = tls::load_server_config(&state.config.tls)?;
        Ok(Self { state, tls_config })
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM
    pub async fn start(self) -> WebResult<()> {
        let address = self.state.config.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Listening on {}", address);
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> WebResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Running {}", self.state.config.tls.describe());
        let app = create_app(self.state);

        let result = match self.tls_config {
            Some(tls_config) => tls::serve_tls(listener, app, tls_config, shutdown).await,
            None => serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(WebError::Server),
        };

        if let Err(e) = &result {
            error!("Server error: {}", e);
        }
        result
    }

    /// Get server configuration
    pub fn config(&self) -> &AgentConfig {
        &self.state.config
    }

    pub fn is_tls(&self) -> bool {
        self.tls_config.is_some()
    }
}

/// Builder for AgentServer
pub struct AgentServerBuilder {
    settings: AgentSettings,
}

impl AgentServerBuilder {
    /// Create a new server builder with default settings
    pub fn new() -> Self {
        Self {
            settings: AgentSettings::default(),
        }
    }

    /// Replace all settings at once
    pub fn settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the server host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.settings.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.settings.port = port;
        self
    }

    /// Set the owner command; empty means the owner file is read instead
    pub fn owner_cmd<S: Into<String>>(mut self, command: S) -> Self {
        self.settings.owner_cmd = command.into();
        self
    }

    /// Set the owner file
    pub fn owner_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings.file = path.into();
        self
    }

    /// Set the health-check command
    pub fn health_cmd<S: Into<String>>(mut self, command: S) -> Self {
        self.settings.health_cmd = command.into();
        self
    }

    /// Set the allowed CIDR ranges, comma separated
    pub fn origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.settings.origin = origin.into();
        self
    }

    /// Set the shared-secret token
    pub fn apikey<S: Into<String>>(mut self, apikey: S) -> Self {
        self.settings.apikey = apikey.into();
        self
    }

    /// Serve TLS with a key and certificate given as PEM strings
    pub fn tls_inline<S: Into<String>>(mut self, key_pem: S, cert_pem: S) -> Self {
        self.settings.keystring = key_pem.into();
        self.settings.certstring = cert_pem.into();
        self
    }

    /// Serve TLS with a key and certificate read from disk
    pub fn tls_files<S: Into<String>>(mut self, keyfile: S, certfile: S) -> Self {
        self.settings.keyfile = keyfile.into();
        self.settings.certfile = certfile.into();
        self
    }

    /// Bound command run time
    pub fn command_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.command_timeout_secs = Some(secs);
        self
    }

    /// Build the server
    pub fn build(self) -> WebResult<AgentServer> {
        let config = AgentConfig::from_settings(&self.settings)?;
        AgentServer::new(config)
    }
}

impl Default for AgentServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use koth_core::{OwnerSource, TlsMode};

    #[test]
    fn test_server_builder() {
        let server = AgentServerBuilder::new()
            .host("127.0.0.1")
            .port(3000)
            .owner_cmd("hostname")
            .apikey("secret")
            .origin("10.0.0.0/8")
            .build()
            .unwrap();

        assert_eq!(server.config().address(), "127.0.0.1:3000");
        assert_eq!(
            server.config().owner,
            OwnerSource::Command("hostname".to_string())
        );
        assert!(server.config().auth.token_required());
        assert!(!server.is_tls());
    }

    #[test]
    fn test_builder_rejects_bad_origin() {
        let result = AgentServerBuilder::new().origin("nonsense").build();
        assert!(matches!(result, Err(WebError::Agent(ref e)) if e.is_startup_fatal()));
    }

    #[test]
    fn test_builder_with_inline_tls() {
        let server = AgentServerBuilder::new()
            .tls_inline(
                include_str!("../tests/fixtures/key.pem"),
                include_str!("../tests/fixtures/cert.pem"),
            )
            .build()
            .unwrap();
        assert!(server.is_tls());
        assert!(matches!(server.config().tls, TlsMode::Inline { .. }));
    }

    #[test]
    fn test_builder_rejects_bad_tls() {
        let result = AgentServerBuilder::new()
            .tls_inline("not a key", "not a cert")
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let server = AgentServerBuilder::new().port(0).build().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = server.serve(listener, async {}).await;
        assert!(result.is_ok());
    }
}
