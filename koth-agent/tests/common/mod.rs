//! Common test utilities for the agent's HTTP tests
//!
//! Spawns a real server on an ephemeral port and wraps a client pointed at it.

#![allow(dead_code)]

use koth_agent::AgentServerBuilder;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;
use tokio::net::TcpListener;

static INIT: Once = Once::new();

pub const CERT_PEM: &str = include_str!("../fixtures/cert.pem");
pub const KEY_PEM: &str = include_str!("../fixtures/key.pem");

/// Initialize logging for tests
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("koth_agent=debug,koth_core=debug,info")
            .with_test_writer()
            .try_init();
    });
}

/// Running agent plus a client for it
pub struct TestApp {
    pub address: SocketAddr,
    pub base_url: String,
    pub client: Client,
}

impl TestApp {
    /// Serve the agent built by `builder` over plain HTTP
    pub async fn spawn(builder: AgentServerBuilder) -> Self {
        Self::spawn_with_scheme(builder, "http", Client::new()).await
    }

    /// Serve the agent over TLS with the fixture certificate
    pub async fn spawn_tls(builder: AgentServerBuilder) -> Self {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to create HTTP client");
        Self::spawn_with_scheme(builder.tls_inline(KEY_PEM, CERT_PEM), "https", client).await
    }

    async fn spawn_with_scheme(builder: AgentServerBuilder, scheme: &str, client: Client) -> Self {
        init_logging();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let address = listener.local_addr().expect("Listener has no address");

        let server = builder.build().expect("Failed to build server");
        tokio::spawn(async move {
            let _ = server.serve(listener, std::future::pending()).await;
        });

        // Bound before spawning, so requests queue until the server accepts.
        Self {
            address,
            base_url: format!("{}://{}", scheme, address),
            client,
        }
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .timeout(Duration::from_secs(10))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .timeout(Duration::from_secs(10))
    }
}

/// Split a response into its status code and JSON body
pub async fn status_and_json(response: Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let body = response.json().await.expect("Response is not JSON");
    (status, body)
}
