//! KotH Core - authorization, command execution and configuration
//!
//! Everything the agent decides about a request lives here; the HTTP crate
//! only wires these pieces to routes.

pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod owner;

pub use auth::*;
pub use command::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use owner::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use ipnet::IpNet;
