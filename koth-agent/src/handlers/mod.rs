//! HTTP request handlers for the agent

pub mod health;
pub mod status;
pub mod types;

pub use health::*;
pub use status::*;
pub use types::*;
