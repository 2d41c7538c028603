//! # Messaging
//!
//! Interface to the message bus. The transport, agent naming and
//! serialization live outside this crate; the tower only needs an
//! asynchronous `invoke` toward a named agent.

pub mod messages;

pub use messages::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of remote agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCategory {
    Platform,
    Mc,
}

impl fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Platform => write!(f, "Platform"),
            Self::Mc => write!(f, "MC"),
        }
    }
}

/// Failure reported by the remote side or the transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("unreachable: {0}")]
    Unreachable(String),
}

/// Outbound half of the message bus
#[async_trait]
pub trait TowerMessaging: Send + Sync {
    /// Send `message` to `target` and wait for its reply. Time limits are
    /// applied by the caller.
    async fn invoke(&self, target: &str, message: OutboundMessage) -> Result<Reply, RemoteError>;
}
