//! Bridge Error Types
//!
//! One error enum for the whole crate, split along the recovery boundary the
//! dispatch loop cares about: sends that the caller may retry or drop, and
//! faults that tear the bridge down.

use thiserror::Error;
use types::{MailboxId, NodeId};

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main bridge error type
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No sender is currently bound for the peer. Recoverable; the message
    /// is dropped and the caller decides whether to retry once reconnected.
    #[error("no connection to {node}")]
    NoConnection { node: NodeId },

    /// The bound sender failed to transmit a frame.
    #[error("send of \"{description}\" failed: {source}")]
    SendFailed {
        description: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A first-link "register interest" frame could not be sent. The
    /// requester has no other signal that its subscription is dead, so this
    /// escalates to a bridge-wide fault.
    #[error("link registration for {remote} failed: {source}")]
    LinkRegistrationFailed {
        remote: MailboxId,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Raised on request through the diagnostic fault-injection event.
    #[error("fault injected on request")]
    FaultInjected,
}

impl BridgeError {
    /// Create a no-connection error
    pub fn no_connection(node: NodeId) -> Self {
        Self::NoConnection { node }
    }

    /// Create a send-failure error
    pub fn send_failed(
        description: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SendFailed {
            description: description.into(),
            source: source.into(),
        }
    }

    /// Create a link-registration fault wrapping the underlying send error
    pub fn link_registration_failed(remote: MailboxId, source: BridgeError) -> Self {
        Self::LinkRegistrationFailed {
            remote,
            source: Box::new(source),
        }
    }

    /// True for errors that terminate the dispatch loop rather than being
    /// returned to a caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LinkRegistrationFailed { .. } | Self::FaultInjected
        )
    }
}
