//! Peer Wire Frames
//!
//! The closed set of frames two nodes exchange once a connection is up. The
//! transport layer owns framing and encode/decode; this enum is the shape it
//! decodes into before handing frames to the bridge.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use types::MailboxId;

/// One frame on the node-to-node connection.
///
/// The protocol is symmetric: both sides send and receive every variant.
/// `Ping`/`Pong` are keepalives answered inside the transport layer; the
/// bridge treats one that leaks through as an unexpected frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    /// Application payload addressed to a mailbox on the receiving node.
    Application { target: MailboxId, payload: Bytes },
    /// Ask the receiving node to report when `0` (one of its local
    /// mailboxes) terminates.
    NotifyOnTerminate(MailboxId),
    /// Cancel a previous [`WireMessage::NotifyOnTerminate`].
    RemoveNotifyOnTerminate(MailboxId),
    /// A mailbox the receiving node registered interest in has terminated.
    MailboxTerminated(MailboxId),
    /// Transport keepalive probe.
    Ping(u64),
    /// Transport keepalive answer.
    Pong(u64),
}

impl WireMessage {
    /// Short human label used in send-failure log lines.
    pub fn description(&self) -> &'static str {
        match self {
            WireMessage::Application { .. } => "normal message",
            WireMessage::NotifyOnTerminate(_) => "termination notification",
            WireMessage::RemoveNotifyOnTerminate(_) => "remove notify node",
            WireMessage::MailboxTerminated(_) => "mailbox terminated normally",
            WireMessage::Ping(_) => "ping",
            WireMessage::Pong(_) => "pong",
        }
    }
}
