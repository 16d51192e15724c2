//! Bridge Event Taxonomy
//!
//! Everything the dispatch loop can dequeue, as one closed sum. Local
//! senders, the mailbox runtime and the transport's decode path all enqueue
//! into the same queue, which makes the loop the serialization point for all
//! bridge state.

use crate::wire::WireMessage;
use bytes::Bytes;
use std::fmt;
use types::{AddressId, MailboxId};

/// One-shot diagnostic observer.
///
/// Invoked with an event (or `None` before the first event has been seen);
/// returns `true` to stay installed, `false` to be uninstalled. A purely
/// test/diagnostic seam, never production logic.
pub type EventObserver = Box<dyn FnMut(Option<&BridgeEvent>) -> bool + Send + Sync>;

/// One event on the bridge's inbound queue.
pub enum BridgeEvent {
    /// Local sender wants `payload` delivered to a mailbox on the peer.
    Outgoing { target: MailboxId, payload: Bytes },
    /// Decoded frame received from the peer.
    Peer(WireMessage),
    /// `local` wants a termination notice when `remote` dies.
    Link { remote: MailboxId, local: MailboxId },
    /// `local` no longer cares about `remote`.
    Unlink { remote: MailboxId, local: MailboxId },
    /// A local address the bridge subscribed to has terminated.
    LocalTerminated(AddressId),
    /// Graceful shutdown sentinel; honored in queue order like any event.
    Stop,
    /// Diagnostic: raise an unrecoverable fault unconditionally.
    InjectFault,
    /// Diagnostic: terminate the currently bound sender.
    ForceDisconnect,
    /// Install (or clear) the pre-receive observer. The `Option` exists so
    /// the loop can take the observer out of the event in place.
    InstallPreObserver(Option<EventObserver>),
    /// Install (or clear) the post-receive observer.
    InstallPostObserver(Option<EventObserver>),
}

impl BridgeEvent {
    /// Short label for logs and observers.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeEvent::Outgoing { .. } => "outgoing",
            BridgeEvent::Peer(_) => "peer",
            BridgeEvent::Link { .. } => "link",
            BridgeEvent::Unlink { .. } => "unlink",
            BridgeEvent::LocalTerminated(_) => "local-terminated",
            BridgeEvent::Stop => "stop",
            BridgeEvent::InjectFault => "inject-fault",
            BridgeEvent::ForceDisconnect => "force-disconnect",
            BridgeEvent::InstallPreObserver(_) => "install-pre-observer",
            BridgeEvent::InstallPostObserver(_) => "install-post-observer",
        }
    }
}

// Manual impl: observers are opaque closures.
impl fmt::Debug for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeEvent::Outgoing { target, payload } => f
                .debug_struct("Outgoing")
                .field("target", target)
                .field("payload_len", &payload.len())
                .finish(),
            BridgeEvent::Peer(message) => f.debug_tuple("Peer").field(message).finish(),
            BridgeEvent::Link { remote, local } => f
                .debug_struct("Link")
                .field("remote", remote)
                .field("local", local)
                .finish(),
            BridgeEvent::Unlink { remote, local } => f
                .debug_struct("Unlink")
                .field("remote", remote)
                .field("local", local)
                .finish(),
            BridgeEvent::LocalTerminated(id) => {
                f.debug_tuple("LocalTerminated").field(id).finish()
            }
            other => f.write_str(other.kind()),
        }
    }
}
