//! Local Delivery Surface
//!
//! The bridge never touches mailbox internals; it delivers through this
//! capability, implemented by the mailbox runtime. Termination watching goes
//! through the same surface: the bridge registers its own [`Address`] as the
//! watcher, and the runtime answers by delivering a termination notice back
//! into the bridge's queue when the watched mailbox dies.

use bytes::Bytes;
use types::{AddressId, MailboxId};

/// Delivery handle for a local mailbox.
///
/// A thin value; the resolution layer interprets it. The bridge only ever
/// constructs addresses for ids it was handed, plus its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    id: AddressId,
}

impl Address {
    pub fn mailbox(id: MailboxId) -> Self {
        Self {
            id: AddressId::Mailbox(id),
        }
    }

    pub fn registry(name: impl Into<String>) -> Self {
        Self {
            id: AddressId::Registry(name.into()),
        }
    }

    pub fn id(&self) -> &AddressId {
        &self.id
    }
}

/// What the mailbox runtime does on the bridge's behalf.
///
/// All operations are non-blocking enqueues into runtime-owned queues;
/// unknown targets are the runtime's problem (dead-lettering, logging),
/// never the bridge's.
pub trait MailboxRouter: Send + Sync {
    /// Deliver an application payload to a local mailbox.
    fn deliver(&self, target: MailboxId, payload: Bytes);

    /// Deliver a termination notice for `terminated` to `target`.
    fn deliver_termination(&self, target: MailboxId, terminated: MailboxId);

    /// Arrange for `watcher` to receive a termination notice when the local
    /// mailbox `target` dies.
    fn watch_termination(&self, target: MailboxId, watcher: Address);

    /// Cancel a previous [`MailboxRouter::watch_termination`].
    fn unwatch_termination(&self, target: MailboxId, watcher: &Address);
}
