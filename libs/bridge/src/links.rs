//! Link Table
//!
//! Per-peer bookkeeping of distributed link subscriptions: for each remote
//! mailbox some local process is watching, the set of local mailboxes that
//! want its termination notice.
//!
//! Owned and mutated exclusively by the dispatch loop; single-owner access
//! is the synchronization. The invariant is that an entry exists iff at
//! least one watcher does: an empty set is never left behind, it is removed
//! in the same dispatch step that tells the peer to drop the registration.

use std::collections::{HashMap, HashSet};
use types::MailboxId;

/// Outcome of recording a link request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The watcher was already registered; the request is a no-op.
    AlreadyLinked,
    /// Added to an existing entry; the peer already knows about our
    /// interest in this remote mailbox.
    Added,
    /// First watcher ever for this remote mailbox; the peer must be sent a
    /// register-interest frame.
    FirstForRemote,
}

/// Outcome of removing a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOutcome {
    /// No such registration existed.
    NotLinked,
    /// Removed, other watchers remain.
    Removed,
    /// Removed the last watcher; the entry is gone and the peer must be
    /// sent an unregister frame.
    LastRemoved,
}

#[derive(Debug, Default)]
pub struct LinkTable {
    links: HashMap<MailboxId, HashSet<MailboxId>>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `local` wants a termination notice for `remote`.
    pub fn link(&mut self, remote: MailboxId, local: MailboxId) -> LinkOutcome {
        let watchers = self.links.entry(remote).or_default();
        if !watchers.insert(local) {
            return LinkOutcome::AlreadyLinked;
        }
        if watchers.len() == 1 {
            LinkOutcome::FirstForRemote
        } else {
            LinkOutcome::Added
        }
    }

    /// Remove `local`'s registration for `remote`, deleting the entry when
    /// it becomes empty.
    pub fn unlink(&mut self, remote: MailboxId, local: MailboxId) -> UnlinkOutcome {
        let Some(watchers) = self.links.get_mut(&remote) else {
            return UnlinkOutcome::NotLinked;
        };
        if !watchers.remove(&local) {
            return UnlinkOutcome::NotLinked;
        }
        if watchers.is_empty() {
            self.links.remove(&remote);
            UnlinkOutcome::LastRemoved
        } else {
            UnlinkOutcome::Removed
        }
    }

    /// Remove and return every watcher of `remote`, if any are registered.
    pub fn take_watchers(&mut self, remote: MailboxId) -> Option<HashSet<MailboxId>> {
        self.links.remove(&remote)
    }

    /// Drop the entry for `remote` without reporting watchers. Used to back
    /// out a registration whose peer-side half failed.
    pub fn forget(&mut self, remote: MailboxId) {
        self.links.remove(&remote);
    }

    /// Remove and return the entire table content.
    pub fn drain(&mut self) -> Vec<(MailboxId, HashSet<MailboxId>)> {
        self.links.drain().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Number of remote mailboxes currently tracked.
    pub fn tracked_remotes(&self) -> usize {
        self.links.len()
    }

    #[cfg(test)]
    pub(crate) fn watchers(&self, remote: MailboxId) -> Option<&HashSet<MailboxId>> {
        self.links.get(&remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::NodeId;

    fn remote(serial: u64) -> MailboxId {
        MailboxId::new(NodeId::new(2), serial)
    }

    fn local(serial: u64) -> MailboxId {
        MailboxId::new(NodeId::new(1), serial)
    }

    #[test]
    fn first_link_is_flagged_once() {
        let mut table = LinkTable::new();

        assert_eq!(table.link(remote(1), local(1)), LinkOutcome::FirstForRemote);
        assert_eq!(table.link(remote(1), local(2)), LinkOutcome::Added);
        assert_eq!(table.link(remote(1), local(1)), LinkOutcome::AlreadyLinked);
        assert_eq!(table.watchers(remote(1)).unwrap().len(), 2);
    }

    #[test]
    fn unlink_drains_to_empty() {
        let mut table = LinkTable::new();
        table.link(remote(1), local(1));
        table.link(remote(1), local(2));

        assert_eq!(table.unlink(remote(1), local(1)), UnlinkOutcome::Removed);
        assert_eq!(table.unlink(remote(1), local(2)), UnlinkOutcome::LastRemoved);
        assert!(table.is_empty());

        // Gone means gone; further unlinks are no-ops.
        assert_eq!(table.unlink(remote(1), local(2)), UnlinkOutcome::NotLinked);
    }

    #[test]
    fn unlink_of_unknown_watcher_is_a_noop() {
        let mut table = LinkTable::new();
        table.link(remote(1), local(1));

        assert_eq!(table.unlink(remote(1), local(9)), UnlinkOutcome::NotLinked);
        assert_eq!(table.unlink(remote(9), local(1)), UnlinkOutcome::NotLinked);
        assert_eq!(table.tracked_remotes(), 1);
    }

    #[test]
    fn take_watchers_removes_the_entry() {
        let mut table = LinkTable::new();
        table.link(remote(1), local(1));
        table.link(remote(1), local(2));

        let watchers = table.take_watchers(remote(1)).unwrap();
        assert_eq!(watchers.len(), 2);
        assert!(table.is_empty());
        assert!(table.take_watchers(remote(1)).is_none());
    }

    #[test]
    fn forget_discards_without_reporting() {
        let mut table = LinkTable::new();
        table.link(remote(1), local(1));
        table.forget(remote(1));
        assert!(table.is_empty());

        // Relinking afterwards is a fresh first link.
        assert_eq!(table.link(remote(1), local(1)), LinkOutcome::FirstForRemote);
    }
}
