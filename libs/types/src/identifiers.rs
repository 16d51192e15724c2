//! Node, mailbox and address identifiers.
//!
//! A `MailboxId` is globally unique: it embeds the `NodeId` of the node the
//! mailbox lives on plus a per-node serial. This is what lets the remote
//! bridge route a bare id back to its owning node without a lookup table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one peer process in the cluster.
///
/// Assigned by the cluster configuration; immutable for the life of a node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Identifies a single mailbox, local or remote.
///
/// Opaque to everything except the node that owns it; comparable and
/// hashable so it can key link tables and registries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MailboxId {
    node: NodeId,
    serial: u64,
}

impl MailboxId {
    pub const fn new(node: NodeId, serial: u64) -> Self {
        Self { node, serial }
    }

    /// The node this mailbox lives on.
    pub const fn node(&self) -> NodeId {
        self.node
    }

    pub const fn serial(&self) -> u64 {
        self.serial
    }

    /// True if the mailbox is hosted on `node`.
    pub fn is_on(&self, node: NodeId) -> bool {
        self.node == node
    }
}

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mailbox-{}.{}", self.node.raw(), self.serial)
    }
}

/// Identifier carried by termination notices.
///
/// Most notices name a real mailbox, but the runtime also hands out
/// registry-name addresses whose termination the bridge cannot report to a
/// peer; those are matched and dropped at the point of use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressId {
    /// A concrete local or remote mailbox.
    Mailbox(MailboxId),
    /// A name registered in the node-local registry.
    Registry(String),
}

impl AddressId {
    /// The underlying mailbox id, if this address names a real mailbox.
    pub fn mailbox(&self) -> Option<MailboxId> {
        match self {
            AddressId::Mailbox(id) => Some(*id),
            AddressId::Registry(_) => None,
        }
    }
}

impl From<MailboxId> for AddressId {
    fn from(id: MailboxId) -> Self {
        AddressId::Mailbox(id)
    }
}

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressId::Mailbox(id) => write!(f, "{id}"),
            AddressId::Registry(name) => write!(f, "registry:{name}"),
        }
    }
}
