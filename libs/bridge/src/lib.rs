//! Per-Node Remote Mailbox Bridge
//!
//! Connects the local mailbox runtime with mailboxes hosted on one remote
//! node, over a connection that may drop and be rebound many times. One
//! bridge instance exists per known peer; each runs a single dispatch loop
//! that is the only reader of its state.
//!
//! ```text
//! ┌──────────────────┐                       ┌─────────────────────┐
//! │  local senders   │── send / link ──┐     │   transport layer   │
//! └──────────────────┘                 │     │ (decode peer bytes) │
//! ┌──────────────────┐                 ▼     └──────────┬──────────┘
//! │ mailbox runtime  │── terminated ─► event queue ◄────┘
//! └──────────────────┘                 │
//!                                      ▼ (single consumer)
//!                            ┌──────────────────┐      ┌───────────────┐
//!                            │ dispatch loop    │─────►│ MessageSender │
//!                            │ + link table     │      │ (current conn)│
//!                            └────────┬─────────┘      └───────────────┘
//!                                     │
//!                                     ▼
//!                            MailboxRouter (local delivery)
//! ```
//!
//! The bridge maintains distributed link subscriptions: a local mailbox can
//! ask to be told when a remote mailbox dies, and peers can ask the same
//! about our local mailboxes. Subscription bookkeeping lives entirely inside
//! the dispatch loop, so no locking is needed for it; the only genuinely
//! shared state is the current connection, held by [`ConnectionGuard`].
//!
//! Out of scope here: wire framing, dialing/TLS, and the decision of when to
//! replace a connection. The bridge only reacts to being handed a live
//! [`MessageSender`] or told that one is gone.

pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod links;
pub mod router;
pub mod testing;
pub mod wire;

pub use bridge::{BridgeHandle, RemoteMailboxBridge};
pub use config::BridgeConfig;
pub use connection::{ConnectionGuard, MessageSender};
pub use error::{BridgeError, Result};
pub use events::{BridgeEvent, EventObserver};
pub use links::LinkTable;
pub use router::{Address, MailboxRouter};
pub use wire::WireMessage;
