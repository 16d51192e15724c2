//! Identifier types for the cluster messaging runtime.
//!
//! Pure value types only: no I/O, no async, no behavior beyond formatting
//! and conversion. Every other crate in the workspace builds on these.

pub mod identifiers;

pub use identifiers::{AddressId, MailboxId, NodeId};
