//! Bridge Configuration

use serde::{Deserialize, Serialize};
use types::NodeId;

/// Identity of one bridge instance: the node we run on and the peer this
/// bridge serves. Built by the node orchestration layer, immutable after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Our own node.
    pub local_node: NodeId,
    /// The remote peer this bridge maintains communication with.
    pub remote_node: NodeId,
}

impl BridgeConfig {
    pub fn new(local_node: NodeId, remote_node: NodeId) -> Self {
        Self {
            local_node,
            remote_node,
        }
    }
}
