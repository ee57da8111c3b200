//! Event bindings correlating decoded nodes with guest handlers.
//!
//! The guest marks a node as interactive with a non-zero handler word; the
//! host never sees a function pointer. A binding therefore carries only
//! the node's stable identity, and dispatch goes back through the guest's
//! own invocation exports keyed by that identity. Bindings outlive the
//! decoded tree that produced them: the guest arena behind the tree is
//! reused on the next render, but identities are stable across renders.

use trellis_core::NodeId;

/// A click handler registered by the guest for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickBinding {
    /// Stable identity of the node that owns the handler.
    pub node: NodeId,
}

impl ClickBinding {
    /// Create a binding for the given node identity.
    #[must_use]
    pub const fn new(node: NodeId) -> Self {
        Self { node }
    }
}

/// A change handler registered by the guest for one text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeBinding {
    /// Stable identity of the node that owns the handler.
    pub node: NodeId,
}

impl ChangeBinding {
    /// Create a binding for the given node identity.
    #[must_use]
    pub const fn new(node: NodeId) -> Self {
        Self { node }
    }
}
