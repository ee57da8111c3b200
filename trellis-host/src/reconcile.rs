//! Mount/patch lifecycle over a pluggable render backend.
//!
//! Diffing and patching host-native widgets is an external collaborator's
//! job behind [`RenderBackend`]. The reconciler's own obligation is the
//! shape of its input: it always hands the backend a complete tree in
//! deterministic, guest order, tagged with one stable [`InstanceId`], so
//! the backend can match nodes by (position, kind, identity) and keep
//! host-native state (focus, scroll, partially typed text) alive across
//! renders.

use crate::decode::UiNode;
use trellis_core::error::Result;
use trellis_core::InstanceId;

/// Backend that realizes decoded trees as host-native UI.
pub trait RenderBackend {
    /// Realize a first tree under the instance tag.
    ///
    /// # Errors
    /// Backend failures surface as [`crate::TrellisError::Backend`].
    fn mount(&mut self, instance: InstanceId, tree: &UiNode) -> Result<()>;

    /// Update the previously mounted tree in place.
    ///
    /// # Errors
    /// Backend failures surface as [`crate::TrellisError::Backend`].
    fn patch(&mut self, instance: InstanceId, tree: &UiNode) -> Result<()>;

    /// Tear down everything mounted under the instance tag.
    ///
    /// # Errors
    /// Backend failures surface as [`crate::TrellisError::Backend`].
    fn unmount(&mut self, instance: InstanceId) -> Result<()>;
}

/// Drives a [`RenderBackend`] through the mount/patch/unmount lifecycle
/// for one component instance.
pub struct Reconciler<B> {
    backend: B,
    instance: InstanceId,
    current: Option<UiNode>,
}

impl<B: RenderBackend> Reconciler<B> {
    /// Create a reconciler for one instance.
    pub fn new(backend: B, instance: InstanceId) -> Self {
        Self {
            backend,
            instance,
            current: None,
        }
    }

    /// The instance tag handed to the backend.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// The most recently reconciled tree, if any.
    #[must_use]
    pub fn current(&self) -> Option<&UiNode> {
        self.current.as_ref()
    }

    /// Access the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reconcile a freshly decoded tree.
    ///
    /// The first call mounts; every later call patches whole-tree. The
    /// tree is retained so event dispatch can consult the bindings that
    /// were on screen when the event arrived.
    ///
    /// # Errors
    /// Propagates backend failures; the retained tree is only replaced
    /// after the backend call succeeds.
    pub fn reconcile(&mut self, tree: &UiNode) -> Result<()> {
        if self.current.is_some() {
            self.backend.patch(self.instance, tree)?;
        } else {
            self.backend.mount(self.instance, tree)?;
        }
        self.current = Some(tree.clone());
        Ok(())
    }

    /// Unmount the instance's tree, if one was ever mounted.
    ///
    /// # Errors
    /// Propagates backend failures.
    pub fn unmount(&mut self) -> Result<()> {
        if self.current.take().is_some() {
            self.backend.unmount(self.instance)?;
        }
        Ok(())
    }
}
