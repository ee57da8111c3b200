//! Recording collaborators for tests.
//!
//! Hosts embedding the bridge supply real widget backends, frame timers,
//! and raster surfaces. These stand-ins record every interaction instead,
//! so tests can assert on the exact call sequence the bridge produced.
//! They live in a normal module (not `#[cfg(test)]`) so downstream crates
//! can use them too.

use crate::anim::FrameScheduler;
use crate::decode::UiNode;
use crate::host::{RasterFrame, RasterSink};
use crate::reconcile::RenderBackend;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use trellis_core::error::{Result, TrellisError};
use trellis_core::InstanceId;

/// One recorded backend invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    /// `mount` was called.
    Mount,
    /// `patch` was called.
    Patch,
    /// `unmount` was called.
    Unmount,
}

#[derive(Default)]
struct BackendLogInner {
    calls: Vec<BackendCall>,
    trees: Vec<UiNode>,
    mutations: Vec<usize>,
    instance: Option<InstanceId>,
    fail_next: bool,
}

/// Count the structural mutations a positional diff would apply.
///
/// A node matching by (position, kind, identity) is patched in place:
/// text, attribute, and payload changes count one each, children recurse.
/// A mismatch replaces the whole subtree, counting every node on both
/// sides.
fn count_mutations(old: &UiNode, new: &UiNode) -> usize {
    if old.identity != new.identity || old.kind.name() != new.kind.name() {
        return old.node_count() + new.node_count();
    }

    let mut count = 0;
    if old.text != new.text {
        count += 1;
    }
    if old.attributes != new.attributes {
        count += 1;
    }
    if old.kind != new.kind {
        count += 1;
    }

    let none = Vec::new();
    let old_children = old.children.as_ref().unwrap_or(&none);
    let new_children = new.children.as_ref().unwrap_or(&none);
    for (o, n) in old_children.iter().zip(new_children.iter()) {
        count += count_mutations(o, n);
    }
    for removed in old_children.iter().skip(new_children.len()) {
        count += removed.node_count();
    }
    for added in new_children.iter().skip(old_children.len()) {
        count += added.node_count();
    }
    count
}

/// Shared view into a [`RecordingBackend`]'s log.
///
/// The backend itself moves into the reconciler; tests keep this handle.
#[derive(Clone, Default)]
pub struct BackendLog {
    inner: Arc<Mutex<BackendLogInner>>,
}

impl BackendLog {
    /// All recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().calls.clone()
    }

    /// Every tree handed to mount or patch, in order.
    #[must_use]
    pub fn trees(&self) -> Vec<UiNode> {
        self.inner.lock().trees.clone()
    }

    /// The last tree handed to mount or patch.
    #[must_use]
    pub fn last_tree(&self) -> Option<UiNode> {
        self.inner.lock().trees.last().cloned()
    }

    /// The instance tag seen by the backend, if any call happened.
    #[must_use]
    pub fn instance(&self) -> Option<InstanceId> {
        self.inner.lock().instance
    }

    /// Structural mutation count of each patch, in order.
    #[must_use]
    pub fn patch_mutations(&self) -> Vec<usize> {
        self.inner.lock().mutations.clone()
    }

    /// Make the next backend call fail.
    pub fn fail_next(&self) {
        self.inner.lock().fail_next = true;
    }
}

/// A [`RenderBackend`] that records calls instead of rendering.
#[derive(Default)]
pub struct RecordingBackend {
    log: BackendLog,
}

impl RecordingBackend {
    /// Create a backend with a fresh log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a handle to the log, valid after the backend is moved away.
    #[must_use]
    pub fn log_handle(&self) -> BackendLog {
        self.log.clone()
    }

    fn record(
        &mut self,
        call: BackendCall,
        instance: InstanceId,
        tree: Option<&UiNode>,
    ) -> Result<()> {
        let mut inner = self.log.inner.lock();
        if std::mem::take(&mut inner.fail_next) {
            return Err(TrellisError::Backend {
                instance,
                cause: "injected failure".to_string(),
            });
        }
        inner.calls.push(call);
        inner.instance = Some(instance);
        if let Some(tree) = tree {
            if call == BackendCall::Patch {
                let mutations = inner
                    .trees
                    .last()
                    .map(|previous| count_mutations(previous, tree));
                if let Some(mutations) = mutations {
                    inner.mutations.push(mutations);
                }
            }
            inner.trees.push(tree.clone());
        }
        Ok(())
    }
}

impl RenderBackend for RecordingBackend {
    fn mount(&mut self, instance: InstanceId, tree: &UiNode) -> Result<()> {
        self.record(BackendCall::Mount, instance, Some(tree))
    }

    fn patch(&mut self, instance: InstanceId, tree: &UiNode) -> Result<()> {
        self.record(BackendCall::Patch, instance, Some(tree))
    }

    fn unmount(&mut self, instance: InstanceId) -> Result<()> {
        self.record(BackendCall::Unmount, instance, None)
    }
}

/// A [`FrameScheduler`] pumped by hand.
#[derive(Default)]
pub struct ManualScheduler {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ManualScheduler {
    /// Create an inactive scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `start` was called.
    #[must_use]
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Times `stop` was called.
    #[must_use]
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Whether scheduling is currently on.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.starts() > self.stops()
    }
}

impl FrameScheduler for ManualScheduler {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`RasterSink`] that stores every presented frame.
#[derive(Default)]
pub struct RecordingRasterSink {
    known_targets: Option<Vec<String>>,
    frames: Mutex<Vec<RasterFrame>>,
}

impl RecordingRasterSink {
    /// Create a sink that accepts every target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that only accepts the listed targets; a frame for
    /// any other target fails as missing.
    #[must_use]
    pub fn with_targets(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            known_targets: Some(targets.into_iter().map(Into::into).collect()),
            frames: Mutex::new(Vec::new()),
        }
    }

    /// All presented frames in order.
    #[must_use]
    pub fn frames(&self) -> Vec<RasterFrame> {
        self.frames.lock().clone()
    }
}

impl RasterSink for RecordingRasterSink {
    fn present(&self, frame: RasterFrame) -> Result<()> {
        if let Some(known) = &self.known_targets {
            if !known.contains(&frame.target) {
                return Err(TrellisError::RasterTargetMissing {
                    target: frame.target,
                });
            }
        }
        self.frames.lock().push(frame);
        Ok(())
    }
}
