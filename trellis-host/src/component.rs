//! One mounted guest component.
//!
//! `UiComponent` owns the full pipeline for a single instance: the guest
//! bridge, the reconciler, and the animation registry. Every guest call
//! goes through here, and after each one the component drains the signals
//! the host imports raised during the call: queued animation events are
//! applied to the registry, and a pending rerender runs another
//! render pass. Chained rerenders are processed to quiescence;
//! termination of the chain is a guest obligation, like tree acyclicity.

use crate::anim::{AnimationRegistry, FrameScheduler};
use crate::decode::{decode_tree, ElementKind, UiNode};
use crate::guest::GuestBridge;
use crate::host::{HostState, PlatformSignals, RasterSink};
use crate::reconcile::{Reconciler, RenderBackend};
use crate::runtime::BridgeRuntime;
use std::sync::Arc;
use std::time::Instant;
use trellis_core::error::{Result, TrellisError};
use trellis_core::{InstanceId, NodeId};

/// A guest module mounted onto a render backend.
pub struct UiComponent<B> {
    bridge: GuestBridge,
    reconciler: Reconciler<B>,
    registry: AnimationRegistry,
    signals: Arc<PlatformSignals>,
    in_render: bool,
}

impl<B: RenderBackend> UiComponent<B> {
    /// Compile, instantiate, and initialize a guest component.
    ///
    /// The guest's optional `init_component` runs here; animation
    /// registrations it makes take effect immediately, and a rerender it
    /// requests is satisfied by the first [`render`](Self::render) call.
    ///
    /// # Errors
    /// Any integration-class error from compilation, instantiation, or
    /// layout discovery.
    pub fn new(
        runtime: &BridgeRuntime,
        name: &str,
        wasm_bytes: &[u8],
        backend: B,
        scheduler: Arc<dyn FrameScheduler>,
        raster_sink: Arc<dyn RasterSink>,
    ) -> Result<Self> {
        let instance = InstanceId::new();
        let signals = Arc::new(PlatformSignals::new());

        let compiled = runtime.compile(name, wasm_bytes)?;
        let state = HostState::new(
            instance,
            Arc::clone(&signals),
            raster_sink,
            runtime.config().max_memory_pages,
        );
        let bridge = GuestBridge::instantiate(runtime.engine(), compiled.module(), state)?;

        let mut registry = AnimationRegistry::new(scheduler);
        registry.apply(signals.drain_anim_events());
        // A rerender requested during init is subsumed by the first render.
        signals.take_rerender();

        tracing::info!(instance = %instance, module = name, "Component instantiated");

        Ok(Self {
            bridge,
            reconciler: Reconciler::new(backend, instance),
            registry,
            signals,
            in_render: false,
        })
    }

    /// The instance tag of this component.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.reconciler.instance()
    }

    /// The tree currently on screen, if a render has completed.
    #[must_use]
    pub fn current_tree(&self) -> Option<&UiNode> {
        self.reconciler.current()
    }

    /// Number of live animation callbacks.
    #[must_use]
    pub fn animation_count(&self) -> usize {
        self.registry.len()
    }

    /// Render the component and reconcile the result.
    ///
    /// Runs the guest's render entry, decodes the tree it produced, and
    /// hands the tree to the backend. If the guest requested further
    /// rerenders during the pass, they are processed before returning.
    ///
    /// # Errors
    /// Decode-class errors abandon the render (the backend never sees a
    /// partial tree); guest traps and backend failures propagate.
    pub fn render(&mut self) -> Result<()> {
        if self.in_render {
            return Err(TrellisError::ReentrantRender);
        }

        loop {
            self.render_once()?;
            self.registry.apply(self.signals.drain_anim_events());
            if !self.signals.take_rerender() {
                return Ok(());
            }
            tracing::debug!(instance = %self.instance(), "Guest requested rerender");
        }
    }

    fn render_once(&mut self) -> Result<()> {
        self.in_render = true;
        let outcome = self.render_pass();
        self.in_render = false;
        outcome
    }

    fn render_pass(&mut self) -> Result<()> {
        let root = self.bridge.render()?;
        // Everything decoded from this view is copied out before the
        // next guest call invalidates the frame arena behind it.
        let tree = {
            let layout = *self.bridge.layout();
            decode_tree(&self.bridge.memory(), &layout, root)?
        };
        self.reconciler.reconcile(&tree)
    }

    /// Dispatch a click event on a node.
    ///
    /// The event is checked against the tree that was on screen when it
    /// arrived: a node that is gone or has no click handler (the event
    /// raced with a rerender) is logged and skipped. A rerender the
    /// handler requests runs before this returns.
    ///
    /// # Errors
    /// Guest traps and follow-up render failures propagate.
    pub fn dispatch_click(&mut self, node: NodeId) -> Result<()> {
        let bound = matches!(
            self.reconciler.current().and_then(|t| t.find(node)),
            Some(UiNode {
                kind: ElementKind::Button { on_click: Some(_) },
                ..
            })
        );
        if !bound {
            tracing::warn!(instance = %self.instance(), node = %node,
                "Click on a node with no handler; skipped");
            return Ok(());
        }

        self.bridge.invoke_click(node)?;
        self.after_guest_call()
    }

    /// Dispatch an input change event on a node.
    ///
    /// Same skip semantics as [`dispatch_click`](Self::dispatch_click);
    /// the new value travels through the guest's scratch buffer.
    ///
    /// # Errors
    /// Guest traps, marshaling failures, and follow-up render failures
    /// propagate.
    pub fn dispatch_change(&mut self, node: NodeId, value: &str) -> Result<()> {
        let bound = matches!(
            self.reconciler.current().and_then(|t| t.find(node)),
            Some(UiNode {
                kind: ElementKind::Input {
                    on_change: Some(_),
                    ..
                },
                ..
            })
        );
        if !bound {
            tracing::warn!(instance = %self.instance(), node = %node,
                "Change on a node with no handler; skipped");
            return Ok(());
        }

        self.bridge.invoke_change(node, value)?;
        self.after_guest_call()
    }

    /// Deliver one animation tick to every registered callback.
    ///
    /// Callbacks see the elapsed seconds since their own previous tick
    /// (zero on their first). Registry changes and rerenders requested by
    /// the callbacks are applied after all of them ran.
    ///
    /// # Errors
    /// Guest traps and follow-up render failures propagate.
    pub fn tick_animations(&mut self, now: Instant) -> Result<()> {
        let bridge = &mut self.bridge;
        self.registry
            .tick(now, |key, dt| bridge.invoke_animation(key, dt))?;
        self.after_guest_call()
    }

    /// Tear the component down: stop animation scheduling, drop the
    /// guest instance, and unmount the backend tree.
    ///
    /// # Errors
    /// Propagates a backend unmount failure; the guest side is torn down
    /// regardless.
    pub fn teardown(mut self) -> Result<()> {
        tracing::info!(instance = %self.instance(), "Component teardown");
        self.registry.clear();
        drop(self.bridge);
        self.reconciler.unmount()
    }

    /// Apply signals raised during a guest call, rendering if requested.
    fn after_guest_call(&mut self) -> Result<()> {
        self.registry.apply(self.signals.drain_anim_events());
        if self.signals.take_rerender() {
            self.render()?;
        }
        Ok(())
    }
}
