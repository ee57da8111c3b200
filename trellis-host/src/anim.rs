//! Registry of guest-registered animation frame callbacks.
//!
//! The guest registers a callback by address; the host treats that
//! address as an opaque key and never dereferences it. One scheduling
//! loop serves all callbacks: the registry starts its [`FrameScheduler`]
//! on the empty-to-non-empty transition and stops it on the reverse one,
//! so registering a second callback while one is active never starts a
//! second loop.

use crate::host::AnimEvent;
use std::sync::Arc;
use std::time::Instant;
use trellis_core::error::Result;
use trellis_core::CallbackKey;

/// Drives the periodic tick for the animation registry.
///
/// The registry only decides *whether* ticking should happen; producing
/// the actual cadence (a frame timer, a vsync source, a manual pump in
/// tests) is the scheduler's business.
pub trait FrameScheduler: Send + Sync {
    /// Begin delivering ticks.
    fn start(&self);
    /// Stop delivering ticks.
    fn stop(&self);
}

/// Per-callback tick state, keyed by the opaque guest address.
///
/// Entries keep registration order so dispatch is deterministic.
pub struct AnimationRegistry {
    scheduler: Arc<dyn FrameScheduler>,
    callbacks: Vec<(CallbackKey, Option<Instant>)>,
}

impl AnimationRegistry {
    /// Create an empty registry driving the given scheduler.
    pub fn new(scheduler: Arc<dyn FrameScheduler>) -> Self {
        Self {
            scheduler,
            callbacks: Vec::new(),
        }
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Check if no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Register a callback.
    ///
    /// Starts the scheduler if the registry was empty. Re-registering an
    /// existing key is idempotent on membership but resets its tick
    /// state, so its next delta is zero again.
    pub fn register(&mut self, key: CallbackKey) {
        let was_empty = self.callbacks.is_empty();
        match self.callbacks.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = None,
            None => self.callbacks.push((key, None)),
        }
        if was_empty {
            tracing::debug!(callback = %key, "Animation scheduling started");
            self.scheduler.start();
        }
    }

    /// Deregister a callback.
    ///
    /// Unknown keys are ignored. Stops the scheduler when the last
    /// callback is removed.
    pub fn unregister(&mut self, key: CallbackKey) {
        let before = self.callbacks.len();
        self.callbacks.retain(|(k, _)| *k != key);
        if before > 0 && self.callbacks.is_empty() {
            tracing::debug!(callback = %key, "Animation scheduling stopped");
            self.scheduler.stop();
        }
    }

    /// Apply a batch of events queued during a guest call, in order.
    pub fn apply(&mut self, events: impl IntoIterator<Item = AnimEvent>) {
        for event in events {
            match event {
                AnimEvent::Register(key) => self.register(key),
                AnimEvent::Clear(key) => self.unregister(key),
            }
        }
    }

    /// Remove all callbacks, stopping the scheduler if any were present.
    pub fn clear(&mut self) {
        if !self.callbacks.is_empty() {
            self.callbacks.clear();
            self.scheduler.stop();
        }
    }

    /// Deliver one tick to every registered callback.
    ///
    /// `dispatch` is invoked once per callback with the key and the
    /// elapsed seconds since that callback's previous tick; a callback's
    /// first tick after (re)registration always sees zero.
    ///
    /// # Errors
    /// The first dispatch failure aborts the tick and is returned;
    /// remaining callbacks keep their previous tick state.
    pub fn tick<F>(&mut self, now: Instant, mut dispatch: F) -> Result<()>
    where
        F: FnMut(CallbackKey, f32) -> Result<()>,
    {
        for (key, last) in &mut self.callbacks {
            let dt = match last {
                Some(previous) => now.saturating_duration_since(*previous).as_secs_f32(),
                None => 0.0,
            };
            dispatch(*key, dt)?;
            *last = Some(now);
        }
        Ok(())
    }
}
