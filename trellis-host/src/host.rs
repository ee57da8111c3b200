//! Host function bindings for guest UI modules.
//!
//! Provides the `env` namespace imports a guest can call during a render
//! or event dispatch. Host functions never call back into the guest and
//! never mutate the bridge directly: a rerender request becomes a pending
//! flag and animation registrations become queued events, both drained by
//! the component after the current guest call returns. Keeping the
//! imports side-effect-free toward the guest is what makes renders
//! non-reentrant.

use crate::memory::MemoryView;
use parking_lot::Mutex;
use std::sync::Arc;
use trellis_core::error::{Result, TrellisError};
use trellis_core::schema::{read_value, Member, Schema};
use trellis_core::{CallbackKey, InstanceId};
use wasmtime::{Caller, Linker};

/// Bytes per RGBA pixel in a raster frame.
const BYTES_PER_PIXEL: u32 = 4;

/// An animation registry mutation requested by the guest during a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimEvent {
    /// `platform_on_animation_frame(cb)`.
    Register(CallbackKey),
    /// `platform_clear_animation_frame(cb)`.
    Clear(CallbackKey),
}

/// One RGBA frame blitted by the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFrame {
    /// Target identifier correlating the frame with a canvas node.
    pub target: String,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Tightly packed RGBA bytes, `width * height * 4` of them.
    pub pixels: Vec<u8>,
}

/// Receiver for guest raster frames, keyed by target identifier.
pub trait RasterSink: Send + Sync {
    /// Present one frame.
    ///
    /// # Errors
    /// Returns [`TrellisError::RasterTargetMissing`] if no host-native
    /// surface exists for the frame's target; the blit is then reported
    /// and skipped, never retried.
    fn present(&self, frame: RasterFrame) -> Result<()>;
}

/// A sink that discards every frame. Useful for headless hosts and tests
/// that don't care about raster output.
pub struct NullRasterSink;

impl RasterSink for NullRasterSink {
    fn present(&self, frame: RasterFrame) -> Result<()> {
        tracing::debug!(target = %frame.target, width = frame.width, height = frame.height,
            "Discarding raster frame");
        Ok(())
    }
}

/// Signals raised by host functions during a guest call.
///
/// Shared between the store's [`HostState`] and the owning component,
/// which drains them once the guest call returns.
#[derive(Default)]
pub struct PlatformSignals {
    rerender_pending: Mutex<bool>,
    anim_events: Mutex<Vec<AnimEvent>>,
}

impl PlatformSignals {
    /// Create an empty signal set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rerender request. Repeated requests coalesce.
    pub fn request_rerender(&self) {
        *self.rerender_pending.lock() = true;
    }

    /// Take and clear the pending rerender flag.
    pub fn take_rerender(&self) -> bool {
        std::mem::take(&mut *self.rerender_pending.lock())
    }

    /// Queue an animation registry mutation.
    pub fn push_anim_event(&self, event: AnimEvent) {
        self.anim_events.lock().push(event);
    }

    /// Take all queued animation events in arrival order.
    pub fn drain_anim_events(&self) -> Vec<AnimEvent> {
        std::mem::take(&mut *self.anim_events.lock())
    }
}

/// State provided to guest host functions.
pub struct HostState {
    /// The mounted component instance this store belongs to.
    pub instance: InstanceId,
    /// Signals drained by the component after each guest call.
    pub signals: Arc<PlatformSignals>,
    /// Receiver for canvas blits.
    pub raster_sink: Arc<dyn RasterSink>,
    pub(crate) limits: wasmtime::StoreLimits,
}

impl HostState {
    /// Create host state for one instance, capping guest memory at the
    /// given number of 64 KiB pages.
    pub fn new(
        instance: InstanceId,
        signals: Arc<PlatformSignals>,
        raster_sink: Arc<dyn RasterSink>,
        max_memory_pages: u64,
    ) -> Self {
        let limits = wasmtime::StoreLimitsBuilder::new()
            .memory_size(max_memory_pages as usize * 65536)
            .build();
        Self {
            instance,
            signals,
            raster_sink,
            limits,
        }
    }
}

/// Schema of the packed raster frame descriptor passed to
/// `platform_draw_canvas`.
fn raster_descriptor_schema() -> Schema {
    Schema::Struct(vec![
        Member::new("pixels_ptr", Schema::uint32()),
        Member::new("width", Schema::uint32()),
        Member::new("height", Schema::uint32()),
        Member::new("stride", Schema::uint32()),
    ])
}

/// Register all `env` namespace host functions with a Wasmtime Linker.
pub fn register_host_functions(linker: &mut Linker<HostState>) -> Result<()> {
    register_platform_functions(linker)?;
    register_math_functions(linker)?;
    Ok(())
}

fn wrap_error(function: &'static str) -> impl Fn(wasmtime::Error) -> TrellisError {
    move |e| TrellisError::HostFunction {
        function: function.to_string(),
        cause: e.to_string(),
    }
}

fn register_platform_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // platform_write(buf: u32, len: u32)
    // Relays UTF-8 text from the guest to host structured logging.
    linker
        .func_wrap(
            "env",
            "platform_write",
            |mut caller: Caller<'_, HostState>, buf: u32, len: u32| {
                let memory = match caller.get_export("memory") {
                    Some(wasmtime::Extern::Memory(m)) => m,
                    _ => return,
                };

                let instance = caller.data().instance;
                let mem_data = memory.data(&caller);
                match mem_data.get(buf as usize..(buf as usize).saturating_add(len as usize)) {
                    Some(bytes) => {
                        let text = String::from_utf8_lossy(bytes);
                        tracing::info!(instance = %instance, "[guest] {}", text);
                    }
                    None => {
                        tracing::warn!(instance = %instance, buf, len,
                            "Guest log buffer out of bounds");
                    }
                }
            },
        )
        .map_err(wrap_error("platform_write"))?;

    // platform_rerender()
    // Sets the pending flag; the component drains it after the call.
    linker
        .func_wrap(
            "env",
            "platform_rerender",
            |caller: Caller<'_, HostState>| {
                caller.data().signals.request_rerender();
            },
        )
        .map_err(wrap_error("platform_rerender"))?;

    // platform_on_animation_frame(cb: u32)
    linker
        .func_wrap(
            "env",
            "platform_on_animation_frame",
            |caller: Caller<'_, HostState>, cb: u32| {
                caller
                    .data()
                    .signals
                    .push_anim_event(AnimEvent::Register(CallbackKey::new(cb)));
            },
        )
        .map_err(wrap_error("platform_on_animation_frame"))?;

    // platform_clear_animation_frame(cb: u32)
    linker
        .func_wrap(
            "env",
            "platform_clear_animation_frame",
            |caller: Caller<'_, HostState>, cb: u32| {
                caller
                    .data()
                    .signals
                    .push_anim_event(AnimEvent::Clear(CallbackKey::new(cb)));
            },
        )
        .map_err(wrap_error("platform_clear_animation_frame"))?;

    // platform_draw_canvas(target_ptr: u32, desc_ptr: u32)
    // Failures here are guest-side runtime errors: logged, the blit is
    // skipped, and the render continues.
    linker
        .func_wrap(
            "env",
            "platform_draw_canvas",
            |mut caller: Caller<'_, HostState>, target_ptr: u32, desc_ptr: u32| {
                let memory = match caller.get_export("memory") {
                    Some(wasmtime::Extern::Memory(m)) => m,
                    _ => return,
                };

                let instance = caller.data().instance;
                let sink = Arc::clone(&caller.data().raster_sink);
                let mem_data = memory.data(&caller);

                match read_raster_frame(mem_data, target_ptr, desc_ptr).and_then(|f| sink.present(f))
                {
                    Ok(()) => {}
                    Err(e) if e.is_skippable() => {
                        tracing::warn!(instance = %instance, code = e.code(),
                            "Canvas blit skipped: {}", e);
                    }
                    Err(e) => {
                        tracing::error!(instance = %instance, code = e.code(),
                            "Canvas blit failed: {}", e);
                    }
                }
            },
        )
        .map_err(wrap_error("platform_draw_canvas"))?;

    Ok(())
}

/// Read and validate a raster frame from guest memory.
fn read_raster_frame(mem_data: &[u8], target_ptr: u32, desc_ptr: u32) -> Result<RasterFrame> {
    let view = MemoryView::new(mem_data);
    let target = view.read_cstr(target_ptr)?;

    let descriptor = read_value(mem_data, desc_ptr, &raster_descriptor_schema())?;
    let pixels_ptr = descriptor
        .field_u32("pixels_ptr")
        .ok_or(TrellisError::NullPointer {
            context: "raster descriptor",
        })?;
    let width = descriptor.field_u32("width").unwrap_or(0);
    let height = descriptor.field_u32("height").unwrap_or(0);
    let stride = descriptor.field_u32("stride").unwrap_or(0);

    // The host only handles tightly packed rows.
    if stride != width {
        return Err(TrellisError::RasterStride { width, stride });
    }

    let byte_len = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or(TrellisError::OutOfBounds {
            address: pixels_ptr,
            len: u32::MAX,
            memory_size: mem_data.len(),
        })?;
    let pixels = view.read_bytes(pixels_ptr, byte_len)?.to_vec();

    Ok(RasterFrame {
        target,
        width,
        height,
        pixels,
    })
}

fn register_math_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // Guests built without a libm import these from the host.
    linker
        .func_wrap("env", "atan2f", |y: f32, x: f32| -> f32 { y.atan2(x) })
        .map_err(wrap_error("atan2f"))?;
    linker
        .func_wrap("env", "cosf", |v: f32| -> f32 { v.cos() })
        .map_err(wrap_error("cosf"))?;
    linker
        .func_wrap("env", "sinf", |v: f32| -> f32 { v.sin() })
        .map_err(wrap_error("sinf"))?;
    linker
        .func_wrap("env", "sqrtf", |v: f32| -> f32 { v.sqrt() })
        .map_err(wrap_error("sqrtf"))?;
    Ok(())
}
