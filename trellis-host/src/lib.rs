//! Host-side bridge for guest-described UI trees.
//!
//! A guest module compiled to WASM describes a tree of interactive UI
//! nodes in its own linear memory. This crate recovers that structure on
//! the host side: it discovers the guest's record layout at runtime,
//! decodes the node tree on every render, reconciles it against the
//! previously rendered tree, and relays user events back into the guest.
//!
//! # Architecture
//!
//! - **BridgeRuntime**: Wasmtime engine configuration and module caching
//! - **GuestBridge**: an instantiated guest plus its typed exports
//! - **ElementLayout**: field offsets discovered from the guest at init
//! - **MemoryView**: bounds-checked reads over guest linear memory
//! - **decode**: the recursive node tree decoder
//! - **Reconciler**: mount/patch contract over a [`RenderBackend`]
//! - **AnimationRegistry**: guest-registered periodic callbacks
//! - **UiComponent**: ties the pieces into one mounted instance
//!
//! # Guest ABI Contract
//!
//! Guest modules must export:
//!
//! ```text
//! memory: Memory
//! render_component() -> u32                      // Root node address
//! invoke_on_click(id: u32)                       // Click by stable identity
//! invoke_on_change(id: u32, value_ptr: u32)      // Change by stable identity
//! get_input_buffer() -> u32                      // Scratch buffer address
//! get_element_layout() -> u32                    // Layout table address
//! get_layout_word_size() -> u32                  // Bytes per layout word
//! invoke_animation_frame_callback(cb: u32, dt: f32)
//! init_component()                               // Optional, called once
//! ```
//!
//! Guests can import from the `env` namespace:
//!
//! ```text
//! platform_write(buf, len)                       // Log UTF-8 text
//! platform_rerender()                            // Request a re-render
//! platform_on_animation_frame(cb)                // Register a callback
//! platform_clear_animation_frame(cb)             // Deregister a callback
//! platform_draw_canvas(target_ptr, desc_ptr)     // Blit an RGBA frame
//! atan2f, cosf, sinf, sqrtf                      // libm shims
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use trellis_host::{BridgeConfig, BridgeRuntime, UiComponent};
//! use trellis_host::host::NullRasterSink;
//!
//! let runtime = BridgeRuntime::new(BridgeConfig::default())?;
//! let wasm = std::fs::read("todolist.wasm")?;
//! let mut component = UiComponent::new(
//!     &runtime, "todolist", &wasm, backend, scheduler, Arc::new(NullRasterSink),
//! )?;
//! component.render()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anim;
pub mod callback;
pub mod component;
pub mod decode;
pub mod guest;
pub mod host;
pub mod layout;
pub mod memory;
pub mod reconcile;
pub mod runtime;
pub mod testing;

pub use anim::{AnimationRegistry, FrameScheduler};
pub use callback::{ChangeBinding, ClickBinding};
pub use component::UiComponent;
pub use decode::{decode_tree, ElementKind, UiNode};
pub use guest::GuestBridge;
pub use host::{AnimEvent, HostState, NullRasterSink, PlatformSignals, RasterFrame, RasterSink};
pub use layout::{ElementLayout, LAYOUT_WORD_COUNT};
pub use memory::MemoryView;
pub use reconcile::{Reconciler, RenderBackend};
pub use runtime::{BridgeConfig, BridgeRuntime, CompiledModule};
pub use trellis_core::{Result, TrellisError};
