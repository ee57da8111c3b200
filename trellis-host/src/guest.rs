//! An instantiated guest module and its typed exports.
//!
//! `GuestBridge` owns the store, resolves every required export up front
//! (missing or wrongly typed exports are version skew, caught at init
//! rather than mid-render), runs layout discovery exactly once, and
//! exposes the guest entry points as typed methods. All guest traps
//! surface as [`TrellisError::GuestCall`].

use crate::host::{register_host_functions, HostState, PlatformSignals};
use crate::layout::ElementLayout;
use crate::memory::{write_cstr, MemoryView};
use std::sync::Arc;
use trellis_core::error::{Result, TrellisError};
use trellis_core::{CallbackKey, InstanceId, NodeId};
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, TypedFunc};

/// One live guest instance plus its typed exports and discovered layout.
pub struct GuestBridge {
    store: Store<HostState>,
    memory: Memory,
    layout: ElementLayout,
    signals: Arc<PlatformSignals>,
    render_component: TypedFunc<(), u32>,
    invoke_on_click: TypedFunc<u32, ()>,
    invoke_on_change: TypedFunc<(u32, u32), ()>,
    get_input_buffer: TypedFunc<(), u32>,
    invoke_animation_frame_callback: TypedFunc<(u32, f32), ()>,
}

impl std::fmt::Debug for GuestBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The store and typed funcs carry no useful state to print.
        f.debug_struct("GuestBridge")
            .field("instance", &self.instance())
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl GuestBridge {
    /// Instantiate a compiled guest module.
    ///
    /// Registers the host imports, resolves the required exports, runs
    /// layout discovery, and calls the guest's optional `init_component`
    /// export once.
    ///
    /// # Errors
    /// Any integration-class error: instantiation failure, a missing or
    /// mistyped export, or an unusable layout table.
    pub fn instantiate(engine: &Engine, module: &Module, state: HostState) -> Result<Self> {
        let signals = Arc::clone(&state.signals);

        let mut linker: Linker<HostState> = Linker::new(engine);
        register_host_functions(&mut linker)?;

        let mut store = Store::new(engine, state);
        store.limiter(|state| &mut state.limits);
        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| TrellisError::Instantiate {
                cause: e.to_string(),
            })?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| TrellisError::MissingExport {
                name: "memory".to_string(),
            })?;

        let render_component = typed_export(&instance, &mut store, "render_component")?;
        let invoke_on_click = typed_export(&instance, &mut store, "invoke_on_click")?;
        let invoke_on_change = typed_export(&instance, &mut store, "invoke_on_change")?;
        let get_input_buffer = typed_export(&instance, &mut store, "get_input_buffer")?;
        let invoke_animation_frame_callback =
            typed_export(&instance, &mut store, "invoke_animation_frame_callback")?;

        let layout = discover_layout(&instance, &mut store, memory)?;

        // Optional one-time init hook.
        if let Ok(init) = instance.get_typed_func::<(), ()>(&mut store, "init_component") {
            init.call(&mut store, ())
                .map_err(|e| TrellisError::GuestCall {
                    function: "init_component",
                    cause: e.to_string(),
                })?;
        }

        Ok(Self {
            store,
            memory,
            layout,
            signals,
            render_component,
            invoke_on_click,
            invoke_on_change,
            get_input_buffer,
            invoke_animation_frame_callback,
        })
    }

    /// The layout discovered at init.
    #[must_use]
    pub fn layout(&self) -> &ElementLayout {
        &self.layout
    }

    /// The instance this bridge belongs to.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        self.store.data().instance
    }

    /// Signals raised by host functions during guest calls.
    #[must_use]
    pub fn signals(&self) -> &Arc<PlatformSignals> {
        &self.signals
    }

    /// A bounds-checked view over the guest's current linear memory.
    ///
    /// Valid only until the next guest call; the guest reuses its frame
    /// arena on every render.
    #[must_use]
    pub fn memory(&self) -> MemoryView<'_> {
        MemoryView::new(self.memory.data(&self.store))
    }

    /// Ask the guest to produce a fresh tree; returns the root address.
    ///
    /// # Errors
    /// Returns [`TrellisError::GuestCall`] if the guest traps.
    pub fn render(&mut self) -> Result<u32> {
        self.render_component
            .call(&mut self.store, ())
            .map_err(|e| TrellisError::GuestCall {
                function: "render_component",
                cause: e.to_string(),
            })
    }

    /// Dispatch a click to the guest handler for the given node.
    ///
    /// # Errors
    /// Returns [`TrellisError::GuestCall`] if the guest traps.
    pub fn invoke_click(&mut self, node: NodeId) -> Result<()> {
        self.invoke_on_click
            .call(&mut self.store, node.as_u32())
            .map_err(|e| TrellisError::GuestCall {
                function: "invoke_on_click",
                cause: e.to_string(),
            })
    }

    /// Dispatch an input change to the guest handler for the given node.
    ///
    /// The new value is marshaled through the guest's scratch buffer:
    /// `get_input_buffer()` yields the address, the UTF-8 bytes plus a
    /// NUL terminator are written there, and the guest is handed the
    /// buffer address.
    ///
    /// # Errors
    /// Returns [`TrellisError::GuestCall`] if a guest call traps, or
    /// [`TrellisError::OutOfBounds`] if the value does not fit in linear
    /// memory.
    pub fn invoke_change(&mut self, node: NodeId, value: &str) -> Result<()> {
        let buffer = self
            .get_input_buffer
            .call(&mut self.store, ())
            .map_err(|e| TrellisError::GuestCall {
                function: "get_input_buffer",
                cause: e.to_string(),
            })?;
        if buffer == 0 {
            return Err(TrellisError::NullPointer {
                context: "input scratch buffer",
            });
        }

        write_cstr(self.memory.data_mut(&mut self.store), buffer, value)?;

        self.invoke_on_change
            .call(&mut self.store, (node.as_u32(), buffer))
            .map_err(|e| TrellisError::GuestCall {
                function: "invoke_on_change",
                cause: e.to_string(),
            })
    }

    /// Deliver one animation tick to a guest callback.
    ///
    /// # Errors
    /// Returns [`TrellisError::GuestCall`] if the guest traps.
    pub fn invoke_animation(&mut self, key: CallbackKey, dt: f32) -> Result<()> {
        self.invoke_animation_frame_callback
            .call(&mut self.store, (key.as_u32(), dt))
            .map_err(|e| TrellisError::GuestCall {
                function: "invoke_animation_frame_callback",
                cause: e.to_string(),
            })
    }
}

fn typed_export<Params, Results>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &'static str,
) -> Result<TypedFunc<Params, Results>>
where
    Params: wasmtime::WasmParams,
    Results: wasmtime::WasmResults,
{
    instance
        .get_typed_func::<Params, Results>(&mut *store, name)
        .map_err(|_| TrellisError::MissingExport {
            name: name.to_string(),
        })
}

/// Run layout discovery: one pair of guest calls, one table read.
fn discover_layout(
    instance: &Instance,
    store: &mut Store<HostState>,
    memory: Memory,
) -> Result<ElementLayout> {
    let get_element_layout: TypedFunc<(), u32> =
        typed_export(instance, store, "get_element_layout")?;
    let get_layout_word_size: TypedFunc<(), u32> =
        typed_export(instance, store, "get_layout_word_size")?;

    let table_ptr = get_element_layout
        .call(&mut *store, ())
        .map_err(|e| TrellisError::GuestCall {
            function: "get_element_layout",
            cause: e.to_string(),
        })?;
    let word_size = get_layout_word_size
        .call(&mut *store, ())
        .map_err(|e| TrellisError::GuestCall {
            function: "get_layout_word_size",
            cause: e.to_string(),
        })?;

    let view = MemoryView::new(memory.data(&*store));
    let layout = ElementLayout::read(&view, table_ptr, word_size)?;
    tracing::debug!(table_ptr, word_size, "Element layout discovered");
    Ok(layout)
}
