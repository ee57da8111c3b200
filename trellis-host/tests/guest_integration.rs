//! End-to-end tests against a synthetic guest module.
//!
//! The guest below is a hand-written WAT implementation of the full ABI:
//! it exposes the layout table, builds a three-child tree in
//! `init_component`, mutates that tree from its event handlers, registers
//! an animation callback, and blits a 2x2 frame from the callback. The
//! tests drive it through `UiComponent` exactly as an embedding host
//! would.

use std::sync::Arc;
use std::time::{Duration, Instant};
use trellis_host::testing::{BackendCall, BackendLog, ManualScheduler, RecordingBackend, RecordingRasterSink};
use trellis_host::{BridgeConfig, BridgeRuntime, ElementKind, UiComponent};
use trellis_core::NodeId;

/// A todo-style guest: a "div" root with a class attribute, a button
/// (identity 42), a text input (identity 7), and a canvas ("scene").
///
/// Memory map: layout table at 1024, static strings at 1200..1280, the
/// input's value area at 1600, node records at 2048, the raster
/// descriptor at 1500, pixels at 8192, scratch input buffer at 4096.
fn todo_guest() -> Vec<u8> {
    let wat = r#"
        (module
            (import "env" "platform_write" (func $log (param i32 i32)))
            (import "env" "platform_rerender" (func $rerender))
            (import "env" "platform_on_animation_frame" (func $anim_on (param i32)))
            (import "env" "platform_clear_animation_frame" (func $anim_clear (param i32)))
            (import "env" "platform_draw_canvas" (func $draw (param i32 i32)))
            (memory (export "memory") 1)

            ;; Field offset table: kind 0, identity 4, text 8, children 12,
            ;; attributes 16, union 20; then the per-kind union offsets.
            (data (i32.const 1024)
                "\00\00\00\00\04\00\00\00\08\00\00\00\0c\00\00\00\10\00\00\00\14\00\00\00"
                "\00\00\00\00\00\00\00\00\04\00\00\00\00\00\00\00\04\00\00\00\00\00\00\00\04\00\00\00\08\00\00\00")
            (data (i32.const 1200) "div\00")
            (data (i32.const 1208) "Add\00")
            (data (i32.const 1216) "todo\00")
            (data (i32.const 1240) "scene\00")
            (data (i32.const 1250) "class\00")
            (data (i32.const 1258) "app\00")
            (data (i32.const 1270) "render")

            (func (export "get_element_layout") (result i32) (i32.const 1024))
            (func (export "get_layout_word_size") (result i32) (i32.const 4))
            (func (export "get_input_buffer") (result i32) (i32.const 4096))

            (func (export "init_component")
                ;; root: generic "div", children list, attribute list
                (i32.store (i32.const 2048) (i32.const 0))
                (i32.store (i32.const 2052) (i32.const 1))
                (i32.store (i32.const 2056) (i32.const 0))
                (i32.store (i32.const 2060) (i32.const 1400))
                (i32.store (i32.const 2064) (i32.const 1320))
                (i32.store (i32.const 2068) (i32.const 1200))
                ;; button, identity 42, text "Add", click handler present
                (i32.store (i32.const 2112) (i32.const 1))
                (i32.store (i32.const 2116) (i32.const 42))
                (i32.store (i32.const 2120) (i32.const 1208))
                (i32.store (i32.const 2124) (i32.const 0))
                (i32.store (i32.const 2128) (i32.const 0))
                (i32.store (i32.const 2132) (i32.const 1))
                (i32.store (i32.const 2136) (i32.const 0))
                ;; input, identity 7, value area at 1600, change handler present
                (i32.store (i32.const 2144) (i32.const 2))
                (i32.store (i32.const 2148) (i32.const 7))
                (i32.store (i32.const 2152) (i32.const 1600))
                (i32.store (i32.const 2156) (i32.const 0))
                (i32.store (i32.const 2160) (i32.const 0))
                (i32.store (i32.const 2164) (i32.const 1216))
                (i32.store (i32.const 2168) (i32.const 1))
                ;; canvas, identity 9, target "scene", 2x2
                (i32.store (i32.const 2176) (i32.const 3))
                (i32.store (i32.const 2180) (i32.const 9))
                (i32.store (i32.const 2184) (i32.const 0))
                (i32.store (i32.const 2188) (i32.const 0))
                (i32.store (i32.const 2192) (i32.const 0))
                (i32.store (i32.const 2196) (i32.const 1240))
                (i32.store (i32.const 2200) (i32.const 2))
                (i32.store (i32.const 2204) (i32.const 2))
                ;; children: {length 3, _reserved, items} -> [button, input, canvas]
                (i32.store (i32.const 1400) (i32.const 3))
                (i32.store (i32.const 1408) (i32.const 1440))
                (i32.store (i32.const 1440) (i32.const 2112))
                (i32.store (i32.const 1444) (i32.const 2144))
                (i32.store (i32.const 1448) (i32.const 2176))
                ;; attributes: one record, ("class", "app")
                (i32.store (i32.const 1320) (i32.const 1))
                (i32.store (i32.const 1328) (i32.const 1360))
                (i32.store (i32.const 1360) (i32.const 1300))
                (i32.store (i32.const 1300) (i32.const 1250))
                (i32.store (i32.const 1304) (i32.const 1258))
                ;; raster descriptor {pixels 8192, width 2, height 2, stride 2}
                (i32.store (i32.const 1500) (i32.const 8192))
                (i32.store (i32.const 1504) (i32.const 2))
                (i32.store (i32.const 1508) (i32.const 2))
                (i32.store (i32.const 1512) (i32.const 2))
                ;; pixel bytes 1..16
                (i32.store (i32.const 8192) (i32.const 0x04030201))
                (i32.store (i32.const 8196) (i32.const 0x08070605))
                (i32.store (i32.const 8200) (i32.const 0x0c0b0a09))
                (i32.store (i32.const 8204) (i32.const 0x100f0e0d))
                ;; one animation callback, keyed 0xAA
                (call $anim_on (i32.const 0xAA)))

            (func (export "render_component") (result i32)
                (call $log (i32.const 1270) (i32.const 6))
                (i32.const 2048))

            ;; Stamp the received identity (+100) into the root and rerender,
            ;; so the host can observe the dispatched value in the next tree.
            (func (export "invoke_on_click") (param $id i32)
                (i32.store (i32.const 2052) (i32.add (local.get $id) (i32.const 100)))
                (call $rerender))

            ;; Adopt the new value from the scratch buffer and rerender.
            (func (export "invoke_on_change") (param $id i32) (param $ptr i32)
                (memory.copy (i32.const 1600) (local.get $ptr) (i32.const 32))
                (call $rerender))

            ;; Blit every tick; deregister once a non-zero delta arrives.
            (func (export "invoke_animation_frame_callback") (param $cb i32) (param $dt f32)
                (call $draw (i32.const 1240) (i32.const 1500))
                (if (f32.gt (local.get $dt) (f32.const 0))
                    (then (call $anim_clear (local.get $cb))))))
    "#;
    wat::parse_str(wat).expect("Failed to parse WAT")
}

struct Harness {
    component: UiComponent<RecordingBackend>,
    log: BackendLog,
    scheduler: Arc<ManualScheduler>,
    sink: Arc<RecordingRasterSink>,
}

fn mount_guest() -> Harness {
    let runtime = BridgeRuntime::new(BridgeConfig::testing()).expect("Failed to create runtime");
    let backend = RecordingBackend::new();
    let log = backend.log_handle();
    let scheduler = Arc::new(ManualScheduler::new());
    let sink = Arc::new(RecordingRasterSink::with_targets(["scene"]));

    let frame_scheduler: Arc<dyn trellis_host::FrameScheduler> = scheduler.clone();
    let raster_sink: Arc<dyn trellis_host::RasterSink> = sink.clone();
    let component = UiComponent::new(
        &runtime,
        "todo",
        &todo_guest(),
        backend,
        frame_scheduler,
        raster_sink,
    )
    .expect("Failed to mount component");

    Harness {
        component,
        log,
        scheduler,
        sink,
    }
}

#[test]
fn first_render_mounts_full_tree() {
    let mut h = mount_guest();
    h.component.render().expect("render failed");

    assert_eq!(h.log.calls(), vec![BackendCall::Mount]);
    let tree = h.component.current_tree().expect("no tree");

    assert_eq!(tree.kind, ElementKind::Generic { tag: "div".into() });
    assert_eq!(
        tree.attributes,
        Some(vec![("class".into(), "app".into())])
    );

    let children = tree.children.as_deref().expect("no children");
    assert_eq!(children.len(), 3);

    assert_eq!(children[0].identity, NodeId::new(42));
    assert_eq!(children[0].text.as_deref(), Some("Add"));
    assert!(matches!(
        children[0].kind,
        ElementKind::Button { on_click: Some(_) }
    ));

    assert_eq!(children[1].identity, NodeId::new(7));
    assert_eq!(children[1].text.as_deref(), Some(""));
    match &children[1].kind {
        ElementKind::Input {
            placeholder,
            on_change,
        } => {
            assert_eq!(placeholder.as_deref(), Some("todo"));
            assert!(on_change.is_some());
        }
        other => panic!("expected input, got {}", other.name()),
    }

    assert_eq!(
        children[2].kind,
        ElementKind::Canvas {
            target: "scene".into(),
            width: 2,
            height: 2,
        }
    );
}

#[test]
fn second_render_patches() {
    let mut h = mount_guest();
    h.component.render().unwrap();
    h.component.render().unwrap();
    assert_eq!(h.log.calls(), vec![BackendCall::Mount, BackendCall::Patch]);
}

#[test]
fn click_dispatches_identity_and_rerenders() {
    let mut h = mount_guest();
    h.component.render().unwrap();

    h.component.dispatch_click(NodeId::new(42)).unwrap();

    // The handler stamped id+100 into the root and asked to rerender.
    assert_eq!(h.log.calls(), vec![BackendCall::Mount, BackendCall::Patch]);
    let tree = h.component.current_tree().unwrap();
    assert_eq!(tree.identity, NodeId::new(142));
}

#[test]
fn change_round_trips_through_scratch_buffer() {
    let mut h = mount_guest();
    h.component.render().unwrap();

    h.component.dispatch_change(NodeId::new(7), "milk").unwrap();

    assert_eq!(h.log.calls(), vec![BackendCall::Mount, BackendCall::Patch]);
    let tree = h.component.current_tree().unwrap();
    let input = tree.find(NodeId::new(7)).unwrap();
    assert_eq!(input.text.as_deref(), Some("milk"));
}

#[test]
fn events_on_unbound_nodes_are_skipped() {
    let mut h = mount_guest();
    h.component.render().unwrap();

    // Unknown identity, and a change aimed at a button: both no-ops.
    h.component.dispatch_click(NodeId::new(999)).unwrap();
    h.component.dispatch_change(NodeId::new(42), "x").unwrap();

    assert_eq!(h.log.calls(), vec![BackendCall::Mount]);
}

#[test]
fn init_registers_animation_callback() {
    let h = mount_guest();
    assert_eq!(h.component.animation_count(), 1);
    assert!(h.scheduler.is_active());
}

#[test]
fn animation_ticks_blit_and_self_deregister() {
    let mut h = mount_guest();
    h.component.render().unwrap();

    let base = Instant::now();

    // First tick: zero delta, the callback stays registered.
    h.component.tick_animations(base).unwrap();
    assert_eq!(h.component.animation_count(), 1);
    assert_eq!(h.sink.frames().len(), 1);

    let frame = &h.sink.frames()[0];
    assert_eq!(frame.target, "scene");
    assert_eq!((frame.width, frame.height), (2, 2));
    assert_eq!(frame.pixels, (1u8..=16).collect::<Vec<_>>());

    // Non-zero delta: the callback clears itself and scheduling stops.
    h.component
        .tick_animations(base + Duration::from_millis(16))
        .unwrap();
    assert_eq!(h.component.animation_count(), 0);
    assert!(!h.scheduler.is_active());
    assert_eq!(h.sink.frames().len(), 2);
}

#[test]
fn teardown_unmounts_backend_tree() {
    let mut h = mount_guest();
    h.component.render().unwrap();

    h.component.teardown().unwrap();
    assert_eq!(
        h.log.calls(),
        vec![BackendCall::Mount, BackendCall::Unmount]
    );
}

#[test]
fn module_cache_round_trip() {
    let runtime = BridgeRuntime::with_defaults().unwrap();
    let wasm = todo_guest();
    let first = runtime.compile("a", &wasm).unwrap();
    let second = runtime.compile("b", &wasm).unwrap();
    assert_eq!(first.hash(), second.hash());
    assert_eq!(runtime.cache_size(), 1);
}
