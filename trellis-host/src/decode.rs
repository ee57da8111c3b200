//! Recursive decoder for the guest's UI node tree.
//!
//! A node record starts with a kind discriminant and a stable identity,
//! followed by optional common fields and a kind-specific union region.
//! All field positions come from the discovered [`ElementLayout`]; nothing
//! about the guest's struct packing is assumed. Decoding is a pure read:
//! it produces a host-side value tree, copies every string out of guest
//! memory, and has no side effects.
//!
//! Optional pointer fields use zero for "absent". An absent child list and
//! an empty child list are distinct values and both are preserved.

use crate::callback::{ChangeBinding, ClickBinding};
use crate::layout::ElementLayout;
use crate::memory::MemoryView;
use trellis_core::error::{Result, TrellisError};
use trellis_core::NodeId;

// Kind discriminant words; the set is closed.
const KIND_GENERIC: u32 = 0;
const KIND_BUTTON: u32 = 1;
const KIND_INPUT: u32 = 2;
const KIND_CANVAS: u32 = 3;

/// Kind-specific payload of a decoded node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// A plain container with a guest-chosen tag name.
    Generic {
        /// Tag name, e.g. `"div"`.
        tag: String,
    },
    /// A clickable element.
    Button {
        /// Present iff the guest registered a click handler.
        on_click: Option<ClickBinding>,
    },
    /// A text input. Its current value travels in the common text field.
    Input {
        /// Hint text shown while the input is empty. A zero placeholder
        /// pointer decodes as absent, like every other optional pointer
        /// field, rather than failing the whole tree.
        placeholder: Option<String>,
        /// Present iff the guest registered a change handler.
        on_change: Option<ChangeBinding>,
    },
    /// A raster surface the guest draws into via the blit import.
    Canvas {
        /// Identifier correlating blits with a host-native surface.
        target: String,
        /// Pixel width.
        width: u32,
        /// Pixel height.
        height: u32,
    },
}

impl ElementKind {
    /// Short name of the kind, for logging and diffing.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generic { .. } => "generic",
            Self::Button { .. } => "button",
            Self::Input { .. } => "input",
            Self::Canvas { .. } => "canvas",
        }
    }
}

/// One decoded UI node.
///
/// The tree owns all of its data; nothing borrows guest memory. Identity
/// is the only correlation key across renders (addresses are reused by
/// the guest allocator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiNode {
    /// Stable guest-assigned identity.
    pub identity: NodeId,
    /// Kind-specific payload.
    pub kind: ElementKind,
    /// Optional text content (for inputs, the current value).
    pub text: Option<String>,
    /// Optional child list, in guest order. `None` is distinct from
    /// `Some(vec![])`.
    pub children: Option<Vec<UiNode>>,
    /// Optional attribute list, in guest order. Duplicate keys are
    /// retained; dedup policy belongs to the consumer.
    pub attributes: Option<Vec<(String, String)>>,
}

impl UiNode {
    /// Find a node by stable identity, depth-first.
    #[must_use]
    pub fn find(&self, identity: NodeId) -> Option<&UiNode> {
        if self.identity == identity {
            return Some(self);
        }
        self.children
            .iter()
            .flatten()
            .find_map(|child| child.find(identity))
    }

    /// Total number of nodes in this subtree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(UiNode::node_count)
            .sum::<usize>()
    }
}

/// Decode the node record at `address` and, recursively, its children.
///
/// Depth is bounded only by the guest's tree; acyclicity is a guest
/// obligation (a cycle would recurse until memory reads repeat forever,
/// which the guest contract forbids).
///
/// # Errors
/// Any decode-class error ([`TrellisError::is_render_fatal`]) abandons
/// the whole tree; a partial tree is never returned.
pub fn decode_tree(view: &MemoryView<'_>, layout: &ElementLayout, address: u32) -> Result<UiNode> {
    if address == 0 {
        return Err(TrellisError::NullPointer {
            context: "node record",
        });
    }

    let kind_word = view.read_u32_at(address, layout.kind)?;
    let identity = NodeId::new(view.read_u32_at(address, layout.identity)?);
    let union_base = address
        .checked_add(layout.union)
        .ok_or(TrellisError::OutOfBounds {
            address,
            len: layout.union,
            memory_size: view.len(),
        })?;

    let kind = match kind_word {
        KIND_GENERIC => ElementKind::Generic {
            tag: view.read_cstr(view.read_u32_at(union_base, layout.generic.tag)?)?,
        },
        KIND_BUTTON => {
            let handler = view.read_u32_at(union_base, layout.button.on_click)?;
            ElementKind::Button {
                on_click: (handler != 0).then_some(ClickBinding::new(identity)),
            }
        }
        KIND_INPUT => {
            let placeholder_ptr = view.read_u32_at(union_base, layout.input.placeholder)?;
            let handler = view.read_u32_at(union_base, layout.input.on_change)?;
            ElementKind::Input {
                placeholder: read_opt_cstr(view, placeholder_ptr)?,
                on_change: (handler != 0).then_some(ChangeBinding::new(identity)),
            }
        }
        KIND_CANVAS => ElementKind::Canvas {
            target: view.read_cstr(view.read_u32_at(union_base, layout.canvas.target)?)?,
            width: view.read_u32_at(union_base, layout.canvas.width)?,
            height: view.read_u32_at(union_base, layout.canvas.height)?,
        },
        other => {
            return Err(TrellisError::UnknownElementKind {
                kind: other,
                address,
            })
        }
    };

    let text_ptr = view.read_u32_at(address, layout.text)?;
    let children_ptr = view.read_u32_at(address, layout.children)?;
    let attributes_ptr = view.read_u32_at(address, layout.attributes)?;

    let children = if children_ptr == 0 {
        None
    } else {
        let mut nodes = Vec::new();
        for child_address in view.read_ptr_array(children_ptr)? {
            nodes.push(decode_tree(view, layout, child_address)?);
        }
        Some(nodes)
    };

    let attributes = if attributes_ptr == 0 {
        None
    } else {
        Some(read_attributes(view, attributes_ptr)?)
    };

    Ok(UiNode {
        identity,
        kind,
        text: read_opt_cstr(view, text_ptr)?,
        children,
        attributes,
    })
}

fn read_opt_cstr(view: &MemoryView<'_>, address: u32) -> Result<Option<String>> {
    if address == 0 {
        Ok(None)
    } else {
        view.read_cstr(address).map(Some)
    }
}

/// Read an attribute array: a pointer array whose items each point to a
/// record of two adjacent string pointers (key, value).
fn read_attributes(view: &MemoryView<'_>, address: u32) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    for record in view.read_ptr_array(address)? {
        if record == 0 {
            return Err(TrellisError::NullPointer {
                context: "attribute record",
            });
        }
        let key = view.read_cstr(view.read_u32(record)?)?;
        let value = view.read_cstr(view.read_u32_at(record, 4)?)?;
        attributes.push((key, value));
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{
        ButtonLayout, CanvasLayout, ElementLayout, GenericLayout, InputLayout,
    };

    fn test_layout() -> ElementLayout {
        ElementLayout {
            kind: 0,
            identity: 4,
            text: 8,
            children: 12,
            attributes: 16,
            union: 20,
            generic: GenericLayout { tag: 0 },
            button: ButtonLayout {
                on_click: 0,
                on_click_args: 4,
            },
            input: InputLayout {
                placeholder: 0,
                on_change: 4,
            },
            canvas: CanvasLayout {
                target: 0,
                width: 4,
                height: 8,
            },
        }
    }

    struct GuestMemory {
        data: Vec<u8>,
    }

    impl GuestMemory {
        fn new() -> Self {
            Self {
                data: vec![0u8; 4096],
            }
        }

        fn word(&mut self, address: u32, value: u32) {
            let start = address as usize;
            self.data[start..start + 4].copy_from_slice(&value.to_le_bytes());
        }

        fn string(&mut self, address: u32, value: &str) -> u32 {
            let start = address as usize;
            self.data[start..start + value.len()].copy_from_slice(value.as_bytes());
            self.data[start + value.len()] = 0;
            address
        }

        /// Write a node record at `address` with the test layout's offsets.
        fn node(&mut self, address: u32, kind: u32, identity: u32, union_words: &[u32]) {
            self.word(address, kind);
            self.word(address + 4, identity);
            for (i, w) in union_words.iter().enumerate() {
                self.word(address + 20 + i as u32 * 4, *w);
            }
        }

        /// Write a `{length, _reserved, items_ptr}` header plus items.
        fn ptr_array(&mut self, header: u32, items_at: u32, items: &[u32]) -> u32 {
            self.word(header, items.len() as u32);
            self.word(header + 8, items_at);
            for (i, item) in items.iter().enumerate() {
                self.word(items_at + i as u32 * 4, *item);
            }
            header
        }

        fn view(&self) -> MemoryView<'_> {
            MemoryView::new(&self.data)
        }
    }

    #[test]
    fn button_with_handler_and_all_optionals_absent() {
        let mut mem = GuestMemory::new();
        // Kind 1 (button), identity 42, zero text/children/attributes,
        // handler-presence word 1 at union offset 0.
        mem.node(100, 1, 42, &[1]);

        let layout = test_layout();
        let node = decode_tree(&mem.view(), &layout, 100).unwrap();

        assert_eq!(node.identity, NodeId::new(42));
        assert_eq!(node.text, None);
        assert_eq!(node.children, None);
        assert_eq!(node.attributes, None);
        match node.kind {
            ElementKind::Button { on_click } => {
                assert_eq!(on_click, Some(ClickBinding::new(NodeId::new(42))));
            }
            other => panic!("expected button, got {}", other.name()),
        }
    }

    #[test]
    fn button_without_handler() {
        let mut mem = GuestMemory::new();
        mem.node(100, 1, 7, &[0]);

        let node = decode_tree(&mem.view(), &test_layout(), 100).unwrap();
        assert_eq!(
            node.kind,
            ElementKind::Button { on_click: None }
        );
    }

    #[test]
    fn generic_with_tag_and_text() {
        let mut mem = GuestMemory::new();
        let tag = mem.string(1000, "div");
        let text = mem.string(1010, "hello");
        mem.node(100, 0, 1, &[tag]);
        mem.word(108, text);

        let node = decode_tree(&mem.view(), &test_layout(), 100).unwrap();
        assert_eq!(node.kind, ElementKind::Generic { tag: "div".into() });
        assert_eq!(node.text.as_deref(), Some("hello"));
    }

    #[test]
    fn input_with_placeholder_and_change_handler() {
        let mut mem = GuestMemory::new();
        let placeholder = mem.string(1000, "type here");
        let value = mem.string(1020, "current");
        mem.node(100, 2, 9, &[placeholder, 1]);
        mem.word(108, value);

        let node = decode_tree(&mem.view(), &test_layout(), 100).unwrap();
        assert_eq!(node.text.as_deref(), Some("current"));
        match node.kind {
            ElementKind::Input {
                placeholder,
                on_change,
            } => {
                assert_eq!(placeholder.as_deref(), Some("type here"));
                assert_eq!(on_change, Some(ChangeBinding::new(NodeId::new(9))));
            }
            other => panic!("expected input, got {}", other.name()),
        }
    }

    #[test]
    fn input_null_placeholder_is_absent() {
        let mut mem = GuestMemory::new();
        mem.node(100, 2, 9, &[0, 1]);

        let node = decode_tree(&mem.view(), &test_layout(), 100).unwrap();
        match node.kind {
            ElementKind::Input {
                placeholder,
                on_change,
            } => {
                assert_eq!(placeholder, None);
                assert_eq!(on_change, Some(ChangeBinding::new(NodeId::new(9))));
            }
            other => panic!("expected input, got {}", other.name()),
        }
    }

    #[test]
    fn canvas_dimensions() {
        let mut mem = GuestMemory::new();
        let target = mem.string(1000, "scene");
        mem.node(100, 3, 5, &[target, 320, 240]);

        let node = decode_tree(&mem.view(), &test_layout(), 100).unwrap();
        assert_eq!(
            node.kind,
            ElementKind::Canvas {
                target: "scene".into(),
                width: 320,
                height: 240,
            }
        );
    }

    #[test]
    fn children_preserve_guest_order() {
        let mut mem = GuestMemory::new();
        let tag = mem.string(1000, "div");
        mem.node(100, 0, 1, &[tag]);
        mem.node(200, 1, 10, &[0]);
        mem.node(300, 1, 30, &[0]);
        mem.node(400, 1, 20, &[0]);
        let children = mem.ptr_array(500, 550, &[200, 300, 400]);
        mem.word(112, children);

        let node = decode_tree(&mem.view(), &test_layout(), 100).unwrap();
        let ids: Vec<u32> = node
            .children
            .as_deref()
            .unwrap()
            .iter()
            .map(|c| c.identity.as_u32())
            .collect();
        assert_eq!(ids, vec![10, 30, 20]);
        assert_eq!(node.node_count(), 4);
    }

    #[test]
    fn empty_children_is_distinct_from_absent() {
        let mut mem = GuestMemory::new();
        let tag = mem.string(1000, "div");
        mem.node(100, 0, 1, &[tag]);
        let children = mem.ptr_array(500, 550, &[]);
        mem.word(112, children);

        let node = decode_tree(&mem.view(), &test_layout(), 100).unwrap();
        assert_eq!(node.children, Some(vec![]));
    }

    #[test]
    fn attributes_retain_duplicates_in_order() {
        let mut mem = GuestMemory::new();
        let tag = mem.string(1000, "div");
        mem.node(100, 0, 1, &[tag]);

        let class = mem.string(1100, "class");
        let red = mem.string(1110, "red");
        let blue = mem.string(1120, "blue");
        // Two records of adjacent (key, value) pointers.
        mem.word(1200, class);
        mem.word(1204, red);
        mem.word(1220, class);
        mem.word(1224, blue);
        let attrs = mem.ptr_array(1300, 1350, &[1200, 1220]);
        mem.word(116, attrs);

        let node = decode_tree(&mem.view(), &test_layout(), 100).unwrap();
        assert_eq!(
            node.attributes,
            Some(vec![
                ("class".into(), "red".into()),
                ("class".into(), "blue".into()),
            ])
        );
    }

    #[test]
    fn unknown_kind_is_render_fatal() {
        let mut mem = GuestMemory::new();
        mem.node(100, 9, 1, &[]);

        let err = decode_tree(&mem.view(), &test_layout(), 100).unwrap_err();
        assert_eq!(err.code(), "E101");
        assert!(err.is_render_fatal());
    }

    #[test]
    fn null_root_is_rejected() {
        let mem = GuestMemory::new();
        let err = decode_tree(&mem.view(), &test_layout(), 0).unwrap_err();
        assert_eq!(err.code(), "E102");
    }

    #[test]
    fn generic_with_null_tag_fails() {
        let mut mem = GuestMemory::new();
        mem.node(100, 0, 1, &[0]);
        let err = decode_tree(&mem.view(), &test_layout(), 100).unwrap_err();
        assert_eq!(err.code(), "E102");
    }

    #[test]
    fn find_by_identity() {
        let mut mem = GuestMemory::new();
        let tag = mem.string(1000, "div");
        mem.node(100, 0, 1, &[tag]);
        mem.node(200, 1, 10, &[1]);
        let children = mem.ptr_array(500, 550, &[200]);
        mem.word(112, children);

        let node = decode_tree(&mem.view(), &test_layout(), 100).unwrap();
        assert!(node.find(NodeId::new(10)).is_some());
        assert!(node.find(NodeId::new(99)).is_none());
    }
}
