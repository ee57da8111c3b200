//! Runtime discovery of the guest's element record layout.
//!
//! The guest's native struct layout is not hardcoded on the host. Instead
//! the guest exports a flat array of field offsets which the host reads
//! once at init and caches for the lifetime of the instance. The array
//! order is a fixed, versioned contract shared between host and guest; a
//! mismatch is a fatal integration error, not something to handle
//! defensively.

use crate::memory::MemoryView;
use trellis_core::error::{Result, TrellisError};

/// Number of words in the layout table contract.
pub const LAYOUT_WORD_COUNT: usize = 14;

// Layout array indices; must match the guest's array order.
const LAYOUT_KIND: u32 = 0;
const LAYOUT_IDENTITY: u32 = 1;
const LAYOUT_TEXT: u32 = 2;
const LAYOUT_CHILDREN: u32 = 3;
const LAYOUT_ATTRIBUTES: u32 = 4;
const LAYOUT_UNION: u32 = 5;
const LAYOUT_GENERIC_TAG: u32 = 6;
const LAYOUT_BUTTON_ON_CLICK: u32 = 7;
const LAYOUT_BUTTON_ON_CLICK_ARGS: u32 = 8;
const LAYOUT_INPUT_PLACEHOLDER: u32 = 9;
const LAYOUT_INPUT_ON_CHANGE: u32 = 10;
const LAYOUT_CANVAS_ID: u32 = 11;
const LAYOUT_CANVAS_WIDTH: u32 = 12;
const LAYOUT_CANVAS_HEIGHT: u32 = 13;

/// Offsets of the generic element's union fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericLayout {
    /// Offset of the tag-name string pointer.
    pub tag: u32,
}

/// Offsets of the button element's union fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonLayout {
    /// Offset of the click-handler presence word.
    pub on_click: u32,
    /// Offset of the guest-side handler argument word (never read by the
    /// host; the guest resolves it when the click is dispatched back).
    pub on_click_args: u32,
}

/// Offsets of the input element's union fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLayout {
    /// Offset of the placeholder string pointer.
    pub placeholder: u32,
    /// Offset of the change-handler presence word.
    pub on_change: u32,
}

/// Offsets of the canvas element's union fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    /// Offset of the target identifier string pointer.
    pub target: u32,
    /// Offset of the pixel width word.
    pub width: u32,
    /// Offset of the pixel height word.
    pub height: u32,
}

/// The guest's element record layout, discovered once at init.
///
/// Common field offsets are relative to a node's base address;
/// kind-specific offsets are relative to the union region at
/// `base + union`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLayout {
    /// Offset of the kind discriminant word.
    pub kind: u32,
    /// Offset of the stable identity word.
    pub identity: u32,
    /// Offset of the optional text string pointer.
    pub text: u32,
    /// Offset of the optional children array pointer.
    pub children: u32,
    /// Offset of the optional attribute array pointer.
    pub attributes: u32,
    /// Offset of the kind-specific union region.
    pub union: u32,
    /// Generic element union layout.
    pub generic: GenericLayout,
    /// Button element union layout.
    pub button: ButtonLayout,
    /// Input element union layout.
    pub input: InputLayout,
    /// Canvas element union layout.
    pub canvas: CanvasLayout,
}

impl ElementLayout {
    /// Read the layout table from guest memory.
    ///
    /// `table_ptr` is the address returned by the guest's layout export;
    /// `word_size` is the guest's reported word width. Each entry is read
    /// as a little-endian u32 at `table_ptr + index * word_size` (offsets
    /// above 4 GiB cannot occur in a 32-bit guest).
    ///
    /// # Errors
    /// - [`TrellisError::LayoutDiscovery`] if `table_ptr` is zero
    /// - [`TrellisError::LayoutWordSize`] if `word_size` is not 4 or 8
    /// - [`TrellisError::OutOfBounds`] if the table runs past memory
    pub fn read(view: &MemoryView<'_>, table_ptr: u32, word_size: u32) -> Result<Self> {
        if table_ptr == 0 {
            return Err(TrellisError::LayoutDiscovery {
                cause: "guest returned a null layout table address".to_string(),
            });
        }
        if word_size != 4 && word_size != 8 {
            return Err(TrellisError::LayoutWordSize { size: word_size });
        }

        let word = |index: u32| view.read_u32_at(table_ptr, index * word_size);

        Ok(Self {
            kind: word(LAYOUT_KIND)?,
            identity: word(LAYOUT_IDENTITY)?,
            text: word(LAYOUT_TEXT)?,
            children: word(LAYOUT_CHILDREN)?,
            attributes: word(LAYOUT_ATTRIBUTES)?,
            union: word(LAYOUT_UNION)?,
            generic: GenericLayout {
                tag: word(LAYOUT_GENERIC_TAG)?,
            },
            button: ButtonLayout {
                on_click: word(LAYOUT_BUTTON_ON_CLICK)?,
                on_click_args: word(LAYOUT_BUTTON_ON_CLICK_ARGS)?,
            },
            input: InputLayout {
                placeholder: word(LAYOUT_INPUT_PLACEHOLDER)?,
                on_change: word(LAYOUT_INPUT_ON_CHANGE)?,
            },
            canvas: CanvasLayout {
                target: word(LAYOUT_CANVAS_ID)?,
                width: word(LAYOUT_CANVAS_WIDTH)?,
                height: word(LAYOUT_CANVAS_HEIGHT)?,
            },
        })
    }
}
