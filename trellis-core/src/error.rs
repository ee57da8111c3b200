//! Error types for the trellis bridge.
//!
//! Errors carry stable `Exxx` codes grouped by failure class. The classes
//! drive handling policy: integration errors are fatal for the instance,
//! decode errors abandon the current render, guest-side runtime errors are
//! logged and skipped, and nothing is ever retried automatically.

use crate::types::InstanceId;
use thiserror::Error;

/// The main error type for trellis operations.
#[derive(Error, Debug)]
pub enum TrellisError {
    // =========================================================================
    // Integration/version errors (E001-E099)
    // =========================================================================
    /// The guest module does not export a required function or memory.
    #[error("E001: Guest does not export '{name}' (host/guest version skew)")]
    MissingExport {
        /// Name of the missing export.
        name: String,
    },

    /// The layout discovery call returned an unusable table.
    #[error("E002: Layout discovery failed: {cause}")]
    LayoutDiscovery {
        /// Reason the layout table could not be read.
        cause: String,
    },

    /// The guest reported a layout word size the host cannot interpret.
    #[error("E003: Unsupported layout word size {size} (expected 4 or 8)")]
    LayoutWordSize {
        /// The reported word size in bytes.
        size: u32,
    },

    /// The guest module bytes failed to compile.
    #[error("E004: Failed to load guest module '{module}': {cause}")]
    ModuleLoad {
        /// The module that failed to load.
        module: String,
        /// Reason for the load failure.
        cause: String,
    },

    /// Instantiation of a compiled module failed.
    #[error("E005: Failed to instantiate guest module: {cause}")]
    Instantiate {
        /// Reason for the instantiation failure.
        cause: String,
    },

    /// A host import function could not be registered.
    #[error("E006: Host function '{function}' registration failed: {cause}")]
    HostFunction {
        /// The host function name.
        function: String,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Decode errors (E101-E199)
    // =========================================================================
    /// A node carried a kind discriminant outside the closed set.
    #[error("E101: Unknown element kind {kind} at address {address:#x}")]
    UnknownElementKind {
        /// The unrecognized discriminant word.
        kind: u32,
        /// Address of the offending node record.
        address: u32,
    },

    /// A zero address reached a routine that requires a value.
    #[error("E102: Null pointer dereference while reading {context}")]
    NullPointer {
        /// What was being read when the zero address was found.
        context: &'static str,
    },

    /// A string ran past the end of guest memory without a NUL terminator.
    #[error("E103: Unterminated string at address {address:#x}")]
    UnterminatedString {
        /// Address where the scan started.
        address: u32,
    },

    /// Guest string bytes were not valid UTF-8.
    #[error("E104: Invalid UTF-8 in guest string at address {address:#x}: {cause}")]
    InvalidUtf8 {
        /// Address of the string.
        address: u32,
        /// Decode failure detail.
        cause: String,
    },

    /// A read or write fell outside guest linear memory.
    #[error(
        "E105: Guest memory access out of bounds: address {address:#x}, len {len}, memory size {memory_size}"
    )]
    OutOfBounds {
        /// Requested address.
        address: u32,
        /// Requested length in bytes.
        len: u32,
        /// Current size of guest linear memory.
        memory_size: usize,
    },

    // =========================================================================
    // Guest-side runtime errors (E201-E299), logged and skipped
    // =========================================================================
    /// A raster descriptor violated the stride invariant.
    #[error("E201: Raster stride {stride} does not equal width {width}; blit skipped")]
    RasterStride {
        /// Pixel width of the frame.
        width: u32,
        /// Row stride reported by the guest.
        stride: u32,
    },

    /// No host-native target exists for a requested raster blit.
    #[error("E202: Raster target '{target}' not found; blit skipped")]
    RasterTargetMissing {
        /// The target identifier string from the guest.
        target: String,
    },

    // =========================================================================
    // Resource errors (E301-E399)
    // =========================================================================
    /// The render backend failed to mount, patch, or unmount a tree.
    #[error("E301: Render backend failure for {instance}: {cause}")]
    Backend {
        /// The component instance involved.
        instance: InstanceId,
        /// Reason for the backend failure.
        cause: String,
    },

    // =========================================================================
    // Guest call errors (E401-E499)
    // =========================================================================
    /// A call into a guest export trapped or otherwise failed.
    #[error("E401: Guest call '{function}' failed: {cause}")]
    GuestCall {
        /// The guest export that was invoked.
        function: &'static str,
        /// Trap or failure detail.
        cause: String,
    },

    /// A render was requested while another render was already in flight.
    #[error("E402: Reentrant render rejected")]
    ReentrantRender,
}

impl TrellisError {
    /// Get the stable error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingExport { .. } => "E001",
            Self::LayoutDiscovery { .. } => "E002",
            Self::LayoutWordSize { .. } => "E003",
            Self::ModuleLoad { .. } => "E004",
            Self::Instantiate { .. } => "E005",
            Self::HostFunction { .. } => "E006",
            Self::UnknownElementKind { .. } => "E101",
            Self::NullPointer { .. } => "E102",
            Self::UnterminatedString { .. } => "E103",
            Self::InvalidUtf8 { .. } => "E104",
            Self::OutOfBounds { .. } => "E105",
            Self::RasterStride { .. } => "E201",
            Self::RasterTargetMissing { .. } => "E202",
            Self::Backend { .. } => "E301",
            Self::GuestCall { .. } => "E401",
            Self::ReentrantRender => "E402",
        }
    }

    /// Check if this is an integration/version error (fatal for the instance).
    #[must_use]
    pub fn is_integration(&self) -> bool {
        matches!(
            self,
            Self::MissingExport { .. }
                | Self::LayoutDiscovery { .. }
                | Self::LayoutWordSize { .. }
                | Self::ModuleLoad { .. }
                | Self::Instantiate { .. }
                | Self::HostFunction { .. }
        )
    }

    /// Check if this error abandons the current render.
    ///
    /// A render that hits one of these is surfaced to the caller; a
    /// partially decoded tree is never reconciled.
    #[must_use]
    pub fn is_render_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownElementKind { .. }
                | Self::NullPointer { .. }
                | Self::UnterminatedString { .. }
                | Self::InvalidUtf8 { .. }
                | Self::OutOfBounds { .. }
                | Self::GuestCall { .. }
                | Self::ReentrantRender
        )
    }

    /// Check if this error is reported and skipped without aborting the render.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::RasterStride { .. } | Self::RasterTargetMissing { .. }
        )
    }
}

/// Result type alias using `TrellisError`.
pub type Result<T> = std::result::Result<T, TrellisError>;
