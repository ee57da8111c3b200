//! Trellis Core Library
//!
//! Foundational types for the trellis UI bridge: a host-side layer that
//! decodes a tree of interactive UI nodes out of a sandboxed guest's
//! linear memory and relays user events back into the guest.
//!
//! This crate is deliberately free of any WASM runtime dependency so the
//! decoding primitives can be tested against plain byte buffers.
//!
//! # Key Components
//!
//! - **Error**: the `TrellisError` taxonomy with stable error codes
//! - **Types**: strongly-typed identifiers (`NodeId`, `InstanceId`,
//!   `CallbackKey`)
//! - **Schema**: a declarative struct/union schema model and the reader
//!   that decodes schema-shaped values out of a byte buffer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod schema;
pub mod types;

pub use error::{Result, TrellisError};
pub use schema::{DecodedValue, Member, PrimitiveKind, Scalar, Schema};
pub use types::{CallbackKey, InstanceId, NodeId};
