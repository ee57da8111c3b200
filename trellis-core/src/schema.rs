//! Declarative schema model and schema-driven buffer reader.
//!
//! Where the host knows, at build time, the exact layout the guest will
//! produce (diagnostic and config records such as the raster frame
//! descriptor), it describes that layout as a [`Schema`] and decodes it
//! with [`read_value`] instead of hand-writing offset arithmetic.
//!
//! Struct members are laid out sequentially with cumulative offsets; union
//! members all overlap at offset zero and the union's size is the largest
//! member's size. Which union member is semantically valid is decided by a
//! discriminant that always lives in a sibling field, never inside the
//! union itself, so the reader decodes every member and leaves selection
//! to the caller.

use crate::error::{Result, TrellisError};

/// The closed set of primitive kinds a guest record can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// 32-bit unsigned integer, little-endian.
    U32,
    /// 16-bit unsigned integer, little-endian.
    U16,
    /// 8-bit unsigned integer.
    U8,
    /// IEEE-754 32-bit float, little-endian.
    F32,
    /// Single byte, zero = false.
    Bool,
}

impl PrimitiveKind {
    /// Size of this primitive in bytes.
    #[must_use]
    pub const fn byte_size(self) -> u32 {
        match self {
            Self::U32 | Self::F32 => 4,
            Self::U16 => 2,
            Self::U8 | Self::Bool => 1,
        }
    }
}

/// A named member of a struct or union schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Field name, used for lookup on the decoded value.
    pub name: &'static str,
    /// The member's own schema.
    pub schema: Schema,
}

impl Member {
    /// Create a new named member.
    #[must_use]
    pub fn new(name: &'static str, schema: Schema) -> Self {
        Self { name, schema }
    }
}

/// A schema node: a primitive leaf or a composite of named members.
///
/// Schemas are plain data, immutable once constructed, and cheap enough to
/// build on demand wherever they are needed.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// A primitive leaf.
    Primitive(PrimitiveKind),
    /// Sequential members; size is the sum of member sizes.
    Struct(Vec<Member>),
    /// Overlapping members at offset zero; size is the max member size.
    Union(Vec<Member>),
}

impl Schema {
    /// Shorthand for a u32 leaf.
    #[must_use]
    pub const fn uint32() -> Self {
        Self::Primitive(PrimitiveKind::U32)
    }

    /// Shorthand for a u16 leaf.
    #[must_use]
    pub const fn uint16() -> Self {
        Self::Primitive(PrimitiveKind::U16)
    }

    /// Shorthand for a u8 leaf.
    #[must_use]
    pub const fn uint8() -> Self {
        Self::Primitive(PrimitiveKind::U8)
    }

    /// Shorthand for an f32 leaf.
    #[must_use]
    pub const fn float32() -> Self {
        Self::Primitive(PrimitiveKind::F32)
    }

    /// Shorthand for a bool leaf.
    #[must_use]
    pub const fn boolean() -> Self {
        Self::Primitive(PrimitiveKind::Bool)
    }

    /// Total byte size of a value with this schema.
    ///
    /// Struct size is the sum of member sizes; union size is the maximum.
    #[must_use]
    pub fn byte_size(&self) -> u32 {
        match self {
            Self::Primitive(kind) => kind.byte_size(),
            Self::Struct(members) => members.iter().map(|m| m.schema.byte_size()).sum(),
            Self::Union(members) => members
                .iter()
                .map(|m| m.schema.byte_size())
                .max()
                .unwrap_or(0),
        }
    }
}

/// A decoded primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Decoded u32.
    U32(u32),
    /// Decoded u16.
    U16(u16),
    /// Decoded u8.
    U8(u8),
    /// Decoded f32.
    F32(f32),
    /// Decoded bool.
    Bool(bool),
}

impl Scalar {
    /// Get the value as a u32, widening smaller integers.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            Self::U16(v) => Some(u32::from(*v)),
            Self::U8(v) => Some(u32::from(*v)),
            Self::F32(_) | Self::Bool(_) => None,
        }
    }

    /// Get the value as an f32.
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a bool.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// A decoded value mirroring the shape of the schema it was read with.
///
/// Every level carries its own byte size so a caller can advance a cursor
/// through a buffer without recomputing sizes from the schema.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    /// A decoded primitive leaf.
    Primitive {
        /// The decoded scalar.
        value: Scalar,
        /// Size of the leaf in bytes.
        size: u32,
    },
    /// A decoded struct or union.
    Record {
        /// Decoded members in schema order.
        fields: Vec<(&'static str, DecodedValue)>,
        /// Size of the whole record in bytes.
        size: u32,
    },
}

impl DecodedValue {
    /// Byte size of this value.
    #[must_use]
    pub fn byte_size(&self) -> u32 {
        match self {
            Self::Primitive { size, .. } | Self::Record { size, .. } => *size,
        }
    }

    /// Look up a member of a decoded record by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&DecodedValue> {
        match self {
            Self::Record { fields, .. } => fields
                .iter()
                .find(|(field_name, _)| *field_name == name)
                .map(|(_, value)| value),
            Self::Primitive { .. } => None,
        }
    }

    /// Get the scalar of a decoded primitive leaf.
    #[must_use]
    pub fn scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Primitive { value, .. } => Some(value),
            Self::Record { .. } => None,
        }
    }

    /// Convenience: look up a field and read it as a u32.
    #[must_use]
    pub fn field_u32(&self, name: &str) -> Option<u32> {
        self.field(name).and_then(|v| v.scalar()).and_then(Scalar::as_u32)
    }
}

fn read_slice(bytes: &[u8], address: u32, len: u32) -> Result<&[u8]> {
    let start = address as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or(TrellisError::OutOfBounds {
            address,
            len,
            memory_size: bytes.len(),
        })?;
    bytes.get(start..end).ok_or(TrellisError::OutOfBounds {
        address,
        len,
        memory_size: bytes.len(),
    })
}

fn read_primitive(bytes: &[u8], address: u32, kind: PrimitiveKind) -> Result<DecodedValue> {
    let size = kind.byte_size();
    let raw = read_slice(bytes, address, size)?;
    let value = match kind {
        PrimitiveKind::U32 => Scalar::U32(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        PrimitiveKind::U16 => Scalar::U16(u16::from_le_bytes([raw[0], raw[1]])),
        PrimitiveKind::U8 => Scalar::U8(raw[0]),
        PrimitiveKind::F32 => Scalar::F32(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        PrimitiveKind::Bool => Scalar::Bool(raw[0] != 0),
    };
    Ok(DecodedValue::Primitive { value, size })
}

/// Read a schema-shaped value out of a byte buffer at the given address.
///
/// Struct members are read at strictly increasing offsets starting at
/// `address`; union members are all read at `address` itself and the
/// record's size is the largest member's size. Every read is bounds-checked
/// against the buffer.
///
/// # Errors
/// Returns [`TrellisError::OutOfBounds`] if any read falls outside the
/// buffer.
pub fn read_value(bytes: &[u8], address: u32, schema: &Schema) -> Result<DecodedValue> {
    match schema {
        Schema::Primitive(kind) => read_primitive(bytes, address, *kind),
        Schema::Struct(members) => {
            let mut fields = Vec::with_capacity(members.len());
            let mut cursor = address;
            let mut size = 0u32;
            for member in members {
                let value = read_value(bytes, cursor, &member.schema)?;
                let member_size = value.byte_size();
                cursor += member_size;
                size += member_size;
                fields.push((member.name, value));
            }
            Ok(DecodedValue::Record { fields, size })
        }
        Schema::Union(members) => {
            let mut fields = Vec::with_capacity(members.len());
            let mut size = 0u32;
            for member in members {
                let value = read_value(bytes, address, &member.schema)?;
                size = size.max(value.byte_size());
                fields.push((member.name, value));
            }
            Ok(DecodedValue::Record { fields, size })
        }
    }
}
