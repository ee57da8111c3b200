//! Bounds-checked views over guest linear memory.
//!
//! Every read takes an address and a required size and fails with a bounds
//! error rather than trusting guest-supplied offsets. The view borrows the
//! memory snapshot for the duration of one host callback only; the guest
//! may reuse or free any backing bytes afterward, so all decoded strings
//! are copied out.

use trellis_core::error::{Result, TrellisError};

/// Wire format header size of a dynamic pointer array:
/// `{ length: u32, _reserved: u32, items_ptr: u32 }`.
const PTR_ARRAY_ITEMS_OFFSET: u32 = 8;

/// A read-only, bounds-checked view over guest linear memory.
#[derive(Debug, Clone, Copy)]
pub struct MemoryView<'a> {
    data: &'a [u8],
}

impl<'a> MemoryView<'a> {
    /// Create a view over a memory snapshot.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Size of the underlying memory in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the memory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn slice(&self, address: u32, len: u32) -> Result<&'a [u8]> {
        let start = address as usize;
        let end = start
            .checked_add(len as usize)
            .ok_or(TrellisError::OutOfBounds {
                address,
                len,
                memory_size: self.data.len(),
            })?;
        self.data.get(start..end).ok_or(TrellisError::OutOfBounds {
            address,
            len,
            memory_size: self.data.len(),
        })
    }

    /// Read a little-endian u32 at the given address.
    ///
    /// # Errors
    /// Returns [`TrellisError::OutOfBounds`] if the read falls outside
    /// memory.
    pub fn read_u32(&self, address: u32) -> Result<u32> {
        let raw = self.slice(address, 4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Read a little-endian u32 at `base + offset`.
    ///
    /// Base and offset are both guest-supplied, so the sum is checked
    /// rather than trusted.
    ///
    /// # Errors
    /// Returns [`TrellisError::OutOfBounds`] if the address overflows or
    /// the read falls outside memory.
    pub fn read_u32_at(&self, base: u32, offset: u32) -> Result<u32> {
        let address = base.checked_add(offset).ok_or(TrellisError::OutOfBounds {
            address: base,
            len: offset,
            memory_size: self.data.len(),
        })?;
        self.read_u32(address)
    }

    /// Read `len` raw bytes starting at the given address.
    ///
    /// # Errors
    /// Returns [`TrellisError::OutOfBounds`] if the read falls outside
    /// memory.
    pub fn read_bytes(&self, address: u32, len: u32) -> Result<&'a [u8]> {
        self.slice(address, len)
    }

    /// Read a NUL-terminated UTF-8 string starting at the given address.
    ///
    /// The bytes are copied out of the view; a zero address is always a
    /// decode error here. Callers check optional pointer fields for zero
    /// before ever reaching this routine.
    ///
    /// # Errors
    /// - [`TrellisError::NullPointer`] if `address` is zero
    /// - [`TrellisError::UnterminatedString`] if no NUL byte is found
    ///   before the end of memory
    /// - [`TrellisError::InvalidUtf8`] if the bytes are not valid UTF-8
    pub fn read_cstr(&self, address: u32) -> Result<String> {
        if address == 0 {
            return Err(TrellisError::NullPointer {
                context: "guest string",
            });
        }

        let start = address as usize;
        let tail = self
            .data
            .get(start..)
            .ok_or(TrellisError::OutOfBounds {
                address,
                len: 1,
                memory_size: self.data.len(),
            })?;

        let nul = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(TrellisError::UnterminatedString { address })?;

        String::from_utf8(tail[..nul].to_vec()).map_err(|e| TrellisError::InvalidUtf8 {
            address,
            cause: e.to_string(),
        })
    }

    /// Read a dynamic pointer array: `{length, _reserved, items_ptr}`
    /// followed by `length` contiguous little-endian addresses at
    /// `items_ptr`. Array order is preserved.
    ///
    /// # Errors
    /// Returns [`TrellisError::OutOfBounds`] if the header or the item run
    /// falls outside memory.
    pub fn read_ptr_array(&self, address: u32) -> Result<Vec<u32>> {
        let length = self.read_u32(address)?;
        let items_ptr = self.read_u32_at(address, PTR_ARRAY_ITEMS_OFFSET)?;

        // Capacity is capped: a nonsense length fails its first item read
        // before it can ask for a huge allocation.
        let mut items = Vec::with_capacity(length.min(4096) as usize);
        for i in 0..length {
            let offset = i.checked_mul(4).ok_or(TrellisError::OutOfBounds {
                address: items_ptr,
                len: u32::MAX,
                memory_size: self.data.len(),
            })?;
            items.push(self.read_u32_at(items_ptr, offset)?);
        }
        Ok(items)
    }
}

/// Write a string's UTF-8 bytes followed by one NUL byte into guest memory
/// at the given address.
///
/// The write is bounds-checked against linear memory; keeping the value
/// within whatever buffer the guest actually allocated is the caller's
/// (ultimately the guest's) contract.
///
/// # Errors
/// Returns [`TrellisError::OutOfBounds`] if the bytes plus terminator do
/// not fit in memory.
pub fn write_cstr(data: &mut [u8], address: u32, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let memory_size = data.len();
    let start = address as usize;
    let end = start
        .checked_add(bytes.len())
        .and_then(|n| n.checked_add(1))
        .ok_or(TrellisError::OutOfBounds {
            address,
            len: bytes.len() as u32 + 1,
            memory_size,
        })?;

    let dest = data.get_mut(start..end).ok_or(TrellisError::OutOfBounds {
        address,
        len: bytes.len() as u32 + 1,
        memory_size,
    })?;
    dest[..bytes.len()].copy_from_slice(bytes);
    dest[bytes.len()] = 0;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(writes: &[(u32, &[u8])]) -> Vec<u8> {
        let mut data = vec![0u8; 256];
        for (address, bytes) in writes {
            let start = *address as usize;
            data[start..start + bytes.len()].copy_from_slice(bytes);
        }
        data
    }

    #[test]
    fn read_u32_little_endian() {
        let data = memory_with(&[(4, &0x0102_0304u32.to_le_bytes())]);
        let view = MemoryView::new(&data);
        assert_eq!(view.read_u32(4).unwrap(), 0x0102_0304);
    }

    #[test]
    fn read_u32_out_of_bounds() {
        let data = vec![0u8; 6];
        let view = MemoryView::new(&data);
        let err = view.read_u32(4).unwrap_err();
        assert_eq!(err.code(), "E105");
    }

    #[test]
    fn read_cstr_copies_out() {
        let data = memory_with(&[(10, b"hello\0")]);
        let view = MemoryView::new(&data);
        assert_eq!(view.read_cstr(10).unwrap(), "hello");
    }

    #[test]
    fn read_cstr_null_pointer_is_fatal() {
        let data = vec![0u8; 16];
        let view = MemoryView::new(&data);
        let err = view.read_cstr(0).unwrap_err();
        assert_eq!(err.code(), "E102");
    }

    #[test]
    fn read_cstr_unterminated() {
        let mut data = vec![0u8; 8];
        data[4..8].copy_from_slice(b"abcd");
        let view = MemoryView::new(&data);
        let err = view.read_cstr(4).unwrap_err();
        assert_eq!(err.code(), "E103");
    }

    #[test]
    fn read_cstr_invalid_utf8() {
        let data = memory_with(&[(4, &[0xFF, 0xFE, 0x00])]);
        let view = MemoryView::new(&data);
        let err = view.read_cstr(4).unwrap_err();
        assert_eq!(err.code(), "E104");
    }

    #[test]
    fn ptr_array_preserves_order() {
        // Header at 16: length 3, reserved, items at 64.
        let data = memory_with(&[
            (16, &3u32.to_le_bytes()),
            (24, &64u32.to_le_bytes()),
            (64, &100u32.to_le_bytes()),
            (68, &200u32.to_le_bytes()),
            (72, &150u32.to_le_bytes()),
        ]);
        let view = MemoryView::new(&data);
        assert_eq!(view.read_ptr_array(16).unwrap(), vec![100, 200, 150]);
    }

    #[test]
    fn ptr_array_length_zero() {
        let data = memory_with(&[(16, &0u32.to_le_bytes()), (24, &64u32.to_le_bytes())]);
        let view = MemoryView::new(&data);
        assert!(view.read_ptr_array(16).unwrap().is_empty());
    }

    #[test]
    fn ptr_array_items_out_of_bounds() {
        let data = memory_with(&[
            (16, &4u32.to_le_bytes()),
            (24, &250u32.to_le_bytes()),
        ]);
        let view = MemoryView::new(&data);
        assert_eq!(view.read_ptr_array(16).unwrap_err().code(), "E105");
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut data = vec![0u8; 64];
        write_cstr(&mut data, 20, "szia világ").unwrap();
        let view = MemoryView::new(&data);
        assert_eq!(view.read_cstr(20).unwrap(), "szia világ");
    }

    #[test]
    fn write_cstr_out_of_bounds() {
        let mut data = vec![0u8; 8];
        let err = write_cstr(&mut data, 4, "too long").unwrap_err();
        assert_eq!(err.code(), "E105");
        match err {
            TrellisError::OutOfBounds {
                address,
                len,
                memory_size,
            } => {
                assert_eq!(address, 4);
                assert_eq!(len, 9);
                assert_eq!(memory_size, 8);
            }
            other => panic!("expected bounds error, got {}", other),
        }
        // A failed write leaves memory untouched.
        assert_eq!(data, vec![0u8; 8]);
    }

    #[test]
    fn write_cstr_empty_string() {
        let mut data = vec![1u8; 8];
        write_cstr(&mut data, 2, "").unwrap();
        let view = MemoryView::new(&data);
        assert_eq!(view.read_cstr(2).unwrap(), "");
    }
}
