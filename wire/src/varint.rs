//! Base-128 varint and fixed-width primitives.

use crate::error::{DecodeError, WireResult};

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Reads a varint starting at `offset`.
///
/// Returns the decoded value and the offset just past it.
pub fn read_varint(buf: &[u8], offset: usize) -> WireResult<(u64, usize)> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let pos = offset + i;
        let Some(&byte) = buf.get(pos) else {
            return Err(DecodeError::Truncated {
                offset,
                needed: i + 1,
                available: buf.len().saturating_sub(offset),
            });
        };
        // The tenth byte may only carry the top bit of a u64.
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(DecodeError::InvalidVarint { offset });
        }
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, pos + 1));
        }
    }
    Err(DecodeError::InvalidVarint { offset })
}

/// Appends `value` as a varint.
pub fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Returns the number of bytes `value` occupies as a varint.
#[must_use]
pub const fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Reads a little-endian fixed32 starting at `offset`.
pub fn read_fixed32(buf: &[u8], offset: usize) -> WireResult<(u32, usize)> {
    let bytes = fixed_slice::<4>(buf, offset)?;
    Ok((u32::from_le_bytes(bytes), offset + 4))
}

/// Reads a little-endian fixed64 starting at `offset`.
pub fn read_fixed64(buf: &[u8], offset: usize) -> WireResult<(u64, usize)> {
    let bytes = fixed_slice::<8>(buf, offset)?;
    Ok((u64::from_le_bytes(bytes), offset + 8))
}

fn fixed_slice<const N: usize>(buf: &[u8], offset: usize) -> WireResult<[u8; N]> {
    buf.get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(DecodeError::Truncated {
            offset,
            needed: N,
            available: buf.len().saturating_sub(offset),
        })
}
