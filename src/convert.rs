//! Adapter between a binmap and a flat byte buffer, one bit per leaf.
//!
//! Byte `i`, bit `j` (LSB first) names leaf bin `16*i + 2*j`: each input byte
//! covers 8 consecutive leaves, and the factor of 16 accounts for the
//! `Bin` encoding assigning every leaf an even raw value two apart from its
//! neighbor.

use crate::bin::Bin;
use crate::binmap::Binmap;
use crate::error::ConvertError;

/// Sets every leaf named by a set bit in `bytes`, leaving the rest
/// untouched. Infallible: any byte sequence is a valid input.
pub fn apply_bytes(binmap: &mut Binmap, bytes: &[u8]) {
    for (i, &byte) in bytes.iter().enumerate() {
        for j in 0..8u32 {
            if byte & (1 << j) != 0 {
                let leaf = 16 * i as u32 + 2 * j;
                binmap.set(Bin::from_raw(leaf));
            }
        }
    }
}

/// Decodes `text` as hex and applies it via [`apply_bytes`].
pub fn apply_hex(binmap: &mut Binmap, text: &str) -> Result<(), ConvertError> {
    let bytes = hex::decode(text)?;
    apply_bytes(binmap, &bytes);
    Ok(())
}
