//! Raw bitstring for status lists.
//!
//! Bit `i` lives at byte `i / 8`, mask `1 << (i % 8)`. Bit value 1 means
//! revoked.

use crate::codec::{b64url, b64url_decode, gzip_compress, gzip_decompress};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitstring {
    bytes: Vec<u8>,
}

impl Bitstring {
    /// An all-zero bitstring of `size_bits` bits. `size_bits` must be a
    /// multiple of 8.
    pub fn zeroed(size_bits: usize) -> Self {
        Self {
            bytes: vec![0u8; size_bits / 8],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Decode the base64url column form stored on a status list row.
    pub fn from_b64url(s: &str) -> CoreResult<Self> {
        Ok(Self {
            bytes: b64url_decode(s)?,
        })
    }

    pub fn to_b64url(&self) -> String {
        b64url(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len_bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Read bit `index`. Out-of-range reads return `false`: a credential
    /// pointing past the end of the list is treated as not revoked, since
    /// signature verification already failed upstream of any honest path
    /// that could produce such an index.
    pub fn bit(&self, index: usize) -> bool {
        if index >= self.len_bits() {
            return false;
        }
        (self.bytes[index / 8] & (1 << (index % 8))) != 0
    }

    /// Set bit `index` to 1. Setting an already-set bit is a no-op.
    pub fn set(&mut self, index: usize) -> CoreResult<()> {
        if index >= self.len_bits() {
            return Err(CoreError::Validation(format!(
                "bit index {} out of bounds for {}-bit list",
                index,
                self.len_bits()
            )));
        }
        self.bytes[index / 8] |= 1 << (index % 8);
        Ok(())
    }

    /// The smallest index whose bit is 0, scanning left to right.
    pub fn first_zero_bit(&self) -> Option<usize> {
        for (byte_i, byte) in self.bytes.iter().enumerate() {
            if *byte == 0xff {
                continue;
            }
            for bit_i in 0..8 {
                if byte & (1 << bit_i) == 0 {
                    return Some(byte_i * 8 + bit_i);
                }
            }
        }
        None
    }

    /// The published `encodedList` form: base64url(gzip(raw bytes)).
    pub fn encoded_list(&self) -> CoreResult<String> {
        Ok(b64url(&gzip_compress(&self.bytes)?))
    }

    /// Inverse of [`Bitstring::encoded_list`].
    pub fn decode_encoded_list(encoded: &str) -> CoreResult<Vec<u8>> {
        gzip_decompress(&b64url_decode(encoded)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_has_expected_width() {
        let bits = Bitstring::zeroed(16384);
        assert_eq!(bits.as_bytes().len(), 2048);
        assert_eq!(bits.len_bits(), 16384);
        assert_eq!(bits.first_zero_bit(), Some(0));
    }

    #[test]
    fn set_and_read_back() {
        let mut bits = Bitstring::zeroed(64);
        assert!(!bits.bit(9));
        bits.set(9).unwrap();
        assert!(bits.bit(9));
        // idempotent
        bits.set(9).unwrap();
        assert!(bits.bit(9));
        // neighbours untouched
        assert!(!bits.bit(8));
        assert!(!bits.bit(10));
    }

    #[test]
    fn first_zero_skips_set_bits() {
        let mut bits = Bitstring::zeroed(16);
        bits.set(0).unwrap();
        bits.set(1).unwrap();
        assert_eq!(bits.first_zero_bit(), Some(2));
    }

    #[test]
    fn full_list_has_no_free_bit() {
        let bits = Bitstring::from_bytes(vec![0xff; 4]);
        assert_eq!(bits.first_zero_bit(), None);
    }

    #[test]
    fn out_of_range_read_is_not_revoked() {
        let bits = Bitstring::zeroed(8);
        assert!(!bits.bit(8));
        assert!(!bits.bit(100_000));
    }

    #[test]
    fn out_of_range_set_is_an_error() {
        let mut bits = Bitstring::zeroed(8);
        assert!(bits.set(8).is_err());
    }

    #[test]
    fn encoded_list_roundtrip() {
        let mut bits = Bitstring::zeroed(16384);
        bits.set(3).unwrap();
        bits.set(4000).unwrap();
        let encoded = bits.encoded_list().unwrap();
        let raw = Bitstring::decode_encoded_list(&encoded).unwrap();
        assert_eq!(raw, bits.as_bytes());
    }

    #[test]
    fn b64url_column_roundtrip() {
        let mut bits = Bitstring::zeroed(32);
        bits.set(17).unwrap();
        let col = bits.to_b64url();
        assert_eq!(Bitstring::from_b64url(&col).unwrap(), bits);
    }
}
