//! Bounds-checked big-endian byte handling and `0x` hex conversion.
//!
//! Every reader here returns `None` instead of panicking when the requested
//! range runs past the end of the input, so binary parsers can turn a
//! truncated buffer into a typed error with a single `ok_or`.

use alloy_primitives::hex;
use thiserror::Error;

/// Errors produced when converting hex text to bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    /// The text is not valid hex (bad digit or odd length).
    #[error("invalid hex: {0}")]
    Invalid(String),
}

/// Borrow `len` bytes starting at `offset`.
pub fn take(bytes: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = offset.checked_add(len)?;
    bytes.get(offset..end)
}

/// Borrow exactly `N` bytes starting at `offset` as a fixed array.
pub fn take_array<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    take(bytes, offset, N)?.try_into().ok()
}

/// Read a big-endian `u16` at `offset`.
pub fn read_u16_be(bytes: &[u8], offset: usize) -> Option<u16> {
    take_array::<2>(bytes, offset).map(u16::from_be_bytes)
}

/// Read a big-endian `u32` at `offset`.
pub fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    take_array::<4>(bytes, offset).map(u32::from_be_bytes)
}

/// Left-pad a big-endian unsigned integer to exactly `N` bytes.
///
/// Leading zero bytes are not significant and are dropped first, so a
/// 33-byte DER integer with a sign-padding `0x00` still fits in 32 bytes.
/// Returns `None` when the significant bytes do not fit.
pub fn left_pad<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
    let significant = &bytes[first..];
    if significant.len() > N {
        return None;
    }
    let mut out = [0u8; N];
    out[N - significant.len()..].copy_from_slice(significant);
    Some(out)
}

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode_prefixed(bytes)
}

/// Decode hex text, with or without a `0x` prefix.
///
/// # Errors
///
/// Returns [`HexError::Invalid`] for odd-length input or non-hex digits.
pub fn from_hex(text: &str) -> Result<Vec<u8>, HexError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(digits).map_err(|e| HexError::Invalid(e.to_string()))
}

/// Abbreviated hex for log lines: the first four and last two bytes.
///
/// Short inputs are printed whole.
pub fn short_hex(bytes: impl AsRef<[u8]>) -> String {
    let bytes = bytes.as_ref();
    if bytes.len() <= 8 {
        return to_hex(bytes);
    }
    format!(
        "{}...{}",
        to_hex(&bytes[..4]),
        hex::encode(&bytes[bytes.len() - 2..])
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn it_reads_big_endian_integers() {
        let bytes = [0x00, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(read_u16_be(&bytes, 0), Some(0x0001));
        assert_eq!(read_u16_be(&bytes, 3), Some(0x0304));
        assert_eq!(read_u32_be(&bytes, 1), Some(0x0102_0304));
    }

    #[test]
    fn it_refuses_reads_past_the_end() {
        let bytes = [0xaa, 0xbb];
        assert_eq!(read_u16_be(&bytes, 1), None);
        assert_eq!(read_u32_be(&bytes, 0), None);
        assert_eq!(take(&bytes, usize::MAX, 2), None);
        assert_eq!(take(&bytes, 2, 0), Some(&[][..]));
    }

    #[test]
    fn it_left_pads_integers() {
        assert_eq!(left_pad::<4>(&[0x01, 0x02]), Some([0, 0, 0x01, 0x02]));
        assert_eq!(left_pad::<2>(&[0x00, 0x00, 0xff, 0x01]), Some([0xff, 0x01]));
        assert_eq!(left_pad::<2>(&[0x01, 0x00, 0x00]), None);
        assert_eq!(left_pad::<2>(&[]), Some([0, 0]));
    }

    #[test]
    fn it_converts_hex_with_and_without_prefix() {
        assert_eq!(to_hex([0xde, 0xad, 0xbe, 0xef]), "0xdeadbeef");
        assert_eq!(from_hex("0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(from_hex("DEADBEEF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(from_hex("0x").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn it_rejects_invalid_hex() {
        assert!(matches!(from_hex("0xabc"), Err(HexError::Invalid(_))));
        assert!(matches!(from_hex("zz"), Err(HexError::Invalid(_))));
    }

    #[test]
    fn it_abbreviates_long_identifiers() {
        let id = (0u8..16).collect::<Vec<_>>();
        assert_eq!(short_hex(&id), "0x00010203...0e0f");
        assert_eq!(short_hex([0xab]), "0xab");
    }

    proptest! {
        #[test]
        fn left_pad_preserves_value(value in any::<u64>()) {
            let padded = left_pad::<32>(&value.to_be_bytes()).unwrap();
            prop_assert_eq!(&padded[24..], &value.to_be_bytes()[..]);
            prop_assert!(padded[..24].iter().all(|byte| *byte == 0));
        }
    }
}
