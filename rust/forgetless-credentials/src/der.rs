//! DER ECDSA signature parsing and low-S normalization.
//!
//! Authenticators return `SEQUENCE { INTEGER r, INTEGER s }`. The on-chain
//! verifier wants fixed-width `r` and `s` with `s` in the lower half of the
//! P-256 group order, so both halves are decoded and `s` is folded down when
//! it is high.

use alloy_primitives::{U256, uint};
use forgetless_common::left_pad;

use crate::{NormalizedSignature, PasskeyError};

/// The order `N` of the P-256 group.
pub const P256_N: U256 =
    uint!(0xFFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551_U256);

/// `N / 2`, rounded down. Signatures with `s` above this are high-S.
pub const P256_HALF_N: U256 =
    uint!(0x7FFFFFFF800000007FFFFFFFFFFFFFFFDE737D56D38BCF4279DCE5617E3192A8_U256);

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

/// Parse a DER ECDSA signature and normalize it to low-S form.
///
/// The sequence length may use the long form. Integers may carry a leading
/// `0x00` sign byte; they are read as unsigned big-endian values.
///
/// # Errors
///
/// Returns [`PasskeyError::InvalidSignatureEncoding`] for wrong tags,
/// truncation, lengths that disagree with the input, integers wider than
/// 256 bits, `r` or `s` outside `1..N`, and trailing bytes.
pub fn parse_signature(der: &[u8]) -> Result<NormalizedSignature, PasskeyError> {
    let mut reader = DerReader::new(der);

    reader.expect_tag(TAG_SEQUENCE, "SEQUENCE")?;
    let sequence_len = reader.read_length()?;
    if sequence_len != reader.remaining() {
        return Err(invalid(format!(
            "sequence length {sequence_len} does not match {} remaining bytes",
            reader.remaining()
        )));
    }

    let r = reader.read_integer("r")?;
    let s = reader.read_integer("s")?;

    if reader.remaining() != 0 {
        return Err(invalid(format!(
            "{} trailing bytes after signature",
            reader.remaining()
        )));
    }

    for (name, value) in [("r", r), ("s", s)] {
        if value.is_zero() || value >= P256_N {
            return Err(invalid(format!("{name} is outside the P-256 scalar range")));
        }
    }

    Ok(NormalizedSignature {
        r,
        s: normalize_s(s),
    })
}

/// Fold a high `s` into the lower half of the group order.
///
/// Values in `(N/2, N)` map to `N - s`. Everything else is returned as-is,
/// so the function is idempotent.
pub fn normalize_s(s: U256) -> U256 {
    if s > P256_HALF_N && s < P256_N {
        tracing::trace!("normalized high-S signature");
        P256_N - s
    } else {
        s
    }
}

/// Cursor over DER bytes that refuses to read past the end.
struct DerReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> DerReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn read_byte(&mut self, what: &str) -> Result<u8, PasskeyError> {
        let byte = self
            .bytes
            .get(self.position)
            .copied()
            .ok_or_else(|| invalid(format!("truncated at {what}")))?;
        self.position += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, len: usize, what: &str) -> Result<&'a [u8], PasskeyError> {
        let bytes: &'a [u8] = self.bytes;
        let slice = forgetless_common::take(bytes, self.position, len)
            .ok_or_else(|| invalid(format!("truncated in {what}")))?;
        self.position += len;
        Ok(slice)
    }

    fn expect_tag(&mut self, tag: u8, name: &str) -> Result<(), PasskeyError> {
        let found = self.read_byte(name)?;
        if found != tag {
            return Err(invalid(format!(
                "expected {name} tag 0x{tag:02x}, found 0x{found:02x}"
            )));
        }
        Ok(())
    }

    /// Definite-length DER length, short or long form.
    fn read_length(&mut self) -> Result<usize, PasskeyError> {
        let first = self.read_byte("length")?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        if first == 0x80 {
            return Err(invalid("indefinite length is not allowed".into()));
        }

        let count = (first - 0x80) as usize;
        if count > std::mem::size_of::<usize>() {
            return Err(invalid(format!("{count}-byte length does not fit")));
        }
        let length = self
            .read_slice(count, "long-form length")?
            .iter()
            .fold(0usize, |acc, byte| (acc << 8) | *byte as usize);
        Ok(length)
    }

    fn read_integer(&mut self, name: &str) -> Result<U256, PasskeyError> {
        self.expect_tag(TAG_INTEGER, name)?;
        let len = self.read_byte(name)?;
        if len == 0 || len >= 0x80 {
            return Err(invalid(format!("invalid {name} length 0x{len:02x}")));
        }
        let bytes = self.read_slice(len as usize, name)?;
        let word = left_pad::<32>(bytes)
            .ok_or_else(|| invalid(format!("{name} does not fit in 256 bits")))?;
        Ok(U256::from_be_bytes(word))
    }
}

fn invalid(reason: String) -> PasskeyError {
    PasskeyError::InvalidSignatureEncoding(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::{Signature, SigningKey, signature::Signer};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use testresult::TestResult;

    fn der_integer(value: U256) -> Vec<u8> {
        let bytes = value.to_be_bytes::<32>();
        let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(31);
        let mut out = vec![TAG_INTEGER];
        let body = &bytes[first..];
        if body[0] & 0x80 != 0 {
            out.push(body.len() as u8 + 1);
            out.push(0x00);
        } else {
            out.push(body.len() as u8);
        }
        out.extend_from_slice(body);
        out
    }

    fn der_signature(r: U256, s: U256) -> Vec<u8> {
        let mut body = der_integer(r);
        body.extend(der_integer(s));
        let mut out = vec![TAG_SEQUENCE, body.len() as u8];
        out.extend(body);
        out
    }

    fn sample_signature() -> Result<Signature, p256::ecdsa::Error> {
        let signing_key = SigningKey::from_bytes(&[42u8; 32].into())?;
        Ok(signing_key.sign(b"forgetless"))
    }

    #[test]
    fn it_matches_the_p256_encoder() -> TestResult {
        let signature = sample_signature()?;
        let signature = signature.normalize_s().unwrap_or(signature);
        let parsed = parse_signature(signature.to_der().as_bytes())?;

        assert_eq!(parsed.to_bytes().as_slice(), signature.to_bytes().as_slice());
        Ok(())
    }

    #[test]
    fn it_folds_high_s_into_the_lower_half() -> TestResult {
        let signature = sample_signature()?;
        let low = signature.normalize_s().unwrap_or(signature);
        let bytes = low.to_bytes();
        let r = U256::from_be_slice(&bytes[..32]);
        let s = U256::from_be_slice(&bytes[32..]);

        let parsed = parse_signature(&der_signature(r, P256_N - s))?;
        assert_eq!(parsed, NormalizedSignature { r, s });
        Ok(())
    }

    #[test]
    fn it_keeps_the_boundary_value() {
        assert_eq!(normalize_s(P256_HALF_N), P256_HALF_N);
        assert_eq!(normalize_s(P256_HALF_N + U256::from(1)), P256_HALF_N);
        assert_eq!(normalize_s(P256_N - U256::from(1)), U256::from(1));
    }

    #[test]
    fn it_accepts_long_form_sequence_length() -> TestResult {
        let short = der_signature(U256::from(5), U256::from(7));
        let mut long = vec![TAG_SEQUENCE, 0x81, short[1]];
        long.extend_from_slice(&short[2..]);

        let parsed = parse_signature(&long)?;
        assert_eq!(parsed.r, U256::from(5));
        assert_eq!(parsed.s, U256::from(7));
        Ok(())
    }

    #[test]
    fn it_accepts_unpadded_high_bit_integers() -> TestResult {
        let r = U256::from(0x80u8);
        let der = vec![TAG_SEQUENCE, 0x06, 0x02, 0x01, 0x80, 0x02, 0x01, 0x01];
        assert_eq!(parse_signature(&der)?.r, r);
        Ok(())
    }

    #[test]
    fn it_rejects_wrong_tags() {
        let valid = der_signature(U256::from(5), U256::from(7));

        let mut bad_sequence = valid.clone();
        bad_sequence[0] = 0x31;
        let mut bad_r = valid.clone();
        bad_r[2] = 0x03;
        let mut bad_s = valid.clone();
        bad_s[5] = 0x04;

        for der in [bad_sequence, bad_r, bad_s] {
            assert!(matches!(
                parse_signature(&der),
                Err(PasskeyError::InvalidSignatureEncoding(_))
            ));
        }
    }

    #[test]
    fn it_rejects_every_truncation() -> TestResult {
        let signature = sample_signature()?;
        let der = signature.to_der();
        let der = der.as_bytes();
        for len in 0..der.len() {
            assert!(
                matches!(
                    parse_signature(&der[..len]),
                    Err(PasskeyError::InvalidSignatureEncoding(_))
                ),
                "len={len}"
            );
        }
        Ok(())
    }

    #[test]
    fn it_rejects_structural_oddities() {
        let cases: Vec<Vec<u8>> = vec![
            // indefinite length
            vec![0x30, 0x80, 0x02, 0x01, 0x05, 0x02, 0x01, 0x07, 0x00, 0x00],
            // trailing byte
            vec![0x30, 0x06, 0x02, 0x01, 0x05, 0x02, 0x01, 0x07, 0x00],
            // zero-length integer
            vec![0x30, 0x05, 0x02, 0x00, 0x02, 0x01, 0x07],
            // zero r
            vec![0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x07],
            // sequence length larger than the input
            vec![0x30, 0x09, 0x02, 0x01, 0x05, 0x02, 0x01, 0x07],
        ];
        for der in cases {
            assert!(
                matches!(
                    parse_signature(&der),
                    Err(PasskeyError::InvalidSignatureEncoding(_))
                ),
                "{der:02x?}"
            );
        }
    }

    #[test]
    fn it_rejects_out_of_range_scalars() {
        let too_wide = {
            let mut body = vec![TAG_INTEGER, 33];
            body.extend_from_slice(&[0x01; 33]);
            body.extend(der_integer(U256::from(7)));
            let mut out = vec![TAG_SEQUENCE, body.len() as u8];
            out.extend(body);
            out
        };
        for der in [
            der_signature(P256_N, U256::from(7)),
            der_signature(U256::from(5), P256_N),
            too_wide,
        ] {
            assert!(matches!(
                parse_signature(&der),
                Err(PasskeyError::InvalidSignatureEncoding(_))
            ));
        }
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(bytes in any::<[u8; 32]>()) {
            let s = U256::from_be_bytes(bytes);
            let once = normalize_s(s);
            prop_assert_eq!(normalize_s(once), once);
            if s < P256_N {
                prop_assert!(once <= P256_HALF_N);
            }
        }

        #[test]
        fn parsed_signatures_are_low_s(r in 1u64.., s_bytes in any::<[u8; 32]>()) {
            let s = U256::from_be_bytes(s_bytes) % P256_N;
            prop_assume!(!s.is_zero());
            let parsed = parse_signature(&der_signature(U256::from(r), s)).unwrap();
            prop_assert!(parsed.s <= P256_HALF_N);
            prop_assert!(parsed.s == s || parsed.s == P256_N - s);
        }
    }
}
