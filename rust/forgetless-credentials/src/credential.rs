//! Passkey credential and signature value types.

use alloy_primitives::{B256, Bytes, U256};
use forgetless_common::to_hex;
use p256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::PasskeyError;

/// An uncompressed P-256 public key as two 32-byte big-endian coordinates.
///
/// Values of this type have been checked to lie on the curve, either by
/// [`P256PublicKey::new`] or by the attestation extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct P256PublicKey {
    /// Affine x coordinate.
    pub x: B256,
    /// Affine y coordinate.
    pub y: B256,
}

impl P256PublicKey {
    /// Build a key from raw coordinates, validating that the point is on
    /// P-256.
    ///
    /// # Errors
    ///
    /// Returns [`PasskeyError::MalformedAttestation`] when the coordinates do
    /// not describe a curve point.
    pub fn new(x: B256, y: B256) -> Result<Self, PasskeyError> {
        let key = Self { x, y };
        key.verifying_key()?;
        Ok(key)
    }

    /// SEC1 uncompressed encoding: `0x04 ‖ x ‖ y`.
    pub fn to_sec1_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(self.x.as_slice());
        out[33..].copy_from_slice(self.y.as_slice());
        out
    }

    /// The `p256` verifying key for this point.
    ///
    /// # Errors
    ///
    /// Returns [`PasskeyError::MalformedAttestation`] when the point is not on
    /// the curve.
    pub fn verifying_key(&self) -> Result<VerifyingKey, PasskeyError> {
        VerifyingKey::from_sec1_bytes(&self.to_sec1_bytes()).map_err(|_| {
            PasskeyError::MalformedAttestation("public key is not a point on P-256".into())
        })
    }
}

impl From<&VerifyingKey> for P256PublicKey {
    fn from(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let bytes = point.as_bytes();
        Self {
            x: B256::from_slice(&bytes[1..33]),
            y: B256::from_slice(&bytes[33..65]),
        }
    }
}

/// A registered passkey as the wallet knows it.
///
/// Only public material is held here; the private key never leaves the
/// authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasskeyCredential {
    /// Opaque credential identifier chosen by the authenticator.
    pub credential_id: Bytes,
    /// The credential's P-256 public key.
    pub public_key: P256PublicKey,
    /// Human readable name shown by the platform passkey UI.
    pub display_name: String,
}

impl PasskeyCredential {
    /// The `0x`-prefixed lowercase hex form the contract keys accounts by.
    pub fn credential_id_hex(&self) -> String {
        to_hex(&self.credential_id)
    }

    pub fn public_key_x(&self) -> B256 {
        self.public_key.x
    }

    pub fn public_key_y(&self) -> B256 {
        self.public_key.y
    }
}

/// What the authenticator returned from an assertion, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignature {
    /// Authenticator data bytes, signed as-is.
    pub authenticator_data: Bytes,
    /// The exact `clientDataJSON` bytes the browser produced.
    pub client_data_json: Bytes,
    /// DER-encoded ECDSA signature over
    /// `authenticatorData ‖ SHA-256(clientDataJSON)`.
    pub signature: Bytes,
}

/// ECDSA `(r, s)` with `s` in the lower half of the group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NormalizedSignature {
    /// The `r` scalar.
    pub r: U256,
    /// The `s` scalar, at most `N / 2`.
    pub s: U256,
}

impl NormalizedSignature {
    /// `r` as a big-endian, zero-padded 32-byte word.
    pub fn r_bytes(&self) -> B256 {
        B256::from(self.r.to_be_bytes::<32>())
    }

    /// `s` as a big-endian, zero-padded 32-byte word.
    pub fn s_bytes(&self) -> B256 {
        B256::from(self.s.to_be_bytes::<32>())
    }

    /// Fixed-width `r ‖ s` form accepted by `p256`.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.r_bytes().as_slice());
        out[32..].copy_from_slice(self.s_bytes().as_slice());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    #[test]
    fn it_round_trips_a_verifying_key() -> TestResult {
        let signing_key = SigningKey::from_bytes(&[42u8; 32].into())?;
        let public_key = P256PublicKey::from(signing_key.verifying_key());

        assert_eq!(public_key.to_sec1_bytes()[0], 0x04);
        assert_eq!(&public_key.verifying_key()?, signing_key.verifying_key());
        assert_eq!(P256PublicKey::new(public_key.x, public_key.y)?, public_key);
        Ok(())
    }

    #[test]
    fn it_rejects_points_off_the_curve() {
        let result = P256PublicKey::new(B256::repeat_byte(0x01), B256::repeat_byte(0x02));
        assert!(matches!(result, Err(PasskeyError::MalformedAttestation(_))));
    }

    #[test]
    fn it_renders_the_credential_id_as_prefixed_hex() -> TestResult {
        let signing_key = SigningKey::from_bytes(&[7u8; 32].into())?;
        let credential = PasskeyCredential {
            credential_id: Bytes::from_static(&[0xab, 0xcd, 0x01]),
            public_key: P256PublicKey::from(signing_key.verifying_key()),
            display_name: "Wallet".into(),
        };
        assert_eq!(credential.credential_id_hex(), "0xabcd01");
        assert_eq!(credential.public_key_x(), credential.public_key.x);
        Ok(())
    }

    #[test]
    fn it_pads_small_scalars() {
        let signature = NormalizedSignature {
            r: U256::from(1u8),
            s: U256::from(0x0102u16),
        };
        assert_eq!(signature.r_bytes()[31], 0x01);
        assert!(signature.r_bytes()[..31].iter().all(|byte| *byte == 0));
        assert_eq!(&signature.to_bytes()[62..], &[0x01, 0x02]);
    }
}
