//! Assertion pre-flight verification.
//!
//! Before a withdrawal is handed to the chain writer, the assertion is
//! checked locally the same way the on-chain verifier will check it:
//! 1. `clientDataJSON` is a `webauthn.get` ceremony whose challenge is the
//!    base64url form of the digest
//! 2. the authenticator reported user presence and user verification
//! 3. the normalized signature verifies over
//!    `authenticatorData || SHA-256(clientDataJSON)`

use alloy_primitives::B256;
use base64::Engine;
use p256::ecdsa::{Signature, signature::Verifier as _};
use sha2::{Digest, Sha256};

use crate::{AssertionError, AuthenticatorData, NormalizedSignature, P256PublicKey, RawSignature};

const CEREMONY_GET: &str = "webauthn.get";

/// Check an assertion against the credential's public key and the digest it
/// is supposed to authorize.
///
/// # Errors
///
/// Returns the first [`AssertionError`] encountered.
pub fn verify_assertion(
    public_key: &P256PublicKey,
    digest: B256,
    raw: &RawSignature,
    signature: &NormalizedSignature,
) -> Result<(), AssertionError> {
    check_client_data(&raw.client_data_json, digest)?;

    let auth_data = AuthenticatorData::parse(&raw.authenticator_data)
        .map_err(|_| AssertionError::InvalidAuthenticatorData)?;
    if !auth_data.flags.user_present() || !auth_data.flags.user_verified() {
        return Err(AssertionError::UserNotVerified);
    }

    let key = public_key
        .verifying_key()
        .map_err(|_| AssertionError::InvalidPublicKey)?;
    let ecdsa = Signature::from_slice(&signature.to_bytes())
        .map_err(|e| AssertionError::InvalidSignature(e.to_string()))?;

    key.verify(&signed_message(raw), &ecdsa)
        .map_err(|e| AssertionError::InvalidSignature(e.to_string()))
}

/// Check that `clientDataJSON` describes an assertion over `digest`.
///
/// # Errors
///
/// Returns [`AssertionError::InvalidClientData`] when the JSON or its
/// challenge cannot be decoded, [`AssertionError::UnexpectedCeremonyType`]
/// for anything other than `webauthn.get`, and
/// [`AssertionError::ChallengeMismatch`] when the challenge is not `digest`.
pub fn check_client_data(client_data_json: &[u8], digest: B256) -> Result<(), AssertionError> {
    #[derive(serde::Deserialize)]
    struct ClientData {
        #[serde(rename = "type")]
        ceremony: String,
        challenge: String,
    }

    let client_data: ClientData = serde_json::from_slice(client_data_json)
        .map_err(|e| AssertionError::InvalidClientData(e.to_string()))?;

    if client_data.ceremony != CEREMONY_GET {
        return Err(AssertionError::UnexpectedCeremonyType(client_data.ceremony));
    }

    let challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(client_data.challenge.trim_end_matches('='))
        .map_err(|e| AssertionError::InvalidClientData(e.to_string()))?;

    if challenge.as_slice() != digest.as_slice() {
        return Err(AssertionError::ChallengeMismatch);
    }

    Ok(())
}

/// `authenticatorData || SHA-256(clientDataJSON)`, the bytes the
/// authenticator signs.
pub fn signed_message(raw: &RawSignature) -> Vec<u8> {
    let client_data_hash = Sha256::digest(&raw.client_data_json);
    let mut message = Vec::with_capacity(raw.authenticator_data.len() + 32);
    message.extend_from_slice(&raw.authenticator_data);
    message.extend_from_slice(&client_data_hash);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_signature;
    use alloy_primitives::Bytes;
    use p256::ecdsa::{DerSignature, SigningKey, signature::Signer as _};

    fn client_data_json(ceremony: &str, challenge: &[u8]) -> Vec<u8> {
        let challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(challenge);
        serde_json::to_vec(&serde_json::json!({
            "type": ceremony,
            "challenge": challenge,
            "origin": "https://wallet.example",
            "crossOrigin": false
        }))
        .unwrap()
    }

    fn authenticator_data(flags: u8) -> Vec<u8> {
        let mut data = Sha256::digest(b"wallet.example").to_vec();
        data.push(flags);
        data.extend_from_slice(&[0, 0, 0, 1]);
        data
    }

    fn fixture(digest: B256) -> (P256PublicKey, RawSignature, NormalizedSignature) {
        let signing_key = SigningKey::from_bytes(&[42u8; 32].into()).unwrap();
        let mut raw = RawSignature {
            authenticator_data: authenticator_data(0x05).into(),
            client_data_json: client_data_json("webauthn.get", digest.as_slice()).into(),
            signature: Bytes::new(),
        };
        let der: DerSignature = signing_key.sign(&signed_message(&raw));
        raw.signature = Bytes::copy_from_slice(der.as_bytes());
        let normalized = parse_signature(&raw.signature).unwrap();
        (
            P256PublicKey::from(signing_key.verifying_key()),
            raw,
            normalized,
        )
    }

    #[test]
    fn it_accepts_a_genuine_assertion() {
        let digest = B256::repeat_byte(0x11);
        let (key, raw, signature) = fixture(digest);
        assert_eq!(verify_assertion(&key, digest, &raw, &signature), Ok(()));
    }

    #[test]
    fn it_rejects_a_different_digest() {
        let (key, raw, signature) = fixture(B256::repeat_byte(0x11));
        assert_eq!(
            verify_assertion(&key, B256::repeat_byte(0x22), &raw, &signature),
            Err(AssertionError::ChallengeMismatch)
        );
    }

    #[test]
    fn it_rejects_a_registration_ceremony() {
        let digest = B256::repeat_byte(0x11);
        let json = client_data_json("webauthn.create", digest.as_slice());
        assert_eq!(
            check_client_data(&json, digest),
            Err(AssertionError::UnexpectedCeremonyType("webauthn.create".into()))
        );
    }

    #[test]
    fn it_rejects_unparseable_client_data() {
        assert!(matches!(
            check_client_data(b"not json", B256::ZERO),
            Err(AssertionError::InvalidClientData(_))
        ));
    }

    #[test]
    fn it_requires_user_verification() {
        let digest = B256::repeat_byte(0x11);
        let (key, mut raw, signature) = fixture(digest);
        raw.authenticator_data = authenticator_data(0x01).into();
        assert_eq!(
            verify_assertion(&key, digest, &raw, &signature),
            Err(AssertionError::UserNotVerified)
        );
    }

    #[test]
    fn it_rejects_short_authenticator_data() {
        let digest = B256::repeat_byte(0x11);
        let (key, mut raw, signature) = fixture(digest);
        raw.authenticator_data = Bytes::from_static(&[0x05; 10]);
        assert_eq!(
            verify_assertion(&key, digest, &raw, &signature),
            Err(AssertionError::InvalidAuthenticatorData)
        );
    }

    #[test]
    fn it_rejects_a_signature_from_another_key() {
        let digest = B256::repeat_byte(0x11);
        let (_, raw, signature) = fixture(digest);
        let other = SigningKey::from_bytes(&[99u8; 32].into()).unwrap();
        let result = verify_assertion(
            &P256PublicKey::from(other.verifying_key()),
            digest,
            &raw,
            &signature,
        );
        assert!(matches!(result, Err(AssertionError::InvalidSignature(_))));
    }

    #[test]
    fn it_rejects_tampered_authenticator_data() {
        let digest = B256::repeat_byte(0x11);
        let (key, raw, signature) = fixture(digest);
        let mut tampered = raw.authenticator_data.to_vec();
        tampered[0] ^= 0xff;
        let raw = RawSignature {
            authenticator_data: tampered.into(),
            ..raw
        };
        assert!(matches!(
            verify_assertion(&key, digest, &raw, &signature),
            Err(AssertionError::InvalidSignature(_))
        ));
    }
}
