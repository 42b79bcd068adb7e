//! Attestation object and COSE key decoding.
//!
//! A registration ceremony hands back a CBOR attestation object of the form
//! `{"fmt": .., "attStmt": .., "authData": bytes}`. The authenticator data
//! inside it has a fixed binary prefix followed by the attested credential:
//!
//! ```text
//! rpIdHash (32) | flags (1) | signCount (4, BE)
//!   | aaguid (16) | credentialIdLength (2, BE) | credentialId (n)
//!   | credentialPublicKey (COSE_Key, CBOR map)
//!   | extensions (CBOR, only when the ED flag is set)
//! ```
//!
//! Only ES256 keys on P-256 are accepted.

use std::io::Cursor;

use alloy_primitives::{B256, Bytes};
use ciborium::Value;
use forgetless_common::{read_u16_be, read_u32_be, short_hex, take, take_array};

use crate::{P256PublicKey, PasskeyError};

/// COSE key type label.
pub const COSE_KTY: i128 = 1;
/// COSE algorithm label.
pub const COSE_ALG: i128 = 3;
/// EC2 curve label.
pub const COSE_CRV: i128 = -1;
/// EC2 x coordinate label.
pub const COSE_X: i128 = -2;
/// EC2 y coordinate label.
pub const COSE_Y: i128 = -3;

/// `kty` value for double-coordinate elliptic curve keys.
pub const COSE_KTY_EC2: i128 = 2;
/// `alg` value for ECDSA with SHA-256.
pub const COSE_ALG_ES256: i128 = -7;
/// `crv` value for NIST P-256.
pub const COSE_CRV_P256: i128 = 1;

const RP_ID_HASH_LEN: usize = 32;
const FLAGS_OFFSET: usize = 32;
const SIGN_COUNT_OFFSET: usize = 33;
const AAGUID_OFFSET: usize = 37;
const CREDENTIAL_ID_LEN_OFFSET: usize = 53;
const CREDENTIAL_ID_OFFSET: usize = 55;

/// The fixed-size header every authenticator data carries.
pub const AUTHENTICATOR_DATA_MIN_LEN: usize = 37;

/// Authenticator data flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthenticatorFlags(pub u8);

impl AuthenticatorFlags {
    /// UP: the user touched the authenticator.
    pub const USER_PRESENT: u8 = 0x01;
    /// UV: the user was verified (biometric or PIN).
    pub const USER_VERIFIED: u8 = 0x04;
    /// AT: attested credential data follows the header.
    pub const ATTESTED_CREDENTIAL: u8 = 0x40;
    /// ED: extension data follows the credential.
    pub const EXTENSION_DATA: u8 = 0x80;

    /// Whether UP is set.
    pub fn user_present(self) -> bool {
        self.0 & Self::USER_PRESENT != 0
    }

    /// Whether UV is set.
    pub fn user_verified(self) -> bool {
        self.0 & Self::USER_VERIFIED != 0
    }

    /// Whether AT is set.
    pub fn has_attested_credential(self) -> bool {
        self.0 & Self::ATTESTED_CREDENTIAL != 0
    }

    /// Whether ED is set.
    pub fn has_extensions(self) -> bool {
        self.0 & Self::EXTENSION_DATA != 0
    }
}

/// The credential an authenticator attested to during registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredential {
    /// Authenticator model identifier (all zeros under `none` attestation).
    pub aaguid: [u8; 16],
    /// Credential identifier as embedded in the authenticator data.
    pub credential_id: Bytes,
    /// The credential's public key.
    pub public_key: P256PublicKey,
}

/// Parsed authenticator data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    /// SHA-256 of the relying party id.
    pub rp_id_hash: B256,
    pub flags: AuthenticatorFlags,
    /// Signature counter (zero for most platform authenticators).
    pub sign_count: u32,
    /// Present when the AT flag is set.
    pub attested_credential: Option<AttestedCredential>,
}

impl AuthenticatorData {
    /// Parse authenticator data from a registration or an assertion.
    ///
    /// # Errors
    ///
    /// Returns [`PasskeyError::MalformedAttestation`] when any field runs past
    /// the end of the input, when unexpected bytes trail the structure, or
    /// when the COSE key is malformed, and
    /// [`PasskeyError::UnsupportedAlgorithm`] for keys other than ES256 on
    /// P-256.
    pub fn parse(bytes: &[u8]) -> Result<Self, PasskeyError> {
        let rp_id_hash = take(bytes, 0, RP_ID_HASH_LEN)
            .map(B256::from_slice)
            .ok_or_else(|| truncated("rpIdHash"))?;
        let flags = bytes
            .get(FLAGS_OFFSET)
            .copied()
            .map(AuthenticatorFlags)
            .ok_or_else(|| truncated("flags"))?;
        let sign_count =
            read_u32_be(bytes, SIGN_COUNT_OFFSET).ok_or_else(|| truncated("signCount"))?;

        let mut data = Self {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential: None,
        };

        if !flags.has_attested_credential() {
            if !flags.has_extensions() && bytes.len() > AUTHENTICATOR_DATA_MIN_LEN {
                return Err(PasskeyError::MalformedAttestation(format!(
                    "{} unexpected bytes after authenticator data header",
                    bytes.len() - AUTHENTICATOR_DATA_MIN_LEN
                )));
            }
            return Ok(data);
        }

        let aaguid = take_array::<16>(bytes, AAGUID_OFFSET).ok_or_else(|| truncated("aaguid"))?;
        let credential_id_len = read_u16_be(bytes, CREDENTIAL_ID_LEN_OFFSET)
            .ok_or_else(|| truncated("credentialIdLength"))? as usize;
        let credential_id = take(bytes, CREDENTIAL_ID_OFFSET, credential_id_len)
            .ok_or_else(|| truncated("credentialId"))?;

        let key_offset = CREDENTIAL_ID_OFFSET + credential_id_len;
        let key_bytes = bytes.get(key_offset..).unwrap_or_default();
        let (public_key, consumed) = decode_cose_key(key_bytes)?;

        if !flags.has_extensions() && consumed != key_bytes.len() {
            return Err(PasskeyError::MalformedAttestation(format!(
                "{} unexpected bytes after credential public key",
                key_bytes.len() - consumed
            )));
        }

        tracing::debug!(
            auth_data_len = bytes.len(),
            credential_id_len,
            credential_id = %short_hex(credential_id),
            "parsed attested credential"
        );

        data.attested_credential = Some(AttestedCredential {
            aaguid,
            credential_id: Bytes::copy_from_slice(credential_id),
            public_key,
        });
        Ok(data)
    }
}

/// Extract the attested credential from a CBOR attestation object.
///
/// # Errors
///
/// Returns [`PasskeyError::MalformedAttestation`] when the object is not a
/// single CBOR map with exactly one `authData` byte string, when the AT flag
/// is missing, or when the embedded key is malformed, and
/// [`PasskeyError::UnsupportedAlgorithm`] when the key is not ES256 on P-256.
pub fn extract_attested_credential(
    attestation_object: &[u8],
) -> Result<AttestedCredential, PasskeyError> {
    let auth_data = auth_data_from_attestation(attestation_object)?;
    AuthenticatorData::parse(&auth_data)?
        .attested_credential
        .ok_or_else(|| {
            PasskeyError::MalformedAttestation(
                "authenticator data carries no attested credential".into(),
            )
        })
}

/// Extract the P-256 public key from a CBOR attestation object.
///
/// This is [`extract_attested_credential`] without the credential metadata.
///
/// # Errors
///
/// See [`extract_attested_credential`].
pub fn extract_public_key(attestation_object: &[u8]) -> Result<P256PublicKey, PasskeyError> {
    extract_attested_credential(attestation_object).map(|credential| credential.public_key)
}

/// Locate the `authData` byte string in an attestation object.
fn auth_data_from_attestation(attestation_object: &[u8]) -> Result<Vec<u8>, PasskeyError> {
    let (value, consumed) = decode_single(attestation_object)?;
    if consumed != attestation_object.len() {
        return Err(PasskeyError::MalformedAttestation(format!(
            "{} trailing bytes after attestation object",
            attestation_object.len() - consumed
        )));
    }

    let Value::Map(entries) = value else {
        return Err(PasskeyError::MalformedAttestation(
            "attestation object is not a CBOR map".into(),
        ));
    };

    let mut auth_data = None;
    for (key, value) in entries {
        if key.as_text() != Some("authData") {
            continue;
        }
        if auth_data.is_some() {
            return Err(PasskeyError::MalformedAttestation(
                "duplicate authData entry".into(),
            ));
        }
        match value {
            Value::Bytes(bytes) => auth_data = Some(bytes),
            _ => {
                return Err(PasskeyError::MalformedAttestation(
                    "authData is not a byte string".into(),
                ));
            }
        }
    }

    auth_data.ok_or_else(|| PasskeyError::MalformedAttestation("missing authData entry".into()))
}

/// Decode a COSE_Key map at the start of `bytes`, returning the key and the
/// number of bytes it occupied.
fn decode_cose_key(bytes: &[u8]) -> Result<(P256PublicKey, usize), PasskeyError> {
    let (value, consumed) = decode_single(bytes)?;
    let Value::Map(entries) = value else {
        return Err(PasskeyError::MalformedAttestation(
            "credential public key is not a CBOR map".into(),
        ));
    };

    let mut labels = Vec::with_capacity(entries.len());
    for (label, value) in entries {
        let label = label
            .as_integer()
            .map(i128::from)
            .ok_or_else(|| PasskeyError::MalformedAttestation("non-integer COSE label".into()))?;
        if labels.iter().any(|(seen, _)| *seen == label) {
            return Err(PasskeyError::MalformedAttestation(format!(
                "duplicate COSE label {label}"
            )));
        }
        labels.push((label, value));
    }
    let lookup = |label: i128| {
        labels
            .iter()
            .find(|(seen, _)| *seen == label)
            .map(|(_, value)| value)
    };

    expect_parameter(lookup(COSE_KTY), "kty", COSE_KTY_EC2)?;
    expect_parameter(lookup(COSE_ALG), "alg", COSE_ALG_ES256)?;
    expect_parameter(lookup(COSE_CRV), "crv", COSE_CRV_P256)?;

    let x = coordinate(lookup(COSE_X), "x")?;
    let y = coordinate(lookup(COSE_Y), "y")?;

    Ok((P256PublicKey::new(x, y)?, consumed))
}

fn expect_parameter(value: Option<&Value>, name: &str, expected: i128) -> Result<(), PasskeyError> {
    let actual = value
        .and_then(Value::as_integer)
        .map(i128::from)
        .ok_or_else(|| {
            PasskeyError::MalformedAttestation(format!("missing or non-integer COSE {name}"))
        })?;
    if actual != expected {
        return Err(PasskeyError::UnsupportedAlgorithm(format!(
            "COSE {name} is {actual}, expected {expected}"
        )));
    }
    Ok(())
}

fn coordinate(value: Option<&Value>, name: &str) -> Result<B256, PasskeyError> {
    match value {
        Some(Value::Bytes(bytes)) if bytes.len() == 32 => Ok(B256::from_slice(bytes)),
        Some(Value::Bytes(bytes)) => Err(PasskeyError::MalformedAttestation(format!(
            "COSE {name} coordinate is {} bytes, expected 32",
            bytes.len()
        ))),
        _ => Err(PasskeyError::MalformedAttestation(format!(
            "missing COSE {name} coordinate"
        ))),
    }
}

/// Decode one CBOR item from the front of `bytes`.
fn decode_single(bytes: &[u8]) -> Result<(Value, usize), PasskeyError> {
    let mut cursor = Cursor::new(bytes);
    let value: Value = ciborium::from_reader(&mut cursor)
        .map_err(|e| PasskeyError::MalformedAttestation(format!("invalid CBOR: {e}")))?;
    let consumed = usize::try_from(cursor.position())
        .map_err(|_| PasskeyError::MalformedAttestation("CBOR item too large".into()))?;
    Ok((value, consumed))
}

fn truncated(field: &str) -> PasskeyError {
    PasskeyError::MalformedAttestation(format!("authenticator data truncated at {field}"))
}
