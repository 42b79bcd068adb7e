//! Error types for passkey operations.

use thiserror::Error;

/// Errors from creating a passkey, signing with it, or parsing what the
/// authenticator returned.
///
/// No variant leaves partial state behind: a failed registration yields no
/// credential and a failed signature never reaches the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasskeyError {
    /// The attestation object or its embedded COSE key does not have the
    /// expected CBOR layout. Registration is aborted.
    #[error("malformed attestation: {0}")]
    MalformedAttestation(String),

    /// The DER ECDSA signature is structurally invalid. The withdrawal is
    /// aborted.
    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    /// The ceremony was cancelled, matched no credential on the device, or
    /// the platform refused it. The caller may prompt the user again.
    #[error("no credential selected: {0}")]
    NoCredentialSelected(String),

    /// The credential is not ES256 on P-256. Registration is aborted; the
    /// user needs a device that can create P-256 passkeys.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The OS random source failed while generating ceremony material.
    #[error("randomness unavailable: {0}")]
    Randomness(String),
}

impl PasskeyError {
    /// Whether the user can fix this by acting again (re-prompting).
    pub fn is_user_recoverable(&self) -> bool {
        matches!(self, PasskeyError::NoCredentialSelected(_))
    }
}

/// Errors from checking a WebAuthn assertion before it is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssertionError {
    /// The `clientDataJSON` could not be parsed as JSON.
    #[error("invalid clientDataJSON: {0}")]
    InvalidClientData(String),

    /// The `clientDataJSON.type` is not `webauthn.get`.
    #[error("unexpected ceremony type: {0}")]
    UnexpectedCeremonyType(String),

    /// The challenge in `clientDataJSON` is not the digest that was signed.
    #[error("challenge mismatch")]
    ChallengeMismatch,

    /// The authenticator data is too short or malformed.
    #[error("invalid authenticator data")]
    InvalidAuthenticatorData,

    /// The authenticator did not report user presence and verification.
    #[error("user presence or verification flag missing")]
    UserNotVerified,

    /// The stored public key is not a valid P-256 point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// The ECDSA signature does not verify under the credential's key.
    #[error("invalid ECDSA signature: {0}")]
    InvalidSignature(String),
}
