use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

use crate::RelyingParty;

/// `AuthenticatorAttachment` from the WebAuthn API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    /// Built into the device (Touch ID, Windows Hello, Android).
    Platform,
    /// Roaming authenticator such as a security key or a phone.
    CrossPlatform,
}

impl AuthenticatorAttachment {
    /// The string the browser API expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::CrossPlatform => "cross-platform",
        }
    }
}

/// `AuthenticatorTransport` hint attached to a credential descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    /// Built into the client device.
    Internal,
    /// Cross-device flow, usually a phone scanning a QR code.
    Hybrid,
    /// USB security key.
    Usb,
    /// NFC security key.
    Nfc,
    /// Bluetooth Low Energy authenticator.
    Ble,
}

impl Transport {
    /// The string the browser API expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Hybrid => "hybrid",
            Self::Usb => "usb",
            Self::Nfc => "nfc",
            Self::Ble => "ble",
        }
    }
}

/// Requirement level for resident keys and user verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// The ceremony fails if the authenticator cannot comply.
    Required,
    /// Comply when possible.
    Preferred,
    /// Skip when possible.
    Discouraged,
}

impl Requirement {
    /// The string the browser API expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::Discouraged => "discouraged",
        }
    }
}

/// The user account a new credential is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    /// Opaque user handle, random per registration.
    pub id: Bytes,
    /// Account name shown by the platform's credential picker.
    pub name: String,
    /// Human-friendly account name.
    pub display_name: String,
}

/// Options for `navigator.credentials.create()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationOptions {
    /// Relying party the credential is scoped to.
    pub relying_party: RelyingParty,
    /// Account the credential belongs to.
    pub user: UserEntity,
    /// Fresh random registration challenge.
    pub challenge: Bytes,
    /// Acceptable COSE algorithms in preference order.
    pub algorithms: Vec<i64>,
    /// Whether the credential must be discoverable.
    pub resident_key: Requirement,
    /// Whether the authenticator must verify the user (PIN, biometrics).
    pub user_verification: Requirement,
    /// Which kind of authenticator may answer.
    pub attachment: AuthenticatorAttachment,
    /// Attestation conveyance; the wallet always asks for `"none"`.
    pub attestation: &'static str,
    /// Ceremony timeout in milliseconds.
    pub timeout_ms: u32,
}

/// A credential the platform is allowed to use for an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    /// Credential id.
    pub id: Bytes,
    /// How the client may reach the authenticator holding it.
    pub transports: Vec<Transport>,
}

/// Options for `navigator.credentials.get()`.
///
/// An empty `allow_credentials` asks the platform to offer any
/// discoverable credential for the relying party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Relying party id; `None` lets the client use the caller's origin.
    pub rp_id: Option<String>,
    /// Bytes the authenticator signs over (via `clientDataJSON`).
    pub challenge: Bytes,
    /// Credentials the platform may use, empty for any.
    pub allow_credentials: Vec<CredentialDescriptor>,
    /// Whether the authenticator must verify the user.
    pub user_verification: Requirement,
    /// Ceremony timeout in milliseconds.
    pub timeout_ms: u32,
}

/// Result of a successful registration ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResponse {
    /// Credential id chosen by the authenticator.
    pub raw_id: Bytes,
    /// CBOR attestation object.
    pub attestation_object: Bytes,
    /// UTF-8 JSON the client assembled for the ceremony.
    pub client_data_json: Bytes,
}

/// Result of a successful assertion ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResponse {
    /// Credential id that produced the signature.
    pub raw_id: Bytes,
    /// `rpIdHash || flags || signCount`, plus extensions when present.
    pub authenticator_data: Bytes,
    /// UTF-8 JSON carrying the challenge that was signed.
    pub client_data_json: Bytes,
    /// DER-encoded ECDSA signature.
    pub signature: Bytes,
    /// User handle stored with a discoverable credential.
    pub user_handle: Option<Bytes>,
}
