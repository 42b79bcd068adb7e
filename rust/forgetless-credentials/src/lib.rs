#![warn(missing_docs)]

//! Passkey (WebAuthn P-256) credentials for the Forgetless wallet.
//!
//! This crate covers the device side of the wallet:
//! - creating a passkey and extracting its public key from the CBOR
//!   attestation object ([`extract_public_key`])
//! - asking the passkey to sign a 32-byte digest ([`PasskeyManager`])
//! - turning the DER signature it returns into low-S `(r, s)`
//!   ([`parse_signature`])
//! - checking an assertion locally before it goes on-chain
//!   ([`verify_assertion`])

mod config;
mod credential;
mod error;

pub mod cose;
pub mod der;
pub mod software;
pub mod webauthn;

pub use config::*;
pub use cose::{
    AttestedCredential, AuthenticatorData, extract_attested_credential, extract_public_key,
};
pub use credential::*;
pub use der::{normalize_s, parse_signature};
pub use error::*;
pub use webauthn::{
    CapabilityError, PasskeyManager, WebAuthnCapability, check_client_data, signed_message,
    verify_assertion,
};
