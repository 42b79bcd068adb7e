//! WebAuthn ceremonies for P-256 passkeys.
//!
//! The [`WebAuthnCapability`] trait is the seam to the platform: the browser
//! implementation drives `navigator.credentials` on `wasm32`, and
//! [`SoftwareAuthenticator`](crate::software::SoftwareAuthenticator) stands in
//! everywhere else. [`PasskeyManager`] runs registration, signing and
//! discovery on top of it, and [`verify_assertion`] checks an assertion
//! before it is used.

mod capability;
mod manager;
mod options;
mod verifier;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
mod browser;

pub use capability::{CapabilityError, WebAuthnCapability};
pub use manager::PasskeyManager;
pub use options::*;
pub use verifier::{check_client_data, signed_message, verify_assertion};

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub use browser::BrowserAuthenticator;
