use forgetless_common::ConditionalSync;

use super::{AssertionResponse, AttestationResponse, CreationOptions, RequestOptions};

/// Errors a [`WebAuthnCapability`] reports when a ceremony could not run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The WebAuthn API is not available in this environment.
    #[error("WebAuthn API not available: {0}")]
    NotAvailable(String),

    /// The platform rejected the request (security error, invalid state,
    /// unsupported options).
    #[error("platform error: {0}")]
    Platform(String),
}

/// Something that can run WebAuthn ceremonies: the browser's
/// `navigator.credentials`, or a software authenticator in tests.
///
/// A ceremony the user cancels or that times out resolves to `Ok(None)`.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait WebAuthnCapability: ConditionalSync {
    /// Create a new credential (`navigator.credentials.create()`).
    async fn create(
        &self,
        options: CreationOptions,
    ) -> Result<Option<AttestationResponse>, CapabilityError>;

    /// Produce an assertion (`navigator.credentials.get()`).
    async fn get(&self, options: RequestOptions)
    -> Result<Option<AssertionResponse>, CapabilityError>;
}
