use alloy_primitives::{B256, Bytes};
use forgetless_common::short_hex;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{
    CapabilityError, CreationOptions, CredentialDescriptor, RequestOptions, Requirement,
    UserEntity, WebAuthnCapability,
};
use crate::cose::{COSE_ALG_ES256, extract_attested_credential};
use crate::{CeremonyConfig, PasskeyCredential, PasskeyError, RawSignature};

const CHALLENGE_LEN: usize = 32;
const USER_HANDLE_LEN: usize = 32;

/// Drives passkey ceremonies through a [`WebAuthnCapability`].
///
/// The manager holds no credentials. Every ceremony is independent and at
/// most one runs at a time; a second call waits for the first to finish.
/// Cancelled or refused ceremonies are reported as
/// [`PasskeyError::NoCredentialSelected`] and never retried.
///
/// ```ignore
/// let manager = PasskeyManager::new(BrowserAuthenticator::new());
/// let credential = manager.create_credential("Alice").await?;
/// let raw = manager.sign_digest(&credential.credential_id, digest).await?;
/// ```
pub struct PasskeyManager<W> {
    capability: W,
    config: CeremonyConfig,
    ceremony: Mutex<()>,
}

impl<W> PasskeyManager<W>
where
    W: WebAuthnCapability,
{
    /// Create a manager with the default ceremony settings.
    pub fn new(capability: W) -> Self {
        Self::with_config(capability, CeremonyConfig::default())
    }

    /// Create a manager with explicit ceremony settings.
    pub fn with_config(capability: W, config: CeremonyConfig) -> Self {
        Self {
            capability,
            config,
            ceremony: Mutex::new(()),
        }
    }

    /// The ceremony settings in use.
    pub fn config(&self) -> &CeremonyConfig {
        &self.config
    }

    /// The underlying capability.
    pub fn capability(&self) -> &W {
        &self.capability
    }

    /// Run a registration ceremony and return the new credential.
    ///
    /// Only ES256 is offered, with a resident key, required user
    /// verification, `none` attestation and the configured attachment. The
    /// challenge and user handle are fresh random bytes on every call.
    ///
    /// # Errors
    ///
    /// [`PasskeyError::NoCredentialSelected`] when the user cancels or the
    /// platform refuses, [`PasskeyError::Randomness`] when no random bytes
    /// are available, and the attestation parsing errors of
    /// [`extract_attested_credential`].
    #[instrument(skip(self))]
    pub async fn create_credential(
        &self,
        display_name: &str,
    ) -> Result<PasskeyCredential, PasskeyError> {
        let _ceremony = self.ceremony.lock().await;

        let options = CreationOptions {
            relying_party: self.config.relying_party.clone(),
            user: UserEntity {
                id: random_bytes(USER_HANDLE_LEN)?,
                name: display_name.to_string(),
                display_name: display_name.to_string(),
            },
            challenge: random_bytes(CHALLENGE_LEN)?,
            algorithms: vec![COSE_ALG_ES256 as i64],
            resident_key: Requirement::Required,
            user_verification: Requirement::Required,
            attachment: self.config.attachment,
            attestation: "none",
            timeout_ms: self.config.timeout_ms,
        };

        let response = self
            .capability
            .create(options)
            .await
            .map_err(|error| ceremony_failed("registration", error))?
            .ok_or_else(|| ceremony_abandoned("registration"))?;

        debug!(
            attestation_len = response.attestation_object.len(),
            "received attestation object"
        );

        let attested = extract_attested_credential(&response.attestation_object)?;
        if attested.credential_id != response.raw_id {
            return Err(PasskeyError::MalformedAttestation(
                "attested credential id does not match rawId".into(),
            ));
        }

        info!(
            credential_id = %short_hex(&response.raw_id),
            "created passkey credential"
        );

        Ok(PasskeyCredential {
            credential_id: response.raw_id,
            public_key: attested.public_key,
            display_name: display_name.to_string(),
        })
    }

    /// Ask the authenticator to sign `digest` with the given credential.
    ///
    /// The digest is passed verbatim as the WebAuthn challenge; the
    /// authenticator embeds it in `clientDataJSON` and signs
    /// `authenticatorData || SHA-256(clientDataJSON)`.
    ///
    /// # Errors
    ///
    /// [`PasskeyError::NoCredentialSelected`] when the user cancels, the
    /// credential is not on this device, or the platform refuses.
    #[instrument(skip(self, credential_id), fields(credential_id = %short_hex(credential_id)))]
    pub async fn sign_digest(
        &self,
        credential_id: &[u8],
        digest: B256,
    ) -> Result<RawSignature, PasskeyError> {
        let _ceremony = self.ceremony.lock().await;

        let options = RequestOptions {
            rp_id: self.config.relying_party.id.clone(),
            challenge: Bytes::copy_from_slice(digest.as_slice()),
            allow_credentials: vec![CredentialDescriptor {
                id: Bytes::copy_from_slice(credential_id),
                transports: self.config.transports.clone(),
            }],
            user_verification: Requirement::Required,
            timeout_ms: self.config.timeout_ms,
        };

        let response = self
            .capability
            .get(options)
            .await
            .map_err(|error| ceremony_failed("assertion", error))?
            .ok_or_else(|| ceremony_abandoned("assertion"))?;

        if response.raw_id.as_ref() != credential_id {
            warn!(
                returned = %short_hex(&response.raw_id),
                "authenticator answered with a different credential"
            );
            return Err(PasskeyError::NoCredentialSelected(
                "authenticator used a different credential".into(),
            ));
        }

        debug!(
            authenticator_data_len = response.authenticator_data.len(),
            signature_len = response.signature.len(),
            "received assertion"
        );

        Ok(RawSignature {
            authenticator_data: response.authenticator_data,
            client_data_json: response.client_data_json,
            signature: response.signature,
        })
    }

    /// Let the user pick any passkey this relying party owns and return its
    /// credential id.
    ///
    /// The assertion is made over a random challenge and no allow-list, so
    /// it proves possession but authorizes nothing.
    ///
    /// # Errors
    ///
    /// [`PasskeyError::NoCredentialSelected`] when the user picks nothing or
    /// the platform refuses, [`PasskeyError::Randomness`] when no random
    /// bytes are available.
    #[instrument(skip(self))]
    pub async fn discover_credential(&self) -> Result<Bytes, PasskeyError> {
        let _ceremony = self.ceremony.lock().await;

        let options = RequestOptions {
            rp_id: self.config.relying_party.id.clone(),
            challenge: random_bytes(CHALLENGE_LEN)?,
            allow_credentials: Vec::new(),
            user_verification: Requirement::Required,
            timeout_ms: self.config.timeout_ms,
        };

        let response = self
            .capability
            .get(options)
            .await
            .map_err(|error| ceremony_failed("discovery", error))?
            .ok_or_else(|| ceremony_abandoned("discovery"))?;

        info!(
            credential_id = %short_hex(&response.raw_id),
            "discovered passkey credential"
        );
        Ok(response.raw_id)
    }
}

fn random_bytes(len: usize) -> Result<Bytes, PasskeyError> {
    let mut bytes = vec![0u8; len];
    getrandom::getrandom(&mut bytes).map_err(|e| PasskeyError::Randomness(e.to_string()))?;
    Ok(bytes.into())
}

fn ceremony_failed(ceremony: &str, error: CapabilityError) -> PasskeyError {
    warn!(%error, "{ceremony} ceremony failed");
    PasskeyError::NoCredentialSelected(error.to_string())
}

fn ceremony_abandoned(ceremony: &str) -> PasskeyError {
    warn!("{ceremony} ceremony ended without a credential");
    PasskeyError::NoCredentialSelected(format!("{ceremony} was cancelled or timed out"))
}
