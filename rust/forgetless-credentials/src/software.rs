//! An in-process authenticator backed by a `p256` signing key.
//!
//! [`SoftwareAuthenticator`] answers registration and assertion ceremonies
//! the way a platform authenticator does, producing real CBOR attestation
//! objects, `clientDataJSON` and DER signatures. It exists so the ceremony
//! pipeline can run outside a browser, in tests and in tooling.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use alloy_primitives::{Bytes, U256};
use base64::Engine;
use ciborium::Value;
use p256::ecdsa::{Signature, SigningKey, signature::Signer as _};
use sha2::{Digest, Sha256};

use crate::cose::{
    AuthenticatorFlags, COSE_ALG, COSE_ALG_ES256, COSE_CRV, COSE_CRV_P256, COSE_KTY,
    COSE_KTY_EC2, COSE_X, COSE_Y,
};
use crate::der::P256_N;
use crate::webauthn::{
    AssertionResponse, AttestationResponse, CapabilityError, CreationOptions, RequestOptions,
    WebAuthnCapability,
};
use crate::{P256PublicKey, RawSignature, signed_message};

const DEFAULT_RP_ID: &str = "localhost";

/// How the simulated user responds to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Complete the ceremony.
    Approve,
    /// Dismiss the prompt; the ceremony resolves without a credential.
    Decline,
    /// The platform raises an error.
    Fail(String),
    /// There is no WebAuthn API at all.
    Unavailable,
}

/// A software passkey holding a single P-256 credential.
pub struct SoftwareAuthenticator {
    signing_key: SigningKey,
    credential_id: Bytes,
    origin: String,
    behavior: Behavior,
    high_s: bool,
    sign_count: AtomicU32,
    ceremonies: AtomicUsize,
}

impl SoftwareAuthenticator {
    /// Create an authenticator that approves every prompt.
    pub fn new(signing_key: SigningKey, credential_id: impl Into<Bytes>) -> Self {
        Self {
            signing_key,
            credential_id: credential_id.into(),
            origin: format!("https://{DEFAULT_RP_ID}"),
            behavior: Behavior::Approve,
            high_s: false,
            sign_count: AtomicU32::new(0),
            ceremonies: AtomicUsize::new(0),
        }
    }

    /// Set how prompts are answered.
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Emit signatures with `s` in the upper half of the group order.
    pub fn with_high_s(mut self, high_s: bool) -> Self {
        self.high_s = high_s;
        self
    }

    /// Set the origin written into `clientDataJSON`.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// The single credential id this authenticator answers for.
    pub fn credential_id(&self) -> &Bytes {
        &self.credential_id
    }

    /// Public half of the signing key.
    pub fn public_key(&self) -> P256PublicKey {
        P256PublicKey::from(self.signing_key.verifying_key())
    }

    /// Number of ceremonies this authenticator has been asked to run.
    pub fn ceremonies(&self) -> usize {
        self.ceremonies.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Result<bool, CapabilityError> {
        self.ceremonies.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Approve => Ok(true),
            Behavior::Decline => Ok(false),
            Behavior::Fail(reason) => Err(CapabilityError::Platform(reason.clone())),
            Behavior::Unavailable => Err(CapabilityError::NotAvailable(
                "software authenticator is switched off".into(),
            )),
        }
    }

    /// `{"type":..,"challenge":..,"origin":..,"crossOrigin":false}`, keys in
    /// the order browsers emit them.
    fn client_data_json(
        &self,
        ceremony: &str,
        challenge: &[u8],
    ) -> Result<Bytes, CapabilityError> {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ClientData<'a> {
            #[serde(rename = "type")]
            ceremony: &'a str,
            challenge: String,
            origin: &'a str,
            cross_origin: bool,
        }

        serde_json::to_vec(&ClientData {
            ceremony,
            challenge: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(challenge),
            origin: &self.origin,
            cross_origin: false,
        })
        .map(Bytes::from)
        .map_err(|e| CapabilityError::Platform(e.to_string()))
    }

    fn cose_key(&self) -> Result<Vec<u8>, CapabilityError> {
        let key = self.public_key();
        let map = Value::Map(vec![
            (cose_int(COSE_KTY)?, cose_int(COSE_KTY_EC2)?),
            (cose_int(COSE_ALG)?, cose_int(COSE_ALG_ES256)?),
            (cose_int(COSE_CRV)?, cose_int(COSE_CRV_P256)?),
            (cose_int(COSE_X)?, Value::Bytes(key.x.to_vec())),
            (cose_int(COSE_Y)?, Value::Bytes(key.y.to_vec())),
        ]);
        to_cbor(&map)
    }

    fn sign(&self, message: &[u8]) -> Result<Bytes, CapabilityError> {
        let signature: Signature = self.signing_key.sign(message);
        let low = signature.normalize_s().unwrap_or(signature);
        let signature = if self.high_s {
            let mut bytes = low.to_bytes();
            let s = U256::from_be_slice(&bytes[32..]);
            bytes[32..].copy_from_slice(&(P256_N - s).to_be_bytes::<32>());
            Signature::from_slice(&bytes).map_err(|e| CapabilityError::Platform(e.to_string()))?
        } else {
            low
        };
        Ok(Bytes::copy_from_slice(signature.to_der().as_bytes()))
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl WebAuthnCapability for SoftwareAuthenticator {
    async fn create(
        &self,
        options: CreationOptions,
    ) -> Result<Option<AttestationResponse>, CapabilityError> {
        if !self.answer()? {
            return Ok(None);
        }
        if !options.algorithms.contains(&(COSE_ALG_ES256 as i64)) {
            return Err(CapabilityError::Platform(
                "NotSupportedError: no supported algorithm offered".into(),
            ));
        }

        let rp_id = options.relying_party.id.as_deref().unwrap_or(DEFAULT_RP_ID);
        let mut auth_data = rp_id_hash(rp_id);
        auth_data.push(
            AuthenticatorFlags::USER_PRESENT
                | AuthenticatorFlags::USER_VERIFIED
                | AuthenticatorFlags::ATTESTED_CREDENTIAL,
        );
        auth_data.extend_from_slice(&self.sign_count.load(Ordering::SeqCst).to_be_bytes());
        auth_data.extend_from_slice(&[0u8; 16]);
        let credential_id_len = u16::try_from(self.credential_id.len())
            .map_err(|_| CapabilityError::Platform("credential id too long".into()))?;
        auth_data.extend_from_slice(&credential_id_len.to_be_bytes());
        auth_data.extend_from_slice(&self.credential_id);
        auth_data.extend_from_slice(&self.cose_key()?);

        let attestation_object = to_cbor(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Text("attStmt".into()), Value::Map(Vec::new())),
            (Value::Text("authData".into()), Value::Bytes(auth_data)),
        ]))?;

        Ok(Some(AttestationResponse {
            raw_id: self.credential_id.clone(),
            attestation_object: attestation_object.into(),
            client_data_json: self.client_data_json("webauthn.create", &options.challenge)?,
        }))
    }

    async fn get(
        &self,
        options: RequestOptions,
    ) -> Result<Option<AssertionResponse>, CapabilityError> {
        if !self.answer()? {
            return Ok(None);
        }
        let allowed = options.allow_credentials.is_empty()
            || options
                .allow_credentials
                .iter()
                .any(|descriptor| descriptor.id == self.credential_id);
        if !allowed {
            return Ok(None);
        }

        let rp_id = options.rp_id.as_deref().unwrap_or(DEFAULT_RP_ID);
        let count = self.sign_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut authenticator_data = rp_id_hash(rp_id);
        authenticator_data
            .push(AuthenticatorFlags::USER_PRESENT | AuthenticatorFlags::USER_VERIFIED);
        authenticator_data.extend_from_slice(&count.to_be_bytes());

        let mut raw = RawSignature {
            authenticator_data: authenticator_data.into(),
            client_data_json: self.client_data_json("webauthn.get", &options.challenge)?,
            signature: Bytes::new(),
        };
        raw.signature = self.sign(&signed_message(&raw))?;

        Ok(Some(AssertionResponse {
            raw_id: self.credential_id.clone(),
            authenticator_data: raw.authenticator_data,
            client_data_json: raw.client_data_json,
            signature: raw.signature,
            user_handle: None,
        }))
    }
}

fn rp_id_hash(rp_id: &str) -> Vec<u8> {
    Sha256::digest(rp_id.as_bytes()).to_vec()
}

fn cose_int(value: i128) -> Result<Value, CapabilityError> {
    ciborium::value::Integer::try_from(value)
        .map(Value::Integer)
        .map_err(|e| CapabilityError::Platform(e.to_string()))
}

fn to_cbor(value: &Value) -> Result<Vec<u8>, CapabilityError> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|e| CapabilityError::Platform(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::{AuthenticatorAttachment, CredentialDescriptor, Requirement, UserEntity};
    use crate::{RelyingParty, extract_attested_credential, parse_signature, verify_assertion};
    use alloy_primitives::B256;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn authenticator() -> SoftwareAuthenticator {
        let signing_key = SigningKey::from_bytes(&[42u8; 32].into()).unwrap();
        SoftwareAuthenticator::new(signing_key, vec![0xc1; 20])
    }

    fn creation_options() -> CreationOptions {
        CreationOptions {
            relying_party: RelyingParty::default(),
            user: UserEntity {
                id: Bytes::from_static(&[1; 32]),
                name: "alice".into(),
                display_name: "alice".into(),
            },
            challenge: Bytes::from_static(&[2; 32]),
            algorithms: vec![-7],
            resident_key: Requirement::Required,
            user_verification: Requirement::Required,
            attachment: AuthenticatorAttachment::Platform,
            attestation: "none",
            timeout_ms: 60_000,
        }
    }

    fn request_options(challenge: B256, allow: Vec<CredentialDescriptor>) -> RequestOptions {
        RequestOptions {
            rp_id: None,
            challenge: Bytes::copy_from_slice(challenge.as_slice()),
            allow_credentials: allow,
            user_verification: Requirement::Required,
            timeout_ms: 60_000,
        }
    }

    #[tokio::test]
    async fn it_produces_a_parseable_attestation() -> TestResult {
        let authenticator = authenticator();
        let response = authenticator
            .create(creation_options())
            .await?
            .ok_or("no attestation")?;

        let attested = extract_attested_credential(&response.attestation_object)?;
        assert_eq!(attested.credential_id, response.raw_id);
        assert_eq!(attested.public_key, authenticator.public_key());
        Ok(())
    }

    #[tokio::test]
    async fn it_produces_verifiable_assertions() -> TestResult {
        let digest = B256::repeat_byte(0x5a);
        for high_s in [false, true] {
            let authenticator = authenticator().with_high_s(high_s);
            let response = authenticator
                .get(request_options(digest, Vec::new()))
                .await?
                .ok_or("no assertion")?;
            let raw = RawSignature {
                authenticator_data: response.authenticator_data,
                client_data_json: response.client_data_json,
                signature: response.signature,
            };

            let der = Signature::from_der(&raw.signature)?;
            assert_eq!(der.normalize_s().is_some(), high_s);

            let normalized = parse_signature(&raw.signature)?;
            verify_assertion(&authenticator.public_key(), digest, &raw, &normalized)?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn it_writes_client_data_in_browser_key_order() -> TestResult {
        let response = authenticator()
            .with_origin("https://wallet.example")
            .get(request_options(B256::repeat_byte(0xff), Vec::new()))
            .await?
            .ok_or("no assertion")?;

        assert_eq!(
            std::str::from_utf8(&response.client_data_json)?,
            concat!(
                r#"{"type":"webauthn.get","#,
                r#""challenge":"__________________________________________8","#,
                r#""origin":"https://wallet.example","crossOrigin":false}"#
            )
        );
        Ok(())
    }

    #[tokio::test]
    async fn it_ignores_requests_for_other_credentials() -> TestResult {
        let authenticator = authenticator();
        let allow = vec![CredentialDescriptor {
            id: Bytes::from_static(&[0xee; 20]),
            transports: Vec::new(),
        }];
        let response = authenticator
            .get(request_options(B256::ZERO, allow))
            .await?;
        assert_eq!(response, None);
        Ok(())
    }

    #[tokio::test]
    async fn it_counts_ceremonies_and_follows_behavior() {
        let declining = authenticator().with_behavior(Behavior::Decline);
        assert_eq!(declining.create(creation_options()).await, Ok(None));

        let failing = authenticator().with_behavior(Behavior::Fail("SecurityError".into()));
        assert!(matches!(
            failing.get(request_options(B256::ZERO, Vec::new())).await,
            Err(CapabilityError::Platform(_))
        ));

        let off = authenticator().with_behavior(Behavior::Unavailable);
        assert!(matches!(
            off.create(creation_options()).await,
            Err(CapabilityError::NotAvailable(_))
        ));
        assert_eq!(declining.ceremonies() + failing.ceremonies() + off.ceremonies(), 3);
    }
}
