//! [`WebAuthnCapability`] backed by the browser's `navigator.credentials`.
//!
//! Only available on `wasm32-unknown-unknown`. Options are translated into
//! the plain JS objects the Web Authentication API expects and the
//! `ArrayBuffer` fields of the response are copied back into [`Bytes`].
//!
//! A `NotAllowedError` or `AbortError` (user dismissed the prompt, timeout,
//! no matching credential) resolves to `Ok(None)`; every other rejection is
//! a [`CapabilityError::Platform`].

use alloy_primitives::Bytes;
use js_sys::{Array, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::{
    AssertionResponse, AttestationResponse, CapabilityError, CreationOptions, RequestOptions,
    WebAuthnCapability,
};

/// The browser's platform authenticator.
#[derive(Debug, Clone, Default)]
pub struct BrowserAuthenticator;

impl BrowserAuthenticator {
    /// Create a handle to `navigator.credentials`.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait(?Send)]
impl WebAuthnCapability for BrowserAuthenticator {
    async fn create(
        &self,
        options: CreationOptions,
    ) -> Result<Option<AttestationResponse>, CapabilityError> {
        let public_key = Object::new();
        js_set(&public_key, "challenge", &bytes_to_js(&options.challenge))?;

        let rp = Object::new();
        if let Some(id) = &options.relying_party.id {
            js_set(&rp, "id", &JsValue::from_str(id))?;
        }
        js_set(&rp, "name", &JsValue::from_str(&options.relying_party.name))?;
        js_set(&public_key, "rp", &rp)?;

        let user = Object::new();
        js_set(&user, "id", &bytes_to_js(&options.user.id))?;
        js_set(&user, "name", &JsValue::from_str(&options.user.name))?;
        js_set(
            &user,
            "displayName",
            &JsValue::from_str(&options.user.display_name),
        )?;
        js_set(&public_key, "user", &user)?;

        let params = Array::new();
        for algorithm in &options.algorithms {
            let param = Object::new();
            js_set(&param, "type", &JsValue::from_str("public-key"))?;
            js_set(&param, "alg", &JsValue::from_f64(*algorithm as f64))?;
            params.push(&param);
        }
        js_set(&public_key, "pubKeyCredParams", &params)?;

        let selection = Object::new();
        js_set(
            &selection,
            "authenticatorAttachment",
            &JsValue::from_str(options.attachment.as_str()),
        )?;
        js_set(
            &selection,
            "residentKey",
            &JsValue::from_str(options.resident_key.as_str()),
        )?;
        js_set(
            &selection,
            "userVerification",
            &JsValue::from_str(options.user_verification.as_str()),
        )?;
        js_set(&public_key, "authenticatorSelection", &selection)?;
        js_set(
            &public_key,
            "attestation",
            &JsValue::from_str(options.attestation),
        )?;
        js_set(
            &public_key,
            "timeout",
            &JsValue::from_f64(options.timeout_ms as f64),
        )?;

        let Some(credential) = call_credentials("create", &public_key).await? else {
            return Ok(None);
        };

        let response = js_get(&credential, "response")?;
        Ok(Some(AttestationResponse {
            raw_id: buffer_to_bytes(&js_get(&credential, "rawId")?),
            attestation_object: buffer_to_bytes(&js_get(&response, "attestationObject")?),
            client_data_json: buffer_to_bytes(&js_get(&response, "clientDataJSON")?),
        }))
    }

    async fn get(
        &self,
        options: RequestOptions,
    ) -> Result<Option<AssertionResponse>, CapabilityError> {
        let public_key = Object::new();
        js_set(&public_key, "challenge", &bytes_to_js(&options.challenge))?;
        if let Some(rp_id) = &options.rp_id {
            js_set(&public_key, "rpId", &JsValue::from_str(rp_id))?;
        }
        js_set(
            &public_key,
            "userVerification",
            &JsValue::from_str(options.user_verification.as_str()),
        )?;
        js_set(
            &public_key,
            "timeout",
            &JsValue::from_f64(options.timeout_ms as f64),
        )?;

        if !options.allow_credentials.is_empty() {
            let allow = Array::new();
            for credential in &options.allow_credentials {
                let descriptor = Object::new();
                js_set(&descriptor, "type", &JsValue::from_str("public-key"))?;
                js_set(&descriptor, "id", &bytes_to_js(&credential.id))?;
                let transports = Array::new();
                for transport in &credential.transports {
                    transports.push(&JsValue::from_str(transport.as_str()));
                }
                js_set(&descriptor, "transports", &transports)?;
                allow.push(&descriptor);
            }
            js_set(&public_key, "allowCredentials", &allow)?;
        }

        let Some(credential) = call_credentials("get", &public_key).await? else {
            return Ok(None);
        };

        let response = js_get(&credential, "response")?;
        let user_handle = js_get(&response, "userHandle")?;
        Ok(Some(AssertionResponse {
            raw_id: buffer_to_bytes(&js_get(&credential, "rawId")?),
            authenticator_data: buffer_to_bytes(&js_get(&response, "authenticatorData")?),
            client_data_json: buffer_to_bytes(&js_get(&response, "clientDataJSON")?),
            signature: buffer_to_bytes(&js_get(&response, "signature")?),
            user_handle: (!user_handle.is_null() && !user_handle.is_undefined())
                .then(|| buffer_to_bytes(&user_handle)),
        }))
    }
}

/// Call `navigator.credentials[method]({ publicKey })` and await it.
async fn call_credentials(
    method: &str,
    public_key: &Object,
) -> Result<Option<JsValue>, CapabilityError> {
    let options = Object::new();
    js_set(&options, "publicKey", public_key)?;

    let credentials = credentials_container()?;
    let function: js_sys::Function = js_get(&credentials, method)?
        .dyn_into()
        .map_err(|_| CapabilityError::NotAvailable(format!("credentials.{method} missing")))?;
    let promise: js_sys::Promise = function
        .call1(&credentials, &options)
        .map_err(|e| CapabilityError::Platform(format!("{e:?}")))?
        .unchecked_into();

    match JsFuture::from(promise).await {
        Ok(credential) if credential.is_null() || credential.is_undefined() => Ok(None),
        Ok(credential) => Ok(Some(credential)),
        Err(error) => match error_name(&error).as_deref() {
            Some("NotAllowedError") | Some("AbortError") => Ok(None),
            _ => Err(CapabilityError::Platform(format!("{error:?}"))),
        },
    }
}

fn credentials_container() -> Result<JsValue, CapabilityError> {
    let global = js_sys::global();
    let navigator = Reflect::get(&global, &"navigator".into())
        .map_err(|_| CapabilityError::NotAvailable("navigator not found".into()))?;
    if navigator.is_undefined() {
        return Err(CapabilityError::NotAvailable(
            "navigator is undefined".into(),
        ));
    }
    let credentials = Reflect::get(&navigator, &"credentials".into())
        .map_err(|_| CapabilityError::NotAvailable("credentials not found".into()))?;
    if credentials.is_undefined() {
        return Err(CapabilityError::NotAvailable(
            "navigator.credentials is undefined".into(),
        ));
    }
    Ok(credentials)
}

fn error_name(error: &JsValue) -> Option<String> {
    Reflect::get(error, &"name".into())
        .ok()
        .and_then(|name| name.as_string())
}

fn js_get(object: &JsValue, key: &str) -> Result<JsValue, CapabilityError> {
    Reflect::get(object, &JsValue::from_str(key))
        .map_err(|e| CapabilityError::Platform(format!("failed to get '{key}': {e:?}")))
}

fn js_set(object: &Object, key: &str, value: &JsValue) -> Result<(), CapabilityError> {
    Reflect::set(object, &JsValue::from_str(key), value)
        .map_err(|e| CapabilityError::Platform(format!("failed to set '{key}': {e:?}")))?;
    Ok(())
}

fn bytes_to_js(bytes: &[u8]) -> JsValue {
    Uint8Array::from(bytes).into()
}

fn buffer_to_bytes(value: &JsValue) -> Bytes {
    let array = Uint8Array::new(value);
    let mut bytes = vec![0u8; array.length() as usize];
    array.copy_to(&mut bytes);
    bytes.into()
}
