use alloy_primitives::{B256, Bytes};
use alloy_sol_types::SolValue;
use forgetless_credentials::{NormalizedSignature, RawSignature};

/// The `authData` argument of `withdrawETH` / `withdrawToken`:
/// `abi.encode(bytes authenticatorData, bytes clientDataJSON, bytes32 r, bytes32 s)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthDataPayload(Bytes);

impl AuthDataPayload {
    /// The encoded bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Consume the payload.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl AsRef<[u8]> for AuthDataPayload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<AuthDataPayload> for Bytes {
    fn from(payload: AuthDataPayload) -> Self {
        payload.0
    }
}

/// ABI-encode an assertion for the contract's verifier.
pub fn encode_auth_data(
    authenticator_data: &[u8],
    client_data_json: &[u8],
    r: B256,
    s: B256,
) -> AuthDataPayload {
    let encoded = (
        Bytes::copy_from_slice(authenticator_data),
        Bytes::copy_from_slice(client_data_json),
        r,
        s,
    )
        .abi_encode_params();
    AuthDataPayload(encoded.into())
}

/// [`encode_auth_data`] for a ceremony result and its normalized signature.
pub fn encode_assertion(raw: &RawSignature, signature: &NormalizedSignature) -> AuthDataPayload {
    encode_auth_data(
        &raw.authenticator_data,
        &raw.client_data_json,
        signature.r_bytes(),
        signature.s_bytes(),
    )
}
