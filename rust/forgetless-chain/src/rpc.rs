//! [`ChainReader`] over plain JSON-RPC `eth_call`.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::SolCall;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use crate::contract::IForgetlessWallet;
use crate::{ChainError, ChainReader, WalletConfig};

/// Reads the ForgetlessWallet contract through a node's HTTP JSON-RPC API.
///
/// ```no_run
/// use forgetless_chain::{ChainReader, JsonRpcChainReader, WalletConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let reader = JsonRpcChainReader::new(&WalletConfig::default().with_timeout(10))?;
/// let domain_separator = reader.domain_separator().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct JsonRpcChainReader {
    client: Client,
    endpoint: Url,
    contract: Address,
    next_id: AtomicU64,
}

impl JsonRpcChainReader {
    /// Create a reader for the contract and endpoint in `config`.
    ///
    /// # Errors
    ///
    /// [`ChainError::Configuration`] when the RPC URL does not parse.
    pub fn new(config: &WalletConfig) -> Result<Self, ChainError> {
        let endpoint = Url::parse(&config.network.rpc_url).map_err(|e| {
            ChainError::Configuration(format!("invalid RPC URL {}: {}", config.network.rpc_url, e))
        })?;

        #[allow(unused_mut)]
        let mut client_builder = Client::builder();

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = config.timeout_seconds {
            client_builder = client_builder.timeout(std::time::Duration::from_secs(timeout));
        }

        let client = client_builder.build().unwrap_or_else(|_| Client::new());

        Ok(Self {
            client,
            endpoint,
            contract: config.contract,
            next_id: AtomicU64::new(1),
        })
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn eth_call(&self, calldata: Vec<u8>) -> Result<Bytes, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = call_request(id, self.contract, calldata.into());

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Transport(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Transport(format!("Invalid JSON-RPC response: {}", e)))?;

        let result = body.into_result()?;
        debug!(id, return_len = result.len(), "eth_call returned");
        Ok(result)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl ChainReader for JsonRpcChainReader {
    #[instrument(skip(self), fields(contract = %self.contract))]
    async fn domain_separator(&self) -> Result<B256, ChainError> {
        let ret = self
            .eth_call(IForgetlessWallet::DOMAIN_SEPARATORCall {}.abi_encode())
            .await?;
        IForgetlessWallet::DOMAIN_SEPARATORCall::abi_decode_returns(&ret)
            .map_err(|e| ChainError::Decode(e.to_string()))
    }

    #[instrument(skip(self), fields(contract = %self.contract))]
    async fn withdrawal_typehash(&self) -> Result<B256, ChainError> {
        let ret = self
            .eth_call(IForgetlessWallet::WITHDRAWAL_TYPEHASHCall {}.abi_encode())
            .await?;
        IForgetlessWallet::WITHDRAWAL_TYPEHASHCall::abi_decode_returns(&ret)
            .map_err(|e| ChainError::Decode(e.to_string()))
    }

    #[instrument(skip(self, credential_id), fields(contract = %self.contract))]
    async fn current_nonce(&self, credential_id: &Bytes) -> Result<U256, ChainError> {
        let call = IForgetlessWallet::getNonceCall {
            credentialId: credential_id.clone(),
        };
        let ret = self.eth_call(call.abi_encode()).await?;
        IForgetlessWallet::getNonceCall::abi_decode_returns(&ret)
            .map_err(|e| ChainError::Decode(e.to_string()))
    }

    #[instrument(skip(self, credential_id), fields(contract = %self.contract))]
    async fn is_registered(&self, credential_id: &Bytes) -> Result<bool, ChainError> {
        let call = IForgetlessWallet::isUserRegisteredCall {
            credentialId: credential_id.clone(),
        };
        let ret = self.eth_call(call.abi_encode()).await?;
        IForgetlessWallet::isUserRegisteredCall::abi_decode_returns(&ret)
            .map_err(|e| ChainError::Decode(e.to_string()))
    }
}

fn call_request(id: u64, to: Address, data: Bytes) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "eth_call",
        "params": [{ "to": to, "data": data }, "latest"],
    })
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Bytes>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn into_result(self) -> Result<Bytes, ChainError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ChainError::Transport(
                "JSON-RPC response has neither result nor error".to_string(),
            )),
        }
    }
}
