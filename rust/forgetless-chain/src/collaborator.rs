use alloy_primitives::{Address, B256, Bytes, U256};
use forgetless_common::{ConditionalSend, ConditionalSync};
use serde::{Deserialize, Serialize};

use crate::ChainError;

/// Read access to the ForgetlessWallet contract.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait ChainReader: ConditionalSync {
    /// `DOMAIN_SEPARATOR()`
    async fn domain_separator(&self) -> Result<B256, ChainError>;

    /// `WITHDRAWAL_TYPEHASH()`
    async fn withdrawal_typehash(&self) -> Result<B256, ChainError>;

    /// `getNonce(credentialId)`
    async fn current_nonce(&self, credential_id: &Bytes) -> Result<U256, ChainError>;

    /// `isUserRegistered(credentialId)`
    async fn is_registered(&self, credential_id: &Bytes) -> Result<bool, ChainError>;
}

/// Broadcasts contract calls.
///
/// Gas, fees, signing the outer transaction and waiting for inclusion are
/// all up to the implementor; [`ChainWriter::Receipt`] is whatever it hands
/// back.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait ChainWriter: ConditionalSync {
    /// Proof of submission, e.g. a transaction hash.
    type Receipt: ConditionalSend;

    /// Send `submission` to the chain.
    async fn submit(&self, submission: Submission) -> Result<Self::Receipt, ChainError>;
}

/// Which contract entry point a [`Submission`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    /// `register(bytes,bytes32,bytes32)`
    Register,
    /// `withdrawETH(WithdrawalRequest,bytes)`
    WithdrawEth,
    /// `withdrawToken(WithdrawalRequest,bytes)`
    WithdrawToken,
}

/// A contract call ready to be broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// The contract address
    pub to: Address,
    /// ABI calldata including the selector
    pub calldata: Bytes,
    /// The entry point being called
    pub kind: SubmissionKind,
}
