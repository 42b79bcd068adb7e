//! A ForgetlessWallet contract held in memory.
//!
//! [`InMemoryChain`] answers the contract's view functions and accepts
//! `register` / `withdraw*` submissions, tracking registrations and nonces
//! the way the deployed contract does. Signatures are not checked; it exists
//! to drive the wallet pipelines without a node.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolInterface;
use forgetless_common::short_hex;
use forgetless_credentials::P256PublicKey;
use tracing::debug;

use crate::contract::IForgetlessWallet::{self, IForgetlessWalletCalls};
use crate::{ChainError, ChainReader, ChainWriter, Submission};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Bytes, Account>,
    submissions: Vec<Submission>,
}

#[derive(Debug, Clone, Copy)]
struct Account {
    public_key: P256PublicKey,
    nonce: U256,
}

/// In-memory contract state.
#[derive(Debug)]
pub struct InMemoryChain {
    contract: Address,
    domain_separator: B256,
    typehash: B256,
    state: Mutex<State>,
}

impl InMemoryChain {
    /// A contract at `contract` with the given EIP-712 constants and no
    /// registered credentials.
    pub fn new(contract: Address, domain_separator: B256, typehash: B256) -> Self {
        Self {
            contract,
            domain_separator,
            typehash,
            state: Mutex::new(State::default()),
        }
    }

    /// Register a credential directly, bypassing a submission.
    pub fn insert_credential(
        &self,
        credential_id: impl Into<Bytes>,
        public_key: P256PublicKey,
    ) -> Result<(), ChainError> {
        self.lock()?.accounts.insert(
            credential_id.into(),
            Account {
                public_key,
                nonce: U256::ZERO,
            },
        );
        Ok(())
    }

    /// The public key registered for `credential_id`.
    pub fn public_key(&self, credential_id: &Bytes) -> Option<P256PublicKey> {
        let state = self.state.lock().ok()?;
        state
            .accounts
            .get(credential_id)
            .map(|account| account.public_key)
    }

    /// Every accepted submission, oldest first.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state
            .lock()
            .map(|state| state.submissions.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ChainError> {
        self.state
            .lock()
            .map_err(|_| ChainError::Transport("contract state lock poisoned".to_string()))
    }

    fn apply(&self, state: &mut State, submission: &Submission) -> Result<(), ChainError> {
        if submission.to != self.contract {
            return Err(ChainError::Rejected(format!(
                "no contract at {}",
                submission.to
            )));
        }

        let call = IForgetlessWalletCalls::abi_decode(&submission.calldata)
            .map_err(|e| ChainError::Decode(e.to_string()))?;

        match call {
            IForgetlessWalletCalls::register(call) => {
                if state.accounts.contains_key(&call.credentialId) {
                    return Err(ChainError::Rejected("credential already registered".into()));
                }
                let public_key = P256PublicKey::new(call.publicKeyX, call.publicKeyY)
                    .map_err(|e| ChainError::Rejected(e.to_string()))?;
                state.accounts.insert(
                    call.credentialId,
                    Account {
                        public_key,
                        nonce: U256::ZERO,
                    },
                );
                Ok(())
            }
            IForgetlessWalletCalls::withdrawETH(call) => consume_nonce(state, &call.request),
            IForgetlessWalletCalls::withdrawToken(call) => consume_nonce(state, &call.request),
            _ => Err(ChainError::Rejected("not a state changing call".into())),
        }
    }
}

fn consume_nonce(
    state: &mut State,
    request: &IForgetlessWallet::WithdrawalRequest,
) -> Result<(), ChainError> {
    let account = state
        .accounts
        .get_mut(&request.credentialId)
        .ok_or_else(|| ChainError::NotRegistered(short_hex(&request.credentialId)))?;
    if account.nonce != request.nonce {
        return Err(ChainError::Rejected(format!(
            "invalid nonce {} (expected {})",
            request.nonce, account.nonce
        )));
    }
    account.nonce += U256::from(1u64);
    Ok(())
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl ChainReader for InMemoryChain {
    async fn domain_separator(&self) -> Result<B256, ChainError> {
        Ok(self.domain_separator)
    }

    async fn withdrawal_typehash(&self) -> Result<B256, ChainError> {
        Ok(self.typehash)
    }

    async fn current_nonce(&self, credential_id: &Bytes) -> Result<U256, ChainError> {
        Ok(self
            .lock()?
            .accounts
            .get(credential_id)
            .map(|account| account.nonce)
            .unwrap_or_default())
    }

    async fn is_registered(&self, credential_id: &Bytes) -> Result<bool, ChainError> {
        Ok(self.lock()?.accounts.contains_key(credential_id))
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl ChainWriter for InMemoryChain {
    /// `keccak256(calldata)`, standing in for a transaction hash.
    type Receipt = B256;

    async fn submit(&self, submission: Submission) -> Result<B256, ChainError> {
        let mut state = self.lock()?;
        self.apply(&mut state, &submission)?;

        let receipt = keccak256(&submission.calldata);
        debug!(kind = ?submission.kind, %receipt, "accepted submission");
        state.submissions.push(submission);
        Ok(receipt)
    }
}
