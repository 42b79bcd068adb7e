//! EIP-712 withdrawal challenge.
//!
//! The digest a passkey signs to authorize a withdrawal:
//!
//! ```text
//! credentialIdHash = keccak256(credentialId)
//! structHash       = keccak256(abi.encode(typehash, credentialIdHash, token,
//!                                         amount, recipient, nonce, deadline))
//! digest           = keccak256(0x19 0x01 || domainSeparator || structHash)
//! ```
//!
//! The domain separator and typehash are read from the deployed contract, so
//! a contract upgrade that changes the struct definition needs no change
//! here.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::contract::IForgetlessWallet;

/// A 32-byte EIP-712 signing digest.
pub type Digest = B256;

const EIP712_PREFIX: [u8; 2] = [0x19, 0x01];

/// Every field the contract binds into a withdrawal signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalChallengeParams {
    /// Credential id of the signing passkey
    pub credential_id: Bytes,
    /// ERC-20 token, or the zero address for ETH
    pub token: Address,
    /// Amount in the token's base units
    pub amount: U256,
    /// Receiver of the funds
    pub recipient: Address,
    /// The credential's current contract nonce
    pub nonce: U256,
    /// Unix timestamp after which the signature is void
    pub deadline: U256,
}

impl WithdrawalChallengeParams {
    /// Whether this withdraws native ETH rather than a token.
    pub fn is_native(&self) -> bool {
        self.token.is_zero()
    }

    /// The contract's `WithdrawalRequest` struct for these fields.
    pub fn to_request(&self) -> IForgetlessWallet::WithdrawalRequest {
        IForgetlessWallet::WithdrawalRequest {
            credentialId: self.credential_id.clone(),
            token: self.token,
            amount: self.amount,
            recipient: self.recipient,
            nonce: self.nonce,
            deadline: self.deadline,
        }
    }
}

/// `keccak256(abi.encode(typehash, keccak256(credentialId), ...))`
pub fn struct_hash(params: &WithdrawalChallengeParams, typehash: B256) -> B256 {
    keccak256(
        (
            typehash,
            keccak256(&params.credential_id),
            params.token,
            params.amount,
            params.recipient,
            params.nonce,
            params.deadline,
        )
            .abi_encode(),
    )
}

/// Compute the digest a passkey must sign to authorize `params`.
pub fn build_challenge(
    params: &WithdrawalChallengeParams,
    domain_separator: B256,
    typehash: B256,
) -> Digest {
    let mut message = [0u8; 66];
    message[..2].copy_from_slice(&EIP712_PREFIX);
    message[2..34].copy_from_slice(domain_separator.as_slice());
    message[34..].copy_from_slice(struct_hash(params, typehash).as_slice());
    keccak256(message)
}
