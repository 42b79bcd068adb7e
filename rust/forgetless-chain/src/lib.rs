#![warn(missing_docs)]

//! The chain side of the Forgetless wallet.
//!
//! A withdrawal is authorized by a passkey signature over an EIP-712 digest
//! ([`build_challenge`]). The assertion is packed into the contract's
//! `authData` argument ([`encode_auth_data`]) and sent as `withdrawETH` or
//! `withdrawToken` calldata. [`Wallet`] runs the whole pipeline against a
//! [`ChainReader`] and hands the result to a [`ChainWriter`].

mod auth_data;
mod challenge;
mod collaborator;
mod config;
mod error;
mod wallet;

pub mod contract;
pub mod memory;
pub mod rpc;

pub use auth_data::*;
pub use challenge::*;
pub use collaborator::*;
pub use config::*;
pub use error::*;
pub use memory::InMemoryChain;
pub use rpc::JsonRpcChainReader;
pub use wallet::*;
