use forgetless_credentials::{AssertionError, PasskeyError};
use thiserror::Error;

/// Errors talking to the ForgetlessWallet contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The RPC endpoint could not be reached or answered garbage
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Message reported by the node
        message: String,
    },

    /// Contract return data did not decode as the expected ABI type
    #[error("Failed to decode contract return data: {0}")]
    Decode(String),

    /// The contract does not know the credential
    #[error("Credential {0} is not registered")]
    NotRegistered(String),

    /// A chain writer refused the submission
    #[error("Submission rejected: {0}")]
    Rejected(String),

    /// Configuration does not describe a reachable contract
    #[error("Invalid chain configuration: {0}")]
    Configuration(String),
}

/// Errors surfaced by the wallet pipelines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Passkey ceremony or parsing failure
    #[error(transparent)]
    Passkey(#[from] PasskeyError),

    /// The signed assertion failed local verification
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// Contract read or submission failure
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A withdrawal amount could not be parsed
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The system clock is before the unix epoch
    #[error("System clock error: {0}")]
    Clock(String),
}

impl WalletError {
    /// Whether the user can simply try again (they dismissed the prompt).
    pub fn is_user_recoverable(&self) -> bool {
        matches!(self, WalletError::Passkey(error) if error.is_user_recoverable())
    }
}
