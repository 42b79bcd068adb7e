use alloy_primitives::{Address, B256, address};
use serde::{Deserialize, Serialize};

/// ForgetlessWallet deployment on Base Sepolia.
pub const BASE_SEPOLIA_WALLET: Address = address!("e28b90cb851c9bc144e3ad0737310abcf6f13c91");

/// Default signature validity window in seconds.
pub const DEFAULT_WITHDRAWAL_VALIDITY: u64 = 3600;

/// An EVM network the wallet can talk to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// Human readable name
    pub name: String,
    /// JSON-RPC endpoint (e.g. "https://sepolia.base.org")
    pub rpc_url: String,
    /// Block explorer base URL
    pub explorer: String,
}

impl Network {
    /// Base mainnet.
    pub fn base() -> Self {
        Self {
            chain_id: 8453,
            name: "Base".to_string(),
            rpc_url: "https://mainnet.base.org".to_string(),
            explorer: "https://basescan.org".to_string(),
        }
    }

    /// Base Sepolia testnet.
    pub fn base_sepolia() -> Self {
        Self {
            chain_id: 84532,
            name: "Base Sepolia".to_string(),
            rpc_url: "https://sepolia.base.org".to_string(),
            explorer: "https://sepolia.basescan.org".to_string(),
        }
    }

    /// Explorer page for a transaction.
    pub fn transaction_url(&self, hash: B256) -> String {
        format!("{}/tx/{}", self.explorer.trim_end_matches('/'), hash)
    }

    /// Explorer page for an address.
    pub fn address_url(&self, address: Address) -> String {
        format!("{}/address/{}", self.explorer.trim_end_matches('/'), address)
    }
}

/// Where the wallet contract lives and how withdrawals are signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Network the contract is deployed on
    pub network: Network,

    /// ForgetlessWallet contract address
    pub contract: Address,

    /// Seconds a withdrawal signature stays valid (default: 3600)
    pub withdrawal_validity: u64,

    /// Optional timeout for RPC requests in seconds (default: 30)
    pub timeout_seconds: Option<u64>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::base_sepolia(),
            contract: BASE_SEPOLIA_WALLET,
            withdrawal_validity: DEFAULT_WITHDRAWAL_VALIDITY,
            timeout_seconds: Some(30),
        }
    }
}

impl WalletConfig {
    /// Create a configuration for a contract on `network`
    pub fn new(network: Network, contract: Address) -> Self {
        Self {
            network,
            contract,
            ..Default::default()
        }
    }

    /// Set the signature validity window
    pub fn with_withdrawal_validity(mut self, seconds: u64) -> Self {
        self.withdrawal_validity = seconds;
        self
    }

    /// Set the RPC request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Point at a different RPC endpoint on the same network
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.network.rpc_url = rpc_url.into();
        self
    }
}
