//! Network and contract configuration.
//!
//! This module provides configuration for connecting to an EVM network, the
//! addresses of the voting registry, fee token and achievement token
//! contracts, the comment content store, and the timing knobs used by the
//! retry, monitor and clock layers.

use crate::error::{Result, VotingError};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Network type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Ethereum mainnet
    Mainnet,
    /// Sepolia testnet
    Sepolia,
    /// Local development node (hardhat / anvil)
    Localhost,
    /// Custom network with user-defined endpoints
    Custom,
}

impl Network {
    /// Chain id for this network
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Sepolia => 11_155_111,
            Network::Localhost => 31_337,
            Network::Custom => 0,
        }
    }

    /// Get the default RPC URL for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://ethereum-rpc.publicnode.com",
            Network::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com",
            Network::Localhost => "http://127.0.0.1:8545",
            Network::Custom => "",
        }
    }

    /// Look up a known network by chain id
    pub fn from_chain_id(chain_id: u64) -> Self {
        match chain_id {
            1 => Network::Mainnet,
            11_155_111 => Network::Sepolia,
            31_337 => Network::Localhost,
            _ => Network::Custom,
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    /// Development build, expects Sepolia
    Development,
    /// Production build, expects mainnet
    Production,
}

impl AppEnv {
    /// Network a wallet is expected to be connected to
    pub fn expected_network(&self) -> Network {
        match self {
            AppEnv::Development => Network::Sepolia,
            AppEnv::Production => Network::Mainnet,
        }
    }
}

/// Configuration for the voting client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingConfig {
    /// Deployment environment
    pub app_env: AppEnv,

    /// Network to connect to
    pub network: Network,

    /// JSON-RPC endpoint URL
    pub rpc_url: String,

    /// Expected chain id
    pub chain_id: u64,

    /// Voting registry contract
    pub voting_contract: Option<Address>,

    /// Fee token contract (ERC-20)
    pub fee_token: Option<Address>,

    /// Achievement token contract (ERC-721, non-transferable)
    pub badge_contract: Option<Address>,

    /// Content store pinning API
    pub content_api_url: String,

    /// Content store gateway
    pub content_gateway_url: String,

    /// Bearer token for the pinning API
    pub content_jwt: Option<String>,

    /// Vote fee in whole tokens
    pub vote_fee: u64,

    /// Proposal fee in whole tokens
    pub proposal_fee: u64,

    /// Fee token decimals
    pub token_decimals: u32,

    /// Maximum proposal description length (characters)
    pub max_description_len: usize,

    /// HTTP request timeout (in seconds)
    pub request_timeout_secs: u64,

    /// Maximum number of retries for failed reads
    pub max_retries: usize,

    /// Initial retry delay (in milliseconds)
    pub retry_initial_delay_ms: u64,

    /// Maximum retry delay (in milliseconds)
    pub retry_max_delay_ms: u64,

    /// Retry backoff multiplier
    pub retry_multiplier: f64,

    /// Transaction polling interval (in milliseconds)
    pub tx_poll_interval_ms: u64,

    /// Transaction timeout (in seconds)
    pub tx_timeout_secs: u64,

    /// Countdown clock period (in milliseconds)
    pub clock_tick_ms: u64,

    /// First block scanned for registry events
    pub event_start_block: u64,
}

impl VotingConfig {
    /// Create a new configuration for the specified network
    pub fn new(network: Network) -> Self {
        let app_env = if network == Network::Mainnet {
            AppEnv::Production
        } else {
            AppEnv::Development
        };

        Self {
            app_env,
            network,
            rpc_url: network.default_rpc_url().to_string(),
            chain_id: network.chain_id(),
            voting_contract: None,
            fee_token: None,
            badge_contract: None,
            content_api_url: "https://api.pinata.cloud".to_string(),
            content_gateway_url: "https://gateway.pinata.cloud".to_string(),
            content_jwt: None,
            vote_fee: 10,
            proposal_fee: 25,
            token_decimals: 18,
            max_description_len: 20,
            request_timeout_secs: 30,
            max_retries: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 5000,
            retry_multiplier: 2.0,
            tx_poll_interval_ms: 1000,
            tx_timeout_secs: 120,
            clock_tick_ms: 1000,
            event_start_block: 0,
        }
    }

    /// Create configuration for Sepolia
    pub fn sepolia() -> Self {
        Self::new(Network::Sepolia)
    }

    /// Create configuration for mainnet
    pub fn mainnet() -> Self {
        Self::new(Network::Mainnet)
    }

    /// Create configuration for a local node
    pub fn localhost() -> Self {
        Self::new(Network::Localhost)
    }

    /// Create a custom configuration
    pub fn custom(rpc_url: String, chain_id: u64) -> Result<Self> {
        if rpc_url.is_empty() {
            return Err(VotingError::ConfigError(
                "RPC URL cannot be empty".to_string(),
            ));
        }
        Url::parse(&rpc_url)?;

        let mut config = Self::new(Network::Custom);
        config.rpc_url = rpc_url;
        config.chain_id = chain_id;
        Ok(config)
    }

    /// Load configuration from defaults, an optional TOML file and
    /// `BALLOTBOX_*` environment variables, in increasing precedence.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::sepolia())
            .map_err(|e| VotingError::ConfigError(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("BALLOTBOX").try_parsing(true),
        );

        let loaded: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| VotingError::ConfigError(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Set the voting registry, fee token and badge contract addresses
    pub fn with_contracts(
        mut self,
        voting_contract: Address,
        fee_token: Address,
        badge_contract: Option<Address>,
    ) -> Self {
        self.voting_contract = Some(voting_contract);
        self.fee_token = Some(fee_token);
        self.badge_contract = badge_contract;
        self
    }

    /// Set content store endpoints
    pub fn with_content_store(
        mut self,
        api_url: String,
        gateway_url: String,
        jwt: Option<String>,
    ) -> Self {
        self.content_api_url = api_url;
        self.content_gateway_url = gateway_url;
        self.content_jwt = jwt;
        self
    }

    /// Set action fees in whole tokens
    pub fn with_fees(mut self, vote_fee: u64, proposal_fee: u64) -> Self {
        self.vote_fee = vote_fee;
        self.proposal_fee = proposal_fee;
        self
    }

    /// Set fee token decimals
    pub fn with_token_decimals(mut self, decimals: u32) -> Self {
        self.token_decimals = decimals;
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Set maximum retries
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set retry delays
    pub fn with_retry_config(
        mut self,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    ) -> Self {
        self.retry_initial_delay_ms = initial_delay_ms;
        self.retry_max_delay_ms = max_delay_ms;
        self.retry_multiplier = multiplier;
        self
    }

    /// Set transaction polling configuration
    pub fn with_tx_config(mut self, poll_interval_ms: u64, timeout_secs: u64) -> Self {
        self.tx_poll_interval_ms = poll_interval_ms;
        self.tx_timeout_secs = timeout_secs;
        self
    }

    /// Set the first block scanned for events
    pub fn with_event_start_block(mut self, block: u64) -> Self {
        self.event_start_block = block;
        self
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Countdown clock period
    pub fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.clock_tick_ms)
    }

    /// Vote fee in token base units
    pub fn vote_fee_amount(&self) -> U256 {
        to_base_units(self.vote_fee, self.token_decimals)
    }

    /// Proposal fee in token base units
    pub fn proposal_fee_amount(&self) -> U256 {
        to_base_units(self.proposal_fee, self.token_decimals)
    }

    /// Chain id a wallet is expected to report
    pub fn expected_chain_id(&self) -> u64 {
        match self.network {
            Network::Custom | Network::Localhost => self.chain_id,
            _ => self.app_env.expected_network().chain_id(),
        }
    }

    /// Whether a connected chain id is the one this environment expects
    pub fn is_expected_chain(&self, chain_id: u64) -> bool {
        chain_id == self.expected_chain_id()
    }

    /// Registry and fee token addresses, or `NotConfigured` naming every
    /// missing one
    pub fn require_contracts(&self) -> Result<(Address, Address)> {
        match (self.voting_contract, self.fee_token) {
            (Some(voting), Some(token)) => Ok((voting, token)),
            (voting, token) => {
                let mut missing = Vec::new();
                if voting.is_none() {
                    missing.push("voting_contract");
                }
                if token.is_none() {
                    missing.push("fee_token");
                }
                Err(VotingError::NotConfigured(format!(
                    "Missing required configuration: {}",
                    missing.join(", ")
                )))
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(VotingError::ConfigError(
                "RPC URL cannot be empty".to_string(),
            ));
        }
        Url::parse(&self.rpc_url)?;
        Url::parse(&self.content_api_url)?;
        Url::parse(&self.content_gateway_url)?;

        if self.max_retries == 0 {
            return Err(VotingError::ConfigError(
                "Max retries must be greater than 0".to_string(),
            ));
        }
        if self.retry_initial_delay_ms == 0 {
            return Err(VotingError::ConfigError(
                "Retry initial delay must be greater than 0".to_string(),
            ));
        }
        if self.retry_multiplier <= 1.0 {
            return Err(VotingError::ConfigError(
                "Retry multiplier must be greater than 1.0".to_string(),
            ));
        }
        if self.tx_poll_interval_ms == 0 {
            return Err(VotingError::ConfigError(
                "Transaction poll interval must be greater than 0".to_string(),
            ));
        }
        if self.tx_timeout_secs == 0 {
            return Err(VotingError::ConfigError(
                "Transaction timeout must be greater than 0".to_string(),
            ));
        }
        if self.clock_tick_ms == 0 {
            return Err(VotingError::ConfigError(
                "Clock tick must be greater than 0".to_string(),
            ));
        }
        if self.max_description_len == 0 {
            return Err(VotingError::ConfigError(
                "Max description length must be greater than 0".to_string(),
            ));
        }
        if self.token_decimals > 77 {
            return Err(VotingError::ConfigError(
                "Token decimals must fit in a 256-bit amount".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self::sepolia()
    }
}

fn to_base_units(whole: u64, decimals: u32) -> U256 {
    U256::from(whole) * U256::exp10(decimals as usize)
}
