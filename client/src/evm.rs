//! `ethers` implementations of the collaborator traits.
//!
//! Contract bindings are generated from human-readable ABIs. Every read goes
//! through [`RetryStrategy`]; submissions are sent once and return the pending
//! transaction hash.

use crate::chain::{
    AchievementToken, Collaborators, FeeToken, TransactionWatcher, VotingRegistry,
};
use crate::config::VotingConfig;
use crate::error::{Result, VotingError};
use crate::retry::RetryStrategy;
use crate::types::{AdminEvent, CommentRef, RawProposal, TransactionStatus, TxHash, VoteRecord};
use async_trait::async_trait;
use ethers::contract::ContractError;
use ethers::prelude::*;
use ethers::providers::{MiddlewareError, RpcError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

mod bindings {
    pub mod registry {
        ethers::contract::abigen!(
            VotingRegistryContract,
            r#"[
                function proposalCount() external view returns (uint256)
                function getResults(uint256 proposalId) external view returns (string, uint256, bool, uint256, bool, address)
                function getVoteWeight(uint256 proposalId, address voter) external view returns (uint256)
                function owner() external view returns (address)
                function admins(address account) external view returns (bool)
                function vote(uint256 proposalId) external
                function createProposal(string description) external
                function removeProposalByName(string name) external
                function closeProposal(uint256 proposalId) external
                function addAdmin(address account) external
                function removeAdmin(address account) external
                function addComment(uint256 proposalId, string contentRef) external
                event Voted(uint256 indexed proposalId, address indexed voter)
                event AdminAdded(address indexed admin)
                event AdminRemoved(address indexed admin)
                event CommentAdded(uint256 indexed proposalId, address indexed author, string contentRef)
            ]"#
        );
    }

    pub mod erc20 {
        ethers::contract::abigen!(
            FeeTokenContract,
            r#"[
                function balanceOf(address owner) external view returns (uint256)
                function allowance(address owner, address spender) external view returns (uint256)
                function approve(address spender, uint256 amount) external returns (bool)
            ]"#
        );
    }

    pub mod erc721 {
        ethers::contract::abigen!(
            BadgeTokenContract,
            r#"[
                function balanceOf(address owner) external view returns (uint256)
                function ownerOf(uint256 tokenId) external view returns (address)
                function tokenURI(uint256 tokenId) external view returns (string)
                event Transfer(address indexed from, address indexed to, uint256 indexed tokenId)
            ]"#
        );
    }
}

use bindings::erc20::FeeTokenContract;
use bindings::erc721::BadgeTokenContract;
use bindings::registry::VotingRegistryContract;

/// Signing client used for every contract
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

fn map_contract_error(err: ContractError<SignerClient>) -> VotingError {
    if let Some(reason) = err.decode_revert::<String>() {
        return VotingError::Reverted(reason);
    }
    if err.as_revert().is_some() {
        return VotingError::Reverted(String::new());
    }

    let response = match &err {
        ContractError::MiddlewareError { e } => MiddlewareError::as_error_response(e),
        ContractError::ProviderError { e } => RpcError::as_error_response(e),
        _ => None,
    };
    if let Some(response) = response {
        return VotingError::from_rpc_error(response.code, &response.message);
    }

    match err {
        ContractError::MiddlewareError { e } => VotingError::NetworkError(e.to_string()),
        ContractError::ProviderError { e } => map_provider_error(e),
        other => VotingError::InvalidResponse(other.to_string()),
    }
}

fn map_provider_error(err: ProviderError) -> VotingError {
    match RpcError::as_error_response(&err) {
        Some(response) => VotingError::from_rpc_error(response.code, &response.message),
        None => VotingError::NetworkError(err.to_string()),
    }
}

/// Indexed `uint256` topic for an id
fn id_topic(id: u64) -> H256 {
    let mut topic = [0u8; 32];
    U256::from(id).to_big_endian(&mut topic);
    H256::from(topic)
}

fn to_id(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

/// Connected EVM chain
pub struct EvmChain {
    client: Arc<SignerClient>,
    registry: Arc<EvmVotingRegistry>,
    fee_token: Arc<EvmFeeToken>,
    watcher: Arc<EvmWatcher>,
    badges: Option<Arc<EvmBadgeToken>>,
    registry_address: Address,
    chain_id: u64,
}

impl EvmChain {
    /// Connect to the configured node with `wallet` as the signer.
    ///
    /// Fails with `NotConfigured` when the registry or fee token address is
    /// missing. A chain id other than the expected one is only logged.
    pub async fn connect(config: &VotingConfig, wallet: LocalWallet) -> Result<Self> {
        let (registry_address, token_address) = config.require_contracts()?;

        let url = Url::parse(&config.rpc_url)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let provider = Provider::new(Http::new_with_client(url, http))
            .interval(Duration::from_millis(config.tx_poll_interval_ms));

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(map_provider_error)?
            .as_u64();

        if config.is_expected_chain(chain_id) {
            info!("Connected to chain {} at {}", chain_id, config.rpc_url);
        } else {
            warn!(
                "Connected to chain ID {:#x}, expected {:#x}",
                chain_id,
                config.expected_chain_id()
            );
        }

        let client = Arc::new(SignerMiddleware::new(
            provider,
            wallet.with_chain_id(chain_id),
        ));
        let retry = RetryStrategy::from_config(config);
        let from_block = config.event_start_block;

        let registry = Arc::new(EvmVotingRegistry {
            contract: VotingRegistryContract::new(registry_address, client.clone()),
            retry: retry.clone(),
            from_block,
        });
        let fee_token = Arc::new(EvmFeeToken {
            contract: FeeTokenContract::new(token_address, client.clone()),
            retry: retry.clone(),
        });
        let watcher = Arc::new(EvmWatcher {
            client: client.clone(),
        });
        let badges = config.badge_contract.map(|address| {
            Arc::new(EvmBadgeToken {
                contract: BadgeTokenContract::new(address, client.clone()),
                retry: retry.clone(),
                from_block,
            })
        });

        Ok(Self {
            client,
            registry,
            fee_token,
            watcher,
            badges,
            registry_address,
            chain_id,
        })
    }

    /// Signer address
    pub fn account(&self) -> Address {
        self.client.address()
    }

    /// Chain id reported by the node at connect time
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Latest block number, used as a liveness check
    pub async fn block_number(&self) -> Result<u64> {
        Ok(self
            .client
            .get_block_number()
            .await
            .map_err(|e| VotingError::NetworkError(e.to_string()))?
            .as_u64())
    }

    /// Trait-object handles for the core
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            registry: self.registry.clone(),
            registry_address: self.registry_address,
            signer: Some(self.account()),
            fee_token: self.fee_token.clone(),
            watcher: self.watcher.clone(),
            badges: self
                .badges
                .clone()
                .map(|b| b as Arc<dyn AchievementToken>),
        }
    }
}

/// Voting registry over `ethers`
pub struct EvmVotingRegistry {
    contract: VotingRegistryContract<SignerClient>,
    retry: RetryStrategy,
    from_block: u64,
}

#[async_trait]
impl VotingRegistry for EvmVotingRegistry {
    async fn proposal_count(&self) -> Result<u64> {
        let count = self
            .retry
            .retry(|| async {
                self.contract
                    .proposal_count()
                    .call()
                    .await
                    .map_err(map_contract_error)
            })
            .await?;
        Ok(to_id(count))
    }

    async fn get_results(&self, id: u64) -> Result<RawProposal> {
        self.retry
            .retry(|| async {
                self.contract
                    .get_results(U256::from(id))
                    .call()
                    .await
                    .map_err(map_contract_error)
            })
            .await
    }

    async fn get_vote_weight(&self, id: u64, voter: Address) -> Result<U256> {
        self.retry
            .retry(|| async {
                self.contract
                    .get_vote_weight(U256::from(id), voter)
                    .call()
                    .await
                    .map_err(map_contract_error)
            })
            .await
    }

    async fn owner(&self) -> Result<Address> {
        self.retry
            .retry(|| async { self.contract.owner().call().await.map_err(map_contract_error) })
            .await
    }

    async fn is_admin(&self, address: Address) -> Result<bool> {
        self.retry
            .retry(|| async {
                self.contract
                    .admins(address)
                    .call()
                    .await
                    .map_err(map_contract_error)
            })
            .await
    }

    async fn admin_events(&self) -> Result<Vec<AdminEvent>> {
        let added = self.retry.retry(|| async {
            self.contract
                .admin_added_filter()
                .from_block(self.from_block)
                .query()
                .await
                .map_err(map_contract_error)
        });
        let removed = self.retry.retry(|| async {
            self.contract
                .admin_removed_filter()
                .from_block(self.from_block)
                .query()
                .await
                .map_err(map_contract_error)
        });

        let (added, removed) = futures::try_join!(added, removed)?;
        debug!(
            "Admin events: {} added, {} removed",
            added.len(),
            removed.len()
        );

        Ok(added
            .into_iter()
            .map(|e| AdminEvent::Added(e.admin))
            .chain(removed.into_iter().map(|e| AdminEvent::Removed(e.admin)))
            .collect())
    }

    async fn voted_events(&self, proposal_id: u64) -> Result<Vec<VoteRecord>> {
        let events = self
            .retry
            .retry(|| async {
                self.contract
                    .voted_filter()
                    .topic1(id_topic(proposal_id))
                    .from_block(self.from_block)
                    .query()
                    .await
                    .map_err(map_contract_error)
            })
            .await?;

        Ok(events
            .into_iter()
            .map(|e| VoteRecord {
                proposal_id,
                voter: e.voter,
                weight: U256::one(),
            })
            .collect())
    }

    async fn comment_events(&self, proposal_id: u64) -> Result<Vec<CommentRef>> {
        let events = self
            .retry
            .retry(|| async {
                self.contract
                    .comment_added_filter()
                    .topic1(id_topic(proposal_id))
                    .from_block(self.from_block)
                    .query()
                    .await
                    .map_err(map_contract_error)
            })
            .await?;

        Ok(events
            .into_iter()
            .map(|e| CommentRef {
                proposal_id,
                author: e.author,
                content_ref: e.content_ref,
            })
            .collect())
    }

    async fn vote(&self, proposal_id: u64) -> Result<TxHash> {
        let call = self.contract.vote(U256::from(proposal_id));
        let pending = call.send().await.map_err(map_contract_error)?;
        Ok(pending.tx_hash())
    }

    async fn create_proposal(&self, description: &str) -> Result<TxHash> {
        let call = self.contract.create_proposal(description.to_string());
        let pending = call.send().await.map_err(map_contract_error)?;
        Ok(pending.tx_hash())
    }

    async fn remove_proposal_by_name(&self, name: &str) -> Result<TxHash> {
        let call = self.contract.remove_proposal_by_name(name.to_string());
        let pending = call.send().await.map_err(map_contract_error)?;
        Ok(pending.tx_hash())
    }

    async fn close_proposal(&self, proposal_id: u64) -> Result<TxHash> {
        let call = self.contract.close_proposal(U256::from(proposal_id));
        let pending = call.send().await.map_err(map_contract_error)?;
        Ok(pending.tx_hash())
    }

    async fn add_admin(&self, address: Address) -> Result<TxHash> {
        let call = self.contract.add_admin(address);
        let pending = call.send().await.map_err(map_contract_error)?;
        Ok(pending.tx_hash())
    }

    async fn remove_admin(&self, address: Address) -> Result<TxHash> {
        let call = self.contract.remove_admin(address);
        let pending = call.send().await.map_err(map_contract_error)?;
        Ok(pending.tx_hash())
    }

    async fn add_comment(&self, proposal_id: u64, content_ref: &str) -> Result<TxHash> {
        let call = self
            .contract
            .add_comment(U256::from(proposal_id), content_ref.to_string());
        let pending = call.send().await.map_err(map_contract_error)?;
        Ok(pending.tx_hash())
    }
}

/// ERC-20 fee token over `ethers`
pub struct EvmFeeToken {
    contract: FeeTokenContract<SignerClient>,
    retry: RetryStrategy,
}

#[async_trait]
impl FeeToken for EvmFeeToken {
    async fn balance_of(&self, holder: Address) -> Result<U256> {
        self.retry
            .retry(|| async {
                self.contract
                    .balance_of(holder)
                    .call()
                    .await
                    .map_err(map_contract_error)
            })
            .await
    }

    async fn allowance(&self, holder: Address, spender: Address) -> Result<U256> {
        self.retry
            .retry(|| async {
                self.contract
                    .allowance(holder, spender)
                    .call()
                    .await
                    .map_err(map_contract_error)
            })
            .await
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<TxHash> {
        let call = self.contract.approve(spender, amount);
        let pending = call.send().await.map_err(map_contract_error)?;
        Ok(pending.tx_hash())
    }
}

/// Receipt lookup over `ethers`
pub struct EvmWatcher {
    client: Arc<SignerClient>,
}

#[async_trait]
impl TransactionWatcher for EvmWatcher {
    async fn transaction_status(&self, hash: TxHash) -> Result<TransactionStatus> {
        let receipt = self
            .client
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| VotingError::NetworkError(e.to_string()))?;

        match receipt {
            Some(receipt) => match receipt.status.map(|s| s.as_u64()) {
                Some(1) => Ok(TransactionStatus::Confirmed),
                Some(_) => Ok(TransactionStatus::Reverted(None)),
                // Pre-Byzantium receipts carry no status
                None => Ok(TransactionStatus::Confirmed),
            },
            None => {
                let tx = self
                    .client
                    .get_transaction(hash)
                    .await
                    .map_err(|e| VotingError::NetworkError(e.to_string()))?;
                Ok(match tx {
                    Some(_) => TransactionStatus::Pending,
                    None => TransactionStatus::NotFound,
                })
            }
        }
    }
}

/// ERC-721 achievement token over `ethers`
pub struct EvmBadgeToken {
    contract: BadgeTokenContract<SignerClient>,
    retry: RetryStrategy,
    from_block: u64,
}

#[async_trait]
impl AchievementToken for EvmBadgeToken {
    async fn balance_of(&self, holder: Address) -> Result<U256> {
        self.retry
            .retry(|| async {
                self.contract
                    .balance_of(holder)
                    .call()
                    .await
                    .map_err(map_contract_error)
            })
            .await
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address> {
        self.retry
            .retry(|| async {
                self.contract
                    .owner_of(token_id)
                    .call()
                    .await
                    .map_err(map_contract_error)
            })
            .await
    }

    async fn token_uri(&self, token_id: U256) -> Result<String> {
        self.retry
            .retry(|| async {
                self.contract
                    .token_uri(token_id)
                    .call()
                    .await
                    .map_err(map_contract_error)
            })
            .await
    }

    async fn transfers_to(&self, holder: Address) -> Result<Vec<U256>> {
        let events = self
            .retry
            .retry(|| async {
                self.contract
                    .transfer_filter()
                    .topic2(holder)
                    .from_block(self.from_block)
                    .query()
                    .await
                    .map_err(map_contract_error)
            })
            .await?;

        Ok(events
            .into_iter()
            .filter(|e| e.to == holder)
            .map(|e| e.token_id)
            .collect())
    }

    async fn mints(&self) -> Result<Vec<U256>> {
        let events = self
            .retry
            .retry(|| async {
                self.contract
                    .transfer_filter()
                    .topic1(Address::zero())
                    .from_block(self.from_block)
                    .query()
                    .await
                    .map_err(map_contract_error)
            })
            .await?;

        Ok(events
            .into_iter()
            .filter(|e| e.from == Address::zero())
            .map(|e| e.token_id)
            .collect())
    }
}
