//! Collaborator seams for the external contracts.
//!
//! The core never talks to a node directly; it goes through these traits so
//! that the EVM bindings in [`crate::evm`] can be swapped for fakes in tests.
//! Mutating calls resolve once the signer has signed and the node accepted
//! the transaction, returning its hash. Confirmation is awaited separately
//! through [`TransactionWatcher`].

use crate::error::Result;
use crate::types::{AdminEvent, CommentRef, RawProposal, TransactionStatus, TxHash, VoteRecord};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

/// Voting registry contract
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VotingRegistry: Send + Sync {
    /// `proposalCount()`
    async fn proposal_count(&self) -> Result<u64>;

    /// `getResults(id)`
    async fn get_results(&self, id: u64) -> Result<RawProposal>;

    /// `getVoteWeight(id, voter)`
    async fn get_vote_weight(&self, id: u64, voter: Address) -> Result<U256>;

    /// `owner()`
    async fn owner(&self) -> Result<Address>;

    /// `admins(address)`
    async fn is_admin(&self, address: Address) -> Result<bool>;

    /// Every `AdminAdded` / `AdminRemoved` event in the queried window
    async fn admin_events(&self) -> Result<Vec<AdminEvent>>;

    /// `Voted` events for one proposal
    async fn voted_events(&self, proposal_id: u64) -> Result<Vec<VoteRecord>>;

    /// `CommentAdded` events for one proposal
    async fn comment_events(&self, proposal_id: u64) -> Result<Vec<CommentRef>>;

    /// `vote(id)`
    async fn vote(&self, proposal_id: u64) -> Result<TxHash>;

    /// `createProposal(description)`
    async fn create_proposal(&self, description: &str) -> Result<TxHash>;

    /// `removeProposalByName(name)`
    async fn remove_proposal_by_name(&self, name: &str) -> Result<TxHash>;

    /// `closeProposal(id)`
    async fn close_proposal(&self, proposal_id: u64) -> Result<TxHash>;

    /// `addAdmin(address)`
    async fn add_admin(&self, address: Address) -> Result<TxHash>;

    /// `removeAdmin(address)`
    async fn remove_admin(&self, address: Address) -> Result<TxHash>;

    /// `addComment(id, contentRef)`
    async fn add_comment(&self, proposal_id: u64, content_ref: &str) -> Result<TxHash>;
}

/// ERC-20 fee token
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeeToken: Send + Sync {
    /// `balanceOf(holder)`
    async fn balance_of(&self, holder: Address) -> Result<U256>;

    /// `allowance(holder, spender)`
    async fn allowance(&self, holder: Address, spender: Address) -> Result<U256>;

    /// `approve(spender, amount)`
    async fn approve(&self, spender: Address, amount: U256) -> Result<TxHash>;
}

/// Receipt lookup
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransactionWatcher: Send + Sync {
    /// Current status of a submitted transaction
    async fn transaction_status(&self, hash: TxHash) -> Result<TransactionStatus>;
}

/// Non-transferable ERC-721 achievement token
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AchievementToken: Send + Sync {
    /// `balanceOf(holder)`
    async fn balance_of(&self, holder: Address) -> Result<U256>;

    /// `ownerOf(tokenId)`
    async fn owner_of(&self, token_id: U256) -> Result<Address>;

    /// `tokenURI(tokenId)`
    async fn token_uri(&self, token_id: U256) -> Result<String>;

    /// Token ids from `Transfer(_, holder, _)` events
    async fn transfers_to(&self, holder: Address) -> Result<Vec<U256>>;

    /// Token ids from `Transfer(0x0, _, _)` mint events
    async fn mints(&self) -> Result<Vec<U256>>;
}

/// Handles to every external contract the client drives
#[derive(Clone)]
pub struct Collaborators {
    /// Voting registry
    pub registry: Arc<dyn VotingRegistry>,
    /// Registry address, the spender approved on the fee token
    pub registry_address: Address,
    /// Address every transaction is signed with, when the signer is fixed
    pub signer: Option<Address>,
    /// Fee token
    pub fee_token: Arc<dyn FeeToken>,
    /// Receipt lookup
    pub watcher: Arc<dyn TransactionWatcher>,
    /// Achievement token, when configured
    pub badges: Option<Arc<dyn AchievementToken>>,
}
