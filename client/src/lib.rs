//! Ballotbox Voting Client
//!
//! This library is the client core for a token-fee-gated voting registry on an
//! EVM chain. It reads and normalizes proposals, enforces the fee token
//! balance and allowance preconditions before paid actions, runs each
//! state-mutating action through an explicit state machine, keeps a
//! consistent proposal cache, and resolves the connected wallet's role.
//!
//! # Features
//!
//! - **Chain Reader**: Fetch proposals with per-id failure isolation and a canonical display order
//! - **Fee Gate**: Balance pre-check and approve-once allowance handling
//! - **Transaction Orchestration**: One action at a time, progress published on a watch channel
//! - **Proposal Cache**: Whole-list snapshot swaps, optimistic vote counts, tie-aware leader
//! - **Authorization**: Owner/admin resolution that fails closed
//! - **Comments and Badges**: Content store backed comments and achievement token listing
//! - **Retry Logic**: Exponential backoff for transient read failures
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ballotbox_client::{VotingClient, VotingConfig, SystemClock, Clock};
//! use ethers::signers::LocalWallet;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     ballotbox_client::init_tracing();
//!
//!     let config = Arc::new(VotingConfig::load(None)?);
//!     let wallet: LocalWallet = std::env::var("BALLOTBOX_PRIVATE_KEY")?.parse()?;
//!
//!     let client = VotingClient::connect_evm(config, wallet).await?;
//!     client.load().await?;
//!
//!     for view in client.proposals(SystemClock.now()).await {
//!         println!("#{} {} [{}] {}", view.proposal.id, view.proposal.description, view.status, view.time_remaining);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Examples
//!
//! ## Vote on a proposal
//!
//! ```rust,no_run
//! # use ballotbox_client::{VotingClient, ActionOutcome};
//! # async fn run(client: &VotingClient) -> ballotbox_client::Result<()> {
//! match client.vote(3).await? {
//!     ActionOutcome::Succeeded { hash } => println!("Voted: {:?}", hash),
//!     ActionOutcome::Failed(failure) => println!("{}", failure),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod badges;
pub mod cache;
pub mod chain;
pub mod clock;
pub mod comments;
pub mod config;
pub mod error;
pub mod evm;
pub mod fee_gate;
pub mod monitor;
pub mod orchestrator;
pub mod reader;
pub mod retry;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use auth::{AdminRoster, AuthorizationResolver, Role};
pub use badges::{gateway_url, BadgeGallery};
pub use cache::{ProposalCache, ProposalSnapshot, RefreshTrigger};
pub use chain::{AchievementToken, Collaborators, FeeToken, TransactionWatcher, VotingRegistry};
pub use clock::{spawn_ticker, Clock, ManualClock, SystemClock};
pub use comments::{CommentBoard, ContentStore, PinataStore};
pub use config::{AppEnv, Network, VotingConfig};
pub use error::{ActionFailure, FailureKind, Result, VotingError};
pub use evm::EvmChain;
pub use fee_gate::{ApprovalOutcome, FeeGate};
pub use monitor::{MonitorOptions, MonitorResult, TransactionMonitor};
pub use orchestrator::{Action, ActionOutcome, ActionState, TransactionOrchestrator};
pub use reader::{active_proposals, sort_for_display, ProposalReader};
pub use retry::RetryStrategy;
pub use session::SessionState;
pub use types::{
    compute_leader, format_time_remaining, Badge, Comment, CommentBody, Leader, Proposal,
    ProposalStatus, ProposalView, TransactionStatus, TxHash, VoteRecord, VotedProposal,
};

use ethers::signers::LocalWallet;
use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

/// Initialize tracing with `RUST_LOG` or `info`
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn check_signer(signer: Option<Address>, account: Option<Address>) -> Result<()> {
    match (signer, account) {
        (Some(signer), Some(account)) if signer != account => {
            Err(VotingError::SignerMismatch { signer, account })
        }
        _ => Ok(()),
    }
}

/// Main voting client combining the reader, cache, authorization resolver
/// and orchestrator for one wallet session.
///
/// This is the primary entry point for front ends.
pub struct VotingClient {
    config: Arc<VotingConfig>,
    collaborators: Collaborators,
    reader: ProposalReader,
    cache: Arc<ProposalCache>,
    auth: AuthorizationResolver,
    orchestrator: TransactionOrchestrator,
}

impl VotingClient {
    /// Create a client over already-connected collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration
    /// * `collaborators` - Contract handles
    /// * `account` - Connected wallet, if any
    ///
    /// Fails with `SignerMismatch` when `account` is not the collaborators'
    /// fixed signer.
    pub fn new(
        config: Arc<VotingConfig>,
        collaborators: Collaborators,
        account: Option<Address>,
    ) -> Result<Self> {
        config.validate()?;
        check_signer(collaborators.signer, account)?;

        info!(
            "Initializing voting client for network: {:?}",
            config.network
        );

        let session = match account {
            Some(account) => SessionState::connect(account),
            None => SessionState::disconnected(),
        };
        let session = Arc::new(RwLock::new(session));

        let reader = ProposalReader::new(collaborators.registry.clone());
        let cache = Arc::new(ProposalCache::new(reader.clone(), session));
        let monitor = TransactionMonitor::new(
            collaborators.watcher.clone(),
            MonitorOptions::from_config(&config),
        );
        let fee_gate = FeeGate::new(
            collaborators.fee_token.clone(),
            monitor.clone(),
            collaborators.registry_address,
        );
        let orchestrator = TransactionOrchestrator::new(
            collaborators.registry.clone(),
            fee_gate,
            monitor,
            cache.clone(),
            config.clone(),
        );
        let auth = AuthorizationResolver::new(collaborators.registry.clone());

        Ok(Self {
            config,
            collaborators,
            reader,
            cache,
            auth,
            orchestrator,
        })
    }

    /// Connect to the configured EVM node with `wallet` as the signer
    pub async fn connect_evm(config: Arc<VotingConfig>, wallet: LocalWallet) -> Result<Self> {
        config.validate()?;
        let chain = EvmChain::connect(&config, wallet).await?;
        let account = chain.account();
        Self::new(config, chain.collaborators(), Some(account))
    }

    /// Initial load
    pub async fn load(&self) -> Result<Arc<ProposalSnapshot>> {
        self.cache.refresh(RefreshTrigger::Initial).await
    }

    /// Refetch the proposal list
    pub async fn refresh(&self) -> Result<Arc<ProposalSnapshot>> {
        self.cache.refresh(RefreshTrigger::Manual).await
    }

    /// The wallet switched accounts (or disconnected).
    ///
    /// With a fixed signer only that signer (or `None`) is accepted; any other
    /// account needs a new client built over its own wallet.
    pub async fn on_account_changed(&self, account: Option<Address>) -> Result<Arc<ProposalSnapshot>> {
        if let Err(e) = check_signer(self.collaborators.signer, account) {
            warn!("Ignoring account change: {}", e);
            return Err(e);
        }
        info!("Account changed: {:?}", account);
        self.cache
            .refresh(RefreshTrigger::AccountChanged(account))
            .await
    }

    /// The wallet switched networks
    pub async fn on_chain_changed(&self, chain_id: u64) -> Result<Arc<ProposalSnapshot>> {
        if !self.config.is_expected_chain(chain_id) {
            warn!(
                "Switched to chain ID {:#x}, expected {:#x}",
                chain_id,
                self.config.expected_chain_id()
            );
        }
        self.cache.refresh(RefreshTrigger::ChainChanged).await
    }

    /// Connected account
    pub async fn account(&self) -> Option<Address> {
        self.cache.session().read().await.account()
    }

    /// Non-removed proposals in display order at `now`
    pub async fn proposals(&self, now: u64) -> Vec<ProposalView> {
        self.cache.active_views(now).await
    }

    /// Single proposal, read fresh from the registry
    pub async fn proposal(&self, id: u64) -> Result<Proposal> {
        self.reader.fetch_proposal(id).await
    }

    /// Voters on one proposal
    pub async fn voters(&self, id: u64) -> Result<Vec<VoteRecord>> {
        self.reader.fetch_voters(id).await
    }

    /// Proposals the connected wallet voted on
    pub async fn voted_proposals(&self) -> Result<Vec<VotedProposal>> {
        let account = self.account().await.ok_or(VotingError::WalletNotConnected)?;
        self.reader.fetch_voted_proposals(account).await
    }

    /// Current leader
    pub fn leader(&self) -> Leader {
        self.cache.leader()
    }

    /// Role of the connected wallet
    pub async fn role(&self) -> Role {
        self.auth.resolve(self.account().await).await
    }

    /// Owner and current admins
    pub async fn admins(&self) -> AdminRoster {
        self.auth.list_admins().await
    }

    /// Run any action
    pub async fn run(&self, action: Action) -> Result<ActionOutcome> {
        self.orchestrator.run(action).await
    }

    /// Vote on a proposal
    pub async fn vote(&self, id: u64) -> Result<ActionOutcome> {
        self.run(Action::Vote(id)).await
    }

    /// Create a proposal
    pub async fn create_proposal(&self, description: &str) -> Result<ActionOutcome> {
        self.run(Action::CreateProposal(description.to_string()))
            .await
    }

    /// Remove a proposal by its description
    pub async fn remove_proposal(&self, name: &str) -> Result<ActionOutcome> {
        self.run(Action::RemoveProposal(name.to_string())).await
    }

    /// Close a proposal
    pub async fn close_proposal(&self, id: u64) -> Result<ActionOutcome> {
        self.run(Action::CloseProposal(id)).await
    }

    /// Grant admin rights
    pub async fn add_admin(&self, address: Address) -> Result<ActionOutcome> {
        self.run(Action::AddAdmin(address)).await
    }

    /// Revoke admin rights
    pub async fn remove_admin(&self, address: Address) -> Result<ActionOutcome> {
        self.run(Action::RemoveAdmin(address)).await
    }

    /// Store a comment body and record it on chain
    pub async fn add_comment(
        &self,
        board: &CommentBoard,
        proposal_id: u64,
        text: &str,
    ) -> Result<ActionOutcome> {
        let author = self.account().await.ok_or(VotingError::WalletNotConnected)?;
        let action = board.prepare(proposal_id, author, text).await?;
        self.run(action).await
    }

    /// Comment board over `store`
    pub fn comment_board(&self, store: Arc<dyn ContentStore>) -> CommentBoard {
        CommentBoard::new(self.collaborators.registry.clone(), store)
    }

    /// Badge gallery, when a badge contract is configured
    pub fn badges(&self) -> Option<BadgeGallery> {
        self.collaborators.badges.clone().map(BadgeGallery::new)
    }

    /// Current action state
    pub fn status(&self) -> ActionState {
        self.orchestrator.status()
    }

    /// Receive every action state transition
    pub fn subscribe_status(&self) -> watch::Receiver<ActionState> {
        self.orchestrator.subscribe()
    }

    /// Get the proposal cache
    pub fn cache(&self) -> &Arc<ProposalCache> {
        &self.cache
    }

    /// Get the transaction orchestrator
    pub fn orchestrator(&self) -> &TransactionOrchestrator {
        &self.orchestrator
    }

    /// Health check - verify the registry answers reads
    pub async fn health_check(&self) -> Result<bool> {
        match self.collaborators.registry.proposal_count().await {
            Ok(count) => {
                info!("Registry reachable, {} proposals", count);
                Ok(true)
            }
            Err(e) => {
                warn!("Registry health check failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Get configuration
    pub fn config(&self) -> &VotingConfig {
        &self.config
    }
}
