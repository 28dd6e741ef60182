//! Transaction orchestration.
//!
//! Runs one user-initiated, state-mutating action end to end:
//!
//! ```text
//! Idle → CheckingBalance → CheckingAllowance → [Approving → AwaitingApproval]
//!      → Submitting → AwaitingConfirmation → Succeeded | Failed
//! ```
//!
//! Actions without a fee go straight from `Idle` to `Submitting`. Progress is
//! published on a `watch` channel; busy indicators derive from the current
//! state alone. Nothing is retried automatically.

use crate::auth::validate_admin_candidate;
use crate::cache::{ProposalCache, RefreshTrigger};
use crate::chain::VotingRegistry;
use crate::config::VotingConfig;
use crate::error::{ActionFailure, FailureKind, Result, VotingError};
use crate::fee_gate::FeeGate;
use crate::monitor::TransactionMonitor;
use crate::session::SessionState;
use crate::types::{ContentRef, TxHash};
use ethers::types::{Address, U256};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// A state-mutating registry action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Vote on a proposal (fee-gated)
    Vote(u64),
    /// Create a proposal with a description (fee-gated)
    CreateProposal(String),
    /// Remove a proposal by its description
    RemoveProposal(String),
    /// Close a proposal before its deadline
    CloseProposal(u64),
    /// Grant admin rights
    AddAdmin(Address),
    /// Revoke admin rights
    RemoveAdmin(Address),
    /// Attach a stored comment to a proposal
    AddComment {
        /// Proposal commented on
        proposal_id: u64,
        /// Content store identifier of the body
        content_ref: ContentRef,
    },
}

impl Action {
    /// Fee in token base units, `None` for free actions
    pub fn fee(&self, config: &VotingConfig) -> Option<U256> {
        match self {
            Action::Vote(_) => Some(config.vote_fee_amount()),
            Action::CreateProposal(_) => Some(config.proposal_fee_amount()),
            _ => None,
        }
    }

    /// Whether success changes the proposal list
    pub fn mutates_proposals(&self) -> bool {
        matches!(
            self,
            Action::Vote(_)
                | Action::CreateProposal(_)
                | Action::RemoveProposal(_)
                | Action::CloseProposal(_)
        )
    }

    fn validate(&self, account: Address, max_description_len: usize) -> Result<()> {
        match self {
            Action::Vote(0) | Action::CloseProposal(0) => {
                Err(VotingError::InvalidInput("Invalid proposal id".to_string()))
            }
            Action::CreateProposal(description) => {
                if description.trim().is_empty() {
                    return Err(VotingError::InvalidInput(
                        "Proposal description cannot be empty".to_string(),
                    ));
                }
                if description.chars().count() > max_description_len {
                    return Err(VotingError::InvalidInput(format!(
                        "Proposal description must be at most {} characters",
                        max_description_len
                    )));
                }
                Ok(())
            }
            Action::RemoveProposal(name) if name.trim().is_empty() => Err(
                VotingError::InvalidInput("Proposal name cannot be empty".to_string()),
            ),
            Action::AddAdmin(candidate) => validate_admin_candidate(account, *candidate),
            Action::RemoveAdmin(address) if address.is_zero() => {
                Err(VotingError::InvalidInput("Invalid address".to_string()))
            }
            Action::AddComment {
                proposal_id,
                content_ref,
            } => {
                if *proposal_id == 0 {
                    return Err(VotingError::InvalidInput("Invalid proposal id".to_string()));
                }
                if content_ref.trim().is_empty() {
                    return Err(VotingError::InvalidInput(
                        "Comment reference cannot be empty".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Vote(id) => write!(f, "vote on proposal {}", id),
            Action::CreateProposal(description) => write!(f, "create proposal {:?}", description),
            Action::RemoveProposal(name) => write!(f, "remove proposal {:?}", name),
            Action::CloseProposal(id) => write!(f, "close proposal {}", id),
            Action::AddAdmin(address) => write!(f, "add admin {:?}", address),
            Action::RemoveAdmin(address) => write!(f, "remove admin {:?}", address),
            Action::AddComment { proposal_id, .. } => {
                write!(f, "comment on proposal {}", proposal_id)
            }
        }
    }
}

/// Progress of the current (or last) action
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionState {
    /// Nothing running
    #[default]
    Idle,
    /// Reading the fee token balance
    CheckingBalance,
    /// Reading the spending allowance
    CheckingAllowance,
    /// Waiting for the signer to approve the fee token
    Approving,
    /// Approval sent, waiting to be mined
    AwaitingApproval(TxHash),
    /// Waiting for the signer to sign the action
    Submitting,
    /// Action sent, waiting to be mined
    AwaitingConfirmation(TxHash),
    /// Mined successfully
    Succeeded(TxHash),
    /// Terminal failure
    Failed(ActionFailure),
}

impl ActionState {
    /// Whether controls that start another action must be disabled
    pub fn is_busy(&self) -> bool {
        !matches!(
            self,
            ActionState::Idle | ActionState::Succeeded(_) | ActionState::Failed(_)
        )
    }

    /// Whether the state ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionState::Succeeded(_) | ActionState::Failed(_))
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Mined successfully
    Succeeded {
        /// Transaction hash
        hash: TxHash,
    },
    /// Terminal failure with a user-facing reason
    Failed(ActionFailure),
}

impl ActionOutcome {
    /// Whether the action succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded { .. })
    }

    /// Failure kind, if any
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ActionOutcome::Succeeded { .. } => None,
            ActionOutcome::Failed(failure) => Some(failure.kind),
        }
    }
}

/// Runs actions one at a time for the connected wallet
pub struct TransactionOrchestrator {
    registry: Arc<dyn VotingRegistry>,
    fee_gate: FeeGate,
    monitor: TransactionMonitor,
    cache: Arc<ProposalCache>,
    session: Arc<RwLock<SessionState>>,
    config: Arc<VotingConfig>,
    status: watch::Sender<ActionState>,
    in_flight: Mutex<()>,
}

impl TransactionOrchestrator {
    /// Create an orchestrator sharing the cache's session
    pub fn new(
        registry: Arc<dyn VotingRegistry>,
        fee_gate: FeeGate,
        monitor: TransactionMonitor,
        cache: Arc<ProposalCache>,
        config: Arc<VotingConfig>,
    ) -> Self {
        let (status, _) = watch::channel(ActionState::Idle);
        Self {
            registry,
            fee_gate,
            monitor,
            session: cache.session(),
            cache,
            config,
            status,
            in_flight: Mutex::new(()),
        }
    }

    /// Current state
    pub fn status(&self) -> ActionState {
        self.status.borrow().clone()
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<ActionState> {
        self.status.subscribe()
    }

    /// Whether a run is in progress
    pub fn is_busy(&self) -> bool {
        self.status.borrow().is_busy()
    }

    /// Dismiss a terminal state
    pub fn acknowledge(&self) {
        self.status.send_if_modified(|state| {
            if state.is_terminal() {
                *state = ActionState::Idle;
                true
            } else {
                false
            }
        });
    }

    /// Run `action` to a terminal state.
    ///
    /// Fails with `TransactionInFlight` while another run is pending, with
    /// `WalletNotConnected` without an account and with `InvalidInput` when
    /// the action is rejected locally; none of these touch the state. Every
    /// failure after that is reported as [`ActionOutcome::Failed`].
    pub async fn run(&self, action: Action) -> Result<ActionOutcome> {
        let guard = self
            .in_flight
            .try_lock()
            .map_err(|_| VotingError::TransactionInFlight)?;

        let account = self
            .session
            .read()
            .await
            .account()
            .ok_or(VotingError::WalletNotConnected)?;

        action.validate(account, self.config.max_description_len)?;

        info!("Starting {} for {:?}", action, account);
        self.publish(ActionState::Idle);

        let outcome = match self.execute(&action, account).await {
            Ok(hash) => self.succeed(&action, hash).await,
            Err(e) => self.fail(&action, e).await,
        };
        drop(guard);

        if outcome.is_success() && action.mutates_proposals() {
            if let Err(e) = self.cache.refresh(RefreshTrigger::ActionCompleted).await {
                warn!("Refresh after {} failed: {}", action, e);
            }
        }

        Ok(outcome)
    }

    async fn execute(&self, action: &Action, account: Address) -> Result<TxHash> {
        if let Some(fee) = action.fee(&self.config) {
            self.publish(ActionState::CheckingBalance);
            self.fee_gate.ensure_balance(account, fee).await?;

            self.publish(ActionState::CheckingAllowance);
            self.fee_gate
                .ensure_allowance_reporting(account, fee, &self.status)
                .await?;
        }

        self.publish(ActionState::Submitting);
        let hash = self.submit(action).await?;
        debug!("Submitted {}: {:?}", action, hash);

        self.publish(ActionState::AwaitingConfirmation(hash));
        self.monitor.wait_for_confirmation(hash).await
    }

    async fn submit(&self, action: &Action) -> Result<TxHash> {
        match action {
            Action::Vote(id) => self.registry.vote(*id).await,
            Action::CreateProposal(description) => {
                self.registry.create_proposal(description.trim()).await
            }
            Action::RemoveProposal(name) => self.registry.remove_proposal_by_name(name.trim()).await,
            Action::CloseProposal(id) => self.registry.close_proposal(*id).await,
            Action::AddAdmin(address) => self.registry.add_admin(*address).await,
            Action::RemoveAdmin(address) => self.registry.remove_admin(*address).await,
            Action::AddComment {
                proposal_id,
                content_ref,
            } => self.registry.add_comment(*proposal_id, content_ref).await,
        }
    }

    async fn succeed(&self, action: &Action, hash: TxHash) -> ActionOutcome {
        if let Action::Vote(id) = action {
            self.cache.apply_optimistic_vote(*id);
            self.session.write().await.mark_voted(*id);
        }

        info!("{} succeeded: {:?}", action, hash);
        self.publish(ActionState::Succeeded(hash));
        ActionOutcome::Succeeded { hash }
    }

    async fn fail(&self, action: &Action, error: VotingError) -> ActionOutcome {
        let error = match (action, error) {
            (Action::Vote(id), VotingError::Reverted(reason))
                if VotingError::is_already_voted_reason(&reason) =>
            {
                VotingError::AlreadyVoted(*id)
            }
            (_, error) => error,
        };

        if let VotingError::AlreadyVoted(id) = error {
            self.session.write().await.mark_voted(id);
        }

        let failure = error.to_failure();
        match failure.kind {
            FailureKind::UserRejected | FailureKind::AlreadyVoted | FailureKind::InsufficientBalance => {
                info!("{} not completed: {}", action, failure)
            }
            _ => error!("{} failed: {} ({})", action, failure, error),
        }

        self.publish(ActionState::Failed(failure.clone()));
        ActionOutcome::Failed(failure)
    }

    fn publish(&self, state: ActionState) {
        debug!("Action state: {:?}", state);
        self.status.send_replace(state);
    }
}
