//! Balance and allowance preconditions for paid actions.

use crate::chain::FeeToken;
use crate::error::{Result, VotingError};
use crate::monitor::TransactionMonitor;
use crate::orchestrator::ActionState;
use crate::types::TxHash;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Result of an allowance check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Allowance already covers the amount; nothing was sent
    Sufficient,
    /// An unlimited approval was sent and confirmed
    Approved(TxHash),
}

/// Guards fee-gated actions against failing for lack of funds or allowance
#[derive(Clone)]
pub struct FeeGate {
    token: Arc<dyn FeeToken>,
    monitor: TransactionMonitor,
    spender: Address,
}

impl FeeGate {
    /// Create a gate approving `spender` (the voting registry) on `token`
    pub fn new(token: Arc<dyn FeeToken>, monitor: TransactionMonitor, spender: Address) -> Self {
        Self {
            token,
            monitor,
            spender,
        }
    }

    /// Spender the gate approves
    pub fn spender(&self) -> Address {
        self.spender
    }

    /// Fail with `InsufficientBalance` when `holder` owns less than `required`
    pub async fn ensure_balance(&self, holder: Address, required: U256) -> Result<()> {
        let available = self.token.balance_of(holder).await?;
        debug!("Balance of {:?}: {} (required {})", holder, available, required);

        if available < required {
            return Err(VotingError::InsufficientBalance {
                required,
                available,
            });
        }
        Ok(())
    }

    /// Make sure the spender may pull `required` from `holder`, approving
    /// `U256::MAX` once when it may not.
    pub async fn ensure_allowance(&self, holder: Address, required: U256) -> Result<ApprovalOutcome> {
        self.ensure_allowance_inner(holder, required, None).await
    }

    /// [`Self::ensure_allowance`], publishing `Approving` and
    /// `AwaitingApproval` on `status` when an approval is needed
    pub async fn ensure_allowance_reporting(
        &self,
        holder: Address,
        required: U256,
        status: &watch::Sender<ActionState>,
    ) -> Result<ApprovalOutcome> {
        self.ensure_allowance_inner(holder, required, Some(status))
            .await
    }

    async fn ensure_allowance_inner(
        &self,
        holder: Address,
        required: U256,
        status: Option<&watch::Sender<ActionState>>,
    ) -> Result<ApprovalOutcome> {
        let approved = self.token.allowance(holder, self.spender).await?;
        if approved >= required {
            debug!("Allowance {} covers {}", approved, required);
            return Ok(ApprovalOutcome::Sufficient);
        }

        let shortfall = VotingError::InsufficientAllowance { required, approved };
        info!("{}; requesting unlimited approval", shortfall);

        if let Some(status) = status {
            status.send_replace(ActionState::Approving);
        }
        let hash = self.token.approve(self.spender, U256::MAX).await?;

        if let Some(status) = status {
            status.send_replace(ActionState::AwaitingApproval(hash));
        }
        self.monitor.wait_for_confirmation(hash).await?;

        info!("Approval confirmed: {:?}", hash);
        Ok(ApprovalOutcome::Approved(hash))
    }
}
