//! Proposal reads against the voting registry.
//!
//! Bulk reads iterate ids sequentially and isolate failures per id: one
//! unreadable proposal is logged and skipped, never failing the whole list.

use crate::chain::VotingRegistry;
use crate::error::{Result, VotingError};
use crate::types::{Proposal, ProposalStatus, VoteRecord, VotedProposal};
use ethers::types::{Address, U256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads and normalizes proposals
#[derive(Clone)]
pub struct ProposalReader {
    registry: Arc<dyn VotingRegistry>,
}

impl ProposalReader {
    /// Create a reader over a registry
    pub fn new(registry: Arc<dyn VotingRegistry>) -> Self {
        Self { registry }
    }

    /// Number of proposals ever created
    pub async fn proposal_count(&self) -> Result<u64> {
        self.registry.proposal_count().await
    }

    /// Fetch one proposal, `NotFound` when `id` is outside `[1, count]`
    pub async fn fetch_proposal(&self, id: u64) -> Result<Proposal> {
        let count = self.registry.proposal_count().await?;
        if id == 0 || id > count {
            return Err(VotingError::NotFound(id));
        }
        self.read(id).await
    }

    async fn read(&self, id: u64) -> Result<Proposal> {
        let raw = self.registry.get_results(id).await?;
        Ok(Proposal::from_raw(id, raw))
    }

    /// Fetch every proposal in id order.
    ///
    /// Only the count read can fail the call.
    pub async fn fetch_all_proposals(&self) -> Result<Vec<Proposal>> {
        let count = self.registry.proposal_count().await?;
        debug!("Fetching {} proposals", count);

        let mut proposals = Vec::with_capacity(count.min(1024) as usize);
        for id in 1..=count {
            match self.read(id).await {
                Ok(proposal) => proposals.push(proposal),
                Err(e) => warn!("Skipping proposal {}: {}", id, e),
            }
        }

        Ok(proposals)
    }

    /// Vote weight of `voter` for each id; ids whose read fails are absent
    pub async fn fetch_vote_weights(
        &self,
        voter: Address,
        ids: &[u64],
    ) -> HashMap<u64, U256> {
        let mut weights = HashMap::with_capacity(ids.len());
        for &id in ids {
            match self.registry.get_vote_weight(id, voter).await {
                Ok(weight) => {
                    weights.insert(id, weight);
                }
                Err(e) => warn!("Skipping vote weight for proposal {}: {}", id, e),
            }
        }
        weights
    }

    /// Non-removed proposals `voter` has a positive weight on
    pub async fn fetch_voted_proposals(&self, voter: Address) -> Result<Vec<VotedProposal>> {
        let proposals = self.fetch_all_proposals().await?;
        let ids: Vec<u64> = proposals
            .iter()
            .filter(|p| !p.removed)
            .map(|p| p.id)
            .collect();
        let weights = self.fetch_vote_weights(voter, &ids).await;

        Ok(proposals
            .into_iter()
            .filter(|p| !p.removed)
            .filter_map(|p| match weights.get(&p.id) {
                Some(weight) if !weight.is_zero() => Some(VotedProposal {
                    weight: *weight,
                    proposal: p,
                }),
                _ => None,
            })
            .collect())
    }

    /// Voters recorded for one proposal
    pub async fn fetch_voters(&self, id: u64) -> Result<Vec<VoteRecord>> {
        self.registry.voted_events(id).await
    }
}

/// Canonical display order: status (Open, Ended, Closed, Removed), then
/// ascending deadline. Stable, so equal keys keep their input order.
pub fn sort_for_display(proposals: &mut [Proposal], now: u64) {
    proposals.sort_by_key(|p| (p.status(now), p.deadline));
}

/// Non-removed proposals in display order
pub fn active_proposals(proposals: &[Proposal], now: u64) -> Vec<Proposal> {
    let mut active: Vec<Proposal> = proposals
        .iter()
        .filter(|p| p.status(now) != ProposalStatus::Removed)
        .cloned()
        .collect();
    sort_for_display(&mut active, now);
    active
}
