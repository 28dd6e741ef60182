//! Per-wallet session state.
//!
//! Tracks the proposals the connected account has voted on so controls can
//! disable immediately. It is a hint only: refreshes reconcile it against
//! on-chain vote weights, and vote submission never consults it.

use ethers::types::{Address, U256};
use std::collections::{BTreeSet, HashMap};

/// Connected account and the proposals it voted on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    account: Option<Address>,
    voted: BTreeSet<u64>,
}

impl SessionState {
    /// Empty session for `account`
    pub fn connect(account: Address) -> Self {
        Self {
            account: Some(account),
            voted: BTreeSet::new(),
        }
    }

    /// Session with no wallet
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Connected account, if any
    pub fn account(&self) -> Option<Address> {
        self.account
    }

    /// Switch to another account, discarding the voted set
    pub fn reset(&mut self, account: Option<Address>) {
        self.account = account;
        self.voted.clear();
    }

    /// Record a vote (or an authoritative duplicate-vote rejection)
    pub fn mark_voted(&mut self, proposal_id: u64) {
        self.voted.insert(proposal_id);
    }

    /// Whether the account is known to have voted on `proposal_id`
    pub fn has_voted(&self, proposal_id: u64) -> bool {
        self.voted.contains(&proposal_id)
    }

    /// Voted ids in ascending order
    pub fn voted(&self) -> impl Iterator<Item = u64> + '_ {
        self.voted.iter().copied()
    }

    /// Replace membership with authoritative weights.
    ///
    /// Ids present in `weights` are voted iff their weight is non-zero; ids
    /// missing from it (failed reads) keep their current membership.
    pub fn reconcile(&mut self, weights: &HashMap<u64, U256>) {
        for (&id, weight) in weights {
            if weight.is_zero() {
                self.voted.remove(&id);
            } else {
                self.voted.insert(id);
            }
        }
    }
}
