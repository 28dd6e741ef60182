//! Common types used across the voting client.
//!
//! This module defines the proposal record and its derived status, vote and
//! comment records, admin events, transaction status, and the leader
//! computation result.

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction hash type
pub type TxHash = H256;

/// Opaque content-addressed identifier for an off-chain comment body
pub type ContentRef = String;

/// Raw `getResults` tuple: description, vote count, closed, deadline, removed, creator
pub type RawProposal = (String, U256, bool, U256, bool, Address);

/// Derived proposal status. Variant order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Accepting votes
    Open,
    /// Deadline passed, not yet closed
    Ended,
    /// Explicitly closed by the owner or an admin
    Closed,
    /// Removed by an admin
    Removed,
}

impl ProposalStatus {
    /// Derive a status from the raw flags and the current time
    pub fn derive(removed: bool, closed: bool, deadline: u64, now: u64) -> Self {
        if removed {
            ProposalStatus::Removed
        } else if closed {
            ProposalStatus::Closed
        } else if now >= deadline {
            ProposalStatus::Ended
        } else {
            ProposalStatus::Open
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalStatus::Open => write!(f, "Open"),
            ProposalStatus::Ended => write!(f, "Ended"),
            ProposalStatus::Closed => write!(f, "Closed"),
            ProposalStatus::Removed => write!(f, "Removed"),
        }
    }
}

/// One governance item as read from the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Registry-assigned id, 1-based
    pub id: u64,
    /// Free-text description
    pub description: String,
    /// Votes received
    pub vote_count: u64,
    /// Unix timestamp (seconds) after which voting ends
    pub deadline: u64,
    /// Closed by the owner or an admin
    pub closed: bool,
    /// Removed by an admin
    pub removed: bool,
    /// Proposer
    pub creator: Address,
}

impl Proposal {
    /// Build a proposal from the raw registry tuple.
    ///
    /// Counts and deadlines beyond `u64` saturate rather than wrap.
    pub fn from_raw(id: u64, raw: RawProposal) -> Self {
        let (description, votes, closed, deadline, removed, creator) = raw;
        Self {
            id,
            description,
            vote_count: saturating_u64(votes),
            deadline: saturating_u64(deadline),
            closed,
            removed,
            creator,
        }
    }

    /// Status at `now`
    pub fn status(&self, now: u64) -> ProposalStatus {
        ProposalStatus::derive(self.removed, self.closed, self.deadline, now)
    }

    /// Whether a vote can be cast at `now`
    pub fn is_open(&self, now: u64) -> bool {
        self.status(now) == ProposalStatus::Open
    }
}

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

/// Proposal plus the values derived from the current clock tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalView {
    /// The proposal as of the last fetch
    pub proposal: Proposal,
    /// Status at the tick
    pub status: ProposalStatus,
    /// Countdown label
    pub time_remaining: String,
    /// Whether the connected wallet is known to have voted
    pub voted: bool,
}

/// Proposal the connected wallet voted on, with its weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VotedProposal {
    /// The proposal
    pub proposal: Proposal,
    /// Weight of the wallet's vote
    pub weight: U256,
}

/// One wallet's participation in one proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Proposal voted on
    pub proposal_id: u64,
    /// Voter
    pub voter: Address,
    /// Vote weight, normally 1
    pub weight: U256,
}

/// On-chain pointer to a comment body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRef {
    /// Proposal commented on
    pub proposal_id: u64,
    /// Comment author
    pub author: Address,
    /// Content store identifier
    pub content_ref: ContentRef,
}

/// Comment body as stored in the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentBody {
    /// Comment text
    pub text: String,
    /// Author address
    pub author: Address,
    /// Proposal commented on
    pub proposal_id: u64,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Comment with its resolved body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    /// Proposal commented on
    pub proposal_id: u64,
    /// Author from the on-chain record
    pub author: Address,
    /// Content store identifier
    pub content_ref: ContentRef,
    /// Resolved body
    pub body: CommentBody,
}

/// Admin grant or revoke observed in the registry event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminEvent {
    /// `AdminAdded(admin)`
    Added(Address),
    /// `AdminRemoved(admin)`
    Removed(Address),
}

impl AdminEvent {
    /// Address the event concerns
    pub fn address(&self) -> Address {
        match self {
            AdminEvent::Added(address) | AdminEvent::Removed(address) => *address,
        }
    }
}

/// Achievement token owned by a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    /// Token id
    pub token_id: U256,
    /// Raw token URI
    pub token_uri: String,
    /// Gateway URL for the metadata
    pub gateway_url: String,
}

/// Transaction status enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Submitted, not yet mined
    Pending,
    /// Mined successfully
    Confirmed,
    /// Mined and reverted
    Reverted(Option<String>),
    /// Unknown to the node
    NotFound,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "PENDING"),
            TransactionStatus::Confirmed => write!(f, "CONFIRMED"),
            TransactionStatus::Reverted(_) => write!(f, "REVERTED"),
            TransactionStatus::NotFound => write!(f, "NOT_FOUND"),
        }
    }
}

/// Result of the winner computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Leader {
    /// No non-removed proposals
    NoProposals,
    /// Single proposal with the most votes
    Winner(Proposal),
    /// Several proposals share the maximum
    Tie {
        /// Shared vote count
        votes: u64,
        /// Tied proposals, ascending by id
        proposals: Vec<Proposal>,
    },
}

/// Pick the leader among non-removed proposals, reporting ties
pub fn compute_leader(proposals: &[Proposal]) -> Leader {
    let candidates: Vec<&Proposal> = proposals.iter().filter(|p| !p.removed).collect();

    let max_votes = match candidates.iter().map(|p| p.vote_count).max() {
        Some(max) => max,
        None => return Leader::NoProposals,
    };

    let mut leaders: Vec<Proposal> = candidates
        .into_iter()
        .filter(|p| p.vote_count == max_votes)
        .cloned()
        .collect();
    leaders.sort_by_key(|p| p.id);

    if leaders.len() == 1 {
        Leader::Winner(leaders.remove(0))
    } else {
        Leader::Tie {
            votes: max_votes,
            proposals: leaders,
        }
    }
}

/// Countdown label: `Ended` once the deadline is reached, else `HHh MMm SSs`
pub fn format_time_remaining(deadline: u64, now: u64) -> String {
    if deadline <= now {
        return "Ended".to_string();
    }

    let diff = deadline - now;
    let hours = diff / 3600;
    let minutes = (diff % 3600) / 60;
    let seconds = diff % 60;

    format!("{:02}h {:02}m {:02}s", hours, minutes, seconds)
}
