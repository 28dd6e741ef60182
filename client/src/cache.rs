//! Proposal cache and refresh controller.
//!
//! The cache owns the proposal list as of the last fetch. Each refresh builds
//! a complete snapshot and swaps it in whole; a fetch that started before the
//! installed snapshot's fetch never replaces it. Countdowns and Open/Ended
//! transitions are derived from `(deadline, now)` at view time.

use crate::error::Result;
use crate::reader::{active_proposals, sort_for_display, ProposalReader};
use crate::session::SessionState;
use crate::types::{compute_leader, format_time_remaining, Leader, Proposal, ProposalView};
use chrono::{DateTime, Utc};
use ethers::types::Address;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

/// Why a refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// First load
    Initial,
    /// Wallet switched to another account (or disconnected)
    AccountChanged(Option<Address>),
    /// Wallet switched network; everything is reloaded from scratch
    ChainChanged,
    /// A vote, create, remove or close action succeeded
    ActionCompleted,
    /// Explicit user request
    Manual,
}

/// Proposal list from one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalSnapshot {
    /// Fetch generation; later fetches have larger values
    pub generation: u64,
    /// Proposals in id order
    pub proposals: Vec<Proposal>,
    /// When the fetch completed, `None` for the empty initial snapshot
    pub fetched_at: Option<DateTime<Utc>>,
    /// False while an optimistic update awaits the next refresh
    pub reconciled: bool,
}

impl ProposalSnapshot {
    fn empty(generation: u64) -> Self {
        Self {
            generation,
            proposals: Vec::new(),
            fetched_at: None,
            reconciled: true,
        }
    }

    /// Proposal by id
    pub fn get(&self, id: u64) -> Option<&Proposal> {
        self.proposals.iter().find(|p| p.id == id)
    }
}

/// Proposal cache shared by the views and the orchestrator
pub struct ProposalCache {
    reader: ProposalReader,
    session: Arc<RwLock<SessionState>>,
    snapshot: watch::Sender<Arc<ProposalSnapshot>>,
    generations: AtomicU64,
}

impl ProposalCache {
    /// Create an empty cache
    pub fn new(reader: ProposalReader, session: Arc<RwLock<SessionState>>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(ProposalSnapshot::empty(0)));
        Self {
            reader,
            session,
            snapshot,
            generations: AtomicU64::new(0),
        }
    }

    /// Session shared with the orchestrator
    pub fn session(&self) -> Arc<RwLock<SessionState>> {
        self.session.clone()
    }

    /// Currently installed snapshot
    pub fn snapshot(&self) -> Arc<ProposalSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Receive every installed snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<ProposalSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Refetch the whole list and install it unless a newer fetch won.
    ///
    /// Returns the snapshot installed when the call finishes, which is an
    /// older fetch's result only if this one was superseded.
    pub async fn refresh(&self, trigger: RefreshTrigger) -> Result<Arc<ProposalSnapshot>> {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Refresh {} requested: {:?}", generation, trigger);

        match trigger {
            RefreshTrigger::ChainChanged => {
                self.snapshot
                    .send_replace(Arc::new(ProposalSnapshot::empty(generation)));
                let mut session = self.session.write().await;
                let account = session.account();
                session.reset(account);
            }
            RefreshTrigger::AccountChanged(account) => {
                self.session.write().await.reset(account);
            }
            _ => {}
        }

        let account = self.session.read().await.account();
        let proposals = self.reader.fetch_all_proposals().await?;

        let weights = match account {
            Some(account) => {
                let ids: Vec<u64> = proposals
                    .iter()
                    .filter(|p| !p.removed)
                    .map(|p| p.id)
                    .collect();
                Some((account, self.reader.fetch_vote_weights(account, &ids).await))
            }
            None => None,
        };

        let fresh = Arc::new(ProposalSnapshot {
            generation,
            proposals,
            fetched_at: Some(Utc::now()),
            reconciled: true,
        });

        let installed = self.snapshot.send_if_modified(|current| {
            if current.generation > generation {
                false
            } else {
                *current = fresh.clone();
                true
            }
        });

        if !installed {
            debug!("Refresh {} superseded by a newer fetch", generation);
            return Ok(self.snapshot());
        }

        if let Some((account, weights)) = weights {
            let mut session = self.session.write().await;
            if session.account() == Some(account) {
                session.reconcile(&weights);
            }
        }

        info!(
            "Installed {} proposals (refresh {})",
            fresh.proposals.len(),
            generation
        );
        Ok(fresh)
    }

    /// Bump the vote count of `id` until the next refresh reconciles it
    pub fn apply_optimistic_vote(&self, id: u64) {
        self.snapshot.send_if_modified(|current| {
            if current.get(id).is_none() {
                return false;
            }
            let mut next = (**current).clone();
            for proposal in next.proposals.iter_mut().filter(|p| p.id == id) {
                proposal.vote_count = proposal.vote_count.saturating_add(1);
            }
            next.reconciled = false;
            *current = Arc::new(next);
            true
        });
    }

    /// Every proposal in display order with status and countdown at `now`
    pub async fn views(&self, now: u64) -> Vec<ProposalView> {
        let mut proposals = self.snapshot().proposals.clone();
        sort_for_display(&mut proposals, now);
        self.to_views(proposals, now).await
    }

    /// Non-removed proposals in display order
    pub async fn active_views(&self, now: u64) -> Vec<ProposalView> {
        let proposals = active_proposals(&self.snapshot().proposals, now);
        self.to_views(proposals, now).await
    }

    async fn to_views(&self, proposals: Vec<Proposal>, now: u64) -> Vec<ProposalView> {
        let session = self.session.read().await;
        proposals
            .into_iter()
            .map(|proposal| ProposalView {
                status: proposal.status(now),
                time_remaining: format_time_remaining(proposal.deadline, now),
                voted: session.has_voted(proposal.id),
                proposal,
            })
            .collect()
    }

    /// Leader among non-removed proposals
    pub fn leader(&self) -> Leader {
        compute_leader(&self.snapshot().proposals)
    }
}
