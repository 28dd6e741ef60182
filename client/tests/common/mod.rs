//! In-memory registry, fee token and receipt lookup shared by the
//! integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ballotbox_client::types::{AdminEvent, CommentRef, RawProposal};
use ballotbox_client::{
    Collaborators, FeeToken, Result, TransactionStatus, TransactionWatcher, TxHash, VoteRecord,
    VotingConfig, VotingError, VotingRegistry,
};
use ethers::types::{Address, U256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const VOTE_FEE: u64 = 10;
pub const PROPOSAL_FEE: u64 = 25;

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn registry_address() -> Address {
    addr(0xee)
}

/// Config with whole-token fees of 10 and 25 base units and fast polling
pub fn test_config() -> Arc<VotingConfig> {
    Arc::new(
        VotingConfig::localhost()
            .with_contracts(registry_address(), addr(0xfe), None)
            .with_token_decimals(0)
            .with_fees(VOTE_FEE, PROPOSAL_FEE)
            .with_request_timeout(Duration::from_secs(5))
            .with_max_retries(1)
            .with_tx_config(5, 2),
    )
}

#[derive(Default)]
pub struct ChainState {
    /// Index `id - 1`
    pub proposals: Vec<RawProposal>,
    pub weights: HashMap<(u64, Address), U256>,
    pub owner: Address,
    pub admins: HashSet<Address>,
    pub admin_events: Vec<AdminEvent>,
    pub comments: Vec<CommentRef>,
    pub balances: HashMap<Address, U256>,
    pub allowances: HashMap<(Address, Address), U256>,
    /// Amounts passed to `approve`, in call order
    pub approvals: Vec<U256>,
    /// Every collaborator call, in order
    pub calls: Vec<&'static str>,
    pub poisoned: HashSet<u64>,
    pub owner_fails: bool,
    /// `msg.sender` for submitted transactions
    pub sender: Address,
    pub next_hash: u64,
}

/// Chain double honoring the registry's vote-once and allowance rules
#[derive(Clone, Default)]
pub struct FakeChain {
    pub state: Arc<Mutex<ChainState>>,
    /// Held by a test to park submissions in flight
    pub submit_gate: Arc<tokio::sync::Mutex<()>>,
}

impl FakeChain {
    pub fn new(sender: Address) -> Self {
        let chain = Self::default();
        chain.with_state(|s| {
            s.sender = sender;
            s.owner = addr(0x01);
        });
        chain
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&mut ChainState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_proposal(&self, description: &str, votes: u64, deadline: u64) -> u64 {
        self.with_state(|s| {
            s.proposals.push((
                description.to_string(),
                U256::from(votes),
                false,
                U256::from(deadline),
                false,
                addr(0x01),
            ));
            s.proposals.len() as u64
        })
    }

    pub fn fund(&self, holder: Address, amount: u64) {
        self.with_state(|s| {
            s.balances.insert(holder, U256::from(amount));
        });
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn approvals(&self) -> Vec<U256> {
        self.with_state(|s| s.approvals.clone())
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            registry: Arc::new(self.clone()),
            registry_address: registry_address(),
            signer: None,
            fee_token: Arc::new(self.clone()),
            watcher: Arc::new(self.clone()),
            badges: None,
        }
    }

    fn record(&self, call: &'static str) {
        self.with_state(|s| s.calls.push(call));
    }

    fn hash(s: &mut ChainState) -> TxHash {
        s.next_hash += 1;
        TxHash::from_low_u64_be(s.next_hash)
    }

    fn charge(s: &mut ChainState, fee: u64) -> Result<()> {
        let sender = s.sender;
        let fee = U256::from(fee);
        let allowance = s
            .allowances
            .get(&(sender, registry_address()))
            .copied()
            .unwrap_or_default();
        if allowance < fee {
            return Err(VotingError::Reverted(
                "ERC20: insufficient allowance".to_string(),
            ));
        }
        let balance = s.balances.get(&sender).copied().unwrap_or_default();
        if balance < fee {
            return Err(VotingError::Reverted(
                "ERC20: transfer amount exceeds balance".to_string(),
            ));
        }
        s.balances.insert(sender, balance - fee);
        if allowance != U256::MAX {
            s.allowances
                .insert((sender, registry_address()), allowance - fee);
        }
        Ok(())
    }

    fn submit(
        &self,
        call: &'static str,
        apply: impl FnOnce(&mut ChainState) -> Result<()>,
    ) -> Result<TxHash> {
        self.with_state(|s| {
            s.calls.push(call);
            apply(s)?;
            Ok(Self::hash(s))
        })
    }
}

#[async_trait]
impl VotingRegistry for FakeChain {
    async fn proposal_count(&self) -> Result<u64> {
        self.record("proposal_count");
        Ok(self.with_state(|s| s.proposals.len() as u64))
    }

    async fn get_results(&self, id: u64) -> Result<RawProposal> {
        self.with_state(|s| {
            if s.poisoned.contains(&id) {
                return Err(VotingError::NetworkError(format!("proposal {} unreadable", id)));
            }
            id.checked_sub(1)
                .and_then(|index| s.proposals.get(index as usize))
                .cloned()
                .ok_or(VotingError::NotFound(id))
        })
    }

    async fn get_vote_weight(&self, id: u64, voter: Address) -> Result<U256> {
        Ok(self.with_state(|s| s.weights.get(&(id, voter)).copied().unwrap_or_default()))
    }

    async fn owner(&self) -> Result<Address> {
        self.with_state(|s| {
            if s.owner_fails {
                Err(VotingError::NetworkError("owner() unavailable".to_string()))
            } else {
                Ok(s.owner)
            }
        })
    }

    async fn is_admin(&self, address: Address) -> Result<bool> {
        Ok(self.with_state(|s| s.admins.contains(&address)))
    }

    async fn admin_events(&self) -> Result<Vec<AdminEvent>> {
        Ok(self.with_state(|s| s.admin_events.clone()))
    }

    async fn voted_events(&self, proposal_id: u64) -> Result<Vec<VoteRecord>> {
        Ok(self.with_state(|s| {
            let mut records: Vec<VoteRecord> = s
                .weights
                .iter()
                .filter(|((id, _), _)| *id == proposal_id)
                .map(|((id, voter), weight)| VoteRecord {
                    proposal_id: *id,
                    voter: *voter,
                    weight: *weight,
                })
                .collect();
            records.sort_by_key(|r| r.voter);
            records
        }))
    }

    async fn comment_events(&self, proposal_id: u64) -> Result<Vec<CommentRef>> {
        Ok(self.with_state(|s| {
            s.comments
                .iter()
                .filter(|c| c.proposal_id == proposal_id)
                .cloned()
                .collect()
        }))
    }

    async fn vote(&self, proposal_id: u64) -> Result<TxHash> {
        let _gate = self.submit_gate.lock().await;
        self.submit("vote", |s| {
            let sender = s.sender;
            if s.weights.contains_key(&(proposal_id, sender)) {
                return Err(VotingError::Reverted(
                    "execution reverted: Already voted".to_string(),
                ));
            }
            let index = proposal_id
                .checked_sub(1)
                .filter(|index| (*index as usize) < s.proposals.len())
                .ok_or_else(|| VotingError::Reverted("Invalid proposal".to_string()))?
                as usize;
            Self::charge(s, VOTE_FEE)?;
            s.weights.insert((proposal_id, sender), U256::one());
            s.proposals[index].1 += U256::one();
            Ok(())
        })
    }

    async fn create_proposal(&self, description: &str) -> Result<TxHash> {
        let _gate = self.submit_gate.lock().await;
        self.submit("create_proposal", |s| {
            Self::charge(s, PROPOSAL_FEE)?;
            let creator = s.sender;
            s.proposals.push((
                description.to_string(),
                U256::zero(),
                false,
                U256::from(u64::MAX),
                false,
                creator,
            ));
            Ok(())
        })
    }

    async fn remove_proposal_by_name(&self, name: &str) -> Result<TxHash> {
        self.submit("remove_proposal", |s| {
            let proposal = s
                .proposals
                .iter_mut()
                .find(|p| p.0 == name && !p.4)
                .ok_or_else(|| VotingError::Reverted("Proposal not found".to_string()))?;
            proposal.4 = true;
            Ok(())
        })
    }

    async fn close_proposal(&self, proposal_id: u64) -> Result<TxHash> {
        self.submit("close_proposal", |s| {
            let proposal = proposal_id
                .checked_sub(1)
                .and_then(|index| s.proposals.get_mut(index as usize))
                .ok_or_else(|| VotingError::Reverted("Invalid proposal".to_string()))?;
            proposal.2 = true;
            Ok(())
        })
    }

    async fn add_admin(&self, address: Address) -> Result<TxHash> {
        self.submit("add_admin", |s| {
            if s.sender != s.owner {
                return Err(VotingError::Reverted("Only owner".to_string()));
            }
            s.admins.insert(address);
            s.admin_events.push(AdminEvent::Added(address));
            Ok(())
        })
    }

    async fn remove_admin(&self, address: Address) -> Result<TxHash> {
        self.submit("remove_admin", |s| {
            if s.sender != s.owner {
                return Err(VotingError::Reverted("Only owner".to_string()));
            }
            s.admins.remove(&address);
            s.admin_events.push(AdminEvent::Removed(address));
            Ok(())
        })
    }

    async fn add_comment(&self, proposal_id: u64, content_ref: &str) -> Result<TxHash> {
        self.submit("add_comment", |s| {
            let author = s.sender;
            s.comments.push(CommentRef {
                proposal_id,
                author,
                content_ref: content_ref.to_string(),
            });
            Ok(())
        })
    }
}

#[async_trait]
impl FeeToken for FakeChain {
    async fn balance_of(&self, holder: Address) -> Result<U256> {
        self.record("balance_of");
        Ok(self.with_state(|s| s.balances.get(&holder).copied().unwrap_or_default()))
    }

    async fn allowance(&self, holder: Address, spender: Address) -> Result<U256> {
        self.record("allowance");
        Ok(self.with_state(|s| {
            s.allowances
                .get(&(holder, spender))
                .copied()
                .unwrap_or_default()
        }))
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<TxHash> {
        self.submit("approve", |s| {
            let sender = s.sender;
            s.approvals.push(amount);
            s.allowances.insert((sender, spender), amount);
            Ok(())
        })
    }
}

#[async_trait]
impl TransactionWatcher for FakeChain {
    async fn transaction_status(&self, hash: TxHash) -> Result<TransactionStatus> {
        let known = self.with_state(|s| hash.to_low_u64_be() <= s.next_hash);
        Ok(if known {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::NotFound
        })
    }
}
