//! Authorization resolution for the connected wallet.
//!
//! Ownership and admin status always come from live registry reads. The
//! admin event log only supplies candidate addresses for the roster.
//!
//! Known limitation: the roster only sees admins whose `AdminAdded` event
//! falls inside the queried block window (`event_start_block` onwards). An
//! admin granted before that block is missing from [`AdminRoster::admins`],
//! though [`AuthorizationResolver::resolve`] still reports them correctly.

use crate::chain::VotingRegistry;
use crate::error::{Result, VotingError};
use ethers::types::Address;
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Role of an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Role {
    /// Account is the registry owner
    pub is_owner: bool,
    /// Account may administer proposals; always true for the owner
    pub is_admin: bool,
}

impl Role {
    /// Least-privileged role
    pub fn none() -> Self {
        Self::default()
    }
}

/// Owner plus every currently granted admin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminRoster {
    /// Registry owner, when the read succeeded
    pub owner: Option<Address>,
    /// Owner first, then admins in first-seen event order
    pub admins: Vec<Address>,
}

/// Resolves roles against the registry
#[derive(Clone)]
pub struct AuthorizationResolver {
    registry: Arc<dyn VotingRegistry>,
}

impl AuthorizationResolver {
    /// Create a resolver
    pub fn new(registry: Arc<dyn VotingRegistry>) -> Self {
        Self { registry }
    }

    /// Role of `account`. Read failures resolve to [`Role::none`].
    pub async fn resolve(&self, account: Option<Address>) -> Role {
        let account = match account {
            Some(account) => account,
            None => return Role::none(),
        };

        let owner = match self.registry.owner().await {
            Ok(owner) => owner,
            Err(e) => {
                warn!("Owner read failed, treating {:?} as unprivileged: {}", account, e);
                return Role::none();
            }
        };

        // `Address` equality is byte equality, so checksum casing never matters
        if owner == account {
            return Role {
                is_owner: true,
                is_admin: true,
            };
        }

        let is_admin = match self.registry.is_admin(account).await {
            Ok(granted) => granted,
            Err(e) => {
                warn!("Admin read failed for {:?}: {}", account, e);
                false
            }
        };

        Role {
            is_owner: false,
            is_admin,
        }
    }

    /// Owner and every address whose admin flag is currently set
    pub async fn list_admins(&self) -> AdminRoster {
        let owner = match self.registry.owner().await {
            Ok(owner) => Some(owner),
            Err(e) => {
                warn!("Owner read failed: {}", e);
                None
            }
        };

        let events = match self.registry.admin_events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("Admin event query failed: {}", e);
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let candidates: Vec<Address> = events
            .iter()
            .map(|event| event.address())
            .filter(|address| !address.is_zero() && Some(*address) != owner)
            .filter(|address| seen.insert(*address))
            .collect();
        debug!("Checking {} admin candidates", candidates.len());

        let mut admins: Vec<Address> = owner.into_iter().collect();
        for candidate in candidates {
            match self.registry.is_admin(candidate).await {
                Ok(true) => admins.push(candidate),
                Ok(false) => {}
                Err(e) => warn!("Skipping admin candidate {:?}: {}", candidate, e),
            }
        }

        AdminRoster { owner, admins }
    }
}

/// Parse a user-entered address
pub fn parse_address(input: &str) -> Result<Address> {
    Address::from_str(input.trim())
        .map_err(|_| VotingError::InvalidInput("Please enter a valid Ethereum address".to_string()))
}

/// Reject admin grants to the zero address or to the caller
pub fn validate_admin_candidate(account: Address, candidate: Address) -> Result<()> {
    if candidate.is_zero() {
        return Err(VotingError::InvalidInput(
            "Please enter a valid Ethereum address".to_string(),
        ));
    }
    if candidate == account {
        return Err(VotingError::InvalidInput(
            "You are already an admin".to_string(),
        ));
    }
    Ok(())
}
