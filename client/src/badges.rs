//! Achievement badges held by a wallet.

use crate::chain::AchievementToken;
use crate::comments::strip_ipfs_scheme;
use crate::error::Result;
use crate::types::Badge;
use ethers::types::{Address, U256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

const IPFS_GATEWAY: &str = "https://ipfs.io/ipfs";

/// Public gateway URL for an `ipfs://` URI or bare hash. HTTP(S) URIs pass
/// through unchanged; an empty URI stays empty.
pub fn gateway_url(uri: &str) -> String {
    if uri.is_empty() || uri.starts_with("http://") || uri.starts_with("https://") {
        return uri.to_string();
    }
    format!("{}/{}", IPFS_GATEWAY, strip_ipfs_scheme(uri))
}

/// Lists achievement tokens owned by a wallet
#[derive(Clone)]
pub struct BadgeGallery {
    token: Arc<dyn AchievementToken>,
}

impl BadgeGallery {
    /// Create a gallery over a token contract
    pub fn new(token: Arc<dyn AchievementToken>) -> Self {
        Self { token }
    }

    /// Badges currently owned by `holder`, ascending by token id.
    ///
    /// Candidates come from transfers to the holder, or from mint events when
    /// there are none but the balance is positive. Each candidate is confirmed
    /// with `ownerOf`; tokens whose checks fail are skipped.
    pub async fn owned_badges(&self, holder: Address) -> Result<Vec<Badge>> {
        let mut candidates: BTreeSet<U256> = self.token.transfers_to(holder).await?.into_iter().collect();

        if candidates.is_empty() {
            let balance = self.token.balance_of(holder).await?;
            if balance.is_zero() {
                return Ok(Vec::new());
            }
            debug!("Balance {} without transfer events, scanning mints", balance);
            candidates = self.token.mints().await?.into_iter().collect();
        }

        let mut badges = Vec::new();
        for token_id in candidates {
            match self.token.owner_of(token_id).await {
                Ok(owner) if owner == holder => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping badge {}: {}", token_id, e);
                    continue;
                }
            }

            match self.token.token_uri(token_id).await {
                Ok(token_uri) => badges.push(Badge {
                    token_id,
                    gateway_url: gateway_url(&token_uri),
                    token_uri,
                }),
                Err(e) => warn!("Skipping badge {}: {}", token_id, e),
            }
        }

        Ok(badges)
    }
}
