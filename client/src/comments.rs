//! Proposal comments.
//!
//! Comment bodies live in an external content-addressed store; the registry
//! only records `CommentAdded(proposalId, author, contentRef)`. Bodies are
//! fetched best-effort: one missing body drops that comment, not the list.

use crate::chain::VotingRegistry;
use crate::config::VotingConfig;
use crate::error::{Result, VotingError};
use crate::orchestrator::Action;
use crate::retry::RetryStrategy;
use crate::types::{Comment, CommentBody, ContentRef};
use async_trait::async_trait;
use chrono::Utc;
use ethers::types::Address;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

/// Content-addressed store for comment bodies
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a body, returning its identifier
    async fn put(&self, body: &CommentBody) -> Result<ContentRef>;

    /// Fetch a body by identifier
    async fn get(&self, content_ref: &str) -> Result<CommentBody>;
}

/// Strip an `ipfs://` scheme, leaving the bare hash
pub fn strip_ipfs_scheme(content_ref: &str) -> &str {
    content_ref.strip_prefix("ipfs://").unwrap_or(content_ref)
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pinata pinning API plus gateway
#[derive(Clone)]
pub struct PinataStore {
    client: Client,
    api_url: String,
    gateway_url: String,
    jwt: Option<String>,
    retry_strategy: RetryStrategy,
}

impl PinataStore {
    /// Create a store from the content store settings in `config`
    pub fn new(config: &VotingConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            api_url: config.content_api_url.trim_end_matches('/').to_string(),
            gateway_url: config.content_gateway_url.trim_end_matches('/').to_string(),
            jwt: config.content_jwt.clone(),
            retry_strategy: RetryStrategy::from_config(config),
        })
    }

    fn jwt(&self) -> Result<&str> {
        self.jwt
            .as_deref()
            .filter(|jwt| !jwt.is_empty())
            .ok_or_else(|| VotingError::NotConfigured("Missing required configuration: content_jwt".to_string()))
    }

    /// Check the JWT against the pinning API
    pub async fn test_authentication(&self) -> Result<bool> {
        let jwt = self.jwt()?;
        let url = format!("{}/data/testAuthentication", self.api_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(jwt)
            .send()
            .await
            .map_err(|e| VotingError::NetworkError(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

async fn error_for_status(response: reqwest::Response) -> VotingError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        return VotingError::RateLimitExceeded(retry_after);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    VotingError::ContentStore(format!("HTTP {}: {}", status.as_u16(), error_text))
}

#[async_trait]
impl ContentStore for PinataStore {
    async fn put(&self, body: &CommentBody) -> Result<ContentRef> {
        let jwt = self.jwt()?;
        let url = format!("{}/pinning/pinJSONToIPFS", self.api_url);
        let payload = json!({
            "pinataContent": body,
            "pinataMetadata": {
                "name": format!("comment-{}.json", Utc::now().timestamp_millis()),
            },
        });

        let pinned: PinResponse = self
            .retry_strategy
            .retry(|| async {
                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(jwt)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| VotingError::NetworkError(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(error_for_status(response).await);
                }

                response
                    .json()
                    .await
                    .map_err(|e| VotingError::InvalidResponse(e.to_string()))
            })
            .await?;

        info!("Pinned comment body: {}", pinned.ipfs_hash);
        Ok(pinned.ipfs_hash)
    }

    async fn get(&self, content_ref: &str) -> Result<CommentBody> {
        let url = format!("{}/ipfs/{}", self.gateway_url, strip_ipfs_scheme(content_ref));
        debug!("Fetching comment body from {}", url);

        self.retry_strategy
            .retry(|| async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| VotingError::NetworkError(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(error_for_status(response).await);
                }

                response
                    .json()
                    .await
                    .map_err(|e| VotingError::InvalidResponse(e.to_string()))
            })
            .await
    }
}

/// Reads and prepares comments for one registry
#[derive(Clone)]
pub struct CommentBoard {
    registry: Arc<dyn VotingRegistry>,
    store: Arc<dyn ContentStore>,
}

impl CommentBoard {
    /// Create a board
    pub fn new(registry: Arc<dyn VotingRegistry>, store: Arc<dyn ContentStore>) -> Self {
        Self { registry, store }
    }

    /// Comments on `proposal_id`, oldest first. Bodies that cannot be
    /// fetched are skipped.
    pub async fn load(&self, proposal_id: u64) -> Result<Vec<Comment>> {
        let refs = self.registry.comment_events(proposal_id).await?;

        let mut comments = Vec::with_capacity(refs.len());
        for comment_ref in refs {
            match self.store.get(&comment_ref.content_ref).await {
                Ok(body) => comments.push(Comment {
                    proposal_id: comment_ref.proposal_id,
                    author: comment_ref.author,
                    content_ref: comment_ref.content_ref,
                    body,
                }),
                Err(e) => warn!(
                    "Skipping comment {} on proposal {}: {}",
                    comment_ref.content_ref, proposal_id, e
                ),
            }
        }

        comments.sort_by_key(|c| c.body.timestamp);
        Ok(comments)
    }

    /// Store a comment body and return the action that records it on chain
    pub async fn prepare(&self, proposal_id: u64, author: Address, text: &str) -> Result<Action> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VotingError::InvalidInput(
                "Comment cannot be empty".to_string(),
            ));
        }

        let body = CommentBody {
            text: text.to_string(),
            author,
            proposal_id,
            timestamp: Utc::now(),
        };
        let content_ref = self.store.put(&body).await?;

        Ok(Action::AddComment {
            proposal_id,
            content_ref,
        })
    }
}
