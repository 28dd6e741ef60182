//! Error types for the voting client.
//!
//! `VotingError` is the internal error type returned by every fallible call.
//! `FailureKind` / `ActionFailure` are the user-facing taxonomy that terminal
//! orchestrator states carry.

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for voting client operations
#[derive(Error, Debug)]
pub enum VotingError {
    /// Fee-gate pre-check failed
    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance {
        /// Amount the action needs
        required: U256,
        /// Amount the holder owns
        available: U256,
    },

    /// Spending allowance below the fee. Resolved by approval, never surfaced.
    #[error("Insufficient allowance: {required} required, {approved} approved")]
    InsufficientAllowance {
        /// Amount the action needs
        required: U256,
        /// Amount currently approved
        approved: U256,
    },

    /// The signer declined a signature request
    #[error("User rejected the transaction")]
    UserRejected,

    /// The registry rejected a duplicate vote
    #[error("Already voted on proposal {0}")]
    AlreadyVoted(u64),

    /// Contract revert
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Provider or connectivity failure
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Required external addresses missing at startup
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Proposal id outside `[1, proposalCount]`
    #[error("Proposal not found: {0}")]
    NotFound(u64),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Caller supplied an invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No wallet connected
    #[error("Wallet not connected")]
    WalletNotConnected,

    /// The session account is not the address transactions are signed with
    #[error("Account {account:?} does not match the connected signer {signer:?}; reconnect with that wallet")]
    SignerMismatch {
        /// Address the signer signs with
        signer: Address,
        /// Account the session was asked to switch to
        account: Address,
    },

    /// Another action is still pending for this wallet
    #[error("Another transaction is still in flight")]
    TransactionInFlight,

    /// Confirmation did not arrive in time
    #[error("Transaction timeout after {0} seconds")]
    TransactionTimeout(u64),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimitExceeded(u64),

    /// Max retries exceeded
    #[error("Max retries ({0}) exceeded")]
    MaxRetriesExceeded(usize),

    /// Invalid response from a node or the content store
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Content store request failed
    #[error("Content store error: {0}")]
    ContentStore(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

/// Result type alias for voting client operations
pub type Result<T> = std::result::Result<T, VotingError>;

const ALREADY_VOTED_MARKER: &str = "already voted";

/// EIP-1193 "user rejected request"
const USER_REJECTED_CODE: i64 = 4001;
/// Geth/Infura "limit exceeded" and HTTP 429 surfaced as a JSON-RPC code
const RATE_LIMITED_CODES: [i64; 2] = [-32005, 429];
/// JSON-RPC "execution reverted"
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Numeric values following `code` in an error message (`code: 4001`,
/// `"code":4001`, `code=-32005`)
fn error_codes(lower: &str) -> impl Iterator<Item = i64> + '_ {
    lower.match_indices("code").filter_map(move |(i, m)| {
        let rest = lower[i + m.len()..]
            .trim_start_matches(|c: char| c == '"' || c == ':' || c == '=' || c.is_whitespace());
        let end = rest
            .char_indices()
            .find(|&(j, c)| !(c.is_ascii_digit() || (j == 0 && c == '-')))
            .map_or(rest.len(), |(j, _)| j);
        rest[..end].parse().ok()
    })
}

fn is_rate_limit_text(lower: &str) -> bool {
    lower.contains("rate limit") || lower.contains("too many requests")
}

impl VotingError {
    /// Classify a raw provider or wallet error message.
    ///
    /// Wallets report rejections as error code 4001 or `ACTION_REJECTED`;
    /// nodes report out-of-gas funding as "insufficient funds". Anything that
    /// is not recognisably a transport problem is treated as a revert.
    pub fn from_provider_message(message: &str) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("action_rejected")
            || error_codes(&lower).any(|code| code == USER_REJECTED_CODE)
        {
            return VotingError::UserRejected;
        }

        if lower.contains("insufficient funds") || lower.contains("insufficient gas") {
            return VotingError::Reverted("Insufficient gas in your wallet".to_string());
        }

        if is_rate_limit_text(&lower)
            || error_codes(&lower).any(|code| RATE_LIMITED_CODES.contains(&code))
        {
            return VotingError::RateLimitExceeded(1);
        }

        if lower.contains("network error")
            || lower.contains("connection refused")
            || lower.contains("connection reset")
            || lower.contains("timed out")
            || lower.contains("error sending request")
        {
            return VotingError::NetworkError(message.to_string());
        }

        VotingError::Reverted(message.to_string())
    }

    /// Classify a JSON-RPC error response from the node.
    ///
    /// Only code 3 and "execution reverted" messages are reverts; any other
    /// response the node returns is a network-level failure.
    pub fn from_rpc_error(code: i64, message: &str) -> Self {
        let lower = message.to_lowercase();

        if code == USER_REJECTED_CODE {
            return VotingError::UserRejected;
        }
        if RATE_LIMITED_CODES.contains(&code) || is_rate_limit_text(&lower) {
            return VotingError::RateLimitExceeded(1);
        }
        if code == EXECUTION_REVERTED_CODE || lower.contains("execution reverted") {
            let reason = message
                .trim_start_matches("execution reverted")
                .trim_start_matches(':')
                .trim();
            return VotingError::Reverted(reason.to_string());
        }
        if lower.contains("insufficient funds") {
            return VotingError::Reverted("Insufficient gas in your wallet".to_string());
        }

        VotingError::NetworkError(format!("(code: {}, message: {})", code, message))
    }

    /// Whether a revert reason reports a duplicate vote
    pub fn is_already_voted_reason(reason: &str) -> bool {
        reason.to_lowercase().contains(ALREADY_VOTED_MARKER)
    }

    /// Map this error onto the user-facing taxonomy
    pub fn to_failure(&self) -> ActionFailure {
        match self {
            VotingError::InsufficientBalance { required, .. } => ActionFailure::new(
                FailureKind::InsufficientBalance,
                format!("You need at least {} token units for this action", required),
            ),
            VotingError::UserRejected => {
                ActionFailure::new(FailureKind::UserRejected, "User rejected the transaction")
            }
            VotingError::AlreadyVoted(_) => ActionFailure::new(
                FailureKind::AlreadyVoted,
                "You can only vote once per proposal",
            ),
            VotingError::Reverted(reason) if Self::is_already_voted_reason(reason) => {
                ActionFailure::new(
                    FailureKind::AlreadyVoted,
                    "You can only vote once per proposal",
                )
            }
            VotingError::Reverted(reason) if reason.trim().is_empty() => ActionFailure::new(
                FailureKind::Reverted,
                "Something went wrong with the transaction",
            ),
            VotingError::Reverted(reason) => {
                ActionFailure::new(FailureKind::Reverted, reason.clone())
            }
            VotingError::InvalidInput(reason) => {
                ActionFailure::new(FailureKind::Reverted, reason.clone())
            }
            VotingError::NotConfigured(reason) => {
                ActionFailure::new(FailureKind::NotConfigured, reason.clone())
            }
            VotingError::NetworkError(_)
            | VotingError::Http(_)
            | VotingError::RateLimitExceeded(_)
            | VotingError::MaxRetriesExceeded(_)
            | VotingError::TransactionTimeout(_)
            | VotingError::InvalidResponse(_) => ActionFailure::new(
                FailureKind::NetworkError,
                "Network error. Please check your connection",
            ),
            other => ActionFailure::new(FailureKind::Reverted, other.to_string()),
        }
    }
}

/// User-facing failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Balance below the action fee; the signer was never asked
    InsufficientBalance,
    /// Signer declined the approval or the action
    UserRejected,
    /// Duplicate vote rejected by the registry
    AlreadyVoted,
    /// Any other contract revert
    Reverted,
    /// Provider or connectivity failure
    NetworkError,
    /// Required addresses missing
    NotConfigured,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self {
            FailureKind::InsufficientBalance => "Insufficient Balance",
            FailureKind::UserRejected => "Transaction Rejected",
            FailureKind::AlreadyVoted => "Already Voted",
            FailureKind::Reverted => "Transaction Failed",
            FailureKind::NetworkError => "Network Error",
            FailureKind::NotConfigured => "Not Configured",
        };
        write!(f, "{}", title)
    }
}

/// Terminal failure reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    /// Taxonomy bucket
    pub kind: FailureKind,
    /// Human-readable reason
    pub reason: String,
}

impl ActionFailure {
    /// Create a failure
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    /// Whether the failure is transient and worth a user-initiated retry
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, FailureKind::NetworkError)
    }
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

impl From<&VotingError> for ActionFailure {
    fn from(error: &VotingError) -> Self {
        error.to_failure()
    }
}

/// Error context for retryable operations
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Number of attempts made
    pub attempts: usize,
    /// Last error encountered
    pub last_error: String,
    /// Total time spent waiting between attempts (in milliseconds)
    pub total_time_ms: u64,
}

impl RetryContext {
    /// Create a new retry context
    pub fn new() -> Self {
        Self {
            attempts: 0,
            last_error: String::new(),
            total_time_ms: 0,
        }
    }

    /// Record an attempt
    pub fn record_attempt(&mut self, error: &str, duration_ms: u64) {
        self.attempts += 1;
        self.last_error = error.to_string();
        self.total_time_ms += duration_ms;
    }
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = VotingError::Reverted("Proposal closed".to_string());
        assert_eq!(err.to_string(), "Transaction reverted: Proposal closed");
    }

    #[test]
    fn test_insufficient_balance_display() {
        let err = VotingError::InsufficientBalance {
            required: U256::from(10),
            available: U256::from(3),
        };
        assert!(err.to_string().contains("10 required"));
    }

    #[test_case("MetaMask Tx Signature: User denied transaction signature."; "metamask denial")]
    #[test_case("user rejected transaction (action=\"sendTransaction\", code=ACTION_REJECTED)"; "ethers rejection")]
    #[test_case("(code: 4001, message: rejected)"; "eip1193 code")]
    fn test_rejection_messages(message: &str) {
        assert_matches!(
            VotingError::from_provider_message(message),
            VotingError::UserRejected
        );
    }

    #[test_case("execution reverted: proposal 14001 is closed"; "digits in reason")]
    #[test_case("execution reverted: voter 0x4001ab has no stake"; "digits in address")]
    fn test_code_digits_inside_reason_are_not_rejection(message: &str) {
        let err = VotingError::from_provider_message(message);
        assert_matches!(err, VotingError::Reverted(_));
        assert_eq!(err.to_failure().kind, FailureKind::Reverted);
    }

    #[test_case("{\"code\":4001,\"message\":\"User rejected the request.\"}"; "json body")]
    #[test_case("error code=4001"; "key value")]
    fn test_structured_rejection_code(message: &str) {
        assert_matches!(
            VotingError::from_provider_message(message),
            VotingError::UserRejected
        );
    }

    #[test]
    fn test_rate_limit_message() {
        let err = VotingError::from_provider_message("(code: -32005, message: request rate limited)");
        assert_matches!(err, VotingError::RateLimitExceeded(_));
    }

    #[test_case(-32005, "daily request count exceeded, request rate limited"; "limit exceeded code")]
    #[test_case(429, "Too Many Requests"; "http status code")]
    #[test_case(-32000, "rate limit reached"; "rate limit text")]
    fn test_rpc_rate_limit(code: i64, message: &str) {
        assert_matches!(
            VotingError::from_rpc_error(code, message),
            VotingError::RateLimitExceeded(_)
        );
    }

    #[test]
    fn test_rpc_internal_error_is_network() {
        let err = VotingError::from_rpc_error(-32603, "internal error");
        assert_matches!(err, VotingError::NetworkError(ref msg) if msg.contains("-32603"));
        assert_eq!(err.to_failure().kind, FailureKind::NetworkError);
    }

    #[test]
    fn test_rpc_revert_strips_prefix() {
        let err = VotingError::from_rpc_error(3, "execution reverted: Already voted");
        assert_matches!(err, VotingError::Reverted(ref reason) if reason == "Already voted");
        assert_eq!(err.to_failure().kind, FailureKind::AlreadyVoted);
    }

    #[test]
    fn test_rpc_user_rejection() {
        assert_matches!(
            VotingError::from_rpc_error(4001, "User rejected the request."),
            VotingError::UserRejected
        );
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = VotingError::from_provider_message("insufficient funds for gas * price + value");
        assert_matches!(err, VotingError::Reverted(reason) if reason == "Insufficient gas in your wallet");
    }

    #[test]
    fn test_network_message() {
        let err = VotingError::from_provider_message("error sending request for url");
        assert_matches!(err, VotingError::NetworkError(_));
    }

    #[test]
    fn test_unknown_message_is_revert() {
        let err = VotingError::from_provider_message("execution reverted: Voting period over");
        assert_matches!(err, VotingError::Reverted(reason) if reason.contains("Voting period over"));
    }

    #[test_case("execution reverted: Already voted", FailureKind::AlreadyVoted; "already voted")]
    #[test_case("ALREADY VOTED", FailureKind::AlreadyVoted; "case insensitive")]
    #[test_case("Proposal closed", FailureKind::Reverted; "other revert")]
    fn test_revert_classification(reason: &str, expected: FailureKind) {
        let failure = VotingError::Reverted(reason.to_string()).to_failure();
        assert_eq!(failure.kind, expected);
    }

    #[test]
    fn test_empty_revert_uses_fallback() {
        let failure = VotingError::Reverted(String::new()).to_failure();
        assert_eq!(failure.kind, FailureKind::Reverted);
        assert_eq!(failure.reason, "Something went wrong with the transaction");
    }

    #[test]
    fn test_timeout_maps_to_network_error() {
        let failure = VotingError::TransactionTimeout(60).to_failure();
        assert_eq!(failure.kind, FailureKind::NetworkError);
        assert!(failure.is_transient());
    }

    #[test]
    fn test_failure_display() {
        let failure = ActionFailure::new(FailureKind::UserRejected, "User rejected the transaction");
        assert_eq!(
            failure.to_string(),
            "Transaction Rejected: User rejected the transaction"
        );
    }

    #[test]
    fn test_retry_context() {
        let mut ctx = RetryContext::new();
        assert_eq!(ctx.attempts, 0);

        ctx.record_attempt("error 1", 100);
        assert_eq!(ctx.attempts, 1);
        assert_eq!(ctx.last_error, "error 1");
        assert_eq!(ctx.total_time_ms, 100);

        ctx.record_attempt("error 2", 200);
        assert_eq!(ctx.attempts, 2);
        assert_eq!(ctx.total_time_ms, 300);
    }
}
