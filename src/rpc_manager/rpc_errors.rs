use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::pubsub_client::PubsubClientError;
use thiserror::Error;

/// Network-layer error taxonomy shared by RPC and pub/sub calls
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcManagerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// RPC response errors (from the RPC server, including preflight failures)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// The freshness token is unknown to the node (aged out or never seen)
    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    /// The unit's last valid block height has passed
    #[error("Transaction expired (endpoint: {endpoint})")]
    TransactionExpired { endpoint: String },

    /// The node has already seen a transaction with this signature
    #[error("Transaction already processed (endpoint: {endpoint})")]
    AlreadyProcessed { endpoint: String },

    #[error("Account not found: {account} (endpoint: {endpoint})")]
    AccountNotFound { account: String, endpoint: String },

    #[error("Insufficient funds (endpoint: {endpoint})")]
    InsufficientFunds { endpoint: String },

    /// Signature subscription could not be opened or closed unexpectedly
    #[error("Subscription error: {message} (endpoint: {endpoint})")]
    Subscription { endpoint: String, message: String },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcManagerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcManagerError::Transport { .. } => true,
            RpcManagerError::Timeout { .. } => true,
            // Rebuilding with a fresh blockhash fixes both of these
            RpcManagerError::BlockhashNotFound { .. } => true,
            RpcManagerError::TransactionExpired { .. } => true,
            RpcManagerError::Subscription { .. } => true,

            RpcManagerError::AlreadyProcessed { .. } => false,
            RpcManagerError::AccountNotFound { .. } => false,
            RpcManagerError::InsufficientFunds { .. } => false,
            RpcManagerError::Validation(_) => false,
            RpcManagerError::Internal(_) => false,

            RpcManagerError::RpcResponse { code, .. } => {
                // Retry on server errors (5xx)
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    /// Whether the rejection was caused by an aged-out freshness token
    pub fn is_expired_blockhash(&self) -> bool {
        matches!(
            self,
            RpcManagerError::BlockhashNotFound { .. } | RpcManagerError::TransactionExpired { .. }
        )
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            RpcManagerError::Transport { .. } => "transport",
            RpcManagerError::Timeout { .. } => "timeout",
            RpcManagerError::RpcResponse { .. } => "rpc_response",
            RpcManagerError::BlockhashNotFound { .. } => "blockhash",
            RpcManagerError::TransactionExpired { .. } => "expired",
            RpcManagerError::AlreadyProcessed { .. } => "already_processed",
            RpcManagerError::AccountNotFound { .. } => "account_not_found",
            RpcManagerError::InsufficientFunds { .. } => "insufficient_funds",
            RpcManagerError::Subscription { .. } => "subscription",
            RpcManagerError::Validation(_) => "validation",
            RpcManagerError::Internal(_) => "internal",
        }
    }

    /// Get the endpoint associated with this error, if any
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            RpcManagerError::Transport { endpoint, .. }
            | RpcManagerError::Timeout { endpoint, .. }
            | RpcManagerError::RpcResponse { endpoint, .. }
            | RpcManagerError::BlockhashNotFound { endpoint }
            | RpcManagerError::TransactionExpired { endpoint }
            | RpcManagerError::AlreadyProcessed { endpoint }
            | RpcManagerError::AccountNotFound { endpoint, .. }
            | RpcManagerError::InsufficientFunds { endpoint }
            | RpcManagerError::Subscription { endpoint, .. } => Some(endpoint),
            RpcManagerError::Validation(_) | RpcManagerError::Internal(_) => None,
        }
    }

    /// Create from ClientError with context
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        if matches!(err.kind(), ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_)) {
            let message = err.to_string();
            if message.to_lowercase().contains("timed out") {
                return RpcManagerError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms: 0,
                };
            }
            return RpcManagerError::Transport {
                endpoint: endpoint.to_string(),
                message,
            };
        }
        Self::classify_message(&err.to_string(), endpoint)
    }

    /// Create from a pub/sub client error
    pub fn from_pubsub_error(err: PubsubClientError, endpoint: &str) -> Self {
        RpcManagerError::Subscription {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }

    /// Classify a node error message
    pub fn classify_message(message: &str, endpoint: &str) -> Self {
        let err_str = message.to_lowercase();

        if err_str.contains("blockhash not found") {
            RpcManagerError::BlockhashNotFound {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("transaction expired")
            || err_str.contains("block height exceeded")
        {
            RpcManagerError::TransactionExpired {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("already been processed") || err_str.contains("alreadyprocessed") {
            RpcManagerError::AlreadyProcessed {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("accountnotfound") || err_str.contains("account not found") {
            RpcManagerError::AccountNotFound {
                account: "unknown".to_string(),
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("insufficient funds")
            || err_str.contains("insufficient lamports")
        {
            RpcManagerError::InsufficientFunds {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            RpcManagerError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: 0,
            }
        } else {
            // Extract error code if available
            let code = err_str
                .split("code:")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_end_matches(|c: char| !c.is_ascii_digit()).parse::<i64>().ok());

            RpcManagerError::RpcResponse {
                endpoint: endpoint.to_string(),
                message: message.to_string(),
                code,
            }
        }
    }
}
