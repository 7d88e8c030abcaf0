//! Observability module for correlation and tracing

use uuid::Uuid;

/// Correlation ID for tracking one multi-transaction operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Trace context for a sequence of dependent submissions
///
/// A config push opens one context and derives a child per submitted phase;
/// every log line of a push carries the same `correlation_id`, and phase
/// spans point back at the push through `parent_span_id`.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub correlation_id: CorrelationId,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub operation: String,
    /// Unix epoch seconds
    pub timestamp: u64,
}

impl TraceContext {
    pub fn new(operation: &str) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
            operation: operation.to_string(),
            timestamp: unix_now(),
        }
    }

    /// Child context sharing the correlation id
    pub fn child_span(&self, operation: &str) -> Self {
        Self {
            correlation_id: self.correlation_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(self.span_id.clone()),
            operation: operation.to_string(),
            timestamp: unix_now(),
        }
    }

    /// `tracing` span carrying this context's identifiers
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "op",
            operation = %self.operation,
            correlation_id = %self.correlation_id,
            span_id = %self.span_id,
            parent_span_id = ?self.parent_span_id,
            started_at = self.timestamp,
        )
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
