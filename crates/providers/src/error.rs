/// Failure modes of a provider invocation.
///
/// These never cross the adapter boundary as panics or thrown errors —
/// they travel inside a failed
/// [`ResilienceOutcome`](crate::ResilienceOutcome).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The adapter is switched off in configuration; nothing was called.
    #[error("Provider '{0}' is disabled")]
    Disabled(String),

    /// One attempt exceeded the configured per-call timeout.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The circuit breaker is open; the operation was not invoked.
    #[error("Circuit breaker is open for '{0}'")]
    CircuitOpen(String),

    /// The bulkhead is at capacity; the operation was not invoked.
    #[error("Bulkhead at capacity for '{0}'")]
    BulkheadFull(String),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The provider returned a non-2xx status code.
    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A 2xx response that does not contain the expected output field.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}
