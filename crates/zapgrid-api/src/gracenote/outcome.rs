//! Fetch outcome and transfer statistics types.

/// Result of a retried request.
///
/// Exhausted retries are not an error: callers branch on `Failed`
/// explicitly ("no more data" for the grid, "unavailable" for details).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    /// A success status with a non-empty body.
    Fetched(T),
    /// Every attempt failed (transport error, non-success status, or empty body).
    Failed,
}

impl<T> FetchOutcome<T> {
    /// Maps the fetched payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            Self::Fetched(value) => FetchOutcome::Fetched(f(value)),
            Self::Failed => FetchOutcome::Failed,
        }
    }

    /// Returns `true` when the request failed.
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// How a text fetch treats a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPolicy {
    /// A failed request yields an empty string.
    AllowEmpty,
    /// A failed request is a fatal error.
    Required,
}

/// Run-level transfer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Requests issued (every attempt counts).
    pub requests: u64,
    /// Response body bytes received.
    pub bytes: u64,
    /// Distinct remote peers observed.
    pub connections: usize,
}
