use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the external search and classification capabilities.
///
/// Zero results is not an error; a successful call that finds nothing returns
/// an empty document set. These variants exist so callers can tell a quota
/// exhaustion from a timeout from a garbled payload and pick the right
/// recovery (skip the query, fail open on the filter, default to neutral).
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("quota exhausted: {0}")]
    Quota(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Violations of orchestration invariants.
///
/// Unlike capability and persistence failures, these indicate a programming
/// or configuration error and abort the run.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),
    #[error("work unit '{0}' was not terminal at join")]
    IncompleteJoin(String),
    #[error("empty work set: {0}")]
    EmptyWorkSet(String),
}
