//! Error taxonomy. Mirrors the shape of the teacher's `error.rs`
//! (`thiserror`-derived enum, one variant per user-visible failure mode)
//! but generic over the loader error type, since loaders are supplied by
//! the embedding application rather than being internal to the crate.

use thiserror::Error;

/// Errors raised while constructing a single eviction-policy engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("capacity must be greater than zero for this policy")]
    ZeroCapacity,

    #[error("eviction_size must be at least 1 and less than capacity")]
    InvalidEvictionSize,

    #[error("shard count must be greater than 1")]
    InvalidShardCount,
}

/// Errors surfaced by the high-level cache's public API.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("loader failed: {0}")]
    LoaderError(E),

    #[error("missing-key cache is not configured")]
    MissingCacheDisabled,

    #[error("warm up did not complete within the allotted time")]
    WarmUpTimeout,

    #[error("internal cache error: {0}")]
    Internal(String),
}

impl<E> From<PolicyError> for CacheError<E> {
    fn from(err: PolicyError) -> Self {
        CacheError::InvalidConfiguration(err.to_string())
    }
}

impl<E: Clone> Clone for CacheError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidConfiguration(s) => Self::InvalidConfiguration(s.clone()),
            Self::LoaderError(e) => Self::LoaderError(e.clone()),
            Self::MissingCacheDisabled => Self::MissingCacheDisabled,
            Self::WarmUpTimeout => Self::WarmUpTimeout,
            Self::Internal(s) => Self::Internal(s.clone()),
        }
    }
}

impl<E: PartialEq> PartialEq for CacheError<E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidConfiguration(a), Self::InvalidConfiguration(b)) => a == b,
            (Self::LoaderError(a), Self::LoaderError(b)) => a == b,
            (Self::MissingCacheDisabled, Self::MissingCacheDisabled) => true,
            (Self::WarmUpTimeout, Self::WarmUpTimeout) => true,
            (Self::Internal(a), Self::Internal(b)) => a == b,
            _ => false,
        }
    }
}
