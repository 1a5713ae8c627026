//! Error type for message dispatchers.

use std::error::Error;

use thiserror::Error;

/// A dispatcher failed to handle a message.
#[derive(Debug, Error)]
#[error("dispatch failed: {0}")]
pub struct DispatchError(#[source] Box<dyn Error + Send + Sync>);

impl DispatchError {
    /// Wrap the underlying cause.
    pub fn new(cause: impl Into<Box<dyn Error + Send + Sync>>) -> Self { Self(cause.into()) }

    /// Recover the underlying cause.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn Error + Send + Sync> { self.0 }
}
