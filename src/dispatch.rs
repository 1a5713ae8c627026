//! Message dispatch strategies.
//!
//! A [`MessageDispatcher`] receives each decoded message, in order, and owns
//! it from then on. The client awaits each dispatch before decoding the next
//! message, so dispatchers never run concurrently with themselves.

use std::{fmt, future::Future};

use async_trait::async_trait;

mod error;

pub use error::DispatchError;

/// Handles one decoded message at a time.
#[async_trait]
pub trait MessageDispatcher<M: Send + 'static>: Send {
    /// Process `message`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if handling failed. The client treats this
    /// as a fault and stops listening.
    async fn dispatch(&mut self, message: M) -> Result<(), DispatchError>;
}

/// Logs every message at `INFO` level.
///
/// # Examples
///
/// ```
/// use devicewire::dispatch::{MessageDispatcher, TracingDispatcher};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), devicewire::dispatch::DispatchError> {
/// let mut dispatcher = TracingDispatcher::new("sensor");
/// dispatcher.dispatch(String::from("t=21.5")).await?;
/// assert_eq!(dispatcher.dispatched(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TracingDispatcher {
    label: String,
    dispatched: u64,
}

impl TracingDispatcher {
    /// Create a dispatcher that tags its log lines with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            dispatched: 0,
        }
    }

    /// Number of messages logged so far.
    #[must_use]
    pub fn dispatched(&self) -> u64 { self.dispatched }
}

#[async_trait]
impl<M> MessageDispatcher<M> for TracingDispatcher
where
    M: fmt::Debug + Send + 'static,
{
    async fn dispatch(&mut self, message: M) -> Result<(), DispatchError> {
        self.dispatched += 1;
        tracing::info!(
            device = %self.label,
            sequence = self.dispatched,
            ?message,
            "message received"
        );
        Ok(())
    }
}

/// Adapts an async closure into a dispatcher.
///
/// ```
/// use devicewire::dispatch::{DispatchError, FnDispatcher, MessageDispatcher};
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut dispatcher = FnDispatcher::new(|line: String| async move {
///     if line.is_empty() {
///         return Err(DispatchError::new("empty line"));
///     }
///     Ok(())
/// });
/// assert!(dispatcher.dispatch(String::from("ok")).await.is_ok());
/// assert!(dispatcher.dispatch(String::new()).await.is_err());
/// # }
/// ```
pub struct FnDispatcher<F> {
    handler: F,
}

impl<F> FnDispatcher<F> {
    /// Wrap `handler`.
    pub fn new(handler: F) -> Self { Self { handler } }
}

impl<F> fmt::Debug for FnDispatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnDispatcher").finish_non_exhaustive()
    }
}

#[async_trait]
impl<M, F, Fut> MessageDispatcher<M> for FnDispatcher<F>
where
    M: Send + 'static,
    F: FnMut(M) -> Fut + Send,
    Fut: Future<Output = Result<(), DispatchError>> + Send,
{
    async fn dispatch(&mut self, message: M) -> Result<(), DispatchError> {
        (self.handler)(message).await
    }
}
