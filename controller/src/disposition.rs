//! The outcome of a single reconciliation, and its translation into `kube::runtime` terms.
use crate::error::Error;

use kube::runtime::controller::Action;
use snafu::Snafu;
use tokio::time::Duration;

/// Backoff applied to errors which do not carry their own requeue delay.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// What the work queue should do with a Node after one pass of the state machine.
#[derive(Debug)]
pub enum Disposition {
    /// Nothing left to do until the Node changes again.
    Settled,
    /// Look at the Node again after the given delay.
    RequeueAfter(Duration),
    /// Look at the Node again after the given delay, surfacing the error that caused the retry.
    RequeueAfterWithError(Duration, Error),
    /// Surface the error and let the error policy choose the delay.
    Failed(Error),
}

impl Disposition {
    /// The delay before the next reconciliation, if one is scheduled by this disposition.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::Settled => None,
            Self::RequeueAfter(delay) | Self::RequeueAfterWithError(delay, _) => Some(*delay),
            Self::Failed(_) => Some(DEFAULT_ERROR_BACKOFF),
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::RequeueAfterWithError(_, err) | Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Settled => "settled",
            Self::RequeueAfter(_) => "requeue",
            Self::RequeueAfterWithError(_, _) => "requeue_with_error",
            Self::Failed(_) => "failed",
        }
    }

    /// Converts into the result shape `kube::runtime::Controller` expects from a reconciler.
    ///
    /// Errors keep their requeue delay so that the error policy can honour it.
    pub fn into_action(self) -> std::result::Result<Action, RequeueError> {
        match self {
            Self::Settled => Ok(Action::await_change()),
            Self::RequeueAfter(delay) => Ok(Action::requeue(delay)),
            Self::RequeueAfterWithError(delay, source) => Err(RequeueError {
                source,
                requeue_after: Some(delay),
            }),
            Self::Failed(source) => Err(RequeueError {
                source,
                requeue_after: None,
            }),
        }
    }
}

/// A reconciliation error together with the delay the state machine asked for.
#[derive(Debug, Snafu)]
#[snafu(display("{}", source))]
pub struct RequeueError {
    source: Error,
    requeue_after: Option<Duration>,
}

impl RequeueError {
    /// The action the controller's error policy should take for this error.
    pub fn action(&self) -> Action {
        Action::requeue(self.requeue_after.unwrap_or(DEFAULT_ERROR_BACKOFF))
    }

    pub fn source_error(&self) -> &Error {
        &self.source
    }
}
