use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared cancellation flag for one render request.
///
/// Every stage checks the token at each of its yield points. Once
/// set it is never cleared.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one time slice of a resumable stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// Quota exhausted; call again on the next tick.
    Yield,

    /// The stage finished.
    Done(T),

    /// The request was cancelled. Nothing will be reported.
    Cancelled,
}

impl<T> Step<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done(_))
    }
}
