//! Progress reporting for one render request.

use crate::CancelToken;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Snapshot handed to a [`ProgressSink`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderProgress {
    pub total: usize,
    pub completed: usize,
    pub message: String,
}

/// Receives progress updates.
///
/// `None` is the terminal state: the render finished or was
/// cancelled and there is nothing left to show.
pub trait ProgressSink: Send + Sync {
    fn update(&self, progress: Option<&RenderProgress>);
}

impl<F> ProgressSink for F
where
    F: Fn(Option<&RenderProgress>) + Send + Sync,
{
    fn update(&self, progress: Option<&RenderProgress>) {
        self(progress);
    }
}

/// Progress channel owned by a single request.
///
/// Once the request's [`CancelToken`] is set, every further update is
/// dropped. Updates and cancellation serialize on the same lock, so no
/// update can land after [`Progress::cancel`] returns.
#[derive(Clone)]
pub struct Progress {
    inner: Arc<Inner>,
}

struct Inner {
    sink: Arc<dyn ProgressSink>,
    cancel: CancelToken,
    state: Mutex<RenderProgress>,
}

impl Progress {
    pub fn new(sink: Arc<dyn ProgressSink>, cancel: CancelToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                cancel,
                state: Mutex::new(RenderProgress::default()),
            }),
        }
    }

    /// Returns a `Progress` which reports to nobody.
    pub fn silent(cancel: CancelToken) -> Self {
        Self::new(Arc::new(|_: Option<&RenderProgress>| {}), cancel)
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.inner.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Begins the tile download phase with `total` units of work.
    pub fn start(&self, total: usize) {
        self.publish(|state| {
            state.total = total;
            state.completed = 0;
            state.message = download_message(0, total);
        });
    }

    /// Marks one tile as resolved.
    pub fn advance(&self) {
        self.publish(|state| {
            state.completed = state.total.min(state.completed + 1);
            state.message = download_message(state.completed, state.total);
        });
    }

    /// Replaces the human readable message, leaving counts alone.
    pub fn message(&self, message: impl Into<String>) {
        let message = message.into();
        self.publish(|state| state.message = message);
    }

    /// Reports the terminal empty state after a successful render.
    pub fn finish(&self) {
        let _state = self.lock();
        if !self.is_cancelled() {
            self.inner.sink.update(None);
        }
    }

    /// Cancels the request and reports the terminal empty state.
    ///
    /// Idempotent; only the first call reaches the sink.
    pub fn cancel(&self) {
        let _state = self.lock();
        if !self.is_cancelled() {
            self.inner.cancel.cancel();
            self.inner.sink.update(None);
        }
    }

    /// Returns the most recently published state.
    pub fn snapshot(&self) -> RenderProgress {
        self.lock().clone()
    }

    fn publish(&self, f: impl FnOnce(&mut RenderProgress)) {
        let mut state = self.lock();
        if self.is_cancelled() {
            return;
        }
        f(&mut state);
        self.inner.sink.update(Some(&state));
    }

    fn lock(&self) -> MutexGuard<'_, RenderProgress> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn download_message(completed: usize, total: usize) -> String {
    format!("Downloading tiles: {completed} of {total}...")
}
