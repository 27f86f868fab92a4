use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellation flag for one piece of in-flight work.
///
/// Tokens handed out by a [`Lifetime`] also report cancelled once the
/// lifetime ends. Cancelling a token never ends its lifetime.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    own: Arc<AtomicBool>,
    scope: Option<Arc<AtomicBool>>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.own.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.own.load(Ordering::Acquire)
            || self
                .scope
                .as_ref()
                .is_some_and(|scope| scope.load(Ordering::Acquire))
    }
}

/// Scope of one open workspace. Ending it (explicitly or by drop) cancels
/// every token handed out from it.
#[derive(Debug, Default)]
pub struct Lifetime {
    ended: Arc<AtomicBool>,
}

impl Lifetime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh token bound to this lifetime.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            own: Arc::default(),
            scope: Some(Arc::clone(&self.ended)),
        }
    }

    pub fn end(&self) {
        self.ended.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        self.end();
    }
}
