//! Bearer credential ownership
//!
//! The manager holds exactly one "current" acquisition: a shared future that
//! every reader awaits. `refresh` swaps in a new acquisition; readers already
//! awaiting the old one still receive its result, readers arriving later see
//! the new one. A settled acquisition is never mutated, so readers observe
//! either the old or the new token, never a mix.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::AccessToken;
use crate::services::upstream::{TokenError, TokenSource};

/// One token acquisition, shareable among any number of awaiting callers
pub type TokenHandle = Shared<BoxFuture<'static, Result<AccessToken, TokenError>>>;

#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn TokenSource>,
    current: Mutex<TokenHandle>,
    generation: AtomicU64,
}

impl TokenManager {
    /// The first acquisition starts lazily, when a reader first awaits it
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        let generation = AtomicU64::new(1);
        let first = acquire(Arc::clone(&source), 1);
        Self {
            inner: Arc::new(Inner {
                source,
                current: Mutex::new(first),
                generation,
            }),
        }
    }

    /// Await the current acquisition
    ///
    /// If the current acquisition already settled with a failure, a fresh one
    /// replaces it first; callers that awaited the failed one have seen the
    /// failure already.
    pub async fn current_token(&self) -> Result<AccessToken, TokenError> {
        let handle = {
            let mut current = self.lock_current();
            if matches!(current.peek(), Some(Err(_))) {
                *current = self.next_acquisition();
            }
            current.clone()
        };
        handle.await
    }

    /// Start a new acquisition unconditionally and make it current
    ///
    /// The acquisition is driven on the runtime right away, so it completes
    /// even if nobody awaits the returned handle.
    pub fn refresh(&self) -> TokenHandle {
        let handle = self.next_acquisition();
        *self.lock_current() = handle.clone();

        let driver = handle.clone();
        tokio::spawn(async move {
            let _ = driver.await;
        });

        handle
    }

    /// Number of acquisitions started so far
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn next_acquisition(&self) -> TokenHandle {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        acquire(Arc::clone(&self.inner.source), generation)
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, TokenHandle> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

fn acquire(source: Arc<dyn TokenSource>, generation: u64) -> TokenHandle {
    async move {
        let result = source.fetch_token().await;
        match &result {
            Ok(_) => tracing::info!(generation, "Acquired new upstream token"),
            Err(e) => tracing::warn!(generation, error = %e, "Upstream token acquisition failed"),
        }
        result
    }
    .boxed()
    .shared()
}
