//! Browser abstraction for per-request page rendering.
//!
//! Defines the `BrowserLauncher` and `BrowserSession` traits that abstract
//! over the browser engine (currently Chromium via chromiumoxide), and the
//! `SessionGuard` that ties a session's lifetime to one request.

pub mod chromium;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::config::BrowserSettings;
use crate::error::BrowserError;

/// Starts one isolated browser per call.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a browser and open a page configured per `settings`
    /// (user agent, viewport).
    async fn launch(
        &self,
        settings: &BrowserSettings,
    ) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One launched browser with a single configured page.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url` and wait for network activity to settle.
    ///
    /// Not bounded in time by itself; callers wrap it in a timeout.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Read `window.runParams.data` from the loaded page.
    ///
    /// `Ok(None)` when the page does not expose it.
    async fn run_params_data(&mut self) -> Result<Option<Value>, BrowserError>;

    /// Terminate the browser process.
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// Owns a session for the duration of one request.
///
/// [`SessionGuard::release`] closes the browser and logs a failed close.
/// A guard dropped without release (the request future was cancelled)
/// drops the session, which tears the browser process down.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&mut self) -> Result<&mut (dyn BrowserSession + 'static), BrowserError> {
        self.session.as_deref_mut().ok_or(BrowserError::SessionClosed)
    }

    /// Close the browser. Close failures are logged, never returned.
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            match session.close().await {
                Ok(()) => tracing::debug!("browser closed"),
                Err(e) => warn!(error = %e, "failed to close browser"),
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            warn!("browser session dropped without release; killing browser process");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSession {
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    #[async_trait]
    impl BrowserSession for CountingSession {
        async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn run_params_data(&mut self) -> Result<Option<Value>, BrowserError> {
            Ok(None)
        }

        async fn close(self: Box<Self>) -> Result<(), BrowserError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(BrowserError::Cdp("target crashed".into()));
            }
            Ok(())
        }
    }

    fn guard(fail_close: bool) -> (SessionGuard, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let session = CountingSession {
            closes: Arc::clone(&closes),
            fail_close,
        };
        (SessionGuard::new(Box::new(session)), closes)
    }

    #[tokio::test]
    async fn test_release_closes_once() {
        let (mut g, closes) = guard(false);
        assert!(g.session().is_ok());
        g.release().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_failure_is_swallowed() {
        let (g, closes) = guard(true);
        g.release().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_without_release_skips_close() {
        let (g, closes) = guard(false);
        drop(g);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }
}
