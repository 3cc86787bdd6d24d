//! Session token acquisition and caching.
//!
//! Listing and resolution queries must carry a per-session anti-CSRF token
//! that the platform embeds in its HTML pages. [`AuthProvider`] owns a
//! single-slot cache over a [`TokenSource`] and exposes an explicit
//! [`invalidate`](AuthProvider::invalidate) - no process-wide global. The
//! platform client invalidates the slot when the API reports an error
//! envelope, so a stale token is refetched on the next query.

mod cookies;

pub use cookies::{CookieError, CookieLine, load_cookies_into_jar, parse_netscape_cookies};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Errors from token acquisition.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Fetching a token-bearing page failed.
    #[error("token page request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// No token could be extracted from any known page.
    #[error("no session token found; is the session logged in?")]
    TokenNotFound,
}

/// Produces a fresh session token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetches a fresh token from the platform.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if no token can be obtained.
    async fn fetch_token(&self) -> Result<String, AuthError>;
}

/// Single-slot cached token provider.
pub struct AuthProvider {
    source: Box<dyn TokenSource>,
    cached: Mutex<Option<String>>,
}

impl AuthProvider {
    /// Creates a provider over the given source with an empty cache.
    #[must_use]
    pub fn new(source: Box<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Returns the cached token, fetching one first if the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the slot is empty and the source cannot
    /// produce a token.
    pub async fn token(&self) -> Result<String, AuthError> {
        let mut slot = self.cached.lock().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let token = self.source.fetch_token().await?;
        debug!("session token acquired");
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Clears the cached token so the next [`token`](Self::token) call
    /// refetches.
    pub async fn invalidate(&self) {
        let mut slot = self.cached.lock().await;
        if slot.take().is_some() {
            warn!("session token invalidated");
        }
    }
}

/// Scrapes the session token out of the platform's HTML pages.
///
/// Tries the photo-upload page first (the token sits in a plain form
/// field there), then the mobile home page, where it appears in one of
/// two script-embedded shapes.
pub struct HtmlTokenSource {
    client: Client,
    upload_page_url: String,
    home_page_url: String,
}

impl HtmlTokenSource {
    /// Creates a source over the two token-bearing page URLs.
    #[must_use]
    pub fn new(
        client: Client,
        upload_page_url: impl Into<String>,
        home_page_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            upload_page_url: upload_page_url.into(),
            home_page_url: home_page_url.into(),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, AuthError> {
        let text = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html")
            .send()
            .await?
            .text()
            .await?;
        Ok(text)
    }
}

/// Pulls the token out of upload-page HTML (`name="fb_dtsg" value="..."`).
#[must_use]
pub(crate) fn token_from_form_html(html: &str) -> Option<String> {
    first_capture(html, r#"name="fb_dtsg" value="(.*?)""#)
}

/// Pulls the token out of home-page HTML, where it appears either as
/// `"dtsg":{"token":"..."` or `"name":"fb_dtsg","value":"..."`.
#[must_use]
pub(crate) fn token_from_script_html(html: &str) -> Option<String> {
    first_capture(html, r#""dtsg":\{"token":"([^"]+)""#)
        .or_else(|| first_capture(html, r#""name":"fb_dtsg","value":"([^"]+)"#))
}

fn first_capture(text: &str, pattern: &str) -> Option<String> {
    // Patterns are fixed literals; a compile failure is a programmer error
    // surfaced as "no match".
    let re = Regex::new(pattern).ok()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl TokenSource for HtmlTokenSource {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_token(&self) -> Result<String, AuthError> {
        let upload_html = self.fetch_page(&self.upload_page_url).await?;
        if let Some(token) = token_from_form_html(&upload_html) {
            return Ok(token);
        }

        debug!("upload page had no token; trying home page");
        let home_html = self.fetch_page(&self.home_page_url).await?;
        token_from_script_html(&home_html).ok_or(AuthError::TokenNotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingSource {
        calls: std::sync::Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch_token(&self) -> Result<String, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{n}"))
        }
    }

    #[tokio::test]
    async fn test_token_is_cached_in_single_slot() {
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let provider = AuthProvider::new(Box::new(CountingSource {
            calls: std::sync::Arc::clone(&calls),
        }));

        assert_eq!(provider.token().await.unwrap(), "token-1");
        assert_eq!(provider.token().await.unwrap(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let provider = AuthProvider::new(Box::new(CountingSource {
            calls: std::sync::Arc::clone(&calls),
        }));

        assert_eq!(provider.token().await.unwrap(), "token-1");
        provider.invalidate().await;
        assert_eq!(provider.token().await.unwrap(), "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_token_from_form_html() {
        let html = r#"<form><input name="fb_dtsg" value="AQHx12:34" /></form>"#;
        assert_eq!(token_from_form_html(html).unwrap(), "AQHx12:34");
        assert!(token_from_form_html("<html></html>").is_none());
    }

    #[test]
    fn test_token_from_script_html_both_shapes() {
        let modern = r#"{"dtsg":{"token":"NAfoo123","async_get_token":"x"}}"#;
        assert_eq!(token_from_script_html(modern).unwrap(), "NAfoo123");

        let legacy = r#"{"name":"fb_dtsg","value":"NAbar456"}"#;
        assert_eq!(token_from_script_html(legacy).unwrap(), "NAbar456");

        assert!(token_from_script_html("nothing here").is_none());
    }
}
