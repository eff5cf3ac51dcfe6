//! Bearer token caching.
//!
//! The service holds exactly one token for the Teams service account. It is
//! fetched from the security service on demand and handed out until it is
//! within the safety margin of its expiry. Refreshes are single-flight: the
//! cache lock is held across the fetch, so concurrent callers that find the
//! token expired wait for one fetch and share its result.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::teams::auth::SecurityServiceClient;
use crate::{CoreError, Result};

/// Upper bound on how long a token is cached.
pub(crate) const MAX_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// A bearer token and the instant it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: Instant,
}

impl Token {
    /// Create a token that expires `lifetime` from now, capped at 24 hours.
    #[must_use]
    pub fn new(value: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Instant::now() + lifetime.min(MAX_LIFETIME),
        }
    }

    /// The raw bearer value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// When the token expires.
    #[must_use]
    pub const fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the token is still valid `margin` from now.
    #[must_use]
    pub fn is_usable(&self, margin: Duration) -> bool {
        Instant::now()
            .checked_add(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Something that can issue fresh tokens.
pub trait TokenSource: Send + Sync {
    /// Fetch a new token.
    fn fetch(&self) -> impl Future<Output = Result<Token>> + Send;
}

/// Single-flight cache for the service account token.
#[derive(Debug)]
pub struct TokenCache<S = SecurityServiceClient> {
    source: S,
    safety_margin: Duration,
    slot: Mutex<Option<Token>>,
}

impl<S: TokenSource> TokenCache<S> {
    /// Create an empty cache.
    #[must_use]
    pub fn new(source: S, safety_margin: Duration) -> Self {
        Self {
            source,
            safety_margin,
            slot: Mutex::new(None),
        }
    }

    /// Return a usable token, fetching a new one if the cached token is
    /// missing or inside the safety margin.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AuthUnavailable` if a fetch was needed and failed.
    /// The stale token is dropped in that case.
    pub async fn get(&self) -> Result<Token> {
        let mut slot = self.slot.lock().await;

        match slot.as_ref() {
            Some(token) if token.is_usable(self.safety_margin) => {
                log::debug!("using cached Teams token");
                return Ok(token.clone());
            }
            Some(_) => log::debug!("cached Teams token has expired, requesting a new one"),
            None => log::debug!("no cached Teams token available, requesting a new one"),
        }

        self.refresh(&mut slot).await
    }

    /// Replace a token that Graph rejected.
    ///
    /// If the cache still holds `rejected`, it is discarded and a new token is
    /// fetched. If another caller already replaced it, the newer token is
    /// returned without another fetch.
    pub(crate) async fn renew(&self, rejected: &Token) -> Result<Token> {
        let mut slot = self.slot.lock().await;

        if let Some(token) = slot.as_ref()
            && token != rejected
            && token.is_usable(self.safety_margin)
        {
            log::debug!("Teams token already renewed by another request");
            return Ok(token.clone());
        }

        log::debug!("discarding rejected Teams token");
        self.refresh(&mut slot).await
    }

    async fn refresh(&self, slot: &mut Option<Token>) -> Result<Token> {
        *slot = None;

        match self.source.fetch().await {
            Ok(token) => {
                log::debug!("Teams token retrieved successfully");
                *slot = Some(token.clone());
                Ok(token)
            }
            Err(e) => {
                log::error!("no valid Teams token available: {e}");
                Err(match e {
                    CoreError::AuthUnavailable(_) => e,
                    other => CoreError::AuthUnavailable(other.to_string()),
                })
            }
        }
    }
}
