//! CSRF state for the login redirect
//!
//! The state token is laid down lazily the first time a login URL is built,
//! travels through the provider's dialog, and must come back unchanged with
//! the authorization code. It is single use: a match clears it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use tracing::debug;

use crate::error::Result;
use crate::persistence::SessionData;

/// Generate a cryptographically random state token.
///
/// 16 random bytes, URL-safe base64 without padding (22 characters).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The request-local view of the persisted CSRF state.
#[derive(Debug, Clone, Default)]
pub struct CsrfGuard {
    state: Option<String>,
}

impl CsrfGuard {
    /// Pick up any state left by an earlier request.
    pub async fn load(session: &SessionData) -> Result<Self> {
        let state = session.load().await?.state.filter(|s| !s.is_empty());
        Ok(Self { state })
    }

    pub fn current(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Return the existing state, or create and persist a fresh one.
    pub async fn ensure(&mut self, session: &SessionData) -> Result<String> {
        if let Some(state) = &self.state {
            return Ok(state.clone());
        }
        let state = generate_state();
        let persisted = state.clone();
        session.update(move |f| f.state = Some(persisted)).await?;
        debug!(namespace = session.namespace(), "laid down CSRF state");
        self.state = Some(state.clone());
        Ok(state)
    }

    /// Accept `candidate` iff it equals the current state exactly.
    ///
    /// A match clears the state locally and in the store. A mismatch leaves
    /// it in place.
    pub async fn consume(&mut self, session: &SessionData, candidate: &str) -> Result<bool> {
        if self.state.as_deref() != Some(candidate) {
            return Ok(false);
        }
        self.state = None;
        session.update(|f| f.state = None).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use std::sync::Arc;

    fn session() -> SessionData {
        SessionData::new(Arc::new(MemoryStore::new()), "fb_1")
    }

    #[test]
    fn state_is_url_safe_and_unique() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 22);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "state must be URL-safe base64: {a}"
        );
        assert_ne!(a, b, "two states must not collide");
    }

    #[tokio::test]
    async fn ensure_creates_once_and_persists() {
        let session = session();
        let mut guard = CsrfGuard::load(&session).await.unwrap();
        assert!(guard.current().is_none());

        let first = guard.ensure(&session).await.unwrap();
        let second = guard.ensure(&session).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(session.load().await.unwrap().state, Some(first.clone()));

        // A later request sees the same state
        let reloaded = CsrfGuard::load(&session).await.unwrap();
        assert_eq!(reloaded.current(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn consume_matching_state_clears_it() {
        let session = session();
        let mut guard = CsrfGuard::load(&session).await.unwrap();
        let state = guard.ensure(&session).await.unwrap();

        assert!(guard.consume(&session, &state).await.unwrap());
        assert!(guard.current().is_none());
        assert!(session.load().await.unwrap().state.is_none());

        // Single use
        assert!(!guard.consume(&session, &state).await.unwrap());
    }

    #[tokio::test]
    async fn consume_mismatch_keeps_state() {
        let session = session();
        let mut guard = CsrfGuard::load(&session).await.unwrap();
        let state = guard.ensure(&session).await.unwrap();

        assert!(!guard.consume(&session, "forged").await.unwrap());
        assert!(!guard.consume(&session, &state[..10]).await.unwrap());
        assert_eq!(guard.current(), Some(state.as_str()));
        assert_eq!(session.load().await.unwrap().state, Some(state));
    }

    #[tokio::test]
    async fn consume_without_state_fails() {
        let session = session();
        let mut guard = CsrfGuard::load(&session).await.unwrap();
        assert!(!guard.consume(&session, "").await.unwrap());
    }
}
