use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::{ClientError, ClientResult};

pub mod store;

pub use store::{FileTokenStore, MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Access/refresh pair as returned by login and register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Session transitions, published to anyone listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    AccessRefreshed,
    LoggedOut,
    /// Refresh failed; the user has to go through the login surface again.
    LoginRequired { redirect_to: String },
}

/// Process-wide auth state backed by a [`TokenStore`].
///
/// Only login, logout and the refresh interceptor write to it; every
/// outgoing request reads the access token from here.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self { store, events }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn access_token(&self) -> ClientResult<Option<String>> {
        self.store
            .get(ACCESS_TOKEN_KEY)
            .await
            .map_err(ClientError::Storage)
    }

    pub async fn refresh_token(&self) -> ClientResult<Option<String>> {
        self.store
            .get(REFRESH_TOKEN_KEY)
            .await
            .map_err(ClientError::Storage)
    }

    pub async fn is_authenticated(&self) -> ClientResult<bool> {
        Ok(self.access_token().await?.is_some())
    }

    /// Login/register: stores both tokens.
    pub async fn begin(&self, tokens: &TokenPair) -> ClientResult<()> {
        self.store
            .set(ACCESS_TOKEN_KEY, &tokens.access)
            .await
            .map_err(ClientError::Storage)?;
        self.store
            .set(REFRESH_TOKEN_KEY, &tokens.refresh)
            .await
            .map_err(ClientError::Storage)?;
        info!("session started");
        self.publish(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Stores a freshly issued access token (and a rotated refresh token, if any).
    pub async fn update_access(&self, access: &str, refresh: Option<&str>) -> ClientResult<()> {
        self.store
            .set(ACCESS_TOKEN_KEY, access)
            .await
            .map_err(ClientError::Storage)?;
        if let Some(refresh) = refresh {
            self.store
                .set(REFRESH_TOKEN_KEY, refresh)
                .await
                .map_err(ClientError::Storage)?;
        }
        info!(rotated = refresh.is_some(), "access token refreshed");
        self.publish(SessionEvent::AccessRefreshed);
        Ok(())
    }

    /// Logout: drops both tokens.
    pub async fn end(&self) -> ClientResult<()> {
        self.clear().await?;
        info!("session ended");
        self.publish(SessionEvent::LoggedOut);
        Ok(())
    }

    /// Refresh failure: drops both tokens and asks for a new login.
    pub async fn expire(&self, login_path: &str) {
        if let Err(e) = self.clear().await {
            warn!(error = %e, "failed to clear tokens after refresh failure");
        }
        warn!(redirect_to = %login_path, "session expired");
        self.publish(SessionEvent::LoginRequired {
            redirect_to: login_path.to_string(),
        });
    }

    async fn clear(&self) -> ClientResult<()> {
        self.store
            .remove(ACCESS_TOKEN_KEY)
            .await
            .map_err(ClientError::Storage)?;
        self.store
            .remove(REFRESH_TOKEN_KEY)
            .await
            .map_err(ClientError::Storage)
    }

    fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;

    fn pair() -> TokenPair {
        TokenPair {
            access: "access-1".into(),
            refresh: "refresh-1".into(),
        }
    }

    #[tokio::test]
    async fn begin_and_end_round_trip() {
        let session = Session::in_memory();
        let mut events = session.subscribe();

        session.begin(&pair()).await.unwrap();
        assert!(session.is_authenticated().await.unwrap());
        assert_eq!(
            session.refresh_token().await.unwrap().as_deref(),
            Some("refresh-1")
        );
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedIn);

        session.end().await.unwrap();
        assert!(!session.is_authenticated().await.unwrap());
        assert_eq!(session.refresh_token().await.unwrap(), None);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    }

    #[tokio::test]
    async fn update_access_keeps_refresh_unless_rotated() {
        let session = Session::in_memory();
        session.begin(&pair()).await.unwrap();

        session.update_access("access-2", None).await.unwrap();
        assert_eq!(
            session.access_token().await.unwrap().as_deref(),
            Some("access-2")
        );
        assert_eq!(
            session.refresh_token().await.unwrap().as_deref(),
            Some("refresh-1")
        );

        session
            .update_access("access-3", Some("refresh-2"))
            .await
            .unwrap();
        assert_eq!(
            session.refresh_token().await.unwrap().as_deref(),
            Some("refresh-2")
        );
    }

    #[tokio::test]
    async fn expire_clears_and_requests_login() {
        let session = Session::in_memory();
        session.begin(&pair()).await.unwrap();
        let mut events = session.subscribe();

        session.expire("/login").await;

        assert_eq!(session.access_token().await.unwrap(), None);
        assert_eq!(session.refresh_token().await.unwrap(), None);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::LoginRequired {
                redirect_to: "/login".into()
            }
        );
    }
}
