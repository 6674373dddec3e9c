//! Credential resolution and the authentication-state observer.
//!
//! The channel never owns or refreshes the credential: it reads the current
//! token fresh on every connection attempt, so a token rotated between
//! attempts is picked up automatically and a logged-out session simply
//! produces no attempt.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::channel::NotificationChannel;

/// Source of the current bearer token.
///
/// Implementations are stateless lookups into the session store; the channel
/// calls [`CredentialSource::current_token`] once per connection attempt.
pub trait CredentialSource: Send + Sync {
    /// Returns the current bearer token, or `None` when the user is logged
    /// out.
    fn current_token(&self) -> Option<String>;
}

/// Shared token slot backed by the session store.
///
/// The authentication layer writes here on login, token refresh, and logout;
/// the channel only reads.
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SessionToken {
    /// Creates an empty (logged-out) token slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a freshly issued token.
    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(token.into());
        }
    }

    /// Clears the token on logout.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = None;
        }
    }
}

impl CredentialSource for SessionToken {
    fn current_token(&self) -> Option<String> {
        self.inner.read().ok().and_then(|slot| slot.clone())
    }
}

/// Drives channel activation from a boolean "session is authenticated"
/// signal: a transition to `true` activates the channel, a transition to
/// `false` deactivates it. The task ends when the sender side of the watch
/// is dropped.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn observe_session(
    channel: NotificationChannel,
    mut authenticated: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if *authenticated.borrow_and_update() {
            channel.activate();
        }
        while authenticated.changed().await.is_ok() {
            if *authenticated.borrow_and_update() {
                channel.activate();
            } else {
                channel.deactivate();
            }
        }
        tracing::debug!("session observer stopped");
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::transport::mock::{MockTransport, settle};

    #[test]
    fn token_is_read_fresh() {
        let session = SessionToken::new();
        assert_eq!(session.current_token(), None);

        session.set("first");
        assert_eq!(session.current_token(), Some("first".to_string()));

        // Rotation between reads is visible immediately.
        session.set("second");
        assert_eq!(session.current_token(), Some("second".to_string()));

        session.clear();
        assert_eq!(session.current_token(), None);
    }

    #[test]
    fn clones_share_the_slot() {
        let session = SessionToken::new();
        let writer = session.clone();
        writer.set("shared");
        assert_eq!(session.current_token(), Some("shared".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn session_flag_drives_activation() {
        let transport = Arc::new(MockTransport::default());
        let session = SessionToken::new();
        session.set("tok");

        let channel = NotificationChannel::with_transport(
            ChannelConfig::default(),
            Arc::new(session),
            transport.clone(),
        );

        let (auth_tx, auth_rx) = watch::channel(false);
        let observer = observe_session(channel.clone(), auth_rx);
        settle().await;
        assert_eq!(transport.connect_count(), 0);

        // Login opens the channel.
        let _ = auth_tx.send(true);
        let _server = transport.take_server().await;
        settle().await;
        assert!(channel.is_connected());
        assert_eq!(transport.connect_count(), 1);

        // Logout tears it down.
        let _ = auth_tx.send(false);
        settle().await;
        assert!(!channel.is_connected());

        drop(auth_tx);
        let _ = observer.await;
    }
}
