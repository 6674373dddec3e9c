//! regami-realtime listener entry point.
//!
//! Connects the notification channel with a token from the environment and
//! logs every server push until interrupted. Useful for watching a session's
//! notifications from a terminal.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use regami_realtime::auth::SessionToken;
use regami_realtime::channel::NotificationChannel;
use regami_realtime::config::ChannelConfig;
use regami_realtime::messages::EventType;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ChannelConfig::from_env();
    tracing::info!(base_url = %config.base_url, "starting regami-realtime listener");

    let session = SessionToken::new();
    match std::env::var("REGAMI_SESSION_TOKEN") {
        Ok(token) => session.set(token),
        Err(_) => {
            tracing::warn!("REGAMI_SESSION_TOKEN is not set, the channel will stay idle");
        }
    }

    let channel = NotificationChannel::spawn(config, Arc::new(session));

    for event_type in [
        EventType::Connected,
        EventType::NewMatch,
        EventType::MatchAccepted,
        EventType::MatchConfirmed,
        EventType::MatchRejected,
        EventType::NewMessage,
        EventType::Notification,
    ] {
        let tag = event_type.clone();
        channel.subscribe(event_type, move |data| {
            tracing::info!(event = %tag, %data, "notification");
        });
    }

    channel.activate();
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    channel.deactivate();
    Ok(())
}
