//! # regami-realtime
//!
//! Realtime notification channel client for the Regami dog-care matching
//! platform.
//!
//! The crate maintains one persistent authenticated WebSocket connection to
//! the Regami backend, survives network interruption through automatic
//! reconnection at a flat interval, keeps the connection alive with a
//! periodic `ping` heartbeat, and fans server-pushed envelopes out to
//! registered reactions. All failures are absorbed internally: consumers
//! only ever observe the boolean connectivity status and dispatched events.
//!
//! ## Architecture
//!
//! ```text
//! Consumers (pages, toasts, stores)
//!     │  activate / deactivate / send / subscribe / status
//!     ├── NotificationChannel handle (channel/)
//!     │       │ commands            │ connectivity + last event
//!     │       ▼                     ▲
//!     ├── Driver task: state machine + Heartbeat + RetryTimer (channel/)
//!     │       │ frames
//!     ├── Envelope codec (messages/) ── EventDispatcher (dispatch/)
//!     ├── Transport seam (transport/) ── tokio-tungstenite
//!     └── CredentialSource (auth/) ── session store
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use regami_realtime::auth::SessionToken;
//! use regami_realtime::channel::NotificationChannel;
//! use regami_realtime::config::ChannelConfig;
//! use regami_realtime::messages::EventType;
//!
//! # async fn example() {
//! let session = SessionToken::new();
//! session.set("jwt-from-login");
//!
//! let channel = NotificationChannel::spawn(ChannelConfig::from_env(), Arc::new(session));
//! channel.subscribe(EventType::NewMatch, |data| {
//!     println!("new match: {data}");
//! });
//! channel.activate();
//! # }
//! ```

pub mod auth;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod messages;
pub mod transport;
