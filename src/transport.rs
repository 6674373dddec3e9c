//! Transport seam: frames, the connector trait, and URL construction.
//!
//! The channel core is written against [`Transport`] so the connection
//! machinery can be exercised with an in-memory transport in tests. The
//! production implementation is [`TungsteniteTransport`].

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::TransportError;

/// A frame on the channel. The wire carries only discrete text envelopes;
/// everything else at the WebSocket layer is handled below this seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text frame carrying one encoded envelope.
    Text(String),
    /// A close frame (either direction).
    Close,
}

/// Writing half of an established connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Reading half of an established connection. The stream ends when the
/// connection is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// Opens channel connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes a connection to the given channel URL.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the connection cannot be
    /// established. The caller treats this like any other close and retries.
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}

/// Production transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (ws_sink, ws_stream) = socket.split();

        let sink: FrameSink = Box::pin(
            ws_sink
                .sink_map_err(|e| TransportError::Connection(e.to_string()))
                .with(|frame: Frame| {
                    future::ready(Ok::<Message, TransportError>(match frame {
                        Frame::Text(text) => Message::text(text),
                        Frame::Close => Message::Close(None),
                    }))
                }),
        );

        let stream: FrameStream = Box::pin(ws_stream.filter_map(|item| {
            future::ready(match item {
                Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.to_string()))),
                Ok(Message::Close(_)) => Some(Ok(Frame::Close)),
                // Protocol-level ping/pong and binary frames are not part of
                // the envelope stream.
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::Connection(e.to_string()))),
            })
        }));

        Ok((sink, stream))
    }
}

/// Builds the channel URL from a base address and the session credential.
///
/// `http(s)` schemes are upgraded to `ws(s)`; `ws(s)` bases pass through.
/// The credential rides as a query parameter, matching the backend's
/// `/ws?token=<jwt>` contract.
///
/// # Errors
///
/// Returns [`TransportError::InvalidAddress`] for any other scheme.
pub fn ws_url(base: &str, token: &str) -> Result<String, TransportError> {
    let base = base.trim_end_matches('/');
    let upgraded = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("wss://") || base.starts_with("ws://") {
        base.to_string()
    } else {
        return Err(TransportError::InvalidAddress(base.to_string()));
    };
    Ok(format!("{upgraded}/ws?token={token}"))
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod mock {
    //! In-memory transport for driving the connection machinery in tests.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::channel::mpsc;
    use futures_util::{SinkExt, StreamExt};

    use super::{Frame, FrameSink, FrameStream, Transport};
    use crate::error::TransportError;

    /// The server end of one scripted connection.
    #[derive(Debug)]
    pub(crate) struct ServerEnd {
        /// URL the client connected with.
        pub(crate) url: String,
        /// Frames pushed here arrive on the client's stream. Dropping the
        /// sender simulates the network cutting the connection.
        pub(crate) to_client: mpsc::UnboundedSender<Result<Frame, TransportError>>,
        /// Frames the client wrote. Ends when the client closes its sink.
        pub(crate) from_client: mpsc::UnboundedReceiver<Frame>,
    }

    impl ServerEnd {
        pub(crate) fn push_text(&self, text: &str) {
            let _ = self
                .to_client
                .unbounded_send(Ok(Frame::Text(text.to_string())));
        }

        pub(crate) async fn next_frame(&mut self) -> Option<Frame> {
            self.from_client.next().await
        }
    }

    /// Lets the driver task drain its queues without advancing the clock.
    pub(crate) async fn settle() {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    /// Scripted [`Transport`]: records every connect and hands the test the
    /// server end of each accepted connection.
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        refuse: AtomicBool,
        connects: AtomicUsize,
        accepted: Mutex<Vec<ServerEnd>>,
    }

    impl MockTransport {
        pub(crate) fn refuse_connections(&self, refuse: bool) {
            self.refuse.store(refuse, Ordering::SeqCst);
        }

        pub(crate) fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        pub(crate) fn try_take_server(&self) -> Option<ServerEnd> {
            self.accepted.lock().ok()?.pop()
        }

        /// Waits (by yielding) until the driver has connected, then returns
        /// the server end.
        pub(crate) async fn take_server(&self) -> ServerEnd {
            for _ in 0..256 {
                if let Some(server) = self.try_take_server() {
                    return server;
                }
                tokio::task::yield_now().await;
            }
            panic!("no connection was accepted");
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::Connect("refused".to_string()));
            }

            let (to_client, client_rx) = mpsc::unbounded();
            let (client_tx, from_client) = mpsc::unbounded();

            if let Ok(mut accepted) = self.accepted.lock() {
                accepted.push(ServerEnd {
                    url: url.to_string(),
                    to_client,
                    from_client,
                });
            }

            let sink: FrameSink =
                Box::pin(client_tx.sink_map_err(|e| TransportError::Connection(e.to_string())));
            let stream: FrameStream = Box::pin(client_rx);
            Ok((sink, stream))
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn secure_base_upgrades_to_wss() {
        let Ok(url) = ws_url("https://api.regami.app", "abc123") else {
            panic!("expected url");
        };
        assert_eq!(url, "wss://api.regami.app/ws?token=abc123");
    }

    #[test]
    fn plain_base_upgrades_to_ws() {
        let Ok(url) = ws_url("http://localhost:8000", "t") else {
            panic!("expected url");
        };
        assert_eq!(url, "ws://localhost:8000/ws?token=t");
    }

    #[test]
    fn ws_base_passes_through() {
        let Ok(url) = ws_url("wss://api.regami.app", "t") else {
            panic!("expected url");
        };
        assert_eq!(url, "wss://api.regami.app/ws?token=t");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let Ok(url) = ws_url("https://api.regami.app/", "t") else {
            panic!("expected url");
        };
        assert_eq!(url, "wss://api.regami.app/ws?token=t");
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(ws_url("ftp://api.regami.app", "t").is_err());
        assert!(ws_url("api.regami.app", "t").is_err());
    }
}
