//! Connection manager: the consumer handle and the driver state machine.
//!
//! A single driver task owns the socket, both timers, and the connection
//! state. Consumers hold a [`NotificationChannel`] and interact only through
//! `activate`/`deactivate`/`send`/`subscribe` and the connectivity reads;
//! no transport detail leaks out.
//!
//! State machine:
//!
//! ```text
//! Idle --activate--> Connecting --open ok--> Open --close/error--> Closed
//!                        ^                                           |
//!                        +--------------- retry timer fires ---------+
//! ```
//!
//! `deactivate()` returns to `Idle` from any state, dropping every timer and
//! closing a live socket. Connection failures are never surfaced to callers:
//! while the session stays authenticated the channel keeps retrying at a
//! flat interval.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use super::heartbeat::Heartbeat;
use super::reconnect::RetryTimer;
use crate::auth::CredentialSource;
use crate::config::ChannelConfig;
use crate::dispatch::EventDispatcher;
use crate::messages::{self, Envelope, EventType};
use crate::transport::{Frame, FrameSink, FrameStream, Transport, TungsteniteTransport, ws_url};

/// Instructions from the handle to the driver.
#[derive(Debug)]
enum Command {
    Activate,
    Deactivate,
    Send(Envelope),
}

/// Driver state. `Open` carries the live socket halves; the variants with no
/// data have no resources by construction, which is what makes teardown
/// complete.
enum ConnectionState {
    Idle,
    Connecting,
    Open(FrameSink, FrameStream),
    Closed,
    /// All handles are gone; the driver exits. Not reachable through the
    /// public API other than by dropping the last handle.
    Shutdown,
}

/// Handle to the realtime notification channel.
///
/// Cloneable; all clones talk to the same driver task. The driver shuts
/// down with full cleanup when the last handle is dropped.
#[derive(Debug, Clone)]
pub struct NotificationChannel {
    commands: mpsc::UnboundedSender<Command>,
    connected: watch::Receiver<bool>,
    last_event: watch::Receiver<Option<Envelope>>,
    dispatcher: Arc<EventDispatcher>,
}

impl NotificationChannel {
    /// Spawns a channel over the production WebSocket transport.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(config: ChannelConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        Self::with_transport(config, credentials, Arc::new(TungsteniteTransport))
    }

    /// Spawns a channel over a caller-supplied transport.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn with_transport(
        config: ChannelConfig,
        credentials: Arc<dyn CredentialSource>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = watch::channel(false);
        let (last_event_tx, last_event_rx) = watch::channel(None);
        let dispatcher = Arc::new(EventDispatcher::new());

        let driver = Driver {
            config,
            credentials,
            transport,
            dispatcher: Arc::clone(&dispatcher),
            commands: command_rx,
            connected: connected_tx,
            last_event: last_event_tx,
        };
        tokio::spawn(driver.run());

        Self {
            commands: command_tx,
            connected: connected_rx,
            last_event: last_event_rx,
            dispatcher,
        }
    }

    /// Asks the channel to connect. No-op while already connecting or open,
    /// and no-op (not an error) when no credential is available; the next
    /// activation after login will connect.
    pub fn activate(&self) {
        let _ = self.commands.send(Command::Activate);
    }

    /// Cancels any pending reconnection, stops the heartbeat, closes an open
    /// connection, and returns the channel to idle. Idempotent.
    pub fn deactivate(&self) {
        let _ = self.commands.send(Command::Deactivate);
    }

    /// Sends an envelope to the server if the connection is open; otherwise
    /// the message is dropped silently (logged, never queued, never an
    /// error).
    pub fn send(&self, event_type: EventType, data: Value) {
        let _ = self.commands.send(Command::Send(Envelope::new(event_type, data)));
    }

    /// Registers a reaction for a message type. Handlers for the same type
    /// run in registration order.
    pub fn subscribe<F>(&self, event_type: EventType, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(event_type, handler);
    }

    /// Current connectivity status.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Watch for connectivity transitions (e.g. to render a transient
    /// "reconnecting" indicator).
    #[must_use]
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// The most recently received envelope, if any.
    #[must_use]
    pub fn last_event(&self) -> Option<Envelope> {
        self.last_event.borrow().clone()
    }
}

/// The driver task: owns the socket, the timers, and the connection state.
struct Driver {
    config: ChannelConfig,
    credentials: Arc<dyn CredentialSource>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<EventDispatcher>,
    commands: mpsc::UnboundedReceiver<Command>,
    connected: watch::Sender<bool>,
    last_event: watch::Sender<Option<Envelope>>,
}

impl Driver {
    async fn run(mut self) {
        let mut state = ConnectionState::Idle;
        loop {
            state = match state {
                ConnectionState::Idle => self.idle().await,
                ConnectionState::Connecting => self.connect().await,
                ConnectionState::Open(sink, stream) => self.serve(sink, stream).await,
                ConnectionState::Closed => self.await_retry().await,
                ConnectionState::Shutdown => break,
            };
        }
        tracing::debug!("notification channel driver stopped");
    }

    /// Idle: nothing scheduled, nothing open. Only `Activate` leaves.
    async fn idle(&mut self) -> ConnectionState {
        loop {
            match self.commands.recv().await {
                Some(Command::Activate) => return ConnectionState::Connecting,
                Some(Command::Deactivate) => {}
                Some(Command::Send(envelope)) => drop_send(&envelope),
                None => return ConnectionState::Shutdown,
            }
        }
    }

    /// Connecting: resolve the credential fresh, build the URL, and race the
    /// connection attempt against incoming commands.
    async fn connect(&mut self) -> ConnectionState {
        let Some(token) = self.credentials.current_token() else {
            tracing::debug!("no session credential, channel stays idle");
            return ConnectionState::Idle;
        };
        let url = match ws_url(&self.config.base_url, &token) {
            Ok(url) => url,
            Err(error) => {
                tracing::error!(%error, "cannot build channel url");
                return ConnectionState::Idle;
            }
        };

        tracing::debug!("opening notification channel");
        let transport = Arc::clone(&self.transport);
        let mut attempt = transport.connect(&url);
        loop {
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok((sink, stream)) => self.opened(sink, stream),
                        Err(error) => {
                            tracing::warn!(%error, "notification channel connect failed");
                            ConnectionState::Closed
                        }
                    };
                }
                command = self.commands.recv() => match command {
                    Some(Command::Activate) => {}
                    Some(Command::Deactivate) => return ConnectionState::Idle,
                    Some(Command::Send(envelope)) => drop_send(&envelope),
                    None => return ConnectionState::Shutdown,
                }
            }
        }
    }

    /// Successful open: flip connectivity and let consumers react to the
    /// (re)connection before any server frame arrives.
    fn opened(&self, sink: FrameSink, stream: FrameStream) -> ConnectionState {
        tracing::info!("notification channel open");
        self.connected.send_replace(true);
        self.dispatcher
            .publish(&Envelope::new(EventType::Connected, serde_json::json!({})));
        ConnectionState::Open(sink, stream)
    }

    /// Open: pump frames, beat the heartbeat, honor commands. Leaving this
    /// state drops the heartbeat, which is what stops it.
    async fn serve(&mut self, mut sink: FrameSink, mut stream: FrameStream) -> ConnectionState {
        let mut heartbeat = Heartbeat::start(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Frame::Text(text))) => self.receive(&text),
                    Some(Ok(Frame::Close)) => {
                        tracing::info!("notification channel closed by server");
                        break;
                    }
                    Some(Err(error)) => {
                        // Errors precede the close; the stream ends next.
                        tracing::warn!(%error, "notification channel transport error");
                    }
                    None => {
                        tracing::info!("notification channel connection lost");
                        break;
                    }
                },
                _ = heartbeat.beat() => {
                    if !self.transmit(&mut sink, &Envelope::ping()).await {
                        break;
                    }
                }
                command = self.commands.recv() => match command {
                    Some(Command::Activate) => {}
                    Some(Command::Send(envelope)) => {
                        if !self.transmit(&mut sink, &envelope).await {
                            break;
                        }
                    }
                    Some(Command::Deactivate) => {
                        let _ = sink.send(Frame::Close).await;
                        let _ = sink.close().await;
                        self.connected.send_replace(false);
                        return ConnectionState::Idle;
                    }
                    None => {
                        let _ = sink.close().await;
                        self.connected.send_replace(false);
                        return ConnectionState::Shutdown;
                    }
                }
            }
        }

        // Unexpected close: still active, so schedule the reconnect.
        self.connected.send_replace(false);
        ConnectionState::Closed
    }

    /// Closed: exactly one retry pending. `Deactivate` cancels it by
    /// dropping the timer; an explicit `Activate` connects immediately.
    async fn await_retry(&mut self) -> ConnectionState {
        tracing::debug!(
            delay_secs = self.config.reconnect_delay.as_secs(),
            "scheduling reconnect"
        );
        let mut retry = RetryTimer::schedule(self.config.reconnect_delay);
        loop {
            tokio::select! {
                () = retry.fired() => return ConnectionState::Connecting,
                command = self.commands.recv() => match command {
                    Some(Command::Activate) => return ConnectionState::Connecting,
                    Some(Command::Deactivate) => return ConnectionState::Idle,
                    Some(Command::Send(envelope)) => drop_send(&envelope),
                    None => return ConnectionState::Shutdown,
                }
            }
        }
    }

    /// One incoming text frame: decode, record, dispatch. A malformed frame
    /// is dropped and the connection stays up.
    fn receive(&self, text: &str) {
        match messages::decode(text) {
            Ok(envelope) => {
                tracing::debug!(event_type = %envelope.event_type, "received envelope");
                self.last_event.send_replace(Some(envelope.clone()));
                self.dispatcher.publish(&envelope);
            }
            Err(error) => {
                tracing::warn!(%error, "discarding malformed frame");
            }
        }
    }

    /// Writes one envelope. Returns `false` when the socket is dead and the
    /// caller should treat it as a close.
    async fn transmit(&self, sink: &mut FrameSink, envelope: &Envelope) -> bool {
        let text = match messages::encode(envelope) {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(%error, "failed to encode outgoing envelope");
                return true;
            }
        };
        if let Err(error) = sink.send(Frame::Text(text)).await {
            tracing::warn!(%error, "notification channel send failed");
            return false;
        }
        true
    }
}

fn drop_send(envelope: &Envelope) {
    tracing::debug!(
        event_type = %envelope.event_type,
        "dropping outgoing message, connection not open"
    );
}
