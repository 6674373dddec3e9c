//! Channel error types.
//!
//! All failures in this crate are absorbed locally: transport errors feed the
//! reconnect path, decode errors drop the offending frame, and nothing is
//! surfaced to consumers beyond the connectivity flag. These types exist for
//! logging and for the transport/codec seams.

/// Errors produced by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The base address could not be turned into a channel URL.
    #[error("invalid base address: {0}")]
    InvalidAddress(String),

    /// The connection attempt failed (refused, DNS, TLS, handshake).
    #[error("connect failed: {0}")]
    Connect(String),

    /// An established connection failed while reading or writing.
    #[error("connection error: {0}")]
    Connection(String),
}

/// A text frame that could not be decoded into an envelope.
///
/// Decode failures are logged and the frame is discarded; they never close
/// the connection.
#[derive(Debug, thiserror::Error)]
#[error("malformed envelope: {0}")]
pub struct DecodeError(#[from] serde_json::Error);
