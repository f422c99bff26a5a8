// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request/reply session with the chiller.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::command::ChillerCommand;
use crate::config::ChillerConfig;
use crate::error::{Error, ProtocolError, TransportError};
use crate::response::ChillerReply;

use super::codec::{TERMINATOR, decode, encode};

/// A bidirectional byte stream the session can run over.
///
/// Implemented for every `AsyncRead + AsyncWrite` type, so a `TcpStream`
/// and an in-memory `tokio::io::DuplexStream` both qualify.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

/// Connection state of a [`ChillerSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Commands may be sent.
    Connected,
    /// A command timed out. A late reply may still be in flight, so the
    /// stream must be reset before it is used again.
    Invalid,
    /// The stream closed or failed.
    Disconnected,
}

/// A chiller session over one byte stream.
///
/// `send` takes `&mut self`, so at most one command is outstanding at any
/// time. Share a session between tasks by wrapping it in a mutex.
pub struct ChillerSession {
    host: String,
    port: u16,
    device_id: String,
    connect_timeout: Duration,
    command_timeout: Duration,
    stream: Option<BufReader<Box<dyn ByteStream>>>,
    state: SessionState,
}

impl ChillerSession {
    /// Opens a TCP session to the configured chiller.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the connection cannot
    /// be opened within the connect timeout.
    pub async fn connect(config: &ChillerConfig) -> Result<Self, TransportError> {
        let mut session = Self::disconnected(config);
        session.reset().await?;
        Ok(session)
    }

    /// Creates a connected session over an existing stream.
    ///
    /// [`reset`](Self::reset) still dials the configured TCP endpoint.
    #[must_use]
    pub fn from_stream(stream: impl ByteStream + 'static, config: &ChillerConfig) -> Self {
        let mut session = Self::disconnected(config);
        session.replace_stream(stream);
        session
    }

    /// Creates a session with no stream.
    #[must_use]
    pub fn disconnected(config: &ChillerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            device_id: config.device_id.clone(),
            connect_timeout: config.connect_timeout,
            command_timeout: config.command_timeout,
            stream: None,
            state: SessionState::Disconnected,
        }
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` if commands may be sent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Returns the device ID written into every frame.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Drops the current stream and dials the chiller again.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectionFailed` if the connection cannot
    /// be opened; the session is then disconnected.
    pub async fn reset(&mut self) -> Result<(), TransportError> {
        self.disconnect();
        let address = format!("{}:{}", self.host, self.port);
        tracing::debug!(address = %address, "Connecting to chiller");

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| {
                TransportError::ConnectionFailed(format!(
                    "{address}: no connection within {} ms",
                    millis(self.connect_timeout)
                ))
            })?
            .map_err(|e| TransportError::ConnectionFailed(format!("{address}: {e}")))?;

        tracing::info!(address = %address, "Connected to chiller");
        self.replace_stream(stream);
        Ok(())
    }

    /// Replaces the stream and marks the session connected.
    pub fn replace_stream(&mut self, stream: impl ByteStream + 'static) {
        let boxed: Box<dyn ByteStream> = Box::new(stream);
        self.stream = Some(BufReader::new(boxed));
        self.state = SessionState::Connected;
    }

    /// Drops the stream.
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("Chiller session closed");
        }
        self.state = SessionState::Disconnected;
    }

    /// Sends one command and waits for its reply.
    ///
    /// A quirk reply such as `#23` is returned as-is with no command ID;
    /// call [`ChillerReply::into_result`] to turn it into an error.
    ///
    /// # Errors
    ///
    /// - `Error::Value` if the command cannot be encoded.
    /// - `Error::Transport` if the session is not connected, the reply did
    ///   not arrive in time (the session becomes invalid), or the stream
    ///   failed (the session becomes disconnected).
    /// - `Error::Protocol` if the reply is malformed or answers a
    ///   different command.
    pub async fn send(&mut self, command: &ChillerCommand) -> Result<ChillerReply, Error> {
        let frame = encode(command, &self.device_id)?;
        let stream = match (self.state, self.stream.as_mut()) {
            (SessionState::Connected, Some(stream)) => stream,
            (SessionState::Invalid, _) => {
                return Err(TransportError::Invalid(
                    "an earlier command timed out".to_string(),
                )
                .into());
            }
            _ => return Err(TransportError::Disconnected.into()),
        };

        tracing::debug!(command = %command, "Sending chiller command");

        let outcome = tokio::time::timeout(self.command_timeout, exchange(stream, &frame)).await;
        let raw = match outcome {
            Err(_) => {
                self.state = SessionState::Invalid;
                if command.is_mutating() {
                    tracing::warn!(
                        command = %command,
                        "Chiller did not reply; outcome of the command is unknown"
                    );
                }
                return Err(TransportError::Timeout(millis(self.command_timeout)).into());
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Chiller stream failed");
                self.disconnect();
                return Err(e.into());
            }
            Ok(Ok(raw)) => raw,
        };

        let reply = decode(&raw)?;
        match reply.command_id() {
            Some(id) if id != command.id() => Err(ProtocolError::UnexpectedReply(format!(
                "sent {command}, got {:?}",
                reply.raw()
            ))
            .into()),
            _ => {
                tracing::trace!(reply = %reply.raw(), "Received chiller reply");
                Ok(reply)
            }
        }
    }
}

impl fmt::Debug for ChillerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChillerSession")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("device_id", &self.device_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Writes one frame and reads up to the terminator.
async fn exchange(
    stream: &mut BufReader<Box<dyn ByteStream>>,
    frame: &[u8],
) -> Result<Vec<u8>, TransportError> {
    stream.get_mut().write_all(frame).await?;
    stream.get_mut().flush().await?;

    let mut reply = Vec::new();
    stream.read_until(TERMINATOR, &mut reply).await?;
    if reply.last() != Some(&TERMINATOR) {
        return Err(TransportError::Disconnected);
    }
    Ok(reply)
}

// Safe: timeouts in practical use never exceed u64::MAX milliseconds
#[allow(clippy::cast_possible_truncation)]
fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
