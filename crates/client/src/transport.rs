//! Transport seams consumed by the transfer and live-event components.
//!
//! The uploader, downloader and live consumer never talk to reqwest or
//! tungstenite directly. They go through [`AuthenticatedTransport`], which
//! attaches the session credential and performs raw request, stream and
//! duplex I/O. [`HttpTransport`](crate::HttpTransport) is the production
//! implementation; tests substitute scripted mocks.

use std::future::Future;
use std::pin::Pin;

use reqwest::Method;
use tokio::io::AsyncRead;

use crate::error::ClientError;

/// Boxed future returned by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Response body exposed as a byte stream.
pub type BodyReader = Pin<Box<dyn AsyncRead + Send>>;

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A streaming GET request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl StreamRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Status of a streaming response plus its unread body.
pub struct StreamResponse {
    pub status: u16,
    pub body: BodyReader,
}

impl StreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// How a duplex connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplexClose {
    /// A close handshake or an orderly end of stream.
    Clean { code: Option<u16>, reason: String },
    /// The connection dropped without a close handshake; carries the
    /// transport's error text.
    Abrupt(String),
}

impl std::fmt::Display for DuplexClose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplexClose::Clean { code: Some(code), reason } if !reason.is_empty() => {
                write!(f, "closed with code {code}: {reason}")
            }
            DuplexClose::Clean { code: Some(code), .. } => write!(f, "closed with code {code}"),
            DuplexClose::Clean { code: None, .. } => f.write_str("closed"),
            DuplexClose::Abrupt(detail) => write!(f, "dropped: {detail}"),
        }
    }
}

/// One inbound duplex event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplexEvent {
    Text(String),
    Binary(Vec<u8>),
    Closed(DuplexClose),
}

/// An open message-oriented duplex connection.
pub trait DuplexStream: Send {
    /// Sends one text message.
    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<(), ClientError>>;

    /// Sends one binary message.
    fn send_binary(&mut self, data: Vec<u8>) -> BoxFuture<'_, Result<(), ClientError>>;

    /// Waits for the next inbound message or the end of the connection.
    ///
    /// Control frames are handled internally and never surface here.
    fn recv(&mut self) -> BoxFuture<'_, Result<DuplexEvent, ClientError>>;

    /// Starts the close handshake. Best effort.
    fn close(&mut self) -> BoxFuture<'_, Result<(), ClientError>>;
}

/// Authenticated raw I/O against the StealthIM server.
///
/// Implementations attach the bearer credential as an `Authorization`
/// header on ordinary requests and streams, and as a query parameter on
/// duplex connections whose handshake cannot carry custom headers.
pub trait AuthenticatedTransport: Send + Sync {
    /// Performs a request with an optional JSON body and buffers the reply.
    fn issue_request<'a>(
        &'a self,
        method: Method,
        path: &'a str,
        body: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<RawResponse, ClientError>>;

    /// Starts a streaming GET and returns once response headers arrive.
    fn open_stream(&self, request: StreamRequest)
    -> BoxFuture<'_, Result<StreamResponse, ClientError>>;

    /// Opens a duplex connection at `path`.
    fn open_duplex<'a>(
        &'a self,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn DuplexStream>, ClientError>>;
}
