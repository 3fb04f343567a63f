//! StealthIM client SDK: file transfer and live message events.
//!
//! - [`ChunkedUploader`] pushes a file over a duplex connection, one
//!   acknowledged block at a time.
//! - [`StreamableDownloader`] reads a framed download and reassembles the
//!   blocks in id order, whatever order they arrive in.
//! - [`LiveEventConsumer`] follows a group's server-sent message stream
//!   and reconnects on transient failures.
//!
//! All three talk to the server through [`AuthenticatedTransport`];
//! [`Client`] wires them to the default [`HttpTransport`].

mod client;
pub mod closure;
pub mod config;
mod download;
pub mod error;
mod guard;
mod http;
mod live;
mod sse;
pub mod transport;
mod upload;

#[cfg(test)]
mod mock;

pub use client::{Client, TransferHandle};
pub use closure::ClosurePolicy;
pub use config::{ClientConfig, StreamConfig};
pub use download::{ByteRange, StreamableDownloader};
pub use error::{ClientError, ErrorKind};
pub use http::HttpTransport;
pub use live::{EventSubscription, LiveEventConsumer, StreamCursor};
pub use transport::{
    AuthenticatedTransport, DuplexClose, DuplexEvent, DuplexStream, RawResponse, StreamRequest,
    StreamResponse,
};
pub use upload::{ChunkedUploader, Finalization, UploadReport, UploadRequest, UploadState};

pub use stealthim_protocol::{ChatMessage, DomainError, MessageKind};
pub use stealthim_transfer::{HashAlgorithm, ReassemblyBuffer, UploadProgress, hash_file};
