//! Reconnecting consumer for a group's live message stream.
//!
//! A spawned task owns the connection, the attempt counter and the
//! resumption cursor. Messages reach the caller through a bounded channel;
//! when it is full the task stops reading from the network rather than
//! dropping messages.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use stealthim_protocol::constants::{CURSOR_QUERY_PARAM, EVENT_STREAM_CONTENT_TYPE, message_path};
use stealthim_protocol::{ChatMessage, EventBatch};

use crate::config::StreamConfig;
use crate::error::{ClientError, ErrorKind};
use crate::guard::{cancellable, cancellable_sleep};
use crate::sse::{SseLine, parse_line};
use crate::transport::{AuthenticatedTransport, StreamRequest};

/// Longest event-stream line accepted.
const MAX_LINE_LEN: u64 = 16 * 1024 * 1024;

/// Opaque position in a group's message stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StreamCursor(Option<String>);

impl StreamCursor {
    /// Starts from whatever the server sends first.
    pub fn start() -> Self {
        Self(None)
    }

    /// Resumes after the message with id `msg_id`.
    pub fn after(msg_id: impl Into<String>) -> Self {
        Self(Some(msg_id.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_start(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for StreamCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("<start>"))
    }
}

/// How a single connection attempt ended without an error.
enum StreamEnd {
    Eof,
    ReceiverGone,
}

/// Opens and re-opens the live message stream for a group.
#[derive(Clone)]
pub struct LiveEventConsumer {
    transport: Arc<dyn AuthenticatedTransport>,
    config: StreamConfig,
}

impl LiveEventConsumer {
    pub fn new(transport: Arc<dyn AuthenticatedTransport>, config: StreamConfig) -> Self {
        Self { transport, config }
    }

    /// Spawns the consumer task for `group_id`, resuming from `cursor`.
    pub fn subscribe(
        &self,
        group_id: i64,
        cursor: StreamCursor,
        cancel: CancellationToken,
    ) -> EventSubscription {
        let (tx, messages) = mpsc::channel(self.config.channel_capacity.max(1));
        let (cursor_tx, cursor_rx) = watch::channel(cursor.clone());

        let consumer = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            consumer
                .run(group_id, cursor, &tx, &cursor_tx, &task_cancel)
                .await
        });

        EventSubscription {
            messages,
            cursor: cursor_rx,
            cancel,
            task: Some(task),
        }
    }

    /// Streams messages into `tx` until a terminal condition.
    ///
    /// Transport and protocol failures are retried up to
    /// `max_attempts` in total with `retry_delay` between attempts. An end
    /// of stream on the final attempt is a normal end. Domain errors and
    /// cancellation end the loop at once.
    pub async fn run(
        &self,
        group_id: i64,
        mut cursor: StreamCursor,
        tx: &mpsc::Sender<ChatMessage>,
        cursor_tx: &watch::Sender<StreamCursor>,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let last = attempt >= max_attempts;
            debug!(group_id, attempt, %cursor, "opening event stream");

            match self
                .stream_once(group_id, &mut cursor, tx, cursor_tx, cancel)
                .await
            {
                Ok(StreamEnd::ReceiverGone) => {
                    debug!(group_id, "subscriber dropped, stopping event stream");
                    return Ok(());
                }
                Ok(StreamEnd::Eof) if last => {
                    info!(group_id, attempt, "event stream ended");
                    return Ok(());
                }
                Ok(StreamEnd::Eof) => {
                    debug!(group_id, attempt, "event stream ended early");
                }
                Err(e) if last || !is_retryable(&e) => {
                    if !e.is_cancelled() {
                        warn!(group_id, attempt, error = %e, "event stream failed");
                    }
                    return Err(e);
                }
                Err(e) => {
                    warn!(group_id, attempt, error = %e, "event stream interrupted");
                }
            }

            info!(
                group_id,
                attempt = attempt + 1,
                delay = ?self.config.retry_delay,
                "reconnecting event stream"
            );
            tokio::select! {
                biased;
                slept = cancellable_sleep(cancel, self.config.retry_delay) => slept?,
                _ = tx.closed() => {
                    debug!(group_id, "subscriber dropped during backoff");
                    return Ok(());
                }
            }
        }
    }

    async fn stream_once(
        &self,
        group_id: i64,
        cursor: &mut StreamCursor,
        tx: &mpsc::Sender<ChatMessage>,
        cursor_tx: &watch::Sender<StreamCursor>,
        cancel: &CancellationToken,
    ) -> Result<StreamEnd, ClientError> {
        let mut request = StreamRequest::new(message_path(group_id))
            .header("Accept", EVENT_STREAM_CONTENT_TYPE)
            .header("Cache-Control", "no-cache");
        // The server may replay the message at the cursor itself.
        let resumed_from = cursor.as_str().map(str::to_owned);
        if let Some(id) = &resumed_from {
            request = request.query(CURSOR_QUERY_PARAM, id.clone());
        }

        let response = cancellable(cancel, self.transport.open_stream(request)).await?;
        if !response.is_success() {
            return Err(ClientError::Status(response.status));
        }

        let mut reader = BufReader::new(response.body);
        let mut line = String::new();
        loop {
            line.clear();
            let mut limited = (&mut reader).take(MAX_LINE_LEN + 1);
            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tx.closed() => return Ok(StreamEnd::ReceiverGone),
                read = limited.read_line(&mut line) => read?,
            };
            if n == 0 {
                return Ok(StreamEnd::Eof);
            }
            if n as u64 > MAX_LINE_LEN {
                return Err(ClientError::Protocol(format!(
                    "event line longer than {MAX_LINE_LEN} bytes"
                )));
            }

            let payload = match parse_line(&line) {
                SseLine::Data(payload) => payload,
                SseLine::Blank | SseLine::Comment(_) => continue,
                SseLine::Field { name, .. } => {
                    trace!(field = name, "ignoring event field");
                    continue;
                }
            };

            let batch: EventBatch = serde_json::from_str(payload)?;
            batch.result.into_result()?;
            trace!(group_id, count = batch.msg.len(), "event batch received");

            for message in batch.msg {
                if resumed_from.as_deref() == Some(message.msg_id.as_str()) {
                    trace!(msg_id = %message.msg_id, "skipping replayed message");
                    continue;
                }
                let msg_id = message.msg_id.clone();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                    sent = tx.send(message) => {
                        if sent.is_err() {
                            return Ok(StreamEnd::ReceiverGone);
                        }
                    }
                }
                *cursor = StreamCursor::after(msg_id);
                cursor_tx.send_replace(cursor.clone());
            }
        }
    }
}

/// Domain errors and cancellation end the stream; everything else is retried.
fn is_retryable(err: &ClientError) -> bool {
    matches!(err.kind(), ErrorKind::Transport | ErrorKind::Protocol)
}

/// Handle to a running live-event consumer.
///
/// Dropping the handle cancels the consumer and releases its connection.
pub struct EventSubscription {
    messages: mpsc::Receiver<ChatMessage>,
    cursor: watch::Receiver<StreamCursor>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), ClientError>>>,
}

impl EventSubscription {
    /// Next message in server order; `None` once the stream has ended or
    /// was cancelled.
    pub async fn next(&mut self) -> Option<ChatMessage> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            msg = self.messages.recv() => msg,
        }
    }

    /// Cursor of the last message handed to the channel.
    pub fn cursor(&self) -> StreamCursor {
        self.cursor.borrow().clone()
    }

    /// Stops the consumer. No message is delivered afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the consumer task and returns its terminal outcome.
    ///
    /// Undelivered messages are discarded. A consumer still reading or
    /// backing off stops at once and ends with `Ok(())`.
    pub async fn finish(mut self) -> Result<(), ClientError> {
        self.messages.close();
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) => Err(ClientError::Task(e.to_string())),
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
