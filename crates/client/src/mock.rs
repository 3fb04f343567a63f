//! Scripted transport used by the component tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use reqwest::Method;

use crate::error::ClientError;
use crate::transport::{
    AuthenticatedTransport, BoxFuture, DuplexClose, DuplexEvent, DuplexStream, RawResponse,
    StreamRequest, StreamResponse,
};

/// One operation observed on a [`MockDuplex`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplexOp {
    SentText(String),
    SentBinary(Vec<u8>),
    Received,
    Closed,
}

/// Duplex stream replaying scripted inbound events.
///
/// Once the script is exhausted `recv` never resolves.
pub struct MockDuplex {
    script: VecDeque<Result<DuplexEvent, ClientError>>,
    log: Arc<Mutex<Vec<DuplexOp>>>,
}

impl MockDuplex {
    pub fn new() -> (Self, Arc<Mutex<Vec<DuplexOp>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                script: VecDeque::new(),
                log: log.clone(),
            },
            log,
        )
    }

    pub fn push_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.script.push_back(Ok(DuplexEvent::Text(text.into())));
        self
    }

    pub fn push_ack(&mut self, code: i32, kind: &str, block_id: Option<u32>) -> &mut Self {
        let mut ack = serde_json::json!({
            "result": {"code": code, "msg": if code == 800 { "" } else { "rejected" }},
            "type": kind,
        });
        if let Some(id) = block_id {
            ack["blockid"] = id.into();
        }
        self.push_text(ack.to_string())
    }

    pub fn push_close(&mut self, close: DuplexClose) -> &mut Self {
        self.script.push_back(Ok(DuplexEvent::Closed(close)));
        self
    }

    pub fn push_error(&mut self, err: ClientError) -> &mut Self {
        self.script.push_back(Err(err));
        self
    }
}

impl DuplexStream for MockDuplex {
    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<(), ClientError>> {
        self.log.lock().unwrap().push(DuplexOp::SentText(text));
        Box::pin(async { Ok(()) })
    }

    fn send_binary(&mut self, data: Vec<u8>) -> BoxFuture<'_, Result<(), ClientError>> {
        self.log.lock().unwrap().push(DuplexOp::SentBinary(data));
        Box::pin(async { Ok(()) })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<DuplexEvent, ClientError>> {
        Box::pin(async move {
            match self.script.pop_front() {
                Some(event) => {
                    self.log.lock().unwrap().push(DuplexOp::Received);
                    event
                }
                None => std::future::pending().await,
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), ClientError>> {
        self.log.lock().unwrap().push(DuplexOp::Closed);
        Box::pin(async { Ok(()) })
    }
}

/// Transport replaying scripted responses and recording every call.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<RawResponse, ClientError>>>,
    streams: Mutex<VecDeque<Result<StreamResponse, ClientError>>>,
    duplexes: Mutex<VecDeque<Result<MockDuplex, ClientError>>>,
    pub requests: Mutex<Vec<(Method, String, Option<serde_json::Value>)>>,
    pub stream_requests: Mutex<Vec<StreamRequest>>,
    pub duplex_paths: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.responses.lock().unwrap().push_back(Ok(RawResponse {
            status,
            body: body.into(),
        }));
    }

    /// Queues a stream whose body is the given bytes followed by EOF.
    pub fn push_stream(&self, status: u16, body: impl Into<Vec<u8>>) {
        let body = std::io::Cursor::new(body.into());
        self.push_stream_response(StreamResponse {
            status,
            body: Box::pin(body),
        });
    }

    pub fn push_stream_response(&self, response: StreamResponse) {
        self.streams.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_stream_error(&self, err: ClientError) {
        self.streams.lock().unwrap().push_back(Err(err));
    }

    pub fn push_duplex(&self, duplex: MockDuplex) {
        self.duplexes.lock().unwrap().push_back(Ok(duplex));
    }

    pub fn push_duplex_error(&self, err: ClientError) {
        self.duplexes.lock().unwrap().push_back(Err(err));
    }

    pub fn stream_request_count(&self) -> usize {
        self.stream_requests.lock().unwrap().len()
    }
}

impl AuthenticatedTransport for MockTransport {
    fn issue_request<'a>(
        &'a self,
        method: Method,
        path: &'a str,
        body: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<RawResponse, ClientError>> {
        self.requests
            .lock()
            .unwrap()
            .push((method, path.to_string(), body));
        let next = self.responses.lock().unwrap().pop_front();
        Box::pin(async move {
            next.unwrap_or_else(|| Err(ClientError::Connect("no scripted response".into())))
        })
    }

    fn open_stream(
        &self,
        request: StreamRequest,
    ) -> BoxFuture<'_, Result<StreamResponse, ClientError>> {
        self.stream_requests.lock().unwrap().push(request);
        let next = self.streams.lock().unwrap().pop_front();
        Box::pin(async move {
            next.unwrap_or_else(|| Err(ClientError::Connect("no scripted stream".into())))
        })
    }

    fn open_duplex<'a>(
        &'a self,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn DuplexStream>, ClientError>> {
        self.duplex_paths.lock().unwrap().push(path.to_string());
        let next = self.duplexes.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(duplex)) => Ok(Box::new(duplex) as Box<dyn DuplexStream>),
                Some(Err(e)) => Err(e),
                None => Err(ClientError::Connect("no scripted duplex".into())),
            }
        })
    }
}
