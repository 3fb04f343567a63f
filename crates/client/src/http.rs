//! Production transport built on `reqwest` and `tokio-tungstenite`.
//!
//! Ordinary requests and streams carry the session as a bearer
//! `Authorization` header. Duplex connections carry it as the
//! `authorization` query parameter instead, alongside `User-Agent` and
//! `Origin` headers.

use futures_util::{SinkExt, StreamExt, TryStreamExt};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message, client::IntoClientRequest};
use tokio_util::io::StreamReader;
use tracing::{debug, info};

use stealthim_protocol::constants::AUTH_QUERY_PARAM;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{
    AuthenticatedTransport, BoxFuture, DuplexClose, DuplexEvent, DuplexStream, RawResponse,
    StreamRequest, StreamResponse,
};

/// Largest inbound duplex message accepted. Upload replies are small JSON.
const MAX_DUPLEX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// HTTP + WebSocket transport for a StealthIM server.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    session: Option<String>,
    user_agent: String,
    request_timeout: std::time::Duration,
    handshake_timeout: std::time::Duration,
}

impl HttpTransport {
    /// Builds the transport from a client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(session) = &config.session {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {session}"))
                    .map_err(|_| ClientError::Config("session token is not a valid header".into()))?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            session: config.session.clone(),
            user_agent: config.user_agent.clone(),
            request_timeout: config.request_timeout,
            handshake_timeout: config.handshake_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Builds the duplex URL for `path`: the base URL's scheme switched to
/// `ws`/`wss`, with the session as a percent-encoded query parameter.
pub(crate) fn duplex_url(
    base_url: &str,
    path: &str,
    session: Option<&str>,
) -> Result<String, ClientError> {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base_url.starts_with("ws://") || base_url.starts_with("wss://") {
        base_url.to_string()
    } else {
        return Err(ClientError::Config(format!(
            "unsupported base URL scheme: {base_url}"
        )));
    };

    let mut url = format!("{ws_base}{path}");
    if let Some(session) = session {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(AUTH_QUERY_PARAM);
        url.push('=');
        url.extend(utf8_percent_encode(session, NON_ALPHANUMERIC));
    }
    Ok(url)
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ClientError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ClientError::Config(format!("invalid header name: {name}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| ClientError::Config(format!("invalid value for header {name}")))?;
    Ok((name, value))
}

impl AuthenticatedTransport for HttpTransport {
    fn issue_request<'a>(
        &'a self,
        method: Method,
        path: &'a str,
        body: Option<serde_json::Value>,
    ) -> BoxFuture<'a, Result<RawResponse, ClientError>> {
        Box::pin(async move {
            let mut request = self
                .http
                .request(method.clone(), self.url(path))
                .timeout(self.request_timeout);
            if let Some(body) = body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(serde_json::to_vec(&body)?);
            }

            let resp = request.send().await?;
            let status = resp.status().as_u16();
            let body = resp.bytes().await?.to_vec();
            debug!(%method, path, status, bytes = body.len(), "request completed");
            Ok(RawResponse { status, body })
        })
    }

    fn open_stream(
        &self,
        request: StreamRequest,
    ) -> BoxFuture<'_, Result<StreamResponse, ClientError>> {
        Box::pin(async move {
            let mut headers = HeaderMap::new();
            for (name, value) in &request.headers {
                let (name, value) = header_pair(name, value)?;
                headers.insert(name, value);
            }

            let mut builder = self.http.get(self.url(&request.path)).headers(headers);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }

            let resp = builder.send().await?;
            let status = resp.status().as_u16();
            debug!(path = %request.path, status, "stream opened");

            let body = StreamReader::new(resp.bytes_stream().map_err(std::io::Error::other));
            Ok(StreamResponse {
                status,
                body: Box::pin(body),
            })
        })
    }

    fn open_duplex<'a>(
        &'a self,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn DuplexStream>, ClientError>> {
        Box::pin(async move {
            let url = duplex_url(&self.base_url, path, self.session.as_deref())?;
            let mut request = url
                .as_str()
                .into_client_request()
                .map_err(|e| ClientError::Connect(e.to_string()))?;
            for (name, value) in [
                ("user-agent", self.user_agent.as_str()),
                ("origin", self.base_url.as_str()),
            ] {
                let (name, value) = header_pair(name, value)?;
                request.headers_mut().insert(name, value);
            }

            let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
            ws_config.max_message_size = Some(MAX_DUPLEX_MESSAGE_SIZE);
            ws_config.max_frame_size = Some(MAX_DUPLEX_MESSAGE_SIZE);

            let handshake =
                tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false);
            let (ws, _) = match tokio::time::timeout(self.handshake_timeout, handshake).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => return Err(ClientError::Connect(e.to_string())),
                Err(_) => return Err(ClientError::Timeout("duplex handshake")),
            };
            info!(path, "duplex connected");

            Ok(Box::new(WsDuplex::new(ws)) as Box<dyn DuplexStream>)
        })
    }
}

/// [`DuplexStream`] over a WebSocket.
pub(crate) struct WsDuplex<S> {
    ws: WebSocketStream<S>,
}

impl<S> WsDuplex<S> {
    pub(crate) fn new(ws: WebSocketStream<S>) -> Self {
        Self { ws }
    }
}

/// Maps a read error onto a closure where it represents the peer going away.
fn classify_read_error(err: tungstenite::Error) -> Result<DuplexEvent, ClientError> {
    use tungstenite::error::ProtocolError;

    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            Ok(DuplexEvent::Closed(DuplexClose::Clean {
                code: None,
                reason: String::new(),
            }))
        }
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
        | tungstenite::Error::Io(_) => Ok(DuplexEvent::Closed(DuplexClose::Abrupt(err.to_string()))),
        other => Err(other.into()),
    }
}

impl<S> DuplexStream for WsDuplex<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn send_text(&mut self, text: String) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.ws.send(Message::Text(text.into())).await?;
            Ok(())
        })
    }

    fn send_binary(&mut self, data: Vec<u8>) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.ws.send(Message::Binary(data.into())).await?;
            Ok(())
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<DuplexEvent, ClientError>> {
        Box::pin(async move {
            loop {
                let event = match self.ws.next().await {
                    None => DuplexEvent::Closed(DuplexClose::Clean {
                        code: None,
                        reason: String::new(),
                    }),
                    Some(Ok(Message::Text(text))) => DuplexEvent::Text(text.as_str().to_owned()),
                    Some(Ok(Message::Binary(data))) => DuplexEvent::Binary(data.to_vec()),
                    Some(Ok(Message::Close(frame))) => DuplexEvent::Closed(DuplexClose::Clean {
                        code: frame.as_ref().map(|f| u16::from(f.code)),
                        reason: frame
                            .map(|f| f.reason.as_str().to_owned())
                            .unwrap_or_default(),
                    }),
                    // Ping/pong are answered by tungstenite itself.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return classify_read_error(e),
                };
                return Ok(event);
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            match self.ws.close(None).await {
                Ok(())
                | Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}
