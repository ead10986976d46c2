//! HTTPS transport implementation using `reqwest`.

use std::fmt;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use crate::{
    ConnectionId, LineBuffer, Method, ReadLine, Request, Response,
    StreamHandle, Transport, TransportError,
};

/// Lines buffered between the reader task and `read_line`.
const STREAM_CHANNEL_SIZE: usize = 256;

/// Connection settings for [`HttpsTransport`].
///
/// `Debug` output redacts the token.
#[derive(Clone)]
pub struct TransportConfig {
    /// Scheme and host, e.g. `https://lichess.org`. No trailing slash.
    pub base_url: String,
    /// Bearer token sent with every call.
    pub api_token: Option<String>,
    /// Skip certificate validation. On by default: the service is reached
    /// from constrained hosts without a usable trust store.
    pub accept_invalid_certs: bool,
    pub connect_timeout: Duration,
    /// Ceiling for one request/response call, body included.
    pub request_timeout: Duration,
    /// Cap on a single stream line.
    pub max_line_len: usize,
    pub user_agent: String,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_line_len", &self.max_line_len)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lichess.org".to_string(),
            api_token: None,
            accept_invalid_certs: true,
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(15),
            max_line_len: LineBuffer::DEFAULT_MAX_LEN,
            user_agent: concat!("boardcast/", env!("CARGO_PKG_VERSION"))
                .to_string(),
        }
    }
}

/// A [`Transport`] backed by one `reqwest::Client`.
///
/// The client keeps at most one idle connection to the host, so requests
/// and streams share a single TLS session the way the service expects
/// from one board.
pub struct HttpsTransport {
    config: TransportConfig,
    client: Option<reqwest::Client>,
    id: Option<ConnectionId>,
}

impl HttpsTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            client: None,
            id: None,
        }
    }

    fn build_client(&self) -> Result<reqwest::Client, TransportError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.config.api_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        reqwest::Client::builder()
            .danger_accept_invalid_certs(self.config.accept_invalid_certs)
            .connect_timeout(self.config.connect_timeout)
            .pool_max_idle_per_host(1)
            .user_agent(&self.config.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn client(&self) -> Result<&reqwest::Client, TransportError> {
        self.client.as_ref().ok_or(TransportError::NotOpen)
    }
}

/// Maps a failed `send()` onto the transport taxonomy. Anything that
/// happened before a status line arrived counts as a connect failure.
fn send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connect(err.to_string())
    }
}

fn check_status(status: u16) -> Result<(), TransportError> {
    if status < 100 {
        Err(TransportError::InvalidStatus(status))
    } else {
        Ok(())
    }
}

impl Transport for HttpsTransport {
    type Stream = HttpsStream;

    fn open(&mut self) -> Result<(), TransportError> {
        if self.client.is_some() {
            return Ok(());
        }
        let client = self.build_client()?;
        let id = ConnectionId::next();
        tracing::debug!(%id, base_url = %self.config.base_url, "transport opened");
        self.client = Some(client);
        self.id = Some(id);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn request(
        &mut self,
        request: Request,
    ) -> Result<Response, TransportError> {
        let url = self.url(&request.path);
        let client = self.client()?;
        let mut builder = match request.method {
            Method::Get => client.get(&url),
            Method::Post => client.post(&url),
        };
        builder = builder.timeout(self.config.request_timeout);
        if let Some(body) = request.body {
            builder = builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body);
        }

        tracing::trace!(method = %request.method, path = %request.path, "sending request");
        let resp = builder.send().await.map_err(send_error)?;
        let status = resp.status().as_u16();
        check_status(status)?;
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Disconnected(e.to_string())
            }
        })?;
        tracing::debug!(method = %request.method, path = %request.path, status, "request completed");
        Ok(Response { status, body })
    }

    async fn open_stream(
        &mut self,
        path: &str,
    ) -> Result<HttpsStream, TransportError> {
        let url = self.url(path);
        let send = self.client()?.get(&url).send();
        let resp = tokio::time::timeout(self.config.request_timeout, send)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(send_error)?;

        let status = resp.status().as_u16();
        check_status(status)?;
        if !resp.status().is_success() {
            return Err(TransportError::Status(status));
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_SIZE);
        let max_line_len = self.config.max_line_len;
        let task = tokio::spawn(async move {
            let mut body = resp.bytes_stream();
            let mut lines = LineBuffer::new(max_line_len);
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(chunk) => {
                        for item in frame(&mut lines, &chunk) {
                            if tx.send(item).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(StreamItem::Closed(Some(e.to_string())))
                            .await;
                        return;
                    }
                }
            }
            let _ = tx.send(StreamItem::Closed(None)).await;
        });

        tracing::debug!(path, "stream opened");
        Ok(HttpsStream {
            rx,
            task,
            closed: false,
        })
    }

    fn close(&mut self) {
        if let Some(id) = self.id.take() {
            tracing::debug!(%id, "transport closed");
        }
        self.client = None;
    }

    fn id(&self) -> Option<ConnectionId> {
        self.id
    }
}

#[derive(Debug, PartialEq, Eq)]
enum StreamItem {
    Line(String),
    Overflow,
    Closed(Option<String>),
}

/// Frames one body chunk into what the reader forwards. Dropped
/// oversized lines are reported ahead of the lines completed with them.
fn frame(lines: &mut LineBuffer, chunk: &[u8]) -> Vec<StreamItem> {
    let dropped = lines.overflows();
    let framed = lines.push(chunk);
    let mut items: Vec<StreamItem> = (dropped..lines.overflows())
        .map(|_| StreamItem::Overflow)
        .collect();
    items.extend(framed.into_iter().map(StreamItem::Line));
    items
}

/// Read side of a streaming `GET`.
///
/// A background task pulls body chunks and frames them into lines; the
/// task is aborted when the handle is closed or dropped.
pub struct HttpsStream {
    rx: mpsc::Receiver<StreamItem>,
    task: JoinHandle<()>,
    closed: bool,
}

impl StreamHandle for HttpsStream {
    fn read_line(&mut self) -> ReadLine {
        if self.closed {
            return ReadLine::Closed(None);
        }
        match self.rx.try_recv() {
            Ok(StreamItem::Line(line)) => ReadLine::Line(line),
            Ok(StreamItem::Overflow) => ReadLine::Overflow,
            Ok(StreamItem::Closed(reason)) => {
                self.closed = true;
                ReadLine::Closed(reason)
            }
            Err(TryRecvError::Empty) => ReadLine::WouldBlock,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                ReadLine::Closed(None)
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.task.abort();
    }
}

impl Drop for HttpsStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_redacts_token() {
        let config = TransportConfig {
            api_token: Some("lip_secret".into()),
            ..TransportConfig::default()
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("lip_secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_frame_reports_oversized_line_as_overflow() {
        let mut lines = LineBuffer::new(4);
        let items = frame(&mut lines, b"toolongline\nok\n");
        assert_eq!(
            items,
            vec![StreamItem::Overflow, StreamItem::Line("ok".into())]
        );
        assert_eq!(frame(&mut lines, b"\n"), vec![StreamItem::Line(String::new())]);
    }

    #[test]
    fn test_request_before_open_is_not_open() {
        let transport = HttpsTransport::new(TransportConfig::default());
        assert!(!transport.is_open());
        assert!(matches!(transport.client(), Err(TransportError::NotOpen)));
    }

    #[test]
    fn test_open_assigns_fresh_id_each_time() {
        let mut transport = HttpsTransport::new(TransportConfig {
            api_token: Some("lip_secret".into()),
            ..TransportConfig::default()
        });
        transport.open().expect("client should build");
        let first = transport.id().expect("id after open");
        transport.close();
        assert!(transport.id().is_none());
        transport.open().expect("client should build");
        let second = transport.id().expect("id after reopen");
        assert_ne!(first, second);
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let transport = HttpsTransport::new(TransportConfig {
            base_url: "https://example.org/".into(),
            ..TransportConfig::default()
        });
        assert_eq!(
            transport.url("/api/account"),
            "https://example.org/api/account"
        );
    }

    #[test]
    fn test_check_status_rejects_codes_below_100() {
        assert_eq!(check_status(0), Err(TransportError::InvalidStatus(0)));
        assert_eq!(check_status(200), Ok(()));
    }
}
