use crate::{BrowserOpener, DuoFrame, RelayError, RelayResult};
use broker_http::{HttpClient, HttpRequest, HttpResponse};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Route the frame posts its completion to in proxy mode.
pub const POST_ACTION_ROUTE: &str = "/post_action";

const MAX_BODY_BYTES: usize = 64 * 1024;

/// How the frame's completion reaches the provider.
#[derive(Debug, Clone)]
pub enum RelayMode {
    /// The frame posts straight to the provider. The caller learns the
    /// outcome by polling the provider; the relay only serves the page.
    Direct,
    /// The frame posts to the relay, which sends the form through this
    /// request (URL, headers, cookies) and reports the provider's response.
    Proxy(HttpRequest),
}

type Completion = RelayResult<HttpResponse>;

struct Shared {
    page: String,
    forward: Option<HttpRequest>,
    http: HttpClient,
    completion: Mutex<Option<oneshot::Sender<Completion>>>,
}

impl Shared {
    /// Hand the first completion to the waiter; later ones are dropped.
    fn complete(&self, completion: Completion) {
        if let Some(tx) = self.completion.lock().take() {
            let _ = tx.send(completion);
        }
    }
}

/// A running relay. The listener task stops when the relay is dropped.
pub struct CallbackRelay {
    addr: SocketAddr,
    server: JoinHandle<()>,
    completion: Option<oneshot::Receiver<Completion>>,
}

impl CallbackRelay {
    /// Bind a loopback port and start serving. The port is bound before
    /// this returns, so the URL can be opened right away.
    pub async fn start(frame: &DuoFrame, mode: RelayMode, http: HttpClient) -> RelayResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(RelayError::Bind)?;
        let addr = listener.local_addr()?;

        let (page, forward) = match mode {
            RelayMode::Direct => (frame.render(&frame.post_action), None),
            RelayMode::Proxy(request) => (frame.render(POST_ACTION_ROUTE), Some(request)),
        };
        let (tx, rx) = oneshot::channel();
        let completion = forward.is_some().then_some(rx);

        let shared = Arc::new(Shared {
            page,
            forward,
            http,
            completion: Mutex::new(Some(tx)),
        });

        info!(addr = %addr, "Callback relay listening");

        let server = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        let shared = shared.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(socket, shared).await {
                                error!("Error handling relay connection: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Relay accept error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            addr,
            server,
            completion,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn open(&self, browser: &dyn BrowserOpener) -> RelayResult<()> {
        browser.open(&self.url())
    }

    /// Wait for the relayed completion (proxy mode only).
    ///
    /// Returns the provider's response to the forwarded form. Ends early on
    /// Ctrl-C or once `timeout` elapses; the listener is shut down either way.
    pub async fn wait(mut self, timeout: Option<Duration>) -> RelayResult<HttpResponse> {
        let rx = self.completion.take().ok_or(RelayError::Closed)?;

        debug!(addr = %self.addr, "Waiting for relay completion");
        let deadline = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            completion = rx => match completion {
                Ok(response) => Ok(response?),
                Err(_) => Err(RelayError::Closed),
            },
            _ = tokio::signal::ctrl_c() => Err(RelayError::Interrupted),
            _ = deadline => Err(RelayError::Timeout(timeout.map_or(0, |d| d.as_secs()))),
        }
    }
}

impl Drop for CallbackRelay {
    fn drop(&mut self) {
        debug!(addr = %self.addr, "Stopping callback relay");
        self.server.abort();
    }
}

async fn handle_connection(mut socket: TcpStream, shared: Arc<Shared>) -> RelayResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default();
    let path = target.split('?').next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    debug!(method = %method, path = %path, "Relay request");

    match (method.as_str(), path.as_str(), &shared.forward) {
        ("GET", "/", _) => send_response(&mut writer, 200, "text/html; charset=utf-8", &shared.page).await,
        ("POST", POST_ACTION_ROUTE, Some(_)) if content_length > MAX_BODY_BYTES => {
            error!(content_length, limit = MAX_BODY_BYTES, "Completion body too large, not relaying");
            send_response(&mut writer, 413, "text/plain", "Payload Too Large").await?;
            shared.complete(Err(RelayError::BodyTooLarge {
                size: content_length,
                limit: MAX_BODY_BYTES,
            }));
            Ok(())
        }
        ("POST", POST_ACTION_ROUTE, Some(forward)) => {
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).await?;
            let form: Vec<(String, String)> = url::form_urlencoded::parse(&body).into_owned().collect();

            let completion = shared
                .http
                .rest_request(forward.clone().form(form))
                .await
                .map(|rest| rest.response().clone())
                .map_err(RelayError::from);

            match &completion {
                Ok(response) => {
                    let content_type = response.header("content-type").unwrap_or("text/html");
                    send_response(&mut writer, response.status, content_type, &response.body).await?;
                }
                Err(e) => {
                    error!("Relaying completion failed: {}", e);
                    send_response(&mut writer, 502, "text/plain", "Upstream request failed").await?;
                }
            }

            shared.complete(completion);
            Ok(())
        }
        ("GET", _, _) | ("POST", _, _) => send_response(&mut writer, 404, "text/plain", "Not Found").await,
        _ => send_response(&mut writer, 405, "text/plain", "Method Not Allowed").await,
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "",
    }
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status: u16,
    content_type: &str,
    body: &str,
) -> RelayResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason_phrase(status),
        content_type,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
