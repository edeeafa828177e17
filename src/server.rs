//! Development server with live reload.
//!
//! Serves the output root over plain HTTP/1.1 and keeps one Server-Sent
//! Events stream open per browser tab. HTML responses get a small client
//! script injected that listens on that stream and either reloads the page
//! or re-fetches stylesheets.

use crate::config::ServerConfig;
use crate::reload::{ReloadEvent, ReloadSink};
use std::io;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::broadcast;

/// URL of the injected client script.
pub const CLIENT_PATH: &str = "/__frontpipe/client.js";
/// URL of the reload event stream.
pub const EVENTS_PATH: &str = "/__frontpipe/events";

const CLIENT_JS: &str = r#"(function () {
  var source = new EventSource("/__frontpipe/events");
  source.onmessage = function (message) {
    var event = JSON.parse(message.data);
    if (event.kind === "injectcss") {
      document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
        var url = new URL(link.href);
        url.searchParams.set("_frontpipe", Date.now());
        link.href = url.toString();
      });
    } else {
      window.location.reload();
    }
  };
})();
"#;

/// Largest request head accepted.
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Error while starting or running the dev server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServeError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),
}

/// Fan-out of reload events to every connected browser.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ReloadHub {
    /// Create a hub buffering up to `capacity` events per slow client.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Number of connected event streams.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ReloadSink for ReloadHub {
    fn notify(&self, event: ReloadEvent) {
        match self.tx.send(event) {
            Ok(n) => log::debug!("Reload sent to {} client(s)", n),
            Err(_) => log::trace!("Reload skipped: no connected clients"),
        }
    }
}

/// Why a request path was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    /// The path climbs out of the served root
    Forbidden,
    /// The path is not valid percent-encoded UTF-8
    BadRequest,
}

/// Decode `%XX` escapes.
pub fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Map a request target to a file below `root`.
pub fn resolve_request_path(root: &Path, target: &str) -> Result<PathBuf, PathRejection> {
    let path = target.split(['?', '#']).next().unwrap_or("");
    let decoded = percent_decode(path).ok_or(PathRejection::BadRequest)?;

    let mut resolved = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PathRejection::Forbidden)
            }
        }
    }
    Ok(resolved)
}

/// Content type by file extension.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("mp4") => "video/mp4",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        _ => "application/octet-stream",
    }
}

/// Insert the client script tag before the last `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    let tag = format!("<script src=\"{}\"></script>", CLIENT_PATH);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(idx) => format!("{}{}{}", &html[..idx], tag, &html[idx..]),
        None => format!("{}{}", html, tag),
    }
}

/// Serves the output root and streams reload events.
#[derive(Debug, Clone)]
pub struct DevServer {
    root: PathBuf,
    addr: String,
    hub: ReloadHub,
}

impl DevServer {
    pub fn new(root: impl Into<PathBuf>, config: &ServerConfig, hub: ReloadHub) -> Self {
        Self { root: root.into(), addr: format!("{}:{}", config.host, config.port), hub }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Bind the listening socket.
    pub async fn bind(&self) -> Result<TcpListener, ServeError> {
        TcpListener::bind(&self.addr)
            .await
            .map_err(|source| ServeError::Bind { addr: self.addr.clone(), source })
    }

    /// Accept connections forever.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServeError> {
        if let Ok(local) = listener.local_addr() {
            log::info!("Serving {} at http://{}", self.root.display(), local);
        }

        loop {
            let (stream, peer) = listener.accept().await.map_err(ServeError::Accept)?;
            let root = self.root.clone();
            let hub = self.hub.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, root, hub).await {
                    log::debug!("Connection from {} ended: {}", peer, e);
                }
            });
        }
    }

    /// Bind and serve.
    pub async fn run(self) -> Result<(), ServeError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Create a dedicated multi-threaded runtime and bind on it.
    ///
    /// Bind failures (port in use) surface here, before anything is served.
    pub fn bind_blocking(self) -> Result<BoundServer, ServeError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(ServeError::Runtime)?;
        let listener = runtime.block_on(self.bind())?;
        Ok(BoundServer { runtime, listener, server: self })
    }

    /// Bind and serve on a dedicated runtime, blocking the caller.
    pub fn run_blocking(self) -> Result<(), ServeError> {
        self.bind_blocking()?.serve_blocking()
    }
}

/// A dev server with its socket bound, not yet accepting.
#[derive(Debug)]
pub struct BoundServer {
    runtime: Runtime,
    listener: TcpListener,
    server: DevServer,
}

impl BoundServer {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, blocking the caller.
    pub fn serve_blocking(self) -> Result<(), ServeError> {
        let BoundServer { runtime, listener, server } = self;
        runtime.block_on(server.serve(listener))
    }
}

/// Read the request line and skip the header lines.
///
/// At most [`MAX_HEAD_BYTES`] are read; `None` means the head did not fit.
async fn read_head<R: AsyncRead + Unpin>(stream: &mut R) -> io::Result<Option<String>> {
    let mut reader = BufReader::new(stream.take(MAX_HEAD_BYTES as u64));

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    if request_line.ends_with('\n') {
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                break;
            }
            if line == "\r\n" || line == "\n" {
                return Ok(Some(request_line));
            }
        }
    }

    if reader.get_ref().limit() == 0 {
        Ok(None)
    } else {
        // Client closed before the blank line
        Ok(Some(request_line))
    }
}

async fn handle_connection(mut stream: TcpStream, root: PathBuf, hub: ReloadHub) -> io::Result<()> {
    let Some(request_line) = read_head(&mut stream).await? else {
        log::warn!("Rejected request with a head over {} bytes", MAX_HEAD_BYTES);
        return respond(
            &mut stream,
            "431 Request Header Fields Too Large",
            "text/plain",
            b"Request Header Fields Too Large",
            false,
        )
        .await;
    };

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return respond(&mut stream, "400 Bad Request", "text/plain", b"Bad Request", false).await;
    };
    let head_only = method == "HEAD";
    if method != "GET" && !head_only {
        return respond(&mut stream, "405 Method Not Allowed", "text/plain", b"Method Not Allowed", false).await;
    }

    log::trace!("{} {}", method, target);

    if target == EVENTS_PATH {
        return stream_events(&mut stream, hub.subscribe()).await;
    }
    if target == CLIENT_PATH {
        return respond(&mut stream, "200 OK", content_type(Path::new("client.js")), CLIENT_JS.as_bytes(), head_only)
            .await;
    }

    let mut path = match resolve_request_path(&root, target) {
        Ok(path) => path,
        Err(PathRejection::Forbidden) => {
            log::warn!("Rejected request outside the served root: {}", target);
            return respond(&mut stream, "403 Forbidden", "text/plain", b"Forbidden", head_only).await;
        }
        Err(PathRejection::BadRequest) => {
            return respond(&mut stream, "400 Bad Request", "text/plain", b"Bad Request", head_only).await;
        }
    };

    if tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
        path.push("index.html");
    }

    match tokio::fs::read(&path).await {
        Ok(body) => {
            let kind = content_type(&path);
            if kind.starts_with("text/html") {
                let html = inject_client(&String::from_utf8_lossy(&body));
                respond(&mut stream, "200 OK", kind, html.as_bytes(), head_only).await
            } else {
                respond(&mut stream, "200 OK", kind, &body, head_only).await
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            respond(&mut stream, "404 Not Found", "text/plain", b"Not Found", head_only).await
        }
        Err(e) => {
            log::warn!("Failed to read {}: {}", path.display(), e);
            respond(&mut stream, "500 Internal Server Error", "text/plain", b"Internal Server Error", head_only)
                .await
        }
    }
}

async fn respond(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
    head_only: bool,
) -> io::Result<()> {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    if !head_only {
        stream.write_all(body).await?;
    }
    stream.flush().await
}

/// Forward reload events as SSE until the client disconnects or the hub closes.
async fn stream_events(stream: &mut TcpStream, mut rx: broadcast::Receiver<ReloadEvent>) -> io::Result<()> {
    stream
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\n\r\n: connected\n\n",
        )
        .await?;
    stream.flush().await?;

    loop {
        match rx.recv().await {
            Ok(event) => {
                stream.write_all(format!("data: {}\n\n", event.to_json()).as_bytes()).await?;
                stream.flush().await?;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::debug!("Event stream lagged, {} event(s) skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}
