use std::io;
use std::path::Path;

use tokio::io::{AsyncWrite, AsyncWriteExt};

const NOT_FOUND_BODY: &[u8] = b"<h1>404 Not Found</h1>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, reason: &'static str, body: Vec<u8>) -> Self {
        HttpResponse {
            status,
            reason,
            headers: Vec::new(),
            body,
        }
    }

    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        HttpResponse::new(200, "OK", body).with_header("Content-Type", content_type)
    }

    /// 404 with the given body, or the built-in page when `body` is `None`.
    pub fn not_found(body: Option<Vec<u8>>) -> Self {
        HttpResponse::new(404, "NOT FOUND", body.unwrap_or_else(|| NOT_FOUND_BODY.to_vec()))
            .with_header("Content-Type", "text/html")
    }

    pub fn bad_request() -> Self {
        HttpResponse::new(400, "BAD REQUEST", b"<h1>400 Bad Request</h1>".to_vec())
            .with_header("Content-Type", "text/html")
    }

    pub fn request_timeout() -> Self {
        HttpResponse::new(408, "REQUEST TIMEOUT", b"<h1>408 Request Timeout</h1>".to_vec())
            .with_header("Content-Type", "text/html")
    }

    pub fn header_too_large() -> Self {
        HttpResponse::new(
            431,
            "REQUEST HEADER FIELDS TOO LARGE",
            b"<h1>431 Request Header Fields Too Large</h1>".to_vec(),
        )
        .with_header("Content-Type", "text/html")
    }

    pub fn method_not_allowed() -> Self {
        HttpResponse::new(405, "METHOD NOT ALLOWED", b"<h1>405 Method Not Allowed</h1>".to_vec())
            .with_header("Content-Type", "text/html")
            .with_header("Allow", "GET, HEAD")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Drop the body but keep `Content-Length` describing it, as HEAD requires.
    pub fn into_head(mut self) -> Self {
        let len = self.body.len().to_string();
        self.body.clear();
        self.with_header("Content-Length", &len)
    }

    /// Serialize onto the wire. Every response closes the connection.
    pub async fn write_to<W>(&self, stream: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut header = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            header.push_str(&format!("{name}: {value}\r\n"));
        }
        if self.header("Content-Length").is_none() {
            header.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        header.push_str("Connection: close\r\n\r\n");

        stream.write_all(header.as_bytes()).await?;
        stream.write_all(&self.body).await?;
        stream.flush().await?;

        Ok(())
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") | Some("mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}
