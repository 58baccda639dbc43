use std::io;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Upper bound on the request head (request line plus headers).
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Request target as sent by the client, query string included.
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Build a bare request, mostly useful when driving a handler directly.
    pub fn new(method: &str, path: &str) -> Self {
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            version: "HTTP/1.1".to_string(),
            headers: Vec::new(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub fn parse_request(request_str: &str) -> io::Result<HttpRequest> {
    let mut lines = request_str.lines();

    let Some(line) = lines.next() else {
        return Err(malformed());
    };
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(malformed());
    }

    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    Ok(HttpRequest {
        method: parts[0].to_string(),
        path: parts[1].to_string(),
        version: parts.get(2).unwrap_or(&"HTTP/1.0").to_string(),
        headers,
    })
}

fn malformed() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "Malformed request line")
}

/// Read the request head, stopping at the blank line that ends the headers.
pub async fn read_request<S>(stream: &mut S) -> io::Result<String>
where
    S: AsyncRead + Unpin,
{
    read_request_into(stream, &mut Vec::new()).await
}

/// [`read_request`] bounded by `limit`; a stalled client yields `TimedOut`.
pub async fn read_request_timeout<S>(
    stream: &mut S,
    buffer: &mut Vec<u8>,
    limit: Duration,
) -> io::Result<String>
where
    S: AsyncRead + Unpin,
{
    timeout(limit, read_request_into(stream, buffer))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request head timed out"))?
}

/// Like [`read_request`], accumulating into a caller-owned buffer so the
/// partial head is still available when reading fails.
pub async fn read_request_into<S>(stream: &mut S, buffer: &mut Vec<u8>) -> io::Result<String>
where
    S: AsyncRead + Unpin,
{
    let mut temp = [0; 512];

    loop {
        let n = stream.read(&mut temp).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
        }

        buffer.extend_from_slice(&temp[..n]);

        if let Some(end) = find_head_end(buffer) {
            buffer.truncate(end);
            break;
        }
        if buffer.len() > MAX_HEAD_BYTES {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "request head too large"));
        }
    }

    let request_str = String::from_utf8_lossy(buffer).to_string();
    debug!("request = {}", request_str);

    Ok(request_str)
}

/// Target of the request line, if enough of it has arrived.
pub fn request_target(head: &[u8]) -> Option<String> {
    let line_end = head.iter().position(|b| *b == b'\n')?;
    let line = String::from_utf8_lossy(&head[..line_end]);
    line.split_whitespace().nth(1).map(str::to_string)
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}
