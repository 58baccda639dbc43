//! Static file middleware.
//!
//! [`StaticFiles`] maps request paths onto an app-content directory. It can run
//! as the whole request listener of a [`Server`](crate::server::Server) or sit in
//! front of another handler through [`StaticFiles::try_serve`].

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::request::HttpRequest;
use crate::response::{HttpResponse, content_type_for};

/// Conventional app-content directory, relative to the working directory.
pub const DEFAULT_ROOT: &str = "www";

/// Anything that can answer a request.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: &HttpRequest) -> HttpResponse;
}

impl<F> Handler for F
where
    F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
{
    fn call(&self, request: &HttpRequest) -> HttpResponse {
        self(request)
    }
}

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StaticFiles { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serve the request if a file matches, `None` otherwise so a host
    /// stack can fall through to its next handler.
    pub fn try_serve(&self, request: &HttpRequest) -> Option<HttpResponse> {
        let head = match request.method.as_str() {
            "GET" => false,
            "HEAD" => true,
            _ => return None,
        };

        let path = self.resolve(&request.path)?;
        let contents = fs::read(&path).ok()?;
        debug!("serving {}", path.display());

        let response = HttpResponse::ok(content_type_for(&path), contents);
        Some(if head { response.into_head() } else { response })
    }

    /// Map a request target onto a file under the root.
    pub fn resolve(&self, target: &str) -> Option<PathBuf> {
        let path = target.split(['?', '#']).next().unwrap_or("");
        let decoded = percent_decode(path)?;

        let mut resolved = self.root.clone();
        for segment in decoded.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." || segment.contains(['\\', '\0']) {
                return None;
            }
            resolved.push(segment);
        }

        if decoded.ends_with('/') || resolved.is_dir() {
            resolved.push("index.html");
        }
        Some(resolved)
    }

    fn not_found(&self) -> HttpResponse {
        HttpResponse::not_found(fs::read(self.root.join("404.html")).ok())
    }
}

impl Default for StaticFiles {
    fn default() -> Self {
        StaticFiles::new(DEFAULT_ROOT)
    }
}

impl Handler for StaticFiles {
    fn call(&self, request: &HttpRequest) -> HttpResponse {
        if let Some(response) = self.try_serve(request) {
            return response;
        }
        match request.method.as_str() {
            "GET" => self.not_found(),
            "HEAD" => self.not_found().into_head(),
            _ => HttpResponse::method_not_allowed(),
        }
    }
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
