// src/server.rs
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::ServeError;
use crate::events::{EventBus, LogLine};
use crate::middleware::Handler;
use crate::request::{parse_request, read_request_timeout, request_target};
use crate::response::HttpResponse;

/// How long a client may take to send its request head.
pub const REQUEST_HEAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to a running server.
///
/// Dropping the handle leaves the server running; call [`Server::shutdown`]
/// to stop it.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Server {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    /// Connections already accepted run to completion.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            error!("accept loop on {} ended abnormally: {}", self.local_addr, e);
        }
    }
}

/// Bind `addr` and serve every connection with `handler`.
pub async fn listen<A, H>(addr: A, handler: H) -> io::Result<Server>
where
    A: ToSocketAddrs,
    H: Handler,
{
    start(addr, Arc::new(handler), None, REQUEST_HEAD_TIMEOUT).await
}

/// Like [`listen`], and also publish one `log` event per request plus an
/// `error` event per failed accept, or per connection that fails once its
/// request has been parsed. Clients that hang up or stall before sending a
/// full request head are only logged at debug level.
pub async fn listen_with_bus<A, H>(addr: A, handler: H, bus: EventBus) -> io::Result<Server>
where
    A: ToSocketAddrs,
    H: Handler,
{
    start(addr, Arc::new(handler), Some(bus), REQUEST_HEAD_TIMEOUT).await
}

async fn start(
    addr: impl ToSocketAddrs,
    handler: Arc<dyn Handler>,
    bus: Option<EventBus>,
    head_timeout: Duration,
) -> io::Result<Server> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    debug!("Listening on {}", local_addr);

    let shutdown = Arc::new(Notify::new());
    let task = tokio::spawn(accept_loop(
        listener,
        handler,
        bus,
        head_timeout,
        Arc::clone(&shutdown),
    ));

    Ok(Server {
        local_addr,
        shutdown,
        task,
    })
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<dyn Handler>,
    bus: Option<EventBus>,
    head_timeout: Duration,
    shutdown: Arc<Notify>,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.notified() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                debug!("New connection: {}", peer);
                let handler = Arc::clone(&handler);
                let bus = bus.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, handler, bus.as_ref(), head_timeout).await {
                        error!("Error handling connection from {}: {}", peer, e);
                        report(bus.as_ref(), e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                report(bus.as_ref(), e);
            }
        }
    }
    debug!("accept loop stopped");
}

fn report(bus: Option<&EventBus>, e: io::Error) {
    if let Some(bus) = bus {
        bus.emit_error(&ServeError::Io(e));
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    handler: Arc<dyn Handler>,
    bus: Option<&EventBus>,
    head_timeout: Duration,
) -> io::Result<()> {
    let mut buffer = Vec::new();
    let head = match read_request_timeout(&mut stream, &mut buffer, head_timeout).await {
        Ok(head) => head,
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            let url = request_target(&buffer).unwrap_or_default();
            return respond(&mut stream, bus, &url, HttpResponse::header_too_large()).await;
        }
        Err(e) if e.kind() == io::ErrorKind::TimedOut => {
            debug!("request head not received within {:?}", head_timeout);
            if let Err(e) = HttpResponse::request_timeout().write_to(&mut stream).await {
                debug!("could not send 408: {}", e);
            }
            return Ok(());
        }
        Err(e) => {
            debug!("connection closed before a request arrived: {}", e);
            return Ok(());
        }
    };

    let request = match parse_request(&head) {
        Ok(request) => request,
        Err(_) => {
            let url = request_target(head.as_bytes()).unwrap_or_default();
            return respond(&mut stream, bus, &url, HttpResponse::bad_request()).await;
        }
    };
    debug!("method = {} path = {}", request.method, request.path);

    let url = request.path.clone();
    let response = tokio::task::spawn_blocking(move || handler.call(&request))
        .await
        .map_err(io::Error::other)?;

    respond(&mut stream, bus, &url, response).await
}

async fn respond(
    stream: &mut TcpStream,
    bus: Option<&EventBus>,
    url: &str,
    response: HttpResponse,
) -> io::Result<()> {
    response.write_to(stream).await?;

    if let Some(bus) = bus {
        bus.emit_log(LogLine::Request {
            status: response.status,
            url,
        });
    }

    Ok(())
}
