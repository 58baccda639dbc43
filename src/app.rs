//! Serve an app directory on `127.0.0.1`.
//!
//! [`AppServer::serve`] produces a single `Result`. The event bus and the
//! callback of [`AppServer::serve_with`] are both fed from that one result.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use tokio::runtime::Handle;

use crate::error::ServeError;
use crate::events::{EventBus, LogLine};
use crate::middleware::{DEFAULT_ROOT, StaticFiles};
use crate::server::{Server, listen_with_bus};

pub const DEFAULT_PORT: u16 = 3000;
pub const ADDRESS: Ipv4Addr = Ipv4Addr::LOCALHOST;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeOptions {
    /// Port to bind; unset or `0` means [`DEFAULT_PORT`].
    pub port: Option<u16>,
    /// App-content directory; unset means `www` under the working directory.
    pub root: Option<PathBuf>,
}

impl ServeOptions {
    pub fn port(port: u16) -> Self {
        ServeOptions {
            port: Some(port),
            ..Default::default()
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Fill in every unset field.
    pub fn apply_defaults(&mut self) {
        if self.port.unwrap_or(0) == 0 {
            self.port = Some(DEFAULT_PORT);
        }
        if self.root.is_none() {
            self.root = Some(PathBuf::from(DEFAULT_ROOT));
        }
    }

    pub fn effective_port(&self) -> u16 {
        self.port.filter(|p| *p != 0).unwrap_or(DEFAULT_PORT)
    }
}

/// What a successful start hands back to the caller.
#[derive(Debug)]
pub struct StartResult {
    pub server: Server,
    pub address: Ipv4Addr,
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct AppServer {
    bus: EventBus,
}

impl AppServer {
    pub fn new(bus: EventBus) -> Self {
        AppServer { bus }
    }

    /// An app server publishing on [`EventBus::global`].
    pub fn global() -> Self {
        AppServer::new(EventBus::global().clone())
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Start serving. `None` options fail with [`ServeError::MissingOptions`]
    /// before any socket is opened. Bind failures are published on the bus
    /// and returned; success publishes the startup line.
    pub async fn serve(&self, options: Option<ServeOptions>) -> Result<StartResult, ServeError> {
        let mut options = options.ok_or(ServeError::MissingOptions)?;
        options.apply_defaults();
        self.start(options).await
    }

    /// Callback flavour of [`serve`](Self::serve). Options are checked before
    /// anything is spawned; the callback then runs exactly once with the
    /// outcome. Outside a tokio runtime this returns [`ServeError::NoRuntime`]
    /// and the callback is never called.
    pub fn serve_with<F>(&self, options: Option<ServeOptions>, callback: F) -> Result<(), ServeError>
    where
        F: FnOnce(Result<StartResult, ServeError>) + Send + 'static,
    {
        let mut options = options.ok_or(ServeError::MissingOptions)?;
        let runtime = Handle::try_current().map_err(|_| ServeError::NoRuntime)?;
        options.apply_defaults();

        let app = self.clone();
        runtime.spawn(async move { callback(app.start(options).await) });
        Ok(())
    }

    async fn start(&self, options: ServeOptions) -> Result<StartResult, ServeError> {
        let port = options.effective_port();
        let root = options.root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        let addr = SocketAddr::from((ADDRESS, port));

        let result = listen_with_bus(addr, StaticFiles::new(root), self.bus.clone())
            .await
            .map_err(|source| ServeError::Bind { addr, source });

        match result {
            Ok(server) => {
                let message = format!("listening on {ADDRESS}:{port}");
                self.bus.emit_log(LogLine::Message(&message));
                Ok(StartResult {
                    server,
                    address: ADDRESS,
                    port,
                })
            }
            Err(e) => {
                self.bus.emit_error(&e);
                Err(e)
            }
        }
    }
}
