//! Serve a static app directory over local HTTP.
//!
//! ```no_run
//! # async fn run() -> Result<(), soundwave::ServeError> {
//! soundwave::on_log(|line| println!("{line}"));
//! let started = soundwave::serve(Some(soundwave::ServeOptions::port(4500))).await?;
//! assert_eq!(started.port, 4500);
//! # Ok(())
//! # }
//! ```
//!
//! The free functions here use [`EventBus::global`]. Build an [`AppServer`]
//! with its own [`EventBus`] to keep instances apart.

pub mod app;
pub mod cli;
pub mod error;
pub mod events;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

use std::io;

use tokio::net::ToSocketAddrs;

pub use app::{AppServer, ServeOptions, StartResult};
pub use error::ServeError;
pub use events::{Event, EventBus, LogLine};
pub use middleware::{Handler, StaticFiles};
pub use server::Server;

/// The static middleware for `www/`, usable as a handler on its own.
pub fn middleware() -> StaticFiles {
    StaticFiles::default()
}

/// Start a plain server for [`middleware`] on `addr`.
pub async fn listen<A: ToSocketAddrs>(addr: A) -> io::Result<Server> {
    server::listen(addr, middleware()).await
}

/// [`AppServer::serve`] on the global bus.
pub async fn serve(options: Option<ServeOptions>) -> Result<StartResult, ServeError> {
    AppServer::global().serve(options).await
}

/// [`AppServer::serve_with`] on the global bus. Returns
/// [`ServeError::NoRuntime`] when called outside a tokio runtime.
pub fn serve_with<F>(options: Option<ServeOptions>, callback: F) -> Result<(), ServeError>
where
    F: FnOnce(Result<StartResult, ServeError>) + Send + 'static,
{
    AppServer::global().serve_with(options, callback)
}

pub fn on_log<F>(handler: F)
where
    F: Fn(&LogLine<'_>) + Send + Sync + 'static,
{
    EventBus::global().on_log(handler);
}

pub fn on_error<F>(handler: F)
where
    F: Fn(&ServeError) + Send + Sync + 'static,
{
    EventBus::global().on_error(handler);
}

pub fn emit(event: Event<'_>) {
    EventBus::global().emit(event);
}
