//! `log` / `error` event bus.
//!
//! An [`EventBus`] is a cheap handle onto a shared subscriber list. Servers that
//! share a bus have their events interleaved on it without any instance tag.
//! [`EventBus::global`] is the process-wide default.

use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use log::debug;

use crate::error::ServeError;

/// Payload of a `log` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLine<'a> {
    /// Free-form status message, e.g. the startup line.
    Message(&'a str),
    /// One served request.
    Request { status: u16, url: &'a str },
}

impl fmt::Display for LogLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLine::Message(msg) => f.write_str(msg),
            LogLine::Request { status, url } => write!(f, "{status} {url}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    Log(LogLine<'a>),
    Error(&'a ServeError),
}

type LogHandler = Arc<dyn Fn(&LogLine<'_>) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&ServeError) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    log: Vec<LogHandler>,
    error: Vec<ErrorHandler>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Subscribers>>,
}

static GLOBAL: LazyLock<EventBus> = LazyLock::new(EventBus::new);

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// The bus shared by the module-level helpers in the crate root.
    pub fn global() -> &'static EventBus {
        &GLOBAL
    }

    pub fn on_log<F>(&self, handler: F)
    where
        F: Fn(&LogLine<'_>) + Send + Sync + 'static,
    {
        self.lock().log.push(Arc::new(handler));
    }

    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&ServeError) + Send + Sync + 'static,
    {
        self.lock().error.push(Arc::new(handler));
    }

    /// Deliver `event` to every current subscriber, in subscription order.
    ///
    /// Handlers run on the caller's task, outside the subscriber lock, so a
    /// handler may subscribe further handlers. An error nobody listens for is
    /// discarded.
    pub fn emit(&self, event: Event<'_>) {
        match event {
            Event::Log(line) => {
                let handlers = self.lock().log.clone();
                for handler in handlers {
                    handler(&line);
                }
            }
            Event::Error(err) => {
                let handlers = self.lock().error.clone();
                if handlers.is_empty() {
                    debug!("discarding unhandled error: {}", err);
                }
                for handler in handlers {
                    handler(err);
                }
            }
        }
    }

    pub fn emit_log(&self, line: LogLine<'_>) {
        self.emit(Event::Log(line));
    }

    pub fn emit_error(&self, err: &ServeError) {
        self.emit(Event::Error(err));
    }

    pub fn log_subscribers(&self) -> usize {
        self.lock().log.len()
    }

    pub fn error_subscribers(&self) -> usize {
        self.lock().error.len()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        // Handlers never run under the lock, so a poisoned lock still holds a
        // consistent list.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("log_subscribers", &self.log_subscribers())
            .field("error_subscribers", &self.error_subscribers())
            .finish()
    }
}
