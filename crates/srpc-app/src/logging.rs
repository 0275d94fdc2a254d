//! Logging setup: console output, a runtime-adjustable level, and a hook
//! that forwards log lines to registered handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use srpc_common::SrpcError;
use srpc_config::LogLevel;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

/// One log line as seen by a handler.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
}

pub type LogHandler = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Returned by [`LogControl::add_log_handler`]; pass it back to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type HandlerMap = Arc<RwLock<HashMap<HandlerId, LogHandler>>>;

/// Runtime handle over the installed subscriber.
#[derive(Clone)]
pub struct LogControl {
    reload_handle: reload::Handle<LevelFilter, Registry>,
    level: Arc<RwLock<LogLevel>>,
    handlers: HandlerMap,
    next_id: Arc<AtomicU64>,
}

impl LogControl {
    /// Build the control and the reloadable filter layer it drives. The
    /// layer must stay alive (installed or held) for level changes to work.
    pub fn new(level: LogLevel) -> (Self, reload::Layer<LevelFilter, Registry>) {
        let (filter, reload_handle) = reload::Layer::new(level_filter(level));
        let control = Self {
            reload_handle,
            level: Arc::new(RwLock::new(level)),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (control, filter)
    }

    pub fn level(&self) -> LogLevel {
        self.level.read().map(|l| *l).unwrap_or_default()
    }

    pub fn set_level(&self, level: LogLevel) -> Result<(), SrpcError> {
        self.reload_handle
            .reload(level_filter(level))
            .map_err(|e| SrpcError::Other(format!("failed to reload log level: {e}")))?;
        if let Ok(mut current) = self.level.write() {
            *current = level;
        }
        Ok(())
    }

    pub fn add_log_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut map) = self.handlers.write() {
            map.insert(id, Arc::new(handler));
        }
        id
    }

    /// Returns false if the handler was not registered.
    pub fn remove_log_handler(&self, id: HandlerId) -> bool {
        self.handlers
            .write()
            .map(|mut map| map.remove(&id).is_some())
            .unwrap_or(false)
    }

    fn handler_layer(&self) -> LogHandlerLayer {
        LogHandlerLayer {
            handlers: Arc::clone(&self.handlers),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, further narrows console output per target; the
/// level set here (and later through [`LogControl::set_level`]) caps
/// everything.
pub fn init_logging(level: LogLevel) -> LogControl {
    let (control, filter) = LogControl::new(level);

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trace"));

    let subscriber = Registry::default()
        .with(filter)
        .with(control.handler_layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(console_filter),
        );

    if subscriber.try_init().is_err() {
        eprintln!("srpc: a global tracing subscriber was already installed");
    }

    control
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}

// ---------------------------------------------------------------------------
// Handler layer
// ---------------------------------------------------------------------------

struct LogHandlerLayer {
    handlers: HandlerMap,
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let fields = std::mem::take(&mut self.message);
            self.message = format!("{value:?}");
            if !fields.is_empty() {
                self.message.push(' ');
                self.message.push_str(&fields);
            }
        } else {
            if !self.message.is_empty() {
                self.message.push(' ');
            }
            self.message.push_str(&format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.record_debug(field, &format_args!("{value}"));
        } else {
            if !self.message.is_empty() {
                self.message.push(' ');
            }
            self.message.push_str(&format!("{}={}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogHandlerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // Snapshot the handlers so one that logs cannot deadlock the map.
        let handlers: Vec<LogHandler> = match self.handlers.read() {
            Ok(map) if !map.is_empty() => map.values().cloned().collect(),
            _ => return,
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
        };
        for handler in handlers {
            handler(&record);
        }
    }
}
