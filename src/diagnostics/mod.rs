//! Diagnostic sink for facade log events.
//!
//! Every event fans out to three places: the registered callback (if any),
//! the platform log via `tracing`, and a bounded history plus broadcast
//! stream used by the debug HTTP surface and the CLI.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::config::DiagnosticsConfig;
use crate::engine::guard::guard_with_default;

pub mod events;

pub use events::{LogEvent, LogLevel};

/// Host-supplied log receiver: `(tag, level, message)`.
pub type LogCallback = Arc<dyn Fn(&str, LogLevel, &str) + Send + Sync>;

/// Snapshot of sink state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticsSnapshot {
    pub recent: Vec<LogEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

pub struct DiagnosticSink {
    tag: String,
    callback: RwLock<Option<LogCallback>>,
    tx: broadcast::Sender<LogEvent>,
    history: Mutex<VecDeque<LogEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl DiagnosticSink {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            tag: config.tag.clone(),
            callback: RwLock::new(None),
            tx,
            history: Mutex::new(VecDeque::with_capacity(config.history_capacity)),
            history_capacity: config.history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Replace the registered callback. `None` clears it.
    pub fn set_callback(&self, callback: Option<LogCallback>) {
        *self
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = callback;
    }

    pub fn has_callback(&self) -> bool {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn emit(&self, event: LogEvent) {
        // Clone out so the callback runs without holding the lock.
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            let rendered = event.rendered();
            guard_with_default("log callback", (), || {
                callback(&event.tag, event.level, &rendered)
            });
        }

        platform_log(&event);

        self.total_events.fetch_add(1, Ordering::Relaxed);
        if self.history_capacity > 0 {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(LogEvent::new(self.tag.clone(), level, message));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn warn_with(&self, message: impl Into<String>, cause: impl fmt::Display) {
        self.emit(LogEvent::new(self.tag.clone(), LogLevel::Warn, message).with_cause(cause));
    }

    pub fn error(&self, message: impl Into<String>, cause: impl fmt::Display) {
        self.emit(LogEvent::new(self.tag.clone(), LogLevel::Error, message).with_cause(cause));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        DiagnosticsSnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new(&DiagnosticsConfig::default())
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("tag", &self.tag)
            .field("has_callback", &self.has_callback())
            .field("total_events", &self.total_events.load(Ordering::Relaxed))
            .finish()
    }
}

fn platform_log(event: &LogEvent) {
    let tag = event.tag.as_str();
    let message = event.rendered();
    match event.level {
        LogLevel::Debug => tracing::debug!(tag, "{}", message),
        LogLevel::Info => tracing::info!(tag, "{}", message),
        LogLevel::Warn => tracing::warn!(tag, "{}", message),
        LogLevel::Error => tracing::error!(tag, "{}", message),
        LogLevel::Verbose => tracing::trace!(tag, "{}", message),
    }
}
