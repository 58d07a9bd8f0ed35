// FittingContext: lifecycle-managed container for one engine connection
// Owns the configuration, the diagnostic sink and the lazily created engine handle

use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;

use crate::config::BridgeConfig;
use crate::diagnostics::{DiagnosticSink, LogCallback};
use crate::engine::{EngineHandle, EngineSource, EntryPoint, FittingEngine};
use crate::error::{log_engine_error, EngineError};

/// FittingContext: everything a facade needs to reach the engine
///
/// - Engine source (native library or a provided build)
/// - Engine handle, created once on first use
/// - Diagnostic sink with its single callback slot
///
/// Handle creation is serialized; concurrent first callers observe the same
/// instance. A failed creation is not remembered, so the next call retries.
pub struct FittingContext {
    config: BridgeConfig,
    sink: Arc<DiagnosticSink>,
    source: RwLock<Option<EngineSource>>,
    engine: OnceCell<EngineHandle>,
}

impl FittingContext {
    /// Context that loads the native engine named in `config`
    pub fn new(config: BridgeConfig) -> Self {
        let source = EngineSource::Native(config.engine.clone());
        Self::from_source(config, Some(source))
    }

    /// Context over an engine built by the host
    pub fn with_engine(config: BridgeConfig, engine: Arc<dyn FittingEngine>) -> Self {
        Self::from_source(config, Some(EngineSource::Provided(engine)))
    }

    /// Context with no engine source yet; see [`attach`](Self::attach)
    pub fn detached(config: BridgeConfig) -> Self {
        Self::from_source(config, None)
    }

    fn from_source(config: BridgeConfig, source: Option<EngineSource>) -> Self {
        let sink = Arc::new(DiagnosticSink::new(&config.diagnostics));
        Self {
            config,
            sink,
            source: RwLock::new(source),
            engine: OnceCell::new(),
        }
    }

    // ========================================================================
    // LOCK HELPER METHODS
    // ========================================================================

    fn read_source(&self) -> Result<std::sync::RwLockReadGuard<'_, Option<EngineSource>>, EngineError> {
        self.source.read().map_err(|_| EngineError::LockPoisoned {
            component: "engine_source".to_string(),
        })
    }

    fn write_source(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, Option<EngineSource>>, EngineError> {
        self.source.write().map_err(|_| EngineError::LockPoisoned {
            component: "engine_source".to_string(),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<DiagnosticSink> {
        &self.sink
    }

    /// Replace the engine source used by the first acquisition.
    ///
    /// Ignored (with a warning) once the handle exists.
    pub fn attach(&self, source: EngineSource) -> Result<(), EngineError> {
        if self.engine.get().is_some() {
            self.sink
                .warn(format!("Engine already created; ignoring new source {:?}", source));
            return Ok(());
        }
        *self.write_source()? = Some(source);
        Ok(())
    }

    /// Acquire the shared engine handle, creating it on first use.
    ///
    /// # Errors
    /// - `NotInitialized` if no source was ever attached
    /// - `LibraryLoad` if the native library cannot be opened
    pub fn engine(&self) -> Result<&EngineHandle, EngineError> {
        self.engine.get_or_try_init(|| {
            let source = self
                .read_source()?
                .clone()
                .ok_or(EngineError::NotInitialized)?;
            let handle = EngineHandle::from_source(&source).map_err(|err| {
                log_engine_error(&err, "engine acquisition");
                err
            })?;
            self.announce(&handle);
            Ok(handle)
        })
    }

    pub fn is_engine_ready(&self) -> bool {
        self.engine.get().is_some()
    }

    /// Register the single log callback. `None` clears it.
    pub fn set_log_callback(&self, callback: Option<LogCallback>) {
        self.sink.set_callback(callback);
    }

    fn announce(&self, handle: &EngineHandle) {
        let capabilities = handle.capabilities();
        self.sink.info(format!(
            "Engine ready: {} ({} of {} entry points)",
            handle.describe(),
            capabilities.len(),
            EntryPoint::ALL.len()
        ));

        let missing: Vec<&str> = capabilities.missing().map(EntryPoint::symbol).collect();
        if !missing.is_empty() {
            self.sink
                .warn(format!("Engine lacks entry points: {}", missing.join(", ")));
        }
    }
}

impl Default for FittingContext {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::diagnostics::LogLevel;
    use crate::engine::StubEngine;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn test_engine_is_created_once() {
        let context = Arc::new(FittingContext::with_engine(
            BridgeConfig::default(),
            Arc::new(StubEngine::new()),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = Arc::clone(&context);
                thread::spawn(move || context.engine().map(|h| h as *const EngineHandle as usize))
            })
            .collect();
        let addresses: Vec<usize> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
        let infos = context
            .sink()
            .snapshot()
            .recent
            .iter()
            .filter(|event| event.level == LogLevel::Info)
            .count();
        assert_eq!(infos, 1);
    }

    #[test]
    fn test_detached_context_reports_not_initialized() {
        let context = FittingContext::detached(BridgeConfig::default());
        assert_eq!(context.engine().unwrap_err(), EngineError::NotInitialized);
        assert!(!context.is_engine_ready());

        context
            .attach(EngineSource::Provided(Arc::new(StubEngine::new())))
            .unwrap();
        assert!(context.engine().is_ok());
    }

    #[test]
    fn test_failed_load_is_retried() {
        let config = BridgeConfig {
            engine: EngineConfig {
                library_path: "/nonexistent/libnal2.so".to_string(),
                ..EngineConfig::default()
            },
            ..BridgeConfig::default()
        };
        let context = FittingContext::new(config);
        assert!(matches!(
            context.engine(),
            Err(EngineError::LibraryLoad { .. })
        ));

        context
            .attach(EngineSource::Provided(Arc::new(StubEngine::new())))
            .unwrap();
        assert!(context.engine().is_ok());
    }

    #[test]
    fn test_missing_symbols_are_announced() {
        let context = FittingContext::with_engine(
            BridgeConfig::default(),
            Arc::new(StubEngine::new().missing(EntryPoint::DllVersion)),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        context.set_log_callback(Some(Arc::new(move |_: &str, level, message: &str| {
            captured.lock().unwrap().push((level, message.to_string()));
        })));

        context.engine().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, LogLevel::Info);
        assert!(seen[0].1.contains("45 of 46"));
        assert_eq!(seen[1], (LogLevel::Warn, "Engine lacks entry points: dllVersion".to_string()));
    }

    #[test]
    fn test_attach_after_creation_is_ignored() {
        let context = FittingContext::with_engine(
            BridgeConfig::default(),
            Arc::new(StubEngine::new().missing(EntryPoint::GetMle)),
        );
        context.engine().unwrap();
        context
            .attach(EngineSource::Provided(Arc::new(StubEngine::new())))
            .unwrap();

        assert!(!context.engine().unwrap().supports(EntryPoint::GetMle));
    }
}
