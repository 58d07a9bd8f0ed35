//! HTTP surface for the fitting dispatcher, compiled with `http_server`.
//!
//! This module spawns a lightweight Axum server that accepts JSON engine
//! requests, exposes the fitting session and streams diagnostic events.

#[cfg(feature = "http_server")]
mod routes;
#[cfg(feature = "http_server")]
mod sse;

#[cfg(feature = "http_server")]
pub use routes::{build_router, run_http_server, HttpState};

use std::sync::Arc;

use crate::dispatch::Dispatcher;

#[cfg(feature = "http_server")]
use log::{error, info, warn};
#[cfg(feature = "http_server")]
use std::net::SocketAddr;
#[cfg(feature = "http_server")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "http_server")]
use std::thread;

#[cfg(feature = "http_server")]
static SERVER_STARTED: AtomicBool = AtomicBool::new(false);

/// Parse a bind address, falling back to `0.0.0.0:8080`.
pub fn parse_bind_addr(raw: &str) -> std::net::SocketAddr {
    raw.parse()
        .unwrap_or_else(|_| std::net::SocketAddr::from(([0, 0, 0, 0], 8080)))
}

/// Spawn the HTTP server on a background thread when the feature is enabled.
///
/// Only the first call starts a server; later calls log a warning.
pub fn spawn_if_enabled(dispatcher: Arc<Dispatcher>, bind_addr: &str) {
    #[cfg(feature = "http_server")]
    {
        if SERVER_STARTED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("NAL2 HTTP server already running");
            return;
        }

        let addr: SocketAddr = parse_bind_addr(bind_addr);

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("Failed to build tokio runtime for HTTP server: {}", err);
                    SERVER_STARTED.store(false, Ordering::SeqCst);
                    return;
                }
            };

            info!("NAL2 HTTP server binding {}", addr);

            runtime.block_on(async move {
                let state = HttpState::new(dispatcher, addr.port());
                if let Err(err) = run_http_server(state, addr).await {
                    error!("NAL2 HTTP server stopped: {:#}", err);
                }
            });
            SERVER_STARTED.store(false, Ordering::SeqCst);
        });
    }

    #[cfg(not(feature = "http_server"))]
    {
        let _ = (dispatcher, bind_addr);
        log::debug!("HTTP server disabled in this build");
    }
}
