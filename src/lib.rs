// NAL-NL2 Bridge Core - Rust fitting facade
// Failure-tolerant access to the native hearing-aid fitting engine

// Module declarations
pub mod api;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod facade;
pub mod http;
pub mod probe;
pub mod types;

// Re-exports for convenience
pub use api::*;
pub use context::FittingContext;
pub use facade::Nal2Facade;

use once_cell::sync::OnceCell;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Install the platform tracing subscriber
///
/// Android routes events to logcat under the `Nal2Bridge` tag; other
/// platforms write formatted events to stderr. Only the first call has an
/// effect, and an already installed global subscriber is left in place.
pub fn init_logging() {
    LOGGING.get_or_init(|| {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "android")] {
                use tracing_subscriber::layer::SubscriberExt;
                use tracing_subscriber::util::SubscriberInitExt;

                match tracing_android::layer("Nal2Bridge") {
                    Ok(layer) => {
                        let _ = tracing_subscriber::registry().with(layer).try_init();
                    }
                    Err(err) => eprintln!("Nal2Bridge: logcat layer unavailable: {}", err),
                }
            } else {
                let _ = tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .with_writer(std::io::stderr)
                    .try_init();
            }
        }
    });
}

/// JNI_OnLoad is called when the native library is loaded by Android
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(_vm: jni::JavaVM, _reserved: *mut std::ffi::c_void) -> jni::sys::jint {
    init_logging();
    log::info!("JNI_OnLoad called - NAL2 bridge loaded");

    // Return JNI version
    jni::sys::JNI_VERSION_1_6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        assert!(LOGGING.get().is_some());
    }
}
