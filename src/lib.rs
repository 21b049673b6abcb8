//! Call Lifecycle - Client für SDK-gesteuerte Sprach- und Videoanrufe
//!
//! Das Calling-SDK übernimmt Authentifizierung, Signaling und Media. Diese
//! Crate koordiniert nur:
//! - Session Manager: Login, Signaling-Kanal, Listener, aktiver Anruf
//! - Call Lifecycle: level-triggered State Machine pro Anruf
//! - View: UI als reine Funktion des Zustands
//! - Loopback-SDK für Demo und Tests

pub mod app;
pub mod call;
pub mod config;
pub mod sdk;
pub mod session;
pub mod view;

pub use app::{AppEvent, CallApp, Command};
pub use call::{CallController, CallError, CallLifecycleState, LifecycleEvent, MediaToggles};
pub use config::{AppConfig, ConfigError};
pub use sdk::{CallHandle, CallingSdk, MediaKind, SdkError, SdkEvent};
pub use session::{Session, SessionError, SessionManager};
pub use view::{render, Screen, ViewState};

use tracing_subscriber::EnvFilter;

/// Default-Filter wenn `RUST_LOG` nicht gesetzt ist
pub const DEFAULT_LOG_FILTER: &str = "call_lifecycle=debug";

/// Initialisiert Logging nach stderr.
///
/// Mehrfacher Aufruf ist harmlos.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
