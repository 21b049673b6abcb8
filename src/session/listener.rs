//! Registrierung des Listeners für eingehende Anrufe
//!
//! Die Registrierung ist ein Guard: beim Drop wird der Listener beim SDK
//! wieder entfernt. Wer neu registriert, verwirft damit automatisch die
//! alte Registrierung.

use crate::sdk::CallingSdk;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Key unter dem der Listener für eine Identität registriert wird
pub fn listener_key(identity: &str) -> String {
    format!("CALLS_HANDLER_{}", identity)
}

pub struct ListenerRegistration<S: CallingSdk> {
    sdk: Arc<S>,
    key: String,
}

impl<S: CallingSdk> ListenerRegistration<S> {
    /// Registriert einen Listener und gibt Guard + Receiver zurück
    pub fn register(
        sdk: Arc<S>,
        identity: &str,
    ) -> (Self, mpsc::UnboundedReceiver<S::Call>) {
        let key = listener_key(identity);
        let (tx, rx) = mpsc::unbounded_channel();

        sdk.add_listener(&key, tx);
        tracing::debug!("Registered inbound listener {}", key);

        (Self { sdk, key }, rx)
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<S: CallingSdk> Drop for ListenerRegistration<S> {
    fn drop(&mut self) {
        if self.sdk.remove_listener(&self.key) {
            tracing::debug!("Removed inbound listener {}", self.key);
        }
    }
}

impl<S: CallingSdk> std::fmt::Debug for ListenerRegistration<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("key", &self.key)
            .finish()
    }
}
