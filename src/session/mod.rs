//! Session Module - Authentifizierung und aktiver Anruf
//!
//! Dieses Modul verwaltet:
//! - Authentifizierung und Signaling-Kanal über das SDK
//! - Genau einen Listener für eingehende Anrufe
//! - Das einzige aktive Call-Handle

mod listener;
mod manager;

pub use listener::{listener_key, ListenerRegistration};
pub use manager::{AuthStatus, ChannelStatus, Notification, Session, SessionError, SessionManager};
