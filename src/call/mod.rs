//! Call Module - Lifecycle eines einzelnen Anrufs
//!
//! Dieses Modul verwaltet:
//! - Die Call-State-Machine (reine Übergangsfunktion)
//! - Den Controller, der SDK-Events und Benutzeraktionen auf ein Handle anwendet
//! - Lokale Mute/Video-Schalter

mod controller;
mod lifecycle;

pub use controller::{CallController, CallError, MediaToggles};
pub use lifecycle::{transition, CallLifecycleState, LifecycleEvent};
