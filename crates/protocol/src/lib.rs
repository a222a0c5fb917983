//! stammtisch-protocol – Drahtformat des Stammtisch-Relays
//!
//! Dieses Crate definiert die Identitaetstypen, die Umschlag-Nachrichten
//! und das Frame-Format die zwischen Relay und Clients ausgetauscht werden.

pub mod envelope;
pub mod types;
pub mod wire;

// Bequeme Re-Exporte
pub use envelope::{Envelope, UserInfo};
pub use types::UserId;
pub use wire::{FrameCodec, WireError};
