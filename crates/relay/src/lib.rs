//! stammtisch-relay – Verbindungs-Registry und Broadcast-Relay
//!
//! Dieser Crate implementiert den Kern des Stammtisch-Servers: er nimmt
//! beliebig viele gleichzeitige Client-Verbindungen an, verwaltet deren
//! Identitaeten und verteilt jedes eingehende Ereignis an alle aktuell
//! verbundenen Mitglieder.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Aufnahme: userId -> status -> newUser -> userList
//!     |  Danach: jeder Frame wird als `message` an alle verteilt
//!     |
//!     v
//! ClientRegistry – einziger geteilter Zustand
//!     Mutex-geschuetzte Zuordnung UserId -> Mitglied + Sende-Queue
//!     Aufnahme, Entfernung, Momentaufnahme, Fan-out
//! ```
//!
//! Die Registry ist die einzige Stelle die Mitglieder aufnimmt oder
//! entfernt. Ein Zustellungsfehler beim Fan-out gilt als Trennung des
//! betroffenen Mitglieds und bricht die Verteilung an die uebrigen nie ab.

pub mod connection;
pub mod error;
pub mod registry;
pub mod state;
pub mod tcp;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use connection::ClientConnection;
pub use error::{RelayError, RelayResult};
pub use registry::ClientRegistry;
pub use state::{RelayConfig, RelayState};
pub use tcp::RelayServer;
