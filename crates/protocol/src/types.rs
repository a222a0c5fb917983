//! Gemeinsame Identifikationstypen fuer Stammtisch
//!
//! Die `UserId` verwendet das Newtype-Pattern ueber einer monoton
//! vergebenen Prozess-ID. Serialisiert transparent als blanke Zahl,
//! damit auf dem Draht `"userId": 7` steht und kein Objekt.

use serde::{Deserialize, Serialize};

/// Eindeutige Benutzer-ID fuer die Dauer des Prozesses
///
/// Wird von der Registry streng monoton ab 1 vergeben und nie
/// wiederverwendet. Die Vergabe selbst liegt nicht hier, sondern in der
/// Registry – dieser Typ traegt nur den Wert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl UserId {
    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}
