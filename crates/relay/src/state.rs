//! Gemeinsamer Zustand des Relay-Dienstes
//!
//! Haelt Konfiguration und Registry als Arc-Referenzen, die sicher
//! zwischen allen Verbindungs-Tasks geteilt werden koennen.

use stammtisch_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::Arc;

use crate::registry::ClientRegistry;

/// Konfiguration fuer den Relay-Dienst
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bestaetigungstext der privaten `status`-Nachricht nach der Aufnahme
    pub willkommensnachricht: String,
    /// Maximale Anzahl gleichzeitiger Clients
    pub max_clients: u32,
    /// Maximale Frame-Groesse in Bytes (beide Richtungen)
    pub max_frame_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            willkommensnachricht: "Mit dem Server verbunden".to_string(),
            max_clients: 512,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Relay-Konfiguration (unveraenderlich nach dem Start)
    pub config: Arc<RelayConfig>,
    /// Registry aller verbundenen Clients
    pub registry: ClientRegistry,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            registry: ClientRegistry::neu(),
        })
    }
}
