//! stammtisch-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und haelt den Lebenszyklus zusammen:
//! Konfiguration -> Relay binden -> laufen bis zum Shutdown-Signal.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use stammtisch_relay::{RelayConfig, RelayServer, RelayState};
use std::net::SocketAddr;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Relay und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. TCP-Listener binden
    /// 2. Accept-Loop starten
    /// 3. Auf Ctrl-C warten
    /// 4. Shutdown-Signal an alle Verbindungs-Tasks weiterreichen
    pub async fn starten(self) -> Result<()> {
        let bind_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .with_context(|| {
                format!("Ungueltige Bind-Adresse '{}'", self.config.tcp_bind_adresse())
            })?;

        let relay_config = RelayConfig {
            willkommensnachricht: self
                .config
                .server
                .willkommen
                .clone()
                .unwrap_or_else(|| RelayConfig::default().willkommensnachricht),
            max_clients: self.config.server.max_clients,
            max_frame_bytes: self.config.relay.max_frame_bytes,
        };

        let state = RelayState::neu(relay_config);
        let relay = RelayServer::binden(state, bind_addr).await?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %relay.lokale_adresse()?,
            max_clients = self.config.server.max_clients,
            "Server startet"
        );

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let relay_task = tokio::spawn(relay.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        // Accept-Loop und alle Verbindungs-Tasks beenden
        let _ = shutdown_tx.send(true);
        relay_task.await??;

        Ok(())
    }
}
