//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RelayServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer
//! `ClientConnection`. Accept-Fehler sind nicht fatal: sie werden
//! protokolliert und der Listener nimmt weiter Verbindungen an.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::connection::ClientConnection;
use crate::error::RelayResult;
use crate::state::RelayState;

/// TCP-Relay-Server
///
/// Bindet einen TCP-Socket und akzeptiert Verbindungen in einer Loop.
/// Jede Verbindung laeuft als eigener Task.
pub struct RelayServer {
    state: Arc<RelayState>,
    listener: TcpListener,
}

impl RelayServer {
    /// Bindet den TCP-Socket und erstellt den RelayServer
    ///
    /// Das Binden ist von der Accept-Loop getrennt, damit die tatsaechlich
    /// gebundene Adresse (etwa bei Port 0) vor dem Start abfragbar ist.
    pub async fn binden(state: Arc<RelayState>, bind_addr: SocketAddr) -> RelayResult<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    /// Gibt die tatsaechlich gebundene Adresse zurueck
    pub fn lokale_adresse(&self) -> RelayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Startet die Accept-Loop
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt. Das Signal
    /// wird an alle Verbindungs-Tasks weitergereicht, die daraufhin ihre
    /// Transporte schliessen und ihre Registry-Eintraege freigeben.
    pub async fn starten(
        self,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> RelayResult<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "TCP Relay-Server gestartet");

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            // Client-Limit pruefen
                            let anzahl = self.state.registry.anzahl() as u32;
                            if anzahl >= self.state.config.max_clients {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.state.config.max_clients,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                            let verbindung = ClientConnection::neu(
                                Arc::clone(&self.state),
                                peer_addr,
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Relay-Server gestoppt");
        Ok(())
    }
}
