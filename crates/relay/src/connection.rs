//! Client-Verbindung – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task.
//!
//! ## Lebenszyklus
//! ```text
//! Verbunden -> Aufgenommen -> (Frames empfangen)* -> Geschlossen
//! ```
//! Keine Zwischenzustaende; `Geschlossen` ist endgueltig und die
//! Entfernung aus der Registry idempotent. Trennung durch den Client und
//! Transportfehler werden identisch behandelt.
//!
//! ## Aufnahme-Sequenz
//! Nach der Aufnahme erhaelt der Client in dieser Reihenfolge:
//! 1. privat `userId` – die eigene Identitaet
//! 2. privat `status` – Verbindungsbestaetigung
//! 3. Broadcast `newUser` an alle (einschliesslich des Neuen)
//! 4. Broadcast `userList` an alle
//!
//! Die Reihenfolge ist Vertragsbestandteil: Clients muessen ihre eigene ID
//! kennen bevor ein Broadcast sie erwaehnt.

use futures_util::{SinkExt, StreamExt};
use stammtisch_protocol::envelope::Envelope;
use stammtisch_protocol::wire::FrameCodec;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::registry::ClientRegistry;
use crate::state::RelayState;

// ---------------------------------------------------------------------------
// Broadcast mit Fehlerbereinigung
// ---------------------------------------------------------------------------

/// Sendet eine Nachricht an alle Mitglieder und raeumt Zustellungsfehler auf
///
/// Ein Mitglied dessen Queue voll oder geschlossen ist gilt als getrennt:
/// es wird entfernt und sein Abgang als `userDisconnected` angekuendigt.
/// Die Ankuendigung kann ihrerseits fehlschlagen, daher laeuft die
/// Bereinigung bis keine neuen Fehler mehr auftreten.
pub(crate) fn rundsenden(registry: &ClientRegistry, nachricht: Envelope) {
    let mut fehlgeschlagen = registry.an_alle_senden(&nachricht);
    while !fehlgeschlagen.is_empty() {
        let mut naechste = Vec::new();
        for user_id in fehlgeschlagen {
            // Nur wer tatsaechlich entfernt wurde, wird angekuendigt –
            // parallele Ausloeser melden denselben Abgang sonst doppelt.
            if registry.entfernen(&user_id) {
                tracing::warn!(
                    user_id = %user_id,
                    "Zustellung fehlgeschlagen – Mitglied wird entfernt"
                );
                naechste.extend(registry.an_alle_senden(&Envelope::user_disconnected(user_id)));
            }
        }
        fehlgeschlagen = naechste;
    }
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, verteilt sie ueber die Registry und
/// schreibt die eigene Empfangs-Queue zurueck auf den Socket. Laeuft in
/// einem eigenen tokio-Task.
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<RelayState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, ein Transportfehler auftritt, das
    /// Mitglied anderweitig aus der Registry entfernt wird oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let registry = &self.state.registry;

        let codec = FrameCodec::with_max_size(self.state.config.max_frame_bytes);
        let mut framed = Framed::new(stream, codec);

        // Aufnahme: ab hier ist das Mitglied fuer Broadcasts sichtbar.
        let (info, mut empfangs_queue) = registry.aufnehmen();
        let user_id = info.id;
        tracing::info!(peer = %peer_addr, user_id = %user_id, "Neue Verbindung aufgenommen");

        // Aufnahme-Sequenz (siehe Modul-Doku). Die frische Queue kann hier
        // weder voll noch geschlossen sein.
        let _ = registry.an_user_senden(&user_id, Envelope::user_id(user_id));
        let _ = registry.an_user_senden(
            &user_id,
            Envelope::status(self.state.config.willkommensnachricht.clone()),
        );
        rundsenden(registry, Envelope::new_user(info));
        rundsenden(registry, Envelope::user_list(registry.momentaufnahme()));

        loop {
            tokio::select! {
                // Eingehender Frame vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(payload)) => {
                            match serde_json::from_slice::<serde_json::Value>(&payload) {
                                Ok(wert) => {
                                    tracing::trace!(
                                        peer = %peer_addr,
                                        user_id = %user_id,
                                        "Nachricht empfangen"
                                    );
                                    rundsenden(registry, Envelope::message(wert, user_id));
                                }
                                Err(e) => {
                                    // Unparsbare Frames werden verworfen,
                                    // die Verbindung bleibt bestehen.
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        user_id = %user_id,
                                        fehler = %e,
                                        "Unparsbarer Frame verworfen"
                                    );
                                }
                            }
                        }
                        Some(Err(e)) => {
                            // Rahmenfehler (z.B. Frame zu gross)
                            // desynchronisieren den Stream – Verbindung beenden.
                            tracing::warn!(
                                peer = %peer_addr,
                                user_id = %user_id,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            tracing::info!(
                                peer = %peer_addr,
                                user_id = %user_id,
                                "Verbindung vom Client getrennt"
                            );
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus der eigenen Empfangs-Queue
                ausgehend = empfangs_queue.recv() => {
                    match ausgehend {
                        Some(nachricht) => {
                            if let Err(e) = framed.send(nachricht).await {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    user_id = %user_id,
                                    fehler = %e,
                                    "Senden fehlgeschlagen"
                                );
                                break;
                            }
                        }
                        None => {
                            // Die Registry hat uns entfernt (Zustellungsfehler
                            // von einem anderen Task beobachtet).
                            tracing::debug!(user_id = %user_id, "Aus der Registry entfernt");
                            break;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(
                            peer = %peer_addr,
                            user_id = %user_id,
                            "Shutdown-Signal – Verbindung wird getrennt"
                        );
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende. Trennung, Transportfehler und
        // Shutdown werden identisch behandelt; die Ankuendigung erfolgt nur
        // wenn der Eintrag tatsaechlich noch vorhanden war.
        if registry.entfernen(&user_id) {
            rundsenden(registry, Envelope::user_disconnected(user_id));
        }

        tracing::info!(peer = %peer_addr, user_id = %user_id, "Verbindungs-Task beendet");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
