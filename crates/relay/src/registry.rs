//! Client-Registry – Mitgliederverwaltung und Broadcast-Fan-out
//!
//! Die Registry besitzt die Zuordnung `UserId -> Mitglied` samt der
//! Sende-Queue jedes verbundenen Clients. Sie ist die einzige Stelle die
//! Mitglieder aufnimmt oder entfernt; kein anderer Teil des Systems
//! veraendert die Zuordnung direkt.
//!
//! ## Verriegelung
//! Ein einzelner Mutex serialisiert alle Zugriffe. Die Struktur ist klein
//! und flach, Momentaufnahme und Fan-out sehen dadurch immer einen
//! konsistenten Stand. `try_send` blockiert nie, daher darf der Fan-out
//! unter dem Mutex laufen.

use parking_lot::Mutex;
use stammtisch_protocol::envelope::{Envelope, UserInfo};
use stammtisch_protocol::types::UserId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Sende-Queue pro Client
const SENDE_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// Mitglied
// ---------------------------------------------------------------------------

/// Ein aufgenommenes Mitglied mit seiner Sende-Queue
struct Mitglied {
    info: UserInfo,
    tx: mpsc::Sender<Envelope>,
}

impl Mitglied {
    /// Sendet eine Nachricht nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    fn senden(&self, nachricht: Envelope) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(user_id = %self.info.id, "Sende-Queue voll – Nachricht nicht zustellbar");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(user_id = %self.info.id, "Sende-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ClientRegistry
// ---------------------------------------------------------------------------

struct ClientRegistryInner {
    /// Naechste zu vergebende ID (streng monoton, startet bei 1)
    naechste_id: u64,
    /// Alle Mitglieder, nach UserId geordnet (= Aufnahme-Reihenfolge,
    /// da IDs streng steigend vergeben werden)
    mitglieder: BTreeMap<UserId, Mitglied>,
}

/// Zentrale Registry aller verbundenen Clients
///
/// Thread-safe via Arc + Mutex. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ClientRegistry {
    inner: Arc<Mutex<ClientRegistryInner>>,
}

impl ClientRegistry {
    /// Erstellt eine neue, leere ClientRegistry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClientRegistryInner {
                naechste_id: 1,
                mitglieder: BTreeMap::new(),
            })),
        }
    }

    /// Nimmt einen neuen Client auf und gibt seine Empfangs-Queue zurueck
    ///
    /// Vergibt die naechste ID und leitet den Anzeigenamen daraus ab.
    /// IDs werden fuer die Prozesslebensdauer nie wiederverwendet.
    /// Die `ClientConnection` liest aus der Queue und sendet via TCP.
    pub fn aufnehmen(&self) -> (UserInfo, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(SENDE_QUEUE_GROESSE);

        let mut inner = self.inner.lock();
        let id = UserId(inner.naechste_id);
        inner.naechste_id += 1;

        let info = UserInfo::fuer_id(id);
        inner.mitglieder.insert(
            id,
            Mitglied {
                info: info.clone(),
                tx,
            },
        );
        drop(inner);

        tracing::debug!(user_id = %id, "Client in der Registry aufgenommen");
        (info, rx)
    }

    /// Entfernt ein Mitglied aus der Registry
    ///
    /// Gibt `true` zurueck wenn tatsaechlich ein Eintrag entfernt wurde.
    /// Mehrfaches Entfernen ist erlaubt und kein Fehler – Trennung und
    /// Transportfehler koennen sich als Ausloeser ueberholen.
    pub fn entfernen(&self, user_id: &UserId) -> bool {
        let entfernt = self.inner.lock().mitglieder.remove(user_id).is_some();
        if entfernt {
            tracing::debug!(user_id = %user_id, "Client aus der Registry entfernt");
        }
        entfernt
    }

    /// Gibt die aktuelle Mitgliederliste als konsistente Momentaufnahme zurueck
    ///
    /// Geordnet nach ID, was der Aufnahme-Reihenfolge entspricht.
    pub fn momentaufnahme(&self) -> Vec<UserInfo> {
        self.inner
            .lock()
            .mitglieder
            .values()
            .map(|m| m.info.clone())
            .collect()
    }

    /// Sendet eine Nachricht an alle Mitglieder (Fan-out)
    ///
    /// Erreicht genau die Mitgliedschaft zum Aufrufzeitpunkt. Gibt die IDs
    /// zurueck deren Queue voll oder geschlossen war – ein solcher
    /// Zustellungsfehler gilt als Trennung des betroffenen Mitglieds und
    /// bricht die Zustellung an die uebrigen nicht ab.
    pub fn an_alle_senden(&self, nachricht: &Envelope) -> Vec<UserId> {
        let inner = self.inner.lock();
        let mut fehlgeschlagen = Vec::new();
        for (user_id, mitglied) in inner.mitglieder.iter() {
            if !mitglied.senden(nachricht.clone()) {
                fehlgeschlagen.push(*user_id);
            }
        }
        fehlgeschlagen
    }

    /// Sendet eine Nachricht an ein einzelnes Mitglied
    ///
    /// Gibt `true` zurueck wenn das Mitglied gefunden und die Nachricht
    /// eingereiht wurde.
    pub fn an_user_senden(&self, user_id: &UserId, nachricht: Envelope) -> bool {
        match self.inner.lock().mitglieder.get(user_id) {
            Some(mitglied) => mitglied.senden(nachricht),
            None => {
                tracing::debug!(user_id = %user_id, "Senden an unbekanntes Mitglied");
                false
            }
        }
    }

    /// Gibt die Anzahl der aufgenommenen Mitglieder zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.lock().mitglieder.len()
    }

    /// Prueft ob ein Mitglied aufgenommen ist
    pub fn ist_aufgenommen(&self, user_id: &UserId) -> bool {
        self.inner.lock().mitglieder.contains_key(user_id)
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_nachricht() -> Envelope {
        Envelope::status("test")
    }

    #[test]
    fn aufnehmen_vergibt_ids_ab_eins_streng_steigend() {
        let registry = ClientRegistry::neu();

        let (erster, _rx1) = registry.aufnehmen();
        let (zweiter, _rx2) = registry.aufnehmen();
        let (dritter, _rx3) = registry.aufnehmen();

        assert_eq!(erster.id, UserId(1));
        assert_eq!(zweiter.id, UserId(2));
        assert_eq!(dritter.id, UserId(3));
        assert_eq!(erster.name, "User1");
    }

    #[test]
    fn ids_werden_nie_wiederverwendet() {
        let registry = ClientRegistry::neu();

        let (erster, _rx1) = registry.aufnehmen();
        registry.entfernen(&erster.id);

        let (zweiter, _rx2) = registry.aufnehmen();
        assert!(zweiter.id > erster.id, "Entfernte IDs duerfen nicht zurueckkommen");
    }

    #[tokio::test]
    async fn aufnehmen_und_senden() {
        let registry = ClientRegistry::neu();
        let (info, mut rx) = registry.aufnehmen();

        assert!(registry.ist_aufgenommen(&info.id));
        assert!(registry.an_user_senden(&info.id, test_nachricht()));

        let empfangen = rx.try_recv().expect("Nachricht muss vorhanden sein");
        assert!(matches!(empfangen, Envelope::Status { .. }));
    }

    #[test]
    fn an_user_senden_an_unbekanntes_mitglied() {
        let registry = ClientRegistry::neu();
        assert!(!registry.an_user_senden(&UserId(99), test_nachricht()));
    }

    #[test]
    fn momentaufnahme_in_aufnahme_reihenfolge() {
        let registry = ClientRegistry::neu();
        let mut queues = Vec::new();
        for _ in 0..4 {
            queues.push(registry.aufnehmen());
        }

        let aufnahme = registry.momentaufnahme();
        assert_eq!(aufnahme.len(), 4);
        let ids: Vec<u64> = aufnahme.iter().map(|info| info.id.inner()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn momentaufnahme_ohne_entfernte_mitglieder() {
        let registry = ClientRegistry::neu();
        let (erster, _rx1) = registry.aufnehmen();
        let (zweiter, _rx2) = registry.aufnehmen();

        registry.entfernen(&zweiter.id);

        let aufnahme = registry.momentaufnahme();
        assert_eq!(aufnahme.len(), 1);
        assert_eq!(aufnahme[0].id, erster.id);
    }

    #[test]
    fn entfernen_ist_idempotent() {
        let registry = ClientRegistry::neu();
        let (info, _rx) = registry.aufnehmen();
        let (anderes, _rx2) = registry.aufnehmen();

        assert!(registry.entfernen(&info.id));
        assert!(!registry.entfernen(&info.id), "Zweites Entfernen ist ein No-op");
        assert!(!registry.entfernen(&UserId(777)), "Unbekannte ID ist ein No-op");

        // Andere Mitglieder bleiben unberuehrt
        assert!(registry.ist_aufgenommen(&anderes.id));
        assert_eq!(registry.anzahl(), 1);
    }

    #[tokio::test]
    async fn an_alle_senden_erreicht_alle() {
        let registry = ClientRegistry::neu();
        let mut queues: Vec<_> = (0..5).map(|_| registry.aufnehmen()).collect();

        let fehlgeschlagen = registry.an_alle_senden(&test_nachricht());
        assert!(fehlgeschlagen.is_empty());

        for (_, rx) in &mut queues {
            assert!(rx.try_recv().is_ok());
        }
    }

    #[tokio::test]
    async fn fan_out_deckt_genau_die_momentaufnahme() {
        let registry = ClientRegistry::neu();
        let mut queues: Vec<_> = (0..3).map(|_| registry.aufnehmen()).collect();
        let (entferntes, _rx) = registry.aufnehmen();
        registry.entfernen(&entferntes.id);

        let aufnahme: Vec<UserId> = registry.momentaufnahme().iter().map(|i| i.id).collect();
        let fehlgeschlagen = registry.an_alle_senden(&test_nachricht());
        assert!(fehlgeschlagen.is_empty());

        // Genau die Mitglieder der Momentaufnahme haben die Nachricht
        let mut erreicht = Vec::new();
        for (info, rx) in &mut queues {
            if rx.try_recv().is_ok() {
                erreicht.push(info.id);
            }
        }
        assert_eq!(erreicht, aufnahme);
    }

    #[tokio::test]
    async fn geschlossene_queue_wird_als_fehlgeschlagen_gemeldet() {
        let registry = ClientRegistry::neu();
        let (tote, rx_tot) = registry.aufnehmen();
        let (_lebendige, mut rx_lebendig) = registry.aufnehmen();
        drop(rx_tot);

        let fehlgeschlagen = registry.an_alle_senden(&test_nachricht());
        assert_eq!(fehlgeschlagen, vec![tote.id]);

        // Die Zustellung an die uebrigen wurde nicht abgebrochen
        assert!(rx_lebendig.try_recv().is_ok());
    }

    #[tokio::test]
    async fn volle_queue_wird_als_fehlgeschlagen_gemeldet() {
        let registry = ClientRegistry::neu();
        let (info, _rx) = registry.aufnehmen();

        // Queue bis zum Rand fuellen ohne zu lesen
        for _ in 0..SENDE_QUEUE_GROESSE {
            assert!(registry.an_alle_senden(&test_nachricht()).is_empty());
        }

        let fehlgeschlagen = registry.an_alle_senden(&test_nachricht());
        assert_eq!(fehlgeschlagen, vec![info.id]);
    }

    #[test]
    fn nebenlaeufige_aufnahme_bleibt_streng_monoton() {
        let registry = ClientRegistry::neu();
        let gesehen = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let (info, _rx) = registry.aufnehmen();
                        gesehen.lock().push(info.id.inner());
                    }
                });
            }
        });

        let mut ids = gesehen.into_inner();
        assert_eq!(ids.len(), 400);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400, "Keine ID darf doppelt vergeben werden");
        assert_eq!(*ids.first().unwrap(), 1);
        assert_eq!(*ids.last().unwrap(), 400);
    }

    #[tokio::test]
    async fn nachrichten_payload_bleibt_unangetastet() {
        let registry = ClientRegistry::neu();
        let (absender, mut rx) = registry.aufnehmen();

        let payload = json!({"text": "hi", "zahlen": [1, 2, 3]});
        registry.an_alle_senden(&Envelope::message(payload.clone(), absender.id));

        match rx.try_recv().unwrap() {
            Envelope::Message { message, user_id } => {
                assert_eq!(message, payload);
                assert_eq!(user_id, absender.id);
            }
            andere => panic!("Unerwartete Variante: {:?}", andere),
        }
    }

    #[test]
    fn clone_teilt_inneren_zustand() {
        let registry1 = ClientRegistry::neu();
        let registry2 = registry1.clone();

        let (info, _rx) = registry1.aufnehmen();
        assert!(registry2.ist_aufgenommen(&info.id));
    }
}
