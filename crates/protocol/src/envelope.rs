//! Umschlag-Nachrichten (Server -> Client)
//!
//! Definiert alle Nachrichten die der Relay an verbundene Clients sendet.
//!
//! ## Design
//! - Tagged Enum: das Feld `type` diskriminiert die Variante
//! - camelCase auf dem Draht (`userId`, `newUser`, `userList`, ...)
//! - Der `message`-Payload bleibt ein opakes `serde_json::Value` – der
//!   Relay leitet ihn unveraendert weiter und schaut nie hinein
//!
//! Die Gegenrichtung (Client -> Server) hat keinen Umschlag: jeder
//! eingehende Frame ist ein beliebiges JSON-Dokument und wird wortwoertlich
//! in eine `Message`-Variante verpackt.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::UserId;

/// Oeffentliche Mitglieds-Info, auf dem Draht `{id, name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub name: String,
}

impl UserInfo {
    /// Erstellt die Info zu einer vergebenen ID
    ///
    /// Der Anzeigename wird deterministisch aus der ID abgeleitet und
    /// aendert sich danach nicht mehr.
    pub fn fuer_id(id: UserId) -> Self {
        Self {
            name: format!("User{}", id.inner()),
            id,
        }
    }
}

/// Alle Server-zu-Client-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Envelope {
    /// Privat: die dem Client zugewiesene Identitaet
    UserId { user_id: UserId },
    /// Privat: Verbindungsbestaetigung
    Status { message: String },
    /// Broadcast: ein Mitglied ist beigetreten
    NewUser { user: UserInfo },
    /// Broadcast: vollstaendige Mitgliederliste
    UserList { users: Vec<UserInfo> },
    /// Broadcast: weitergeleiteter Client-Payload
    Message { message: Value, user_id: UserId },
    /// Broadcast: ein Mitglied hat die Verbindung getrennt
    UserDisconnected { user_id: UserId },
}

impl Envelope {
    /// Erstellt eine private `userId`-Nachricht
    pub fn user_id(user_id: UserId) -> Self {
        Self::UserId { user_id }
    }

    /// Erstellt eine private `status`-Bestaetigung
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    /// Erstellt eine `newUser`-Ankuendigung
    pub fn new_user(user: UserInfo) -> Self {
        Self::NewUser { user }
    }

    /// Erstellt eine `userList`-Momentaufnahme
    pub fn user_list(users: Vec<UserInfo>) -> Self {
        Self::UserList { users }
    }

    /// Verpackt einen Client-Payload wortwoertlich in eine `message`
    pub fn message(message: Value, user_id: UserId) -> Self {
        Self::Message { message, user_id }
    }

    /// Erstellt eine `userDisconnected`-Ankuendigung
    pub fn user_disconnected(user_id: UserId) -> Self {
        Self::UserDisconnected { user_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_id_drahtformat() {
        let env = Envelope::user_id(UserId(7));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "userId", "userId": 7})
        );
    }

    #[test]
    fn status_drahtformat() {
        let env = Envelope::status("Mit dem Server verbunden");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "status", "message": "Mit dem Server verbunden"})
        );
    }

    #[test]
    fn new_user_drahtformat() {
        let env = Envelope::new_user(UserInfo::fuer_id(UserId(3)));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "newUser", "user": {"id": 3, "name": "User3"}})
        );
    }

    #[test]
    fn user_list_drahtformat() {
        let env = Envelope::user_list(vec![
            UserInfo::fuer_id(UserId(1)),
            UserInfo::fuer_id(UserId(2)),
        ]);
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "userList", "users": [
                {"id": 1, "name": "User1"},
                {"id": 2, "name": "User2"},
            ]})
        );
    }

    #[test]
    fn message_traegt_payload_wortwoertlich() {
        let payload = json!({"text": "hi", "verschachtelt": {"tief": [1, 2, 3]}});
        let env = Envelope::message(payload.clone(), UserId(1));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "message", "message": payload, "userId": 1})
        );
    }

    #[test]
    fn user_disconnected_drahtformat() {
        let env = Envelope::user_disconnected(UserId(2));
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"type": "userDisconnected", "userId": 2})
        );
    }

    #[test]
    fn round_trip_ueber_json() {
        let env = Envelope::message(json!({"text": "hallo"}), UserId(5));
        let json = serde_json::to_string(&env).unwrap();
        let zurueck: Envelope = serde_json::from_str(&json).unwrap();
        match zurueck {
            Envelope::Message { message, user_id } => {
                assert_eq!(message, json!({"text": "hallo"}));
                assert_eq!(user_id, UserId(5));
            }
            andere => panic!("Unerwartete Variante: {:?}", andere),
        }
    }

    #[test]
    fn unbekannter_typ_wird_abgelehnt() {
        let ergebnis: Result<Envelope, _> =
            serde_json::from_str(r#"{"type": "fliegenpilz", "userId": 1}"#);
        assert!(ergebnis.is_err());
    }

    #[test]
    fn anzeigename_ist_deterministisch() {
        assert_eq!(UserInfo::fuer_id(UserId(1)).name, "User1");
        assert_eq!(UserInfo::fuer_id(UserId(120)).name, "User120");
    }
}
