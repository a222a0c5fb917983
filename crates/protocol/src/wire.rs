//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Laenge (u32 big-endian) + ein JSON-Dokument.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Maximale Frame-Groesse ist konfigurierbar (Standard: 1 MB).
//!
//! Der Decoder liefert den rohen Payload als `Bytes` statt einer fertig
//! deserialisierten Nachricht: eingehende Frames sind beliebiges JSON, und
//! ein unparsbarer Payload darf die Verbindung nicht beenden – die
//! Relay-Schicht entscheidet, ob sie den Frame verwirft.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::envelope::Envelope;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Fehlertyp
// ---------------------------------------------------------------------------

/// Fehler beim Kodieren oder Dekodieren von Frames
#[derive(Debug, Error)]
pub enum WireError {
    /// IO-Fehler beim Lesen oder Schreiben
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Frame ueberschreitet die konfigurierte Maximalgroesse
    #[error("Frame zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    FrameZuGross { groesse: usize, maximum: usize },

    /// JSON-Serialisierung oder -Deserialisierung fehlgeschlagen
    #[error("JSON-Verarbeitung fehlgeschlagen: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// Implementiert `Encoder<Envelope>` fuer die Server-zu-Client-Richtung und
/// `Decoder` mit rohem `Bytes`-Payload fuer die Gegenrichtung, fuer nahtlose
/// Integration mit `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        // Maximale Frame-Groesse pruefen
        if length > self.max_frame_size {
            return Err(WireError::FrameZuGross {
                groesse: length,
                maximum: self.max_frame_size,
            });
        }

        // Pruefen ob der vollstaendige Frame bereits im Buffer ist
        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            // Speicher vorbelegen um Reallocations zu vermeiden
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        // Laengen-Feld verbrauchen, Payload-Bytes extrahieren
        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(length).freeze();

        Ok(Some(payload))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<Envelope> for FrameCodec {
    type Error = WireError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // JSON serialisieren
        let json = serde_json::to_vec(&item)?;

        // Groesse pruefen
        if json.len() > self.max_frame_size {
            return Err(WireError::FrameZuGross {
                groesse: json.len(),
                maximum: self.max_frame_size,
            });
        }

        // Laengen-Feld + Payload schreiben
        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen fuer direktes async Lesen/Schreiben
// ---------------------------------------------------------------------------

/// Liest einen einzelnen Frame aus einem `AsyncRead` und deserialisiert ihn
///
/// Generisch ueber den Zieltyp: Clients lesen `Envelope`, Tests koennen
/// auch ein rohes `serde_json::Value` erwarten.
///
/// # Fehler
/// - `Io` mit `UnexpectedEof` wenn die Verbindung vor Abschluss des Frames
///   getrennt wird
/// - `FrameZuGross` bei ueberschrittenem Limit
/// - `Json` bei unparsbarem Payload
pub async fn read_frame<R, T>(reader: &mut R, max_frame_size: usize) -> Result<T, WireError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    // Laengen-Feld lesen
    let mut len_buf = [0u8; LENGTH_FIELD_SIZE];
    reader.read_exact(&mut len_buf).await?;
    let length = u32::from_be_bytes(len_buf) as usize;

    // Groesse pruefen
    if length > max_frame_size {
        return Err(WireError::FrameZuGross {
            groesse: length,
            maximum: max_frame_size,
        });
    }

    // Payload lesen und deserialisieren
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;

    Ok(serde_json::from_slice(&payload)?)
}

/// Serialisiert eine Nachricht und schreibt sie als einzelnen Frame
///
/// # Fehler
/// - `Json` wenn die Nachricht nicht serialisiert werden kann
/// - `FrameZuGross` bei ueberschrittenem Limit
/// - `Io` beim Schreiben
pub async fn write_frame<W, T>(
    writer: &mut W,
    nachricht: &T,
    max_frame_size: usize,
) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    // JSON serialisieren
    let json = serde_json::to_vec(nachricht)?;

    // Groesse pruefen
    if json.len() > max_frame_size {
        return Err(WireError::FrameZuGross {
            groesse: json.len(),
            maximum: max_frame_size,
        });
    }

    // Laengen-Feld + Payload schreiben
    let len_bytes = (json.len() as u32).to_be_bytes();
    writer.write_all(&len_bytes).await?;
    writer.write_all(&json).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
