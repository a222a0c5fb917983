//! Fehlertypen fuer den Relay-Dienst

use stammtisch_protocol::wire::WireError;
use thiserror::Error;

/// Fehlertyp fuer den Relay-Dienst
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Fehler im Drahtformat (Frame zu gross, unparsbares JSON)
    #[error("Drahtformat-Fehler: {0}")]
    Wire(#[from] WireError),
}

/// Result-Typ fuer den Relay-Dienst
pub type RelayResult<T> = Result<T, RelayError>;
