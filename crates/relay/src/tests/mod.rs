//! End-to-End-Tests fuer den Relay-Dienst
