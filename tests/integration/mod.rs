//! Integration tests for lanchat
//!
//! Real sockets on loopback with one or both ends driven by a
//! connection manager.

// Core connection tests
pub mod connection_core;

// Connection recovery tests
pub mod connection_recovery;



// Interactive client session tests
pub mod client_session;
