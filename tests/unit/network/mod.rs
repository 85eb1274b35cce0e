//! Network-related unit tests
//!
//! This module contains tests for timeouts, queues and manager settings.

pub mod settings;
