//! Common test utilities and helper modules
//!
//! This module provides shared functionality for all test files,
//! including mock streams, port allocation and connection helpers.
