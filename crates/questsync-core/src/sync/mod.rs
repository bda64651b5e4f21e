//! Synchronization of collection entry trees with the server.
//!
//! This module provides `SyncEngine`, which loads entry trees through
//! timestamped conditional fetches and applies structural edits only after
//! the server has accepted them.

pub mod engine;

pub use engine::SyncEngine;
