//! `sarar-journal` – The Activity Journal.
//!
//! Append-mostly record of everything the robot does, kept in a local SQLite
//! database so operators can reconstruct a failure chain after the fact.
//!
//! # Modules
//!
//! - [`journal`] – [`Journal`][journal::Journal]: conversation, movement,
//!   speech and free-text activity records with per-table rotation.

pub mod journal;

pub use journal::{
    ActivityEntry, ConversationRecord, Journal, JournalError, MovementRecord, SpeechRecord,
    DEFAULT_MAX_ENTRIES,
};
