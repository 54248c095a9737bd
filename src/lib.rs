//! Core library surface for the lyric set organizer.
//!
//! Sets are ordered collections of songs (lyrics plus a color tag). The
//! persistence path is `db` (SQLite entity store) behind `repository` (whole
//! set writes), with `cache` as the local snapshot and `sync` for the bulk
//! import and migration flows. `library` is the client's ordered working
//! copy, and `ui` is the terminal front-end built on top of it.
pub mod autosave;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod library;
pub mod models;
pub mod ordering;
pub mod repository;
pub mod sync;
pub mod ui;

pub use db::{LegacyMigration, Store};
pub use error::{Error, Result};
pub use library::{Connectivity, Library, LoadOutcome};
pub use models::{Color, Set, SetOrder, Song};
pub use repository::{Repository, SetDraft, SetRepository, SongDraft};
pub use sync::BatchReport;

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
