//! SQLite entity store, split across logical submodules. Everything outside
//! this module goes through [`Store`].

mod connection;
mod sets;
mod songs;

pub use connection::{LegacyMigration, Store};
