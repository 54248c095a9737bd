//! Ratatui front-end: a set list, a set editor, and a reader for performing.
//! All persistence goes through [`crate::library::Library`].

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
