use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use tracing::{info, warn};

use crate::autosave::QuietPeriod;
use crate::cache::{self, backup_file_name};
use crate::error::{Error, Result};
use crate::library::{Connectivity, Library, LoadOutcome};
use crate::models::{Set, Song};
use crate::ordering::DragSession;
use crate::repository::{Repository, SetDraft};

use super::forms::{
    ConfirmImport, ConfirmSetDelete, ConfirmSongRemove, LineForm, SongField, SongForm,
};
use super::helpers::{centered_rect, scroll_start, step_index, surface_error, tag_color};
use super::screens::{EditorScreen, ReaderScreen};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Height allocation per song card in the editor.
const SONG_CARD_HEIGHT: u16 = 4;
/// Rows moved by PageUp/PageDown in the reader.
const READER_PAGE: i32 = 10;

/// High-level navigation states.
enum Screen {
    Sets,
    Editor(EditorScreen),
    Reader(ReaderScreen),
}

/// Fine-grained modes scoped to the current screen.
enum Mode {
    Normal,
    CreatingSet(LineForm),
    /// Title edits save themselves once typing pauses.
    EditingTitle(LineForm),
    EditingSong {
        index: Option<usize>,
        form: SongForm,
    },
    ConfirmSetDelete(ConfirmSetDelete),
    ConfirmSongRemove(ConfirmSongRemove),
    ConfirmMigration {
        pending: usize,
    },
    Importing(LineForm),
    ConfirmImport(ConfirmImport),
    DraggingSets(DragSession<String>),
    DraggingSongs(DragSession<String>),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    library: Library<Repository>,
    selected: usize,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
    title_autosave: QuietPeriod,
}

impl App {
    /// Wrap a loaded library. `outcome` is what the initial load reported and
    /// decides the opening prompt or status line.
    pub fn new(library: Library<Repository>, outcome: LoadOutcome, autosave_quiet: Duration) -> Self {
        let mut app = Self {
            library,
            selected: 0,
            screen: Screen::Sets,
            mode: Mode::Normal,
            status: None,
            title_autosave: QuietPeriod::new(autosave_quiet),
        };
        app.apply_load_outcome(outcome);
        app
    }

    pub fn library(&self) -> &Library<Repository> {
        &self.library
    }

    pub fn into_library(self) -> Library<Repository> {
        self.library
    }

    /// Returns `true` when the user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::CreatingSet(form) => self.handle_create_set(code, form),
            Mode::EditingTitle(form) => self.handle_edit_title(code, form),
            Mode::EditingSong { index, form } => self.handle_song_form(code, index, form),
            Mode::ConfirmSetDelete(confirm) => self.handle_confirm_set_delete(code, confirm),
            Mode::ConfirmSongRemove(confirm) => self.handle_confirm_song_remove(code, confirm),
            Mode::ConfirmMigration { pending } => self.handle_confirm_migration(code, pending),
            Mode::Importing(form) => self.handle_import(code, form),
            Mode::ConfirmImport(confirm) => self.handle_confirm_import(code, confirm),
            Mode::DraggingSets(session) => self.handle_drag_sets(code, session),
            Mode::DraggingSongs(session) => self.handle_drag_songs(code, session),
        };

        exit
    }

    /// Ctrl+S: save the open song form from any field, or commit a title edit
    /// right away.
    pub(crate) fn handle_ctrl_s(&mut self) {
        let mode = mem::replace(&mut self.mode, Mode::Normal);
        self.mode = match mode {
            Mode::EditingSong { index, form } => self.submit_song(index, form),
            Mode::EditingTitle(form) => self.submit_title(form),
            other => other,
        };
    }

    /// Called every loop iteration; fires the title auto-save once the quiet
    /// period has elapsed.
    pub(crate) fn tick(&mut self, now: Instant) {
        let Mode::EditingTitle(form) = &self.mode else {
            return;
        };
        if !self.title_autosave.fire(now) {
            return;
        }
        let title = form.value.clone();
        if let Err(err) = self.save_title(&title) {
            let message = surface_error(&err);
            if let Mode::EditingTitle(form) = &mut self.mode {
                form.error = Some(message.clone());
            }
            self.set_status(message, StatusKind::Error);
        }
    }

    /// Write any title edit still waiting for its quiet period.
    pub(crate) fn flush_pending(&mut self) {
        if !self.title_autosave.is_pending() {
            return;
        }
        self.title_autosave.cancel();
        if let Mode::EditingTitle(form) = &self.mode {
            let title = form.value.clone();
            if let Err(err) = self.save_title(&title) {
                warn!(error = %err, "dropping unsaved title edit on exit");
            }
        }
    }

    fn apply_load_outcome(&mut self, outcome: LoadOutcome) {
        match outcome {
            LoadOutcome::Loaded { sets } => {
                self.set_status(format!("Loaded {sets} sets."), StatusKind::Info)
            }
            LoadOutcome::MigrationAvailable { pending } => {
                self.clear_status();
                self.mode = Mode::ConfirmMigration { pending };
            }
            LoadOutcome::Offline { cached } => self.set_status(
                format!("Offline: showing {cached} sets from the local snapshot. Press r to retry."),
                StatusKind::Error,
            ),
        }
        self.ensure_selection();
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Mode {
        match self.screen {
            Screen::Sets => self.handle_sets_key(code, exit),
            Screen::Editor(_) => self.handle_editor_key(code, exit),
            Screen::Reader(_) => self.handle_reader_key(code, exit),
        }
    }

    fn handle_sets_key(&mut self, code: KeyCode, exit: &mut bool) -> Mode {
        let len = self.library.sets().len();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => *exit = true,
            KeyCode::Up => self.selected = step_index(self.selected, -1, len),
            KeyCode::Down => self.selected = step_index(self.selected, 1, len),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = len.saturating_sub(1),
            KeyCode::Enter => match self.current_set() {
                Some(set) => {
                    self.screen = Screen::Reader(ReaderScreen::new(set.id.clone()));
                    self.clear_status();
                }
                None => self.set_status("No set selected.", StatusKind::Error),
            },
            KeyCode::Char('e') | KeyCode::Char('E') => match self.current_set() {
                Some(set) => {
                    self.screen = Screen::Editor(EditorScreen::new(set.id.clone()));
                    self.clear_status();
                }
                None => self.set_status("No set selected to edit.", StatusKind::Error),
            },
            KeyCode::Char('+') => {
                self.clear_status();
                return Mode::CreatingSet(LineForm::default());
            }
            KeyCode::Char('-') => match self.current_set() {
                Some(set) => return Mode::ConfirmSetDelete(ConfirmSetDelete::from(set)),
                None => self.set_status("No set selected to remove.", StatusKind::Error),
            },
            KeyCode::Char('m') | KeyCode::Char('M') => {
                let ids: Vec<String> = self.library.sets().iter().map(|set| set.id.clone()).collect();
                if let Some(session) = DragSession::grab(&ids, self.selected) {
                    self.set_status("Moving set: arrows to move, Enter to drop, Esc to cancel.", StatusKind::Info);
                    return Mode::DraggingSets(session);
                }
                self.set_status("No set selected to move.", StatusKind::Error);
            }
            KeyCode::Char('w') | KeyCode::Char('W') => self.save_set_order(),
            KeyCode::Char('x') | KeyCode::Char('X') => self.export_backup(),
            KeyCode::Char('i') | KeyCode::Char('I') => {
                self.clear_status();
                return Mode::Importing(LineForm::default());
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                let outcome = self.library.load();
                self.apply_load_outcome(outcome);
                return mem::replace(&mut self.mode, Mode::Normal);
            }
            _ => {}
        }
        Mode::Normal
    }

    fn handle_editor_key(&mut self, code: KeyCode, exit: &mut bool) -> Mode {
        let Some((set, selected)) = self.editor_set() else {
            self.leave_to_sets();
            return Mode::Normal;
        };
        let set_id = set.id.clone();
        let len = set.songs.len();
        let current = set.songs.get(selected).cloned();
        let title = set.title.clone();

        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                self.clear_status();
                self.leave_to_sets();
            }
            KeyCode::Up => self.with_editor(|editor| editor.move_selection(-1, len)),
            KeyCode::Down => self.with_editor(|editor| editor.move_selection(1, len)),
            KeyCode::Home => self.with_editor(|editor| editor.selected = 0),
            KeyCode::End => self.with_editor(|editor| editor.selected = len.saturating_sub(1)),
            KeyCode::Char('t') | KeyCode::Char('T') => {
                self.clear_status();
                self.title_autosave.cancel();
                return Mode::EditingTitle(LineForm::with_value(title));
            }
            KeyCode::Char('+') => {
                self.clear_status();
                return Mode::EditingSong {
                    index: None,
                    form: SongForm::default(),
                };
            }
            KeyCode::Enter | KeyCode::Char('e') | KeyCode::Char('E') => match current {
                Some(song) => {
                    return Mode::EditingSong {
                        index: Some(selected),
                        form: SongForm::from_song(&song),
                    }
                }
                None => self.set_status("No song selected to edit.", StatusKind::Error),
            },
            KeyCode::Char('-') => match current {
                Some(song) => {
                    return Mode::ConfirmSongRemove(ConfirmSongRemove {
                        index: selected,
                        title: song.title,
                    })
                }
                None => self.set_status("No song selected to remove.", StatusKind::Error),
            },
            KeyCode::Char('m') | KeyCode::Char('M') => {
                let ids: Vec<String> = self
                    .library
                    .set(&set_id)
                    .map(|set| set.songs.iter().map(|song| song.id.clone()).collect())
                    .unwrap_or_default();
                if let Some(session) = DragSession::grab(&ids, selected) {
                    self.set_status("Moving song: arrows to move, Enter to drop, Esc to cancel.", StatusKind::Info);
                    return Mode::DraggingSongs(session);
                }
                self.set_status("No song selected to move.", StatusKind::Error);
            }
            KeyCode::Char('p') | KeyCode::Char('P') => {
                let mut reader = ReaderScreen::new(set_id);
                if let Some(set) = self.library.set(&reader.set_id) {
                    reader.open_song(set, selected);
                }
                self.clear_status();
                self.screen = Screen::Reader(reader);
            }
            _ => {}
        }
        Mode::Normal
    }

    fn handle_reader_key(&mut self, code: KeyCode, exit: &mut bool) -> Mode {
        let Screen::Reader(reader) = &mut self.screen else {
            return Mode::Normal;
        };
        let Some(set) = self.library.set(&reader.set_id) else {
            self.leave_to_sets();
            return Mode::Normal;
        };

        if reader.song.is_some() {
            match code {
                KeyCode::Char('q') => *exit = true,
                KeyCode::Esc => reader.close_song(),
                KeyCode::Left | KeyCode::Char('p') => {
                    reader.turn_page(set, -1);
                }
                KeyCode::Right | KeyCode::Char('n') | KeyCode::Char(' ') => {
                    reader.turn_page(set, 1);
                }
                KeyCode::Up => reader.scroll_by(-1),
                KeyCode::Down => reader.scroll_by(1),
                KeyCode::PageUp => reader.scroll_by(-READER_PAGE),
                KeyCode::PageDown => reader.scroll_by(READER_PAGE),
                _ => {}
            }
            return Mode::Normal;
        }

        let len = set.songs.len();
        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                self.leave_to_sets();
            }
            KeyCode::Up => reader.selected = step_index(reader.selected, -1, len),
            KeyCode::Down => reader.selected = step_index(reader.selected, 1, len),
            KeyCode::Enter | KeyCode::Right => {
                let index = reader.selected;
                if !reader.open_song(set, index) {
                    self.set_status("This set has no songs yet.", StatusKind::Error);
                }
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                let mut editor = EditorScreen::new(set.id.clone());
                editor.selected = reader.selected;
                self.screen = Screen::Editor(editor);
            }
            _ => {}
        }
        Mode::Normal
    }

    fn handle_create_set(&mut self, code: KeyCode, mut form: LineForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("New set cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Backspace => {
                form.backspace();
            }
            KeyCode::Enter => {
                let created = self
                    .library
                    .create_set(SetDraft::new(form.value.clone(), Vec::new()))
                    .map(|set| (set.id.clone(), set.title.clone()));
                match created {
                    Ok((id, title)) => {
                        let message = format!("Created set '{title}'.");
                        self.selected = 0;
                        self.screen = Screen::Editor(EditorScreen::new(id));
                        self.set_status(message, StatusKind::Info);
                        return Mode::Normal;
                    }
                    Err(err) => {
                        let message = surface_error(&err);
                        form.error = Some(message.clone());
                        self.set_status(message, StatusKind::Error);
                    }
                }
            }
            KeyCode::Char(ch) => {
                form.push_char(ch);
            }
            _ => {}
        }
        Mode::CreatingSet(form)
    }

    fn handle_edit_title(&mut self, code: KeyCode, mut form: LineForm) -> Mode {
        match code {
            KeyCode::Esc => {
                let discarded = self.title_autosave.is_pending();
                self.title_autosave.cancel();
                if discarded {
                    self.set_status("Unsaved title change discarded.", StatusKind::Info);
                }
                return Mode::Normal;
            }
            KeyCode::Enter => return self.submit_title(form),
            KeyCode::Backspace => {
                if form.backspace() {
                    self.title_autosave.touch(Instant::now());
                }
            }
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    self.title_autosave.touch(Instant::now());
                }
            }
            _ => {}
        }
        Mode::EditingTitle(form)
    }

    fn submit_title(&mut self, mut form: LineForm) -> Mode {
        self.title_autosave.cancel();
        match self.save_title(&form.value) {
            Ok(()) => {
                self.set_status("Title saved.", StatusKind::Info);
                Mode::Normal
            }
            Err(err) => {
                let message = surface_error(&err);
                form.error = Some(message.clone());
                self.set_status(message, StatusKind::Error);
                Mode::EditingTitle(form)
            }
        }
    }

    fn handle_song_form(&mut self, code: KeyCode, index: Option<usize>, mut form: SongForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Song edit cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab => form.toggle_field(),
            KeyCode::BackTab => form.toggle_field_back(),
            KeyCode::Left => form.cycle_color(-1),
            KeyCode::Right => form.cycle_color(1),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => {
                if form.active == SongField::Lyrics {
                    form.newline();
                } else {
                    return self.submit_song(index, form);
                }
            }
            KeyCode::Char(ch) => {
                form.push_char(ch);
            }
            _ => {}
        }
        Mode::EditingSong { index, form }
    }

    fn submit_song(&mut self, index: Option<usize>, mut form: SongForm) -> Mode {
        match self.save_song(index, &form) {
            Ok(selected) => {
                self.with_editor(|editor| editor.selected = selected);
                let verb = if index.is_some() { "Updated" } else { "Added" };
                self.set_status(format!("{verb} '{}'.", form.title.trim()), StatusKind::Info);
                Mode::Normal
            }
            Err(err) => {
                let message = surface_error(&err);
                form.error = Some(message.clone());
                self.set_status(message, StatusKind::Error);
                Mode::EditingSong { index, form }
            }
        }
    }

    fn handle_confirm_set_delete(&mut self, code: KeyCode, confirm: ConfirmSetDelete) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Mode::Normal
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.library.delete_set(&confirm.id) {
                    Ok(()) => {
                        self.screen = Screen::Sets;
                        self.ensure_selection();
                        self.set_status(format!("Deleted set '{}'.", confirm.title), StatusKind::Info);
                        Mode::Normal
                    }
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Mode::Normal
                    }
                }
            }
            _ => Mode::ConfirmSetDelete(confirm),
        }
    }

    fn handle_confirm_song_remove(&mut self, code: KeyCode, confirm: ConfirmSongRemove) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Removal cancelled.", StatusKind::Info);
                Mode::Normal
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.remove_song(confirm.index) {
                    Ok(remaining) => {
                        self.with_editor(|editor| editor.ensure_in_bounds(remaining));
                        self.set_status(format!("Removed '{}'.", confirm.title), StatusKind::Info);
                    }
                    Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
                }
                Mode::Normal
            }
            _ => Mode::ConfirmSongRemove(confirm),
        }
    }

    fn handle_confirm_migration(&mut self, code: KeyCode, pending: usize) -> Mode {
        match code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.library.migrate_local() {
                    Ok(report) if report.is_clean() => self.set_status(
                        format!("Moved {} local sets into the store.", report.succeeded),
                        StatusKind::Info,
                    ),
                    Ok(report) => self.set_status(
                        format!(
                            "Moved {} of {} local sets; {} failed and stay in the local file.",
                            report.succeeded,
                            report.total(),
                            report.failed
                        ),
                        StatusKind::Error,
                    ),
                    Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
                }
                self.ensure_selection();
                Mode::Normal
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                info!(pending, "local migration declined");
                self.set_status("Local sets left untouched.", StatusKind::Info);
                Mode::Normal
            }
            _ => Mode::ConfirmMigration { pending },
        }
    }

    fn handle_import(&mut self, code: KeyCode, mut form: LineForm) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Import cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Backspace => {
                form.backspace();
            }
            KeyCode::Enter => match read_backup(Path::new(form.value.trim())) {
                Ok(confirm) => return Mode::ConfirmImport(confirm),
                Err(message) => {
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                form.push_char(ch);
            }
            _ => {}
        }
        Mode::Importing(form)
    }

    fn handle_confirm_import(&mut self, code: KeyCode, confirm: ConfirmImport) -> Mode {
        match code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.import_backup(&confirm.payload) {
                    Ok(message) => self.set_status(message, StatusKind::Info),
                    Err(message) => self.set_status(message, StatusKind::Error),
                }
                Mode::Normal
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Import cancelled.", StatusKind::Info);
                Mode::Normal
            }
            _ => Mode::ConfirmImport(confirm),
        }
    }

    fn handle_drag_sets(&mut self, code: KeyCode, mut session: DragSession<String>) -> Mode {
        match code {
            KeyCode::Up => {
                session.step(-1);
            }
            KeyCode::Down => {
                session.step(1);
            }
            KeyCode::Home => {
                session.hover(0);
            }
            KeyCode::End => {
                session.hover(usize::MAX);
            }
            KeyCode::Esc => {
                self.selected = session.origin();
                session.cancel();
                self.set_status("Move cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Enter => {
                self.selected = session.current();
                if !session.is_moved() {
                    self.clear_status();
                    return Mode::Normal;
                }
                let order = session.finish();
                match self.library.reorder_sets(&order) {
                    Ok(()) => self.save_set_order(),
                    Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
                }
                return Mode::Normal;
            }
            _ => {}
        }
        Mode::DraggingSets(session)
    }

    fn handle_drag_songs(&mut self, code: KeyCode, mut session: DragSession<String>) -> Mode {
        match code {
            KeyCode::Up => {
                session.step(-1);
            }
            KeyCode::Down => {
                session.step(1);
            }
            KeyCode::Home => {
                session.hover(0);
            }
            KeyCode::End => {
                session.hover(usize::MAX);
            }
            KeyCode::Esc => {
                let origin = session.origin();
                session.cancel();
                self.with_editor(|editor| editor.selected = origin);
                self.set_status("Move cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Enter => {
                let (origin, current) = (session.origin(), session.current());
                if !session.is_moved() {
                    self.clear_status();
                    return Mode::Normal;
                }
                let Some((set, _)) = self.editor_set() else {
                    return Mode::Normal;
                };
                let set_id = set.id.clone();
                let order = session.finish();
                let saved = self
                    .library
                    .reorder_songs_within_set(&set_id, &order)
                    .map(|_| ());
                match saved {
                    Ok(()) => {
                        self.with_editor(|editor| editor.selected = current);
                        self.set_status("Song order saved.", StatusKind::Info);
                    }
                    Err(err) => {
                        self.with_editor(|editor| editor.selected = origin);
                        self.set_status(surface_error(&err), StatusKind::Error);
                    }
                }
                return Mode::Normal;
            }
            _ => {}
        }
        Mode::DraggingSongs(session)
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Sets => self.draw_set_list(frame, content_area),
            Screen::Editor(editor) => self.draw_editor(frame, content_area, editor),
            Screen::Reader(reader) => self.draw_reader(frame, content_area, reader),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::CreatingSet(form) => self.draw_line_form(frame, area, "New Set", "Title", form),
            Mode::Importing(form) => {
                self.draw_line_form(frame, area, "Import Backup", "File", form)
            }
            Mode::EditingSong { index, form } => {
                let title = if index.is_some() { "Edit Song" } else { "Add Song" };
                self.draw_song_form(frame, area, title, form)
            }
            Mode::ConfirmSetDelete(confirm) => self.draw_confirm(
                frame,
                area,
                "Confirm Removal",
                vec![
                    Line::from(format!("Delete set '{}'?", confirm.title)),
                    Line::from(format!("Its {} songs are deleted with it.", confirm.songs)),
                ],
            ),
            Mode::ConfirmSongRemove(confirm) => self.draw_confirm(
                frame,
                area,
                "Remove Song",
                vec![Line::from(format!("Remove '{}' from this set?", confirm.title))],
            ),
            Mode::ConfirmMigration { pending } => self.draw_confirm(
                frame,
                area,
                "Local Sets Found",
                vec![
                    Line::from(format!(
                        "The store is empty, but {} holds {pending} sets.",
                        self.library.cache().path().display()
                    )),
                    Line::from("Copy them into the store now?"),
                ],
            ),
            Mode::ConfirmImport(confirm) => self.draw_confirm(
                frame,
                area,
                "Import Backup",
                vec![
                    Line::from(format!(
                        "Import {} sets from {}?",
                        confirm.items,
                        confirm.path.display()
                    )),
                    Line::from(format!(
                        "They are added to your existing {} sets.",
                        self.library.sets().len()
                    )),
                ],
            ),
            Mode::Normal
            | Mode::EditingTitle(_)
            | Mode::DraggingSets(_)
            | Mode::DraggingSongs(_) => {}
        }
    }

    fn draw_set_list(&self, frame: &mut Frame, area: Rect) {
        let mut title = format!("Sets ({})", self.library.sets().len());
        if self.library.connectivity() == Connectivity::Offline {
            title.push_str(" • offline");
        }
        if self.library.set_order_dirty() {
            title.push_str(" • order not saved");
        }
        let block = Block::default().borders(Borders::ALL).title(title);

        if self.library.sets().is_empty() {
            let message = Paragraph::new("No sets yet. Press '+' to add one.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let (sets, selected, grabbed): (Vec<&Set>, usize, bool) = match &self.mode {
            Mode::DraggingSets(session) => (
                session
                    .preview()
                    .iter()
                    .filter_map(|id| self.library.set(id))
                    .collect(),
                session.current(),
                true,
            ),
            _ => (self.library.sets().iter().collect(), self.selected, false),
        };

        let items: Vec<ListItem> = sets
            .iter()
            .map(|set| {
                let count = match set.songs.len() {
                    1 => "1 song".to_string(),
                    n => format!("{n} songs"),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(set.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
                    Span::styled(format!("  {count}"), Style::default().fg(Color::Gray)),
                ]))
            })
            .collect();

        let highlight = if grabbed {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Yellow)
        };
        let list = List::new(items)
            .block(block)
            .highlight_style(highlight)
            .highlight_symbol(if grabbed { "≡ " } else { "▶ " });

        let mut list_state = ListState::default();
        list_state.select(Some(selected));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_editor(&self, frame: &mut Frame, area: Rect, editor: &EditorScreen) {
        let Some(set) = self.library.set(&editor.set_id) else {
            return;
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(1)])
            .split(area);

        let title_line = match &self.mode {
            Mode::EditingTitle(form) => {
                let mut spans = form.build_line("Title").spans;
                if self.title_autosave.is_pending() {
                    spans.push(Span::styled("  (unsaved)", Style::default().fg(Color::DarkGray)));
                }
                if let Some(error) = &form.error {
                    spans.push(Span::styled(format!("  {error}"), Style::default().fg(Color::Red)));
                }
                Line::from(spans)
            }
            _ => Line::from(vec![
                Span::styled(set.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(
                    format!("  •  {} songs", set.songs.len()),
                    Style::default().fg(Color::Gray),
                ),
            ]),
        };
        let header = Paragraph::new(title_line)
            .block(Block::default().borders(Borders::ALL).title("Edit Set"));
        frame.render_widget(header, chunks[0]);

        if let Mode::EditingTitle(form) = &self.mode {
            let inner = Block::default().borders(Borders::ALL).inner(chunks[0]);
            frame.set_cursor_position((
                inner.x + "Title: ".len() as u16 + form.value_len() as u16,
                inner.y,
            ));
        }

        if set.songs.is_empty() {
            let message = Paragraph::new("No songs yet. Press '+' to add one.")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(message, chunks[1]);
            return;
        }

        let (songs, selected, grabbed): (Vec<&Song>, usize, bool) = match &self.mode {
            Mode::DraggingSongs(session) => (
                session
                    .preview()
                    .iter()
                    .filter_map(|id| set.songs.iter().find(|song| &song.id == id))
                    .collect(),
                session.current(),
                true,
            ),
            _ => (set.songs.iter().collect(), editor.selected, false),
        };
        self.render_song_cards(frame, chunks[1], &songs, selected, grabbed);
    }

    fn render_song_cards(
        &self,
        frame: &mut Frame,
        area: Rect,
        songs: &[&Song],
        selected: usize,
        grabbed: bool,
    ) {
        if songs.is_empty() || area.height == 0 {
            return;
        }

        let capacity = ((area.height / SONG_CARD_HEIGHT) as usize).max(1);
        let start = scroll_start(selected, capacity, songs.len());
        let visible = &songs[start..songs.len().min(start + capacity)];

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(SONG_CARD_HEIGHT); visible.len()])
            .split(area);

        for (offset, (song, chunk)) in visible.iter().zip(rows.iter()).enumerate() {
            let index = start + offset;
            let is_selected = index == selected;

            let mut block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(tag_color(song.color)))
                .title((index + 1).to_string());
            if is_selected && grabbed {
                block = block.border_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
            } else if is_selected {
                block = block.border_style(Style::default().fg(Color::Yellow));
            }

            let marker = match (is_selected, grabbed) {
                (true, true) => "≡ ",
                (true, false) => "▶ ",
                _ => "",
            };
            let first_line = song.lyrics.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
            let lines = vec![
                Line::from(vec![
                    Span::styled(
                        format!("{marker}{}", song.title),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("  [{}]", song.color), Style::default().fg(tag_color(song.color))),
                ]),
                Line::from(Span::styled(first_line.to_string(), Style::default().fg(Color::Gray))),
            ];

            let paragraph = Paragraph::new(lines)
                .block(block)
                .wrap(Wrap { trim: true })
                .alignment(Alignment::Left);
            frame.render_widget(paragraph, *chunk);
        }
    }

    fn draw_reader(&self, frame: &mut Frame, area: Rect, reader: &ReaderScreen) {
        let Some(set) = self.library.set(&reader.set_id) else {
            return;
        };

        if let Some(song) = reader.song.and_then(|index| set.songs.get(index)) {
            let position = reader.song.unwrap_or_default() + 1;
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(tag_color(song.color)))
                .title(format!("{}  •  {position}/{}  •  {}", set.title, set.songs.len(), song.title));
            let body = if song.lyrics.trim().is_empty() {
                Paragraph::new(Span::styled("(no lyrics)", Style::default().fg(Color::DarkGray)))
            } else {
                Paragraph::new(song.lyrics.clone())
            };
            frame.render_widget(
                body.block(block)
                    .wrap(Wrap { trim: false })
                    .scroll((reader.scroll, 0)),
                area,
            );
            return;
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{}  •  {} songs", set.title, set.songs.len()));
        if set.songs.is_empty() {
            let message = Paragraph::new("This set has no songs yet.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let items: Vec<ListItem> = set
            .songs
            .iter()
            .enumerate()
            .map(|(index, song)| {
                ListItem::new(Line::from(vec![
                    Span::styled("● ", Style::default().fg(tag_color(song.color))),
                    Span::raw(format!("{}. {}", index + 1, song.title)),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");
        let mut list_state = ListState::default();
        list_state.select(Some(reader.selected));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let keys: &[(&str, &str)] = match (&self.screen, &self.mode) {
            (_, Mode::DraggingSets(_)) | (_, Mode::DraggingSongs(_)) => {
                &[("[↑↓]", "Move"), ("[Enter]", "Drop"), ("[Esc]", "Cancel")]
            }
            (_, Mode::EditingTitle(_)) => &[("[Enter]", "Save"), ("[Esc]", "Discard unsaved")],
            (_, Mode::EditingSong { .. }) => &[
                ("[Tab]", "Next field"),
                ("[←→]", "Color"),
                ("[Ctrl+S]", "Save"),
                ("[Esc]", "Cancel"),
            ],
            (_, Mode::CreatingSet(_)) | (_, Mode::Importing(_)) => {
                &[("[Enter]", "Confirm"), ("[Esc]", "Cancel")]
            }
            (_, Mode::ConfirmSetDelete(_))
            | (_, Mode::ConfirmSongRemove(_))
            | (_, Mode::ConfirmMigration { .. })
            | (_, Mode::ConfirmImport(_)) => &[("[y]", "Yes"), ("[n]", "No")],
            (Screen::Sets, Mode::Normal) => &[
                ("[Enter]", "Read"),
                ("[e]", "Edit"),
                ("[+]", "Add"),
                ("[-]", "Delete"),
                ("[m]", "Move"),
                ("[w]", "Save order"),
                ("[x]", "Export"),
                ("[i]", "Import"),
                ("[r]", "Reload"),
                ("[q]", "Quit"),
            ],
            (Screen::Editor(_), Mode::Normal) => &[
                ("[t]", "Title"),
                ("[+]", "Add song"),
                ("[e]", "Edit song"),
                ("[-]", "Remove"),
                ("[m]", "Move"),
                ("[p]", "Perform"),
                ("[Esc]", "Back"),
            ],
            (Screen::Reader(reader), Mode::Normal) if reader.song.is_some() => &[
                ("[←→]", "Prev/next song"),
                ("[↑↓]", "Scroll"),
                ("[Esc]", "Song list"),
            ],
            (Screen::Reader(_), Mode::Normal) => {
                &[("[Enter]", "Open"), ("[e]", "Edit"), ("[Esc]", "Back")]
            }
        };

        let mut spans = Vec::with_capacity(keys.len() * 2);
        for (key, label) in keys {
            spans.push(Span::styled(key.to_string(), key_style));
            spans.push(Span::raw(format!(" {label}   ")));
        }
        Line::from(spans)
    }

    fn draw_line_form(&self, frame: &mut Frame, area: Rect, title: &str, field: &str, form: &LineForm) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![form.build_line(field), Line::from("")];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to confirm • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
        frame.set_cursor_position((
            inner.x + format!("{field}: ").len() as u16 + form.value_len() as u16,
            inner.y,
        ));
    }

    fn draw_song_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &SongForm) {
        let popup_area = centered_rect(70, 70, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = form.build_lines();
        lines.push(Line::from(""));
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
        } else {
            lines.push(Line::from(Span::styled(
                "Ctrl+S to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        frame.render_widget(Paragraph::new(lines), inner);
        let (column, row) = form.cursor();
        if row < inner.height {
            frame.set_cursor_position((inner.x + column, inner.y + row));
        }
    }

    fn draw_confirm(&self, frame: &mut Frame, area: Rect, title: &str, mut lines: Vec<Line<'static>>) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press Y to confirm or N / Esc to cancel.",
            Style::default().fg(Color::Gray),
        )));
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn current_set(&self) -> Option<&Set> {
        self.library.sets().get(self.selected)
    }

    fn ensure_selection(&mut self) {
        let len = self.library.sets().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    fn editor_set(&self) -> Option<(&Set, usize)> {
        let Screen::Editor(editor) = &self.screen else {
            return None;
        };
        self.library
            .set(&editor.set_id)
            .map(|set| (set, editor.selected))
    }

    fn with_editor(&mut self, f: impl FnOnce(&mut EditorScreen)) {
        if let Screen::Editor(editor) = &mut self.screen {
            f(editor);
        }
    }

    /// Return to the set list with the cursor on the set that was open.
    fn leave_to_sets(&mut self) {
        let open = match &self.screen {
            Screen::Editor(editor) => Some(editor.set_id.clone()),
            Screen::Reader(reader) => Some(reader.set_id.clone()),
            Screen::Sets => None,
        };
        if let Some(index) = open.and_then(|id| self.library.position_of(&id)) {
            self.selected = index;
        }
        self.screen = Screen::Sets;
        self.ensure_selection();
    }

    fn save_title(&mut self, title: &str) -> Result<()> {
        let Some((set, _)) = self.editor_set() else {
            return Ok(());
        };
        if set.title == title.trim() {
            return Ok(());
        }
        let set_id = set.id.clone();
        let mut draft = SetDraft::from(set);
        draft.title = title.to_string();
        self.library.save_set(&set_id, draft)?;
        Ok(())
    }

    /// Replace or append one song and persist the whole set. Returns the index
    /// the song ended up at.
    fn save_song(&mut self, index: Option<usize>, form: &SongForm) -> Result<usize> {
        let (set, _) = self.editor_set().ok_or_else(|| Error::validation("No set is open."))?;
        let set_id = set.id.clone();
        let mut draft = SetDraft::from(set);
        let slot = match index {
            Some(index) => {
                let song = draft
                    .songs
                    .get_mut(index)
                    .ok_or_else(|| Error::validation("That song is no longer in the set."))?;
                *song = form.to_draft();
                index
            }
            None => {
                draft.songs.push(form.to_draft());
                draft.songs.len() - 1
            }
        };
        self.library.save_set(&set_id, draft)?;
        Ok(slot)
    }

    /// Drop one song and persist the set. Returns how many songs remain.
    fn remove_song(&mut self, index: usize) -> Result<usize> {
        let (set, _) = self.editor_set().ok_or_else(|| Error::validation("No set is open."))?;
        let set_id = set.id.clone();
        let mut draft = SetDraft::from(set);
        if index >= draft.songs.len() {
            return Err(Error::validation("That song is no longer in the set."));
        }
        draft.songs.remove(index);
        let remaining = draft.songs.len();
        self.library.save_set(&set_id, draft)?;
        Ok(remaining)
    }

    fn save_set_order(&mut self) {
        if !self.library.set_order_dirty() {
            self.set_status("Set order is already saved.", StatusKind::Info);
            return;
        }
        match self.library.persist_set_order() {
            Ok(()) => self.set_status("Set order saved.", StatusKind::Info),
            Err(err) => self.set_status(
                format!("Order kept on screen only: {}", surface_error(&err)),
                StatusKind::Error,
            ),
        }
    }

    fn export_backup(&mut self) {
        let dir = self
            .library
            .cache()
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let path = dir.join(backup_file_name(Local::now().date_naive()));

        let outcome = self
            .library
            .export_payload()
            .map_err(|err| surface_error(&err))
            .and_then(|payload| fs::write(&path, payload).map_err(|err| err.to_string()));
        match outcome {
            Ok(()) => {
                info!(path = %path.display(), sets = self.library.sets().len(), "exported backup");
                self.set_status(
                    format!("Exported {} sets to {}.", self.library.sets().len(), path.display()),
                    StatusKind::Info,
                );
            }
            Err(message) => self.set_status(
                format!("Export failed: {message}"),
                StatusKind::Error,
            ),
        }
    }

    /// Import a payload the user already confirmed. Footer text either way.
    fn import_backup(&mut self, payload: &str) -> std::result::Result<String, String> {
        let report = self
            .library
            .import_payload(payload)
            .map_err(|err| surface_error(&err))?;
        self.ensure_selection();
        if report.is_clean() {
            Ok(format!("Imported {} sets.", report.succeeded))
        } else {
            Err(format!(
                "Imported {} sets; {} failed.",
                report.succeeded, report.failed
            ))
        }
    }
}

/// Read a backup file and count its items so the user can confirm the
/// import. Nothing is written here.
fn read_backup(path: &Path) -> std::result::Result<ConfirmImport, String> {
    if path.as_os_str().is_empty() {
        return Err("Enter the path of a backup file.".to_string());
    }
    let payload = fs::read_to_string(path)
        .map_err(|err| format!("Could not read {}: {err}", path.display()))?;
    let items = cache::decode_items(&payload)
        .map_err(|err| surface_error(&err))?
        .len();
    Ok(ConfirmImport {
        path: path.to_path_buf(),
        payload,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use crate::db::Store;
    use crate::models::SetOrder;
    use crate::repository::{SetRepository, SongDraft};
    use tempfile::TempDir;

    const QUIET: Duration = Duration::from_secs(5);

    fn library(dir: &TempDir) -> Library<Repository> {
        let store = Store::open_in_memory().unwrap();
        let cache = LocalCache::new(dir.path().join("music-sets.json"));
        Library::new(Repository::new(store), cache, SetOrder::Position)
    }

    fn app_with(mut library: Library<Repository>) -> App {
        let outcome = library.load();
        App::new(library, outcome, QUIET)
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch));
        }
    }

    fn titles(app: &App) -> Vec<String> {
        app.library().sets().iter().map(|set| set.title.clone()).collect()
    }

    #[test]
    fn new_set_opens_in_editor() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(library(&dir));

        app.handle_key(KeyCode::Char('+'));
        type_text(&mut app, "Friday Gig");
        app.handle_key(KeyCode::Enter);

        assert_eq!(titles(&app), vec!["Friday Gig"]);
        assert!(matches!(app.screen, Screen::Editor(_)));

        app.handle_key(KeyCode::Char('+'));
        type_text(&mut app, "Opener");
        app.handle_key(KeyCode::Tab);
        type_text(&mut app, "la la");
        app.handle_key(KeyCode::Enter);
        type_text(&mut app, "la");
        app.handle_ctrl_s();

        let set = &app.library().sets()[0];
        assert_eq!(set.songs.len(), 1);
        assert_eq!(set.songs[0].lyrics, "la la\nla");
    }

    #[test]
    fn blank_set_title_keeps_form_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(library(&dir));

        app.handle_key(KeyCode::Char('+'));
        app.handle_key(KeyCode::Enter);

        match &app.mode {
            Mode::CreatingSet(form) => {
                assert_eq!(form.error.as_deref(), Some("Set title is required."))
            }
            _ => panic!("form should stay open"),
        }
        assert!(app.library().sets().is_empty());
    }

    #[test]
    fn title_saves_after_quiet_period() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library(&dir);
        library.load();
        library.create_set(SetDraft::new("Old", Vec::new())).unwrap();
        let mut app = app_with(library);

        app.handle_key(KeyCode::Char('e'));
        app.handle_key(KeyCode::Char('t'));
        type_text(&mut app, " Name");

        app.tick(Instant::now());
        assert_eq!(titles(&app), vec!["Old"]);

        app.tick(Instant::now() + Duration::from_secs(60));
        assert_eq!(titles(&app), vec!["Old Name"]);
        assert!(matches!(app.mode, Mode::EditingTitle(_)));
    }

    #[test]
    fn escape_discards_pending_title() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library(&dir);
        library.load();
        library.create_set(SetDraft::new("Keep", Vec::new())).unwrap();
        let mut app = app_with(library);

        app.handle_key(KeyCode::Char('e'));
        app.handle_key(KeyCode::Char('t'));
        type_text(&mut app, "!!!");
        app.handle_key(KeyCode::Esc);
        app.tick(Instant::now() + Duration::from_secs(60));

        assert_eq!(titles(&app), vec!["Keep"]);
    }

    #[test]
    fn dragging_a_set_persists_the_new_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library(&dir);
        library.load();
        for title in ["A", "B", "C"] {
            library.create_set(SetDraft::new(title, Vec::new())).unwrap();
        }
        let mut app = app_with(library);
        assert_eq!(titles(&app), vec!["C", "B", "A"]);

        app.handle_key(KeyCode::Char('m'));
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Down);
        assert_eq!(titles(&app), vec!["C", "B", "A"]);
        app.handle_key(KeyCode::Enter);

        assert_eq!(titles(&app), vec!["B", "A", "C"]);
        assert_eq!(app.selected, 2);
        assert!(!app.library().set_order_dirty());

        let stored: Vec<String> = app
            .library()
            .repository()
            .unwrap()
            .list_sets(SetOrder::Position)
            .unwrap()
            .into_iter()
            .map(|set| set.title)
            .collect();
        assert_eq!(stored, vec!["B", "A", "C"]);
    }

    #[test]
    fn cancelled_drag_restores_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library(&dir);
        library.load();
        for title in ["A", "B"] {
            library.create_set(SetDraft::new(title, Vec::new())).unwrap();
        }
        let mut app = app_with(library);

        app.handle_key(KeyCode::Char('m'));
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Esc);

        assert_eq!(titles(&app), vec!["B", "A"]);
        assert_eq!(app.selected, 0);
        assert!(!app.library().set_order_dirty());
    }

    #[test]
    fn dragging_a_song_rewrites_the_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = library(&dir);
        library.load();
        library
            .create_set(SetDraft::new(
                "Set",
                vec![SongDraft::new("One"), SongDraft::new("Two"), SongDraft::new("Three")],
            ))
            .unwrap();
        let mut app = app_with(library);

        app.handle_key(KeyCode::Char('e'));
        app.handle_key(KeyCode::End);
        app.handle_key(KeyCode::Char('m'));
        app.handle_key(KeyCode::Home);
        app.handle_key(KeyCode::Enter);

        let set = app.library().repository().unwrap().list_sets(SetOrder::Position).unwrap();
        let order: Vec<&str> = set[0].songs.iter().map(|song| song.title.as_str()).collect();
        assert_eq!(order, vec!["Three", "One", "Two"]);
    }

    #[test]
    fn startup_offers_migration_of_local_sets() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = r#"[{"id":"old","title":"From Disk","songs":[{"id":"s","title":"Song"}]}]"#;
        fs::write(dir.path().join("music-sets.json"), snapshot).unwrap();
        let mut app = app_with(library(&dir));

        assert!(matches!(app.mode, Mode::ConfirmMigration { pending: 1 }));
        app.handle_key(KeyCode::Char('y'));

        assert_eq!(titles(&app), vec!["From Disk"]);
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn import_waits_for_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.json");
        fs::write(&backup, r#"{"format_version":1,"sets":[{"title":"One"},{"title":"Two"}]}"#)
            .unwrap();
        let mut app = app_with(library(&dir));

        app.handle_key(KeyCode::Char('i'));
        type_text(&mut app, &backup.display().to_string());
        app.handle_key(KeyCode::Enter);

        assert!(matches!(&app.mode, Mode::ConfirmImport(confirm) if confirm.items == 2));
        assert!(app.library().sets().is_empty());

        app.handle_key(KeyCode::Char('y'));
        assert_eq!(titles(&app), vec!["One", "Two"]);
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn declined_import_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.json");
        fs::write(&backup, r#"[{"title":"One"}]"#).unwrap();
        let mut app = app_with(library(&dir));

        app.handle_key(KeyCode::Char('i'));
        type_text(&mut app, &backup.display().to_string());
        app.handle_key(KeyCode::Enter);
        app.handle_key(KeyCode::Char('n'));

        assert!(matches!(app.mode, Mode::Normal));
        let stored = app.library().repository().unwrap().list_sets(SetOrder::Position).unwrap();
        assert!(stored.is_empty());
    }
}
