use std::path::PathBuf;

use ratatui::style::{Color as TermColor, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::models::{Color, Set, Song};
use crate::repository::SongDraft;

use super::helpers::tag_color;

fn field_style(is_active: bool, is_empty: bool) -> Style {
    if is_active {
        Style::default().fg(TermColor::Yellow)
    } else if is_empty {
        Style::default().fg(TermColor::DarkGray)
    } else {
        Style::default()
    }
}

/// Single-line input used for set titles and the import path.
#[derive(Default, Clone)]
pub(crate) struct LineForm {
    pub(crate) value: String,
    pub(crate) error: Option<String>,
}

impl LineForm {
    pub(crate) fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            error: None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.value.push(ch);
        self.error = None;
        true
    }

    pub(crate) fn backspace(&mut self) -> bool {
        self.error = None;
        self.value.pop().is_some()
    }

    pub(crate) fn build_line(&self, field_name: &str) -> Line<'static> {
        let display = if self.value.is_empty() {
            "<required>".to_string()
        } else {
            self.value.clone()
        };
        Line::from(vec![
            Span::raw(format!("{field_name}: ")),
            Span::styled(display, field_style(true, self.value.is_empty())),
        ])
    }

    pub(crate) fn value_len(&self) -> usize {
        self.value.chars().count()
    }
}

/// Focusable fields of the song form.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub(crate) enum SongField {
    #[default]
    Title,
    Lyrics,
    Color,
}

/// Form state for adding a song to a set or editing one in place.
#[derive(Default, Clone)]
pub(crate) struct SongForm {
    id: Option<String>,
    pub(crate) title: String,
    pub(crate) lyrics: String,
    pub(crate) color: Color,
    pub(crate) active: SongField,
    pub(crate) error: Option<String>,
}

impl SongForm {
    pub(crate) fn from_song(song: &Song) -> Self {
        Self {
            id: Some(song.id.clone()),
            title: song.title.clone(),
            lyrics: song.lyrics.clone(),
            color: song.color,
            active: SongField::Title,
            error: None,
        }
    }

    /// Title → Lyrics → Color → Title.
    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            SongField::Title => SongField::Lyrics,
            SongField::Lyrics => SongField::Color,
            SongField::Color => SongField::Title,
        };
    }

    pub(crate) fn toggle_field_back(&mut self) {
        self.active = match self.active {
            SongField::Title => SongField::Color,
            SongField::Lyrics => SongField::Title,
            SongField::Color => SongField::Lyrics,
        };
    }

    /// Insert a character into the active text field. The color field only
    /// reacts to arrow keys.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            SongField::Title => self.title.push(ch),
            SongField::Lyrics => self.lyrics.push(ch),
            SongField::Color => return false,
        }
        self.error = None;
        true
    }

    pub(crate) fn newline(&mut self) {
        if self.active == SongField::Lyrics {
            self.lyrics.push('\n');
        }
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            SongField::Title => {
                self.title.pop();
            }
            SongField::Lyrics => {
                self.lyrics.pop();
            }
            SongField::Color => {}
        }
    }

    pub(crate) fn cycle_color(&mut self, offset: isize) {
        if self.active == SongField::Color {
            self.color = self.color.cycle(offset);
        }
    }

    /// The song as it should be handed to the repository. Validation of the
    /// title happens there.
    pub(crate) fn to_draft(&self) -> SongDraft {
        SongDraft {
            id: self.id.clone(),
            title: self.title.clone(),
            lyrics: Some(self.lyrics.clone()),
            color: Some(self.color),
        }
    }

    pub(crate) fn build_lines(&self) -> Vec<Line<'static>> {
        let title_active = self.active == SongField::Title;
        let title = if self.title.is_empty() {
            "<required>".to_string()
        } else {
            self.title.clone()
        };
        let mut lines = vec![Line::from(vec![
            Span::raw("Title: "),
            Span::styled(title, field_style(title_active, self.title.is_empty())),
        ])];

        let color_active = self.active == SongField::Color;
        let marker = if color_active { "◀ " } else { "" };
        let trailer = if color_active { " ▶" } else { "" };
        lines.push(Line::from(vec![
            Span::raw("Color: "),
            Span::styled(
                format!("{marker}{}{trailer}", self.color),
                Style::default()
                    .fg(tag_color(self.color))
                    .add_modifier(if color_active {
                        Modifier::BOLD
                    } else {
                        Modifier::empty()
                    }),
            ),
        ]));

        let lyrics_active = self.active == SongField::Lyrics;
        lines.push(Line::from(Span::styled(
            "Lyrics:",
            field_style(lyrics_active, false),
        )));
        if self.lyrics.is_empty() {
            lines.push(Line::from(Span::styled(
                "  <optional>",
                Style::default().fg(TermColor::DarkGray),
            )));
        } else {
            let style = field_style(lyrics_active, false);
            lines.extend(
                self.lyrics
                    .split('\n')
                    .map(|row| Line::from(Span::styled(format!("  {row}"), style))),
            );
        }
        lines
    }

    /// Cursor offset (column, row) relative to the form body.
    pub(crate) fn cursor(&self) -> (u16, u16) {
        match self.active {
            SongField::Title => ("Title: ".len() as u16 + self.title.chars().count() as u16, 0),
            SongField::Color => ("Color: ".len() as u16, 1),
            SongField::Lyrics => {
                let rows = self.lyrics.split('\n').count().max(1);
                let last = self.lyrics.rsplit('\n').next().unwrap_or_default();
                (2 + last.chars().count() as u16, 2 + rows as u16)
            }
        }
    }
}

/// State for confirming the deletion of a whole set.
#[derive(Clone)]
pub(crate) struct ConfirmSetDelete {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) songs: usize,
}

impl From<&Set> for ConfirmSetDelete {
    fn from(set: &Set) -> Self {
        Self {
            id: set.id.clone(),
            title: set.title.clone(),
            songs: set.songs.len(),
        }
    }
}

/// State for confirming the removal of one song from the set being edited.
pub(crate) struct ConfirmSongRemove {
    pub(crate) index: usize,
    pub(crate) title: String,
}

/// A backup file read from disk, waiting for the go-ahead to import.
pub(crate) struct ConfirmImport {
    pub(crate) path: PathBuf,
    pub(crate) payload: String,
    pub(crate) items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_field_ignores_typing() {
        let mut form = SongForm::default();
        form.active = SongField::Color;
        assert!(!form.push_char('x'));
        form.cycle_color(1);
        assert_eq!(form.color, Color::Red);
        form.cycle_color(-2);
        assert_eq!(form.color, Color::Orange);
    }

    #[test]
    fn lyrics_accept_newlines() {
        let mut form = SongForm::default();
        form.toggle_field();
        assert_eq!(form.active, SongField::Lyrics);
        form.push_char('a');
        form.newline();
        form.push_char('b');
        assert_eq!(form.lyrics, "a\nb");
        assert_eq!(form.cursor(), (3, 4));
    }

    #[test]
    fn draft_keeps_existing_song_id() {
        let song = Song {
            id: "s1".into(),
            title: "Old".into(),
            lyrics: String::new(),
            color: Color::Blue,
            position: 0,
        };
        let mut form = SongForm::from_song(&song);
        form.push_char('!');
        let draft = form.to_draft();
        assert_eq!(draft.id.as_deref(), Some("s1"));
        assert_eq!(draft.title, "Old!");
        assert_eq!(draft.color, Some(Color::Blue));
    }
}
