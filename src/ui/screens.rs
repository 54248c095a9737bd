use crate::models::Set;

use super::helpers::step_index;

/// Editing one set: its title and the ordered song list.
pub(crate) struct EditorScreen {
    pub(crate) set_id: String,
    pub(crate) selected: usize,
}

impl EditorScreen {
    pub(crate) fn new(set_id: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            selected: 0,
        }
    }

    pub(crate) fn move_selection(&mut self, offset: isize, len: usize) {
        self.selected = step_index(self.selected, offset, len);
    }

    /// Keep the cursor on a real song after the list shrank.
    pub(crate) fn ensure_in_bounds(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }
}

/// Performance view: the song list of one set, then one song's lyrics at a
/// time.
pub(crate) struct ReaderScreen {
    pub(crate) set_id: String,
    pub(crate) selected: usize,
    /// Index of the song being read; `None` shows the set overview.
    pub(crate) song: Option<usize>,
    pub(crate) scroll: u16,
}

impl ReaderScreen {
    pub(crate) fn new(set_id: impl Into<String>) -> Self {
        Self {
            set_id: set_id.into(),
            selected: 0,
            song: None,
            scroll: 0,
        }
    }

    pub(crate) fn open_song(&mut self, set: &Set, index: usize) -> bool {
        if index >= set.songs.len() {
            return false;
        }
        self.selected = index;
        self.song = Some(index);
        self.scroll = 0;
        true
    }

    /// Flip to the previous or next song, staying put at either end.
    pub(crate) fn turn_page(&mut self, set: &Set, offset: isize) -> bool {
        let Some(current) = self.song else {
            return false;
        };
        let next = step_index(current, offset, set.songs.len());
        if next == current {
            return false;
        }
        self.open_song(set, next)
    }

    pub(crate) fn close_song(&mut self) {
        self.song = None;
        self.scroll = 0;
    }

    pub(crate) fn scroll_by(&mut self, offset: i32) {
        self.scroll = (self.scroll as i32 + offset).clamp(0, u16::MAX as i32) as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Song;

    fn set_with(titles: &[&str]) -> Set {
        Set {
            id: "set".into(),
            title: "Set".into(),
            position: 0,
            songs: titles
                .iter()
                .enumerate()
                .map(|(index, title)| Song {
                    id: format!("s{index}"),
                    title: title.to_string(),
                    lyrics: String::new(),
                    color: Default::default(),
                    position: index as i64,
                })
                .collect(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn reader_pages_stop_at_the_ends() {
        let set = set_with(&["A", "B"]);
        let mut reader = ReaderScreen::new("set");
        assert!(!reader.turn_page(&set, 1));
        assert!(reader.open_song(&set, 0));
        assert!(!reader.turn_page(&set, -1));
        assert!(reader.turn_page(&set, 1));
        assert_eq!(reader.song, Some(1));
        assert!(!reader.turn_page(&set, 1));
    }

    #[test]
    fn editor_selection_follows_shrinking_list() {
        let mut editor = EditorScreen::new("set");
        editor.move_selection(3, 4);
        assert_eq!(editor.selected, 3);
        editor.ensure_in_bounds(2);
        assert_eq!(editor.selected, 1);
    }
}
