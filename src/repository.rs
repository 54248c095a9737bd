//! Request/response contract between the client and the entity store.
//!
//! Callers hand over whole sets as drafts: a title plus the full song list.
//! The repository validates the draft, fills in defaults, generates any
//! missing identifiers, and asks the store to write everything in a single
//! transaction. There is deliberately no song-level mutation; reordering or
//! editing one song means replacing its set.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::db::Store;
use crate::error::{Error, Result};
use crate::models::{Color, Set, SetOrder, Song};

/// Incoming song. Anything optional falls back to a default; a `position`
/// field, if a caller sends one, is ignored because order comes from the
/// list index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl SongDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_lyrics(mut self, lyrics: impl Into<String>) -> Self {
        self.lyrics = Some(lyrics.into());
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

impl From<&Song> for SongDraft {
    fn from(song: &Song) -> Self {
        Self {
            id: Some(song.id.clone()),
            title: song.title.clone(),
            lyrics: Some(song.lyrics.clone()),
            color: Some(song.color),
        }
    }
}

/// Incoming set: the title and the complete, ordered song list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub songs: Vec<SongDraft>,
}

impl SetDraft {
    pub fn new(title: impl Into<String>, songs: Vec<SongDraft>) -> Self {
        Self {
            title: title.into(),
            songs,
        }
    }
}

impl From<&Set> for SetDraft {
    fn from(set: &Set) -> Self {
        Self {
            title: set.title.clone(),
            songs: set.songs.iter().map(SongDraft::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Unavailable,
}

/// Liveness answer plus the moment it was taken (RFC 3339, UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: HealthStatus,
    pub timestamp: String,
}

impl Health {
    /// Stamp `status` with the current time.
    pub fn now(status: HealthStatus) -> Self {
        Self {
            status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Operations the client model needs from whatever holds the sets.
pub trait SetRepository {
    /// Every set with songs attached, in the requested persisted order.
    fn list_sets(&self, order: SetOrder) -> Result<Vec<Set>>;

    fn get_set(&self, id: &str) -> Result<Set>;

    /// Persist a new set and return it as stored, including generated ids.
    fn create_set(&mut self, draft: SetDraft) -> Result<Set>;

    /// Replace title and full song list of an existing set.
    fn replace_set(&mut self, id: &str, draft: SetDraft) -> Result<Set>;

    fn delete_set(&mut self, id: &str) -> Result<()>;

    /// Store the given set order as positions 0..n-1. `ids` lists every
    /// stored set exactly once.
    fn save_set_order(&mut self, ids: &[String]) -> Result<()>;

    fn health(&self) -> Health;
}

/// Hands out millisecond timestamps that never repeat within one process,
/// so two requests landing in the same millisecond still get distinct ids.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn next_stamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let stamp = now.max(self.last + 1);
        self.last = stamp;
        stamp
    }

    /// Song ids combine the request stamp with the song's index.
    pub fn song_id(stamp: i64, index: usize) -> String {
        format!("{stamp}-{index}")
    }
}

/// SQLite-backed implementation of [`SetRepository`].
pub struct Repository {
    store: Store,
    ids: IdGenerator,
}

impl Repository {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            ids: IdGenerator::default(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Shut the underlying store down.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    /// Validate a draft and turn it into rows ready for insertion.
    fn resolve(draft: SetDraft, stamp: i64) -> Result<(String, Vec<Song>)> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(Error::validation("Set title is required."));
        }

        let songs = draft
            .songs
            .into_iter()
            .enumerate()
            .map(|(index, song)| {
                let song_title = song.title.trim();
                if song_title.is_empty() {
                    return Err(Error::validation(format!(
                        "Song {} needs a title.",
                        index + 1
                    )));
                }
                Ok(Song {
                    id: song
                        .id
                        .filter(|id| !id.trim().is_empty())
                        .unwrap_or_else(|| IdGenerator::song_id(stamp, index)),
                    title: song_title.to_string(),
                    lyrics: song.lyrics.unwrap_or_default(),
                    color: song.color.unwrap_or_default(),
                    position: index as i64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((title.to_string(), songs))
    }
}

/// Store failures are logged with their full cause here; callers only see the
/// short context.
fn logged<T>(result: Result<T>, action: &'static str) -> Result<T> {
    if let Err(err @ Error::Store { .. }) = &result {
        error!(action, error = ?err, "store write failed and was rolled back");
    }
    result
}

impl SetRepository for Repository {
    fn list_sets(&self, order: SetOrder) -> Result<Vec<Set>> {
        self.store.list_sets(order)
    }

    fn get_set(&self, id: &str) -> Result<Set> {
        self.store.get_set(id)
    }

    fn create_set(&mut self, draft: SetDraft) -> Result<Set> {
        let stamp = self.ids.next_stamp();
        let (title, songs) = Self::resolve(draft, stamp)?;
        let id = stamp.to_string();
        logged(self.store.create_set(&id, &title, &songs), "create set")?;
        debug!(set = %id, songs = songs.len(), "created set");
        self.store.get_set(&id)
    }

    fn replace_set(&mut self, id: &str, draft: SetDraft) -> Result<Set> {
        let stamp = self.ids.next_stamp();
        let (title, songs) = Self::resolve(draft, stamp)?;
        logged(self.store.replace_set(id, &title, &songs), "replace set")?;
        debug!(set = %id, songs = songs.len(), "replaced set");
        self.store.get_set(id)
    }

    fn delete_set(&mut self, id: &str) -> Result<()> {
        logged(self.store.delete_set(id), "delete set")?;
        debug!(set = %id, "deleted set");
        Ok(())
    }

    fn save_set_order(&mut self, ids: &[String]) -> Result<()> {
        logged(self.store.write_set_positions(ids), "save set order")?;
        debug!(sets = ids.len(), "saved set order");
        Ok(())
    }

    fn health(&self) -> Health {
        let status = match self.store.ping() {
            Ok(()) => HealthStatus::Ok,
            Err(err) => {
                error!(error = ?err, "health probe failed");
                HealthStatus::Unavailable
            }
        };
        Health::now(status)
    }
}
