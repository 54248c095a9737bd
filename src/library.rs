//! The client's working copy of the set list.
//!
//! The in-memory order here is what the user sees. Song order is persisted on
//! every change through whole-set replacement. Set order changes stay in
//! memory until [`Library::persist_set_order`] is called. When the store
//! cannot be reached the library serves the local snapshot and refuses to
//! write.

use tracing::{error, info, warn};

use crate::cache::{self, LocalCache};
use crate::error::{Error, Result};
use crate::models::{Set, SetOrder};
use crate::ordering::{apply_order, move_item};
use crate::repository::{SetDraft, SetRepository};
use crate::sync::{self, BatchReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    /// Serving the local snapshot; every persisting call returns
    /// [`Error::Offline`].
    Offline,
}

/// What `load` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { sets: usize },
    /// The store is empty but the local snapshot holds `pending` sets. Nothing
    /// is copied until the user confirms and [`Library::migrate_local`] runs.
    MigrationAvailable { pending: usize },
    Offline { cached: usize },
}

pub struct Library<R> {
    repo: Option<R>,
    cache: LocalCache,
    order: SetOrder,
    connectivity: Connectivity,
    sets: Vec<Set>,
    set_order_dirty: bool,
    snapshot_held: bool,
}

fn online<R>(repo: &mut Option<R>, connectivity: Connectivity) -> Result<&mut R> {
    match (connectivity, repo.as_mut()) {
        (Connectivity::Online, Some(repo)) => Ok(repo),
        _ => Err(Error::Offline),
    }
}

impl<R: SetRepository> Library<R> {
    pub fn new(repo: R, cache: LocalCache, order: SetOrder) -> Self {
        Self {
            repo: Some(repo),
            cache,
            order,
            connectivity: Connectivity::Online,
            sets: Vec::new(),
            set_order_dirty: false,
            snapshot_held: false,
        }
    }

    /// A library with no store at all, e.g. when the database could not be
    /// opened. Loading serves the snapshot.
    pub fn offline(cache: LocalCache, order: SetOrder) -> Self {
        Self {
            repo: None,
            cache,
            order,
            connectivity: Connectivity::Offline,
            sets: Vec::new(),
            set_order_dirty: false,
            snapshot_held: false,
        }
    }

    pub fn sets(&self) -> &[Set] {
        &self.sets
    }

    pub fn set(&self, id: &str) -> Option<&Set> {
        self.sets.iter().find(|set| set.id == id)
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.sets.iter().position(|set| set.id == id)
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Whether the in-memory set order differs from what was last persisted.
    pub fn set_order_dirty(&self) -> bool {
        self.set_order_dirty
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn repository(&self) -> Option<&R> {
        self.repo.as_ref()
    }

    pub fn into_repository(self) -> Option<R> {
        self.repo
    }

    /// Fetch the full list from the store. Falls back to the local snapshot
    /// (and goes offline) if the store fails. Also the way back online after
    /// an earlier failure.
    pub fn load(&mut self) -> LoadOutcome {
        let Some(repo) = self.repo.as_ref() else {
            return self.fall_back_to_cache();
        };

        match repo.list_sets(self.order) {
            Ok(sets) => {
                self.connectivity = Connectivity::Online;
                self.sets = sets;
                self.set_order_dirty = false;

                if self.sets.is_empty() {
                    let pending = self.cache.read_items().map_or(0, |items| items.len());
                    if pending > 0 {
                        info!(pending, "store is empty and a local snapshot exists");
                        // The snapshot is the only copy of those sets until a
                        // migration moves all of them.
                        self.snapshot_held = true;
                        return LoadOutcome::MigrationAvailable { pending };
                    }
                }
                LoadOutcome::Loaded {
                    sets: self.sets.len(),
                }
            }
            Err(err) => {
                error!(error = ?err, "failed to load sets; switching to the local snapshot");
                self.fall_back_to_cache()
            }
        }
    }

    fn fall_back_to_cache(&mut self) -> LoadOutcome {
        self.connectivity = Connectivity::Offline;
        self.sets = self.cache.read_snapshot().unwrap_or_default();
        self.set_order_dirty = false;
        LoadOutcome::Offline {
            cached: self.sets.len(),
        }
    }

    fn reload(&mut self) -> Result<()> {
        let repo = online(&mut self.repo, self.connectivity)?;
        self.sets = repo.list_sets(self.order)?;
        self.set_order_dirty = false;
        Ok(())
    }

    /// Rewrite the snapshot from the in-memory list. Failures are logged only.
    fn write_through(&self) {
        if self.snapshot_held {
            return;
        }
        if let Err(err) = self.cache.write_snapshot(&self.sets) {
            warn!(error = ?err, "could not refresh local snapshot");
        }
    }

    /// Copy the local snapshot into the (empty) store. Only call this after
    /// the user agreed to it.
    pub fn migrate_local(&mut self) -> Result<BatchReport> {
        let repo = online(&mut self.repo, self.connectivity)?;
        let report = sync::migrate_local_to_store(repo, &self.cache);
        if report.is_clean() {
            self.snapshot_held = false;
        } else {
            warn!(failed = report.failed, "holding local snapshot after partial migration");
            self.snapshot_held = true;
        }
        self.reload()?;
        Ok(report)
    }

    /// Import a backup. Always adds; existing sets are untouched.
    pub fn import_payload(&mut self, text: &str) -> Result<BatchReport> {
        let items = cache::decode_items(text)?;
        let repo = online(&mut self.repo, self.connectivity)?;
        let report = sync::import_sets(repo, items);
        self.reload()?;
        self.write_through();
        Ok(report)
    }

    /// The current list, in display order, as a backup payload.
    pub fn export_payload(&self) -> Result<String> {
        cache::encode(&self.sets)
    }

    pub fn create_set(&mut self, draft: SetDraft) -> Result<&Set> {
        let repo = online(&mut self.repo, self.connectivity)?;
        let set = repo.create_set(draft)?;
        // Fresh sets sort first under both persisted orders.
        self.sets.insert(0, set);
        self.write_through();
        Ok(&self.sets[0])
    }

    /// Whole-set replacement of an existing set.
    pub fn save_set(&mut self, id: &str, draft: SetDraft) -> Result<&Set> {
        let index = self
            .position_of(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let repo = online(&mut self.repo, self.connectivity)?;
        let set = repo.replace_set(id, draft)?;
        self.sets[index] = set;
        self.write_through();
        Ok(&self.sets[index])
    }

    pub fn delete_set(&mut self, id: &str) -> Result<()> {
        let repo = online(&mut self.repo, self.connectivity)?;
        repo.delete_set(id)?;
        self.sets.retain(|set| set.id != id);
        self.write_through();
        Ok(())
    }

    /// Replace the in-memory set order with `new_order` (every set id exactly
    /// once). Nothing is written to the store.
    pub fn reorder_sets(&mut self, new_order: &[String]) -> Result<()> {
        let current = std::mem::take(&mut self.sets);
        match apply_order(current.clone(), new_order, |set| set.id.as_str()) {
            Some(arranged) => {
                if arranged != current {
                    self.set_order_dirty = true;
                }
                self.sets = arranged;
                Ok(())
            }
            None => {
                self.sets = current;
                Err(Error::validation(
                    "New set order must list every set exactly once.",
                ))
            }
        }
    }

    /// Splice one set to a new index, in memory only.
    pub fn move_set(&mut self, from: usize, to: usize) -> bool {
        let moved = move_item(&mut self.sets, from, to);
        if moved {
            self.set_order_dirty = true;
        }
        moved
    }

    /// Write the in-memory set order to the store as positions 0..n-1.
    pub fn persist_set_order(&mut self) -> Result<()> {
        let ids: Vec<String> = self.sets.iter().map(|set| set.id.clone()).collect();
        let repo = online(&mut self.repo, self.connectivity)?;
        repo.save_set_order(&ids)?;
        for (position, set) in self.sets.iter_mut().enumerate() {
            set.position = position as i64;
        }
        self.set_order_dirty = false;
        self.write_through();
        Ok(())
    }

    /// Put the songs of one set into `new_order` (song ids, each exactly once)
    /// and persist by replacing the set. Positions come back dense 0..n-1.
    pub fn reorder_songs_within_set(&mut self, set_id: &str, new_order: &[String]) -> Result<&Set> {
        let set = self
            .set(set_id)
            .ok_or_else(|| Error::NotFound(set_id.to_string()))?;
        let songs = apply_order(set.songs.clone(), new_order, |song| song.id.as_str())
            .ok_or_else(|| {
                Error::validation("New song order must list every song in the set exactly once.")
            })?;

        let mut draft = SetDraft::from(set);
        draft.songs = songs.iter().map(Into::into).collect();
        self.save_set(set_id, draft)
    }

    /// Splice one song of a set from `from` to `to` and persist. A move onto
    /// itself writes nothing.
    pub fn move_song(&mut self, set_id: &str, from: usize, to: usize) -> Result<&Set> {
        let set = self
            .set(set_id)
            .ok_or_else(|| Error::NotFound(set_id.to_string()))?;
        let mut ids: Vec<String> = set.songs.iter().map(|song| song.id.clone()).collect();
        if !move_item(&mut ids, from, to) {
            let index = self.position_of(set_id).unwrap_or_default();
            return Ok(&self.sets[index]);
        }
        self.reorder_songs_within_set(set_id, &ids)
    }
}
