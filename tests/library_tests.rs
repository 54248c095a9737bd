//! Client model behavior: ordering, import, local snapshot fallback and the
//! one-time migration of local sets.

use std::fs;

use lyric_sets::cache::LocalCache;
use lyric_sets::ordering::move_item;
use lyric_sets::repository::{Health, HealthStatus};
use lyric_sets::{
    Connectivity, Error, Library, LoadOutcome, Repository, Result, Set, SetDraft, SetOrder,
    SetRepository, SongDraft, Store,
};
use tempfile::TempDir;

fn cache_in(dir: &TempDir) -> LocalCache {
    LocalCache::new(dir.path().join("music-sets.json"))
}

fn online_library(dir: &TempDir) -> Library<Repository> {
    let repo = Repository::new(Store::open_in_memory().unwrap());
    Library::new(repo, cache_in(dir), SetOrder::Position)
}

fn titles(sets: &[Set]) -> Vec<&str> {
    sets.iter().map(|set| set.title.as_str()).collect()
}

/// A store that is never reachable.
struct UnreachableStore;

fn unreachable<T>() -> Result<T> {
    Err(Error::Store {
        context: "failed to query sets",
        source: rusqlite::Error::InvalidQuery,
    })
}

impl SetRepository for UnreachableStore {
    fn list_sets(&self, _order: SetOrder) -> Result<Vec<Set>> {
        unreachable()
    }

    fn get_set(&self, _id: &str) -> Result<Set> {
        unreachable()
    }

    fn create_set(&mut self, _draft: SetDraft) -> Result<Set> {
        unreachable()
    }

    fn replace_set(&mut self, _id: &str, _draft: SetDraft) -> Result<Set> {
        unreachable()
    }

    fn delete_set(&mut self, _id: &str) -> Result<()> {
        unreachable()
    }

    fn save_set_order(&mut self, _ids: &[String]) -> Result<()> {
        unreachable()
    }

    fn health(&self) -> Health {
        Health::now(HealthStatus::Unavailable)
    }
}

#[test]
fn moving_third_set_to_front_persists_dense_positions() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = online_library(&dir);
    library.load();
    for title in ["D", "C", "B", "A"] {
        library.create_set(SetDraft::new(title, vec![])).unwrap();
    }
    assert_eq!(titles(library.sets()), vec!["A", "B", "C", "D"]);

    assert!(library.move_set(2, 0));
    assert_eq!(titles(library.sets()), vec!["C", "A", "B", "D"]);
    assert!(library.set_order_dirty());

    library.persist_set_order().unwrap();
    let stored = library
        .repository()
        .unwrap()
        .list_sets(SetOrder::Position)
        .unwrap();
    assert_eq!(titles(&stored), vec!["C", "A", "B", "D"]);
    let positions: Vec<i64> = stored.iter().map(|set| set.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
}

#[test]
fn reorder_sets_requires_a_permutation() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = online_library(&dir);
    library.load();
    let a = library.create_set(SetDraft::new("A", vec![])).unwrap().id.clone();
    let b = library.create_set(SetDraft::new("B", vec![])).unwrap().id.clone();

    let err = library.reorder_sets(&[a.clone()]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(titles(library.sets()), vec!["B", "A"]);

    library.reorder_sets(&[a, b]).unwrap();
    assert_eq!(titles(library.sets()), vec!["A", "B"]);
    // Set order is only written on request.
    let stored = library.repository().unwrap().list_sets(SetOrder::Position).unwrap();
    assert_eq!(titles(&stored), vec!["B", "A"]);
}

#[test]
fn reordering_songs_persists_the_splice() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = online_library(&dir);
    library.load();
    let set = library
        .create_set(SetDraft::new(
            "Set",
            ["A", "B", "C", "D"].into_iter().map(SongDraft::new).collect(),
        ))
        .unwrap()
        .clone();

    let mut order: Vec<String> = set.songs.iter().map(|song| song.id.clone()).collect();
    assert!(move_item(&mut order, 2, 0));
    library.reorder_songs_within_set(&set.id, &order).unwrap();

    let stored = library.repository().unwrap().get_set(&set.id).unwrap();
    let rows: Vec<(&str, i64)> = stored
        .songs
        .iter()
        .map(|song| (song.title.as_str(), song.position))
        .collect();
    assert_eq!(rows, vec![("C", 0), ("A", 1), ("B", 2), ("D", 3)]);
    let ids: Vec<String> = stored.songs.iter().map(|song| song.id.clone()).collect();
    assert_eq!(ids, order);
}

#[test]
fn moving_a_song_rewrites_its_set() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = online_library(&dir);
    library.load();
    let id = library
        .create_set(SetDraft::new(
            "Set",
            vec![SongDraft::new("X"), SongDraft::new("Y"), SongDraft::new("Z")],
        ))
        .unwrap()
        .id
        .clone();

    library.move_song(&id, 0, 2).unwrap();

    let stored = library.repository().unwrap().get_set(&id).unwrap();
    let order: Vec<(&str, i64)> = stored
        .songs
        .iter()
        .map(|song| (song.title.as_str(), song.position))
        .collect();
    assert_eq!(order, vec![("Y", 0), ("Z", 1), ("X", 2)]);
    assert_eq!(library.set(&id).unwrap().songs, stored.songs);
}

#[test]
fn import_counts_failures_and_keeps_going() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = online_library(&dir);
    library.load();

    let payload = r##"[
        {"title": "One", "songs": [{"title": "a"}]},
        {"title": "Two"},
        {"title": "   ", "songs": [{"title": "lost"}]},
        {"title": "Four", "songs": [{"title": "b", "color": "#ccffcc"}]},
        {"title": "Five"}
    ]"##;
    let report = library.import_payload(payload).unwrap();

    assert_eq!((report.succeeded, report.failed), (4, 1));
    let stored = library.repository().unwrap().list_sets(SetOrder::Created).unwrap();
    let mut imported = titles(&stored);
    imported.sort();
    assert_eq!(imported, vec!["Five", "Four", "One", "Two"]);
}

#[test]
fn malformed_import_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = online_library(&dir);
    library.load();

    for payload in [r#"{"title": "not a list"}"#, "not json", r#"{"format_version": 9, "sets": []}"#] {
        let err = library.import_payload(payload).unwrap_err();
        assert!(matches!(err, Error::MalformedImportPayload(_)), "{payload}");
    }
    assert!(library.repository().unwrap().list_sets(SetOrder::Position).unwrap().is_empty());
}

#[test]
fn export_can_be_imported_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = online_library(&dir);
    source.load();
    source
        .create_set(SetDraft::new("Backup me", vec![SongDraft::new("Song").with_lyrics("words")]))
        .unwrap();
    let payload = source.export_payload().unwrap();

    let other = tempfile::tempdir().unwrap();
    let mut target = online_library(&other);
    target.load();
    let report = target.import_payload(&payload).unwrap();

    assert!(report.is_clean());
    let set = &target.sets()[0];
    assert_eq!(set.title, "Backup me");
    assert_eq!(set.songs[0].lyrics, "words");
}

#[test]
fn unreachable_store_falls_back_to_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut library = online_library(&dir);
        library.load();
        library.create_set(SetDraft::new("Cached", vec![SongDraft::new("s")])).unwrap();
    }

    let mut library = Library::new(UnreachableStore, cache_in(&dir), SetOrder::Position);
    assert_eq!(library.load(), LoadOutcome::Offline { cached: 1 });
    assert_eq!(library.connectivity(), Connectivity::Offline);
    assert_eq!(titles(library.sets()), vec!["Cached"]);

    let err = library.create_set(SetDraft::new("New", vec![])).unwrap_err();
    assert!(matches!(err, Error::Offline));
    assert!(matches!(library.persist_set_order(), Err(Error::Offline)));
    assert_eq!(library.sets().len(), 1);
}

#[test]
fn library_without_store_reads_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut library: Library<Repository> = Library::offline(cache_in(&dir), SetOrder::Position);
    assert_eq!(library.load(), LoadOutcome::Offline { cached: 0 });
    assert!(library.sets().is_empty());
}

#[test]
fn empty_store_offers_migration_and_copies_on_confirm() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("music-sets.json"),
        r##"[{"id":"1","title":"Local One","songs":[{"id":"1-0","title":"a","color":"#ffcccc"}]},
            {"id":"2","title":"Local Two"}]"##,
    )
    .unwrap();

    let mut library = online_library(&dir);
    assert_eq!(library.load(), LoadOutcome::MigrationAvailable { pending: 2 });
    assert!(library.sets().is_empty());
    assert!(library.repository().unwrap().list_sets(SetOrder::Position).unwrap().is_empty());

    let report = library.migrate_local().unwrap();
    assert_eq!((report.succeeded, report.failed), (2, 0));
    assert_eq!(library.sets().len(), 2);
    assert_eq!(library.load(), LoadOutcome::Loaded { sets: 2 });
}

#[test]
fn partial_migration_keeps_the_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("music-sets.json");
    let snapshot = r#"[{"title":"Good"},{"title":""}]"#;
    fs::write(&snapshot_path, snapshot).unwrap();

    let mut library = online_library(&dir);
    library.load();
    let report = library.migrate_local().unwrap();
    assert_eq!((report.succeeded, report.failed), (1, 1));

    library.create_set(SetDraft::new("After", vec![])).unwrap();
    assert_eq!(fs::read_to_string(&snapshot_path).unwrap(), snapshot);
}

#[test]
fn writes_refresh_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = online_library(&dir);
    library.load();
    let id = library.create_set(SetDraft::new("Fresh", vec![])).unwrap().id.clone();

    let cached = cache_in(&dir).read_snapshot().unwrap();
    assert_eq!(titles(&cached), vec!["Fresh"]);

    library.delete_set(&id).unwrap();
    assert!(cache_in(&dir).read_snapshot().unwrap().is_empty());
}

#[test]
fn exported_order_survives_import() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = online_library(&dir);
    source.load();
    for title in ["C", "B", "A"] {
        source.create_set(SetDraft::new(title, vec![])).unwrap();
    }
    assert_eq!(titles(source.sets()), vec!["A", "B", "C"]);
    let payload = source.export_payload().unwrap();

    let other = tempfile::tempdir().unwrap();
    let mut target = online_library(&other);
    target.load();
    target.import_payload(&payload).unwrap();

    assert_eq!(titles(target.sets()), vec!["A", "B", "C"]);
    let stored = target.repository().unwrap().list_sets(SetOrder::Position).unwrap();
    let positions: Vec<i64> = stored.iter().map(|set| set.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[test]
fn imported_sets_go_ahead_of_existing_ones() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = online_library(&dir);
    library.load();
    for title in ["Old 2", "Old 1"] {
        library.create_set(SetDraft::new(title, vec![])).unwrap();
    }

    let report = library
        .import_payload(r#"[{"title": "New 1"}, {"title": ""}, {"title": "New 2"}]"#)
        .unwrap();

    assert_eq!((report.succeeded, report.failed), (2, 1));
    assert_eq!(titles(library.sets()), vec!["New 1", "New 2", "Old 1", "Old 2"]);
}

#[test]
fn migration_keeps_snapshot_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("music-sets.json"),
        r#"[{"title":"First"},{"title":"Second"},{"title":"Third"}]"#,
    )
    .unwrap();

    let mut library = online_library(&dir);
    library.load();
    library.migrate_local().unwrap();

    assert_eq!(titles(library.sets()), vec!["First", "Second", "Third"]);
    let mut reopened = Library::new(
        library.into_repository().unwrap(),
        cache_in(&dir),
        SetOrder::Position,
    );
    reopened.load();
    assert_eq!(titles(reopened.sets()), vec!["First", "Second", "Third"]);
}

#[test]
fn declined_migration_leaves_the_snapshot_alone() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("music-sets.json");
    fs::write(&snapshot_path, r#"[{"id":"1","title":"Local One"},{"id":"2","title":"Local Two"}]"#).unwrap();

    let mut library = online_library(&dir);
    assert_eq!(library.load(), LoadOutcome::MigrationAvailable { pending: 2 });

    let id = library.create_set(SetDraft::new("New", vec![])).unwrap().id.clone();
    library.delete_set(&id).unwrap();

    let cached = cache_in(&dir).read_snapshot().unwrap();
    assert_eq!(titles(&cached), vec!["Local One", "Local Two"]);
}

#[test]
fn clean_migration_resumes_snapshot_refresh() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("music-sets.json"), r#"[{"title":"Local"}]"#).unwrap();

    let mut library = online_library(&dir);
    library.load();
    assert!(library.migrate_local().unwrap().is_clean());
    library.create_set(SetDraft::new("New", vec![])).unwrap();

    let cached = cache_in(&dir).read_snapshot().unwrap();
    assert_eq!(titles(&cached), vec!["New", "Local"]);
}
