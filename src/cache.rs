//! Local snapshot of the set list, kept as one JSON file. It backs the
//! read-only offline view, feeds the one-time migration into an empty store,
//! and shares its codec with backup export/import.
//!
//! Written snapshots carry a `format_version`; bare arrays written by older
//! clients are still accepted on read.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::Set;

/// Version written into every snapshot and backup.
pub const FORMAT_VERSION: u64 = 1;

/// File name of the local snapshot inside the data directory.
pub const SNAPSHOT_FILE_NAME: &str = "music-sets.json";

#[derive(Serialize)]
struct Envelope<'a> {
    format_version: u64,
    sets: &'a [Set],
}

/// Serialize sets (in the given order) into the versioned envelope.
pub fn encode(sets: &[Set]) -> Result<String> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        sets,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Split a snapshot or backup into its raw set items without decoding them,
/// so one bad item does not spoil the rest. Anything that is not an array of
/// sets (or an envelope around one) is rejected.
pub fn decode_items(text: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| Error::MalformedImportPayload(format!("not valid JSON ({err})")))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut fields) => {
            let version = fields
                .get("format_version")
                .and_then(Value::as_u64)
                .ok_or_else(not_an_array)?;
            if version == 0 || version > FORMAT_VERSION {
                return Err(Error::MalformedImportPayload(format!(
                    "unsupported format version {version}"
                )));
            }
            match fields.remove("sets") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(not_an_array()),
            }
        }
        _ => Err(not_an_array()),
    }
}

fn not_an_array() -> Error {
    Error::MalformedImportPayload("expected an array of sets".to_string())
}

/// Default backup file name for a given day.
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("lyric-sets-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Best-effort snapshot file. Reads never fail: a missing or corrupt file
/// reads as "no snapshot".
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw set items from the snapshot, or `None` when there is no usable
    /// snapshot.
    pub fn read_items(&self) -> Option<Vec<Value>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "could not read local snapshot");
                return None;
            }
        };

        match decode_items(&text) {
            Ok(items) => Some(items),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable local snapshot");
                None
            }
        }
    }

    /// Decoded sets from the snapshot, skipping items that do not decode.
    pub fn read_snapshot(&self) -> Option<Vec<Set>> {
        let items = self.read_items()?;
        let sets = items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value::<Set>(item) {
                Ok(set) => Some(set),
                Err(err) => {
                    warn!(index, error = %err, "skipping undecodable set in local snapshot");
                    None
                }
            })
            .collect();
        Some(sets)
    }

    /// Replace the snapshot via a sibling temp file renamed over the old one.
    pub fn write_snapshot(&self, sets: &[Set]) -> Result<()> {
        let payload = encode(sets)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Cache {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, payload).map_err(|source| Error::Cache {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| Error::Cache {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), sets = sets.len(), "wrote local snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Color, Song};

    fn sample_set() -> Set {
        Set {
            id: "1".into(),
            title: "Ceremony".into(),
            position: 0,
            songs: vec![Song {
                id: "1-0".into(),
                title: "Canon".into(),
                lyrics: String::new(),
                color: Color::Green,
                position: 0,
            }],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn legacy_bare_arrays_are_accepted() {
        let items = decode_items(r#"[{"title":"A"},{"title":"B"}]"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn envelopes_round_trip() {
        let text = encode(&[sample_set()]).unwrap();
        assert!(text.contains("\"format_version\": 1"));
        let items = decode_items(&text).unwrap();
        let set: Set = serde_json::from_value(items[0].clone()).unwrap();
        assert_eq!(set, sample_set());
    }

    #[test]
    fn non_arrays_are_rejected() {
        for payload in [r#"{"title":"A"}"#, "42", "\"sets\"", "not json", r#"{"format_version":1}"#] {
            let err = decode_items(payload).unwrap_err();
            assert!(matches!(err, Error::MalformedImportPayload(_)), "{payload}");
        }
    }

    #[test]
    fn newer_format_versions_are_rejected() {
        let err = decode_items(r#"{"format_version":2,"sets":[]}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid import data: unsupported format version 2"
        );
    }

    #[test]
    fn backup_names_carry_the_date() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(backup_file_name(date), "lyric-sets-backup-2024-06-01.json");
    }

    #[test]
    fn missing_or_corrupt_snapshots_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join(SNAPSHOT_FILE_NAME));
        assert!(cache.read_items().is_none());

        fs::write(cache.path(), "{{{").unwrap();
        assert!(cache.read_snapshot().is_none());
    }

    #[test]
    fn snapshot_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join("nested").join(SNAPSHOT_FILE_NAME));
        cache.write_snapshot(&[sample_set()]).unwrap();
        assert_eq!(cache.read_snapshot().unwrap(), vec![sample_set()]);
    }

    #[test]
    fn undecodable_items_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join(SNAPSHOT_FILE_NAME));
        fs::write(
            cache.path(),
            r#"[{"id":"1","title":"Good","songs":[]},{"title":"no id"}]"#,
        )
        .unwrap();
        let sets = cache.read_snapshot().unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].title, "Good");
    }
}
