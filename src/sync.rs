//! Bulk writes into the store: backup import and the one-time migration of
//! the local snapshot. Both walk the input sequentially and create one set at
//! a time; a failing item is counted and skipped, never fatal to the rest.

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::cache::{self, LocalCache};
use crate::error::{Error, Result};
use crate::models::SetOrder;
use crate::repository::{SetDraft, SetRepository};

/// Tally of a best-effort batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn record<T>(self, outcome: &Result<T>) -> Self {
        match outcome {
            Ok(_) => Self {
                succeeded: self.succeeded + 1,
                ..self
            },
            Err(_) => Self {
                failed: self.failed + 1,
                ..self
            },
        }
    }
}

/// Create one set per item, in order. Items that do not decode as a set, fail
/// validation, or fail in the store are logged and counted as failures.
///
/// The created sets then take positions 0..k-1 in input order, ahead of the
/// sets already stored, so a backup or snapshot keeps its own order.
pub fn import_sets<R>(repo: &mut R, items: Vec<Value>) -> BatchReport
where
    R: SetRepository + ?Sized,
{
    let mut created = Vec::new();
    let report = items
        .into_iter()
        .enumerate()
        .fold(BatchReport::default(), |report, (index, item)| {
            let outcome = serde_json::from_value::<SetDraft>(item)
                .map_err(|err| Error::MalformedImportPayload(format!("set {}: {err}", index + 1)))
                .and_then(|draft| repo.create_set(draft));

            match &outcome {
                Ok(set) => {
                    info!(index, set = %set.id, title = %set.title, "imported set");
                    created.push(set.id.clone());
                }
                Err(err) => warn!(index, error = %err, "failed to import set"),
            }
            report.record(&outcome)
        });

    if !created.is_empty() {
        if let Err(err) = place_first(repo, &created) {
            error!(error = ?err, sets = created.len(), "could not store the order of imported sets");
        }
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "batch import finished"
    );
    report
}

/// Rewrite set positions as `imported` followed by every other stored set in
/// its current position order.
fn place_first<R>(repo: &mut R, imported: &[String]) -> Result<()>
where
    R: SetRepository + ?Sized,
{
    let rest = repo
        .list_sets(SetOrder::Position)?
        .into_iter()
        .map(|set| set.id)
        .filter(|id| !imported.contains(id));
    let order: Vec<String> = imported.iter().cloned().chain(rest).collect();
    repo.save_set_order(&order)
}

/// Import a backup file's contents. The payload shape is checked before any
/// store call, so a malformed payload writes nothing.
pub fn import_payload<R>(repo: &mut R, text: &str) -> Result<BatchReport>
where
    R: SetRepository + ?Sized,
{
    let items = cache::decode_items(text)?;
    Ok(import_sets(repo, items))
}

/// Copy every set in the local snapshot into the store. The snapshot itself
/// is left in place.
pub fn migrate_local_to_store<R>(repo: &mut R, cache: &LocalCache) -> BatchReport
where
    R: SetRepository + ?Sized,
{
    let items = cache.read_items().unwrap_or_default();
    if items.is_empty() {
        info!("no local sets to migrate");
        return BatchReport::default();
    }

    info!(sets = items.len(), path = %cache.path().display(), "migrating local sets into the store");
    import_sets(repo, items)
}
