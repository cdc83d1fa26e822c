//! Update planning between the previous and current manifest

use crate::manifest::{Manifest, ManifestEntry};

/// An entry selected for an update pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedEntry {
    /// Entry to bring up to date
    pub entry: ManifestEntry,
    /// Previous version of the same file, when its content changed between manifests
    pub replacing: Option<ManifestEntry>,
}

/// Decides which entries an update pass downloads
///
/// Every entry of the current manifest is planned, in manifest order. The per-entry
/// procedure skips files that are already intact, so a full rescan also repairs files
/// that were damaged outside of a manifest change.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifestUpdatePolicy;

impl ManifestUpdatePolicy {
    /// Plan an update from `previous` (if any) to `current`
    pub fn plan_update(&self, current: &Manifest, previous: Option<&Manifest>) -> Vec<PlannedEntry> {
        current
            .iter()
            .map(|entry| PlannedEntry {
                entry: entry.clone(),
                replacing: previous.and_then(|previous| replaced_entry(entry, previous)),
            })
            .collect()
    }
}

fn replaced_entry(entry: &ManifestEntry, previous: &Manifest) -> Option<ManifestEntry> {
    if previous.position(entry).is_some() {
        return None;
    }
    previous
        .iter()
        .find(|old| old.is_same_file(entry))
        .cloned()
}
