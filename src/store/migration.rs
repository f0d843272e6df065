//! # Schema Migration
//!
//! Brings every collection's items from their on-disk version up to
//! [`CURRENT_VERSION`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MIGRATION PASS                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Registry: (kind, from_version) → transform, registered at startup     │
//! │                                                                         │
//! │  For each collection, for each indexed id:                             │
//! │                                                                         │
//! │     tombstone ──────────────────────────────▶ pass through untouched   │
//! │                                                                         │
//! │     active, version == CURRENT ─────────────▶ no write                 │
//! │                                                                         │
//! │     active, version < CURRENT ──▶ step one version at a time:          │
//! │         transform(v) → Unchanged  : keep stepping, nothing rewritten   │
//! │         transform(v) → Changed    : bump version, rewrite at the end   │
//! │         transform(v) → Err        : warn, skip item, pass continues    │
//! │                                                                         │
//! │     id changed by a transform ──▶ re-add under the new id, then        │
//! │                                   hard-delete the old id               │
//! │                                                                         │
//! │  Idempotent: a second pass over migrated data makes zero writes.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::store::collection::CachedCollection;
use crate::store::item::{ActiveItem, Item, ItemKind, CURRENT_VERSION};
use crate::time::now_timestamp_millis;

// ============================================================================
// REGISTRY
// ============================================================================

/// Outcome of one transformation step
pub enum Migration {
    /// The item needed no change at this version step
    Unchanged(ActiveItem),
    /// The item was rewritten (possibly under a new id)
    Changed(ActiveItem),
}

/// A single version-step transformation
pub type Transform = Box<dyn Fn(ActiveItem) -> Result<Migration> + Send + Sync>;

/// Lookup table of `(kind, from_version)` transformation steps
///
/// Built once at startup. A missing entry means items of that kind need no
/// change at that version step.
#[derive(Default)]
pub struct MigrationRegistry {
    entries: HashMap<(ItemKind, u32), Transform>,
}

impl MigrationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transform stepping `kind` items from `from_version` to
    /// `from_version + 1`
    pub fn register<F>(&mut self, kind: ItemKind, from_version: u32, transform: F)
    where
        F: Fn(ActiveItem) -> Result<Migration> + Send + Sync + 'static,
    {
        self.entries.insert((kind, from_version), Box::new(transform));
    }

    fn get(&self, kind: ItemKind, from_version: u32) -> Option<&Transform> {
        self.entries.get(&(kind, from_version))
    }
}

// ============================================================================
// MIGRATOR
// ============================================================================

/// How a migration pass treats items that report no change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationMode {
    /// Normal launch: unchanged items are not rewritten
    Normal,
    /// Backup restore: every live item is rewritten into storage
    Restore,
}

/// Per-item progress: `(collection_name, processed, total)`
pub type ProgressFn = dyn Fn(&str, usize, usize) + Send + Sync;

/// Counters for one migration pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Items inspected across all collections
    pub processed: usize,
    /// Items rewritten into storage
    pub rewritten: usize,
    /// Items whose id changed (old id hard-deleted)
    pub renamed: usize,
    /// Tombstones passed through untouched
    pub tombstones: usize,
    /// Items skipped after a transform failure or a version ahead of ours
    pub failed: usize,
}

/// Walks collections and applies registered version-step transforms
pub struct Migrator {
    registry: MigrationRegistry,
}

impl Migrator {
    /// Create a migrator over a filled registry
    pub fn new(registry: MigrationRegistry) -> Self {
        Self { registry }
    }

    /// Run one migration pass across `collections`
    ///
    /// Failures are per-item: a transform error is logged and the pass moves
    /// on, so a bad item never blocks the rest of the dataset. The returned
    /// report carries the failure count.
    pub async fn run(
        &self,
        collections: &[CachedCollection],
        mode: MigrationMode,
        progress: Option<&ProgressFn>,
    ) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        for collection in collections {
            let ids = collection.ids();
            let total = ids.len();
            tracing::info!(collection = collection.name(), total, "migrating collection");

            for (processed, id) in ids.iter().enumerate() {
                self.migrate_one(collection, id, mode, &mut report).await;
                report.processed += 1;
                if let Some(progress) = progress {
                    progress(collection.name(), processed + 1, total);
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            rewritten = report.rewritten,
            failed = report.failed,
            "migration pass complete"
        );
        Ok(report)
    }

    async fn migrate_one(
        &self,
        collection: &CachedCollection,
        id: &str,
        mode: MigrationMode,
        report: &mut MigrationReport,
    ) {
        let item = match collection.get(id) {
            Some(Item::Active(item)) => item,
            Some(Item::Tombstone(_)) => {
                report.tombstones += 1;
                return;
            }
            None => return,
        };

        match self.step_item(item.clone()) {
            Ok((migrated, changed)) => {
                let renamed = migrated.id != item.id;
                if !changed && !renamed && mode == MigrationMode::Normal {
                    return;
                }

                let mut migrated = migrated;
                if changed || renamed {
                    migrated.date_modified = now_timestamp_millis();
                }

                if let Err(e) = collection.put(Item::Active(migrated)).await {
                    tracing::warn!(collection = collection.name(), id, error = %e, "failed to persist migrated item");
                    report.failed += 1;
                    return;
                }
                report.rewritten += 1;

                if renamed {
                    report.renamed += 1;
                    if let Err(e) = collection.hard_delete(&item.id).await {
                        tracing::warn!(collection = collection.name(), id = %item.id, error = %e, "failed to remove renamed item's old id");
                        report.failed += 1;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(collection = collection.name(), id, error = %e, "item migration failed, skipping");
                report.failed += 1;
            }
        }
    }

    /// Step one item from its stored version up to [`CURRENT_VERSION`]
    ///
    /// Returns the stepped item and whether any step changed it.
    fn step_item(&self, mut item: ActiveItem) -> Result<(ActiveItem, bool)> {
        if item.version > CURRENT_VERSION {
            return Err(Error::ItemVersionAhead {
                id: item.id,
                version: item.version,
            });
        }

        let mut changed = false;
        while item.version < CURRENT_VERSION {
            let step = item.version;
            match self.registry.get(item.kind, step) {
                Some(transform) => {
                    item = match transform(item)? {
                        Migration::Changed(item) => {
                            changed = true;
                            item
                        }
                        Migration::Unchanged(item) => item,
                    };
                    item.version = step + 1;
                }
                // No transform for this step: the payload is already in
                // shape, only the version number advances
                None => item.version = step + 1,
            }
        }
        Ok((item, changed))
    }
}

// ============================================================================
// TESTS
// ============================================================================
