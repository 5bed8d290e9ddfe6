//! The catalog: the insertion-ordered set of tables alive in the run.

use std::sync::{Arc, RwLock};

use crate::rng::Prng;
use crate::table::{Table, TableKind, TABLE_PREFIX};

/// All tables alive in the run. Workers take `Arc` handles out and borrow
/// tables for the duration of one operation; entries are only appended
/// during the run, so an index handed out stays valid.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<Vec<Arc<Table>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Table>>> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a table.
    pub fn add(&self, table: Arc<Table>) {
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(table);
    }

    /// Replaces the whole content, used when resuming from a checkpoint.
    pub fn replace(&self, tables: Vec<Arc<Table>>) {
        *self.tables.write().unwrap_or_else(|e| e.into_inner()) = tables;
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The table at `at`, wrapping around so per-thread pinning always
    /// resolves.
    pub fn get(&self, at: usize) -> Option<Arc<Table>> {
        let tables = self.read();
        if tables.is_empty() {
            return None;
        }
        Some(Arc::clone(&tables[at % tables.len()]))
    }

    /// A uniformly random table.
    pub fn random(&self, rng: &mut Prng) -> Option<Arc<Table>> {
        let tables = self.read();
        if tables.is_empty() {
            return None;
        }
        Some(Arc::clone(&tables[rng.int(tables.len() as i64 - 1) as usize]))
    }

    /// Looks a table up by name.
    pub fn find(&self, name: &str) -> Option<Arc<Table>> {
        self.read().iter().find(|t| t.name == name).cloned()
    }

    /// The table created for `(kind, id)` during the load phase, where
    /// names are still the un-suffixed `tt_<id>` forms.
    pub fn find_created(&self, kind: TableKind, id: i64) -> Option<Arc<Table>> {
        let name = format!("{TABLE_PREFIX}{id}{}", kind.suffix());
        self.find(&name)
    }

    /// A point-in-time copy of the table list.
    pub fn snapshot(&self) -> Vec<Arc<Table>> {
        self.read().clone()
    }
}
