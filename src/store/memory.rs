use std::sync::RwLock;

use crate::errors::Result;

use super::{read_tables, run_transaction, Repository, Store, Tables};

/// volatile store; used by tests and short-lived tools
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for InMemoryStore {
    fn read<R>(&self, f: impl FnOnce(&dyn Repository) -> Result<R>) -> Result<R> {
        read_tables(&self.tables, f)
    }

    fn transaction<R>(&self, f: impl FnOnce(&mut dyn Repository) -> Result<R>) -> Result<R> {
        run_transaction(&self.tables, f, |_| Ok(()))
    }
}
