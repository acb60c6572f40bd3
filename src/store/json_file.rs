use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info};

use crate::errors::{LoanError, Result};

use super::tables::TablesSnapshot;
use super::{read_tables, run_transaction, Repository, Store, Tables};

/// durable store: the record set lives in memory and every committed unit is
/// written to a json file before it becomes visible
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    tables: RwLock<Tables>,
}

impl JsonFileStore {
    /// open the store at `path`, creating an empty one if the file is absent
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tables = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| LoanError::persistence_with(format!("cannot read {}", path.display()), e))?;
            let snapshot: TablesSnapshot = serde_json::from_str(&raw)
                .map_err(|e| LoanError::persistence_with(format!("corrupt store file {}", path.display()), e))?;
            Tables::from_snapshot(snapshot)?
        } else {
            Tables::new()
        };

        info!(path = %path.display(), "opened json store");
        Ok(Self {
            path,
            tables: RwLock::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(path: &Path, tables: &Tables) -> Result<()> {
        let json = serde_json::to_vec_pretty(&tables.to_snapshot())
            .map_err(|e| LoanError::persistence_with("cannot serialise store", e))?;

        // write-then-rename keeps the previous file intact if the write dies
        let tmp = path.with_extension("tmp");
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            LoanError::persistence_with(format!("cannot write {}", path.display()), e)
        })?;

        debug!(path = %path.display(), bytes = json.len(), "store committed");
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn read<R>(&self, f: impl FnOnce(&dyn Repository) -> Result<R>) -> Result<R> {
        read_tables(&self.tables, f)
    }

    fn transaction<R>(&self, f: impl FnOnce(&mut dyn Repository) -> Result<R>) -> Result<R> {
        run_transaction(&self.tables, f, |working| Self::persist(&self.path, working))
    }
}
