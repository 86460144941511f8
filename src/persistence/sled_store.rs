//! Latest-value store backed by `sled`
//!
//! The backend server keeps exactly one value per key: every `set`
//! overwrites the previous value. Values live in a dedicated `latest` tree
//! so the default tree stays free for sled's own metadata.

use sled::{Db, Tree};

use crate::utils::StoreError;

const LATEST_TREE: &str = "latest";

#[derive(Clone)]
pub struct Store {
    db: Db,
    latest: Tree,
}

impl Store {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// A store that lives only as long as the process, for tests and demos.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let latest = db.open_tree(LATEST_TREE)?;
        Ok(Self { db, latest })
    }

    /// Replace the value stored under `key`.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.latest.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    /// Fetch the value stored under `key`. Non UTF-8 contents read as absent.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .latest
            .get(key.as_bytes())?
            .and_then(|raw| String::from_utf8(raw.to_vec()).ok()))
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("db", &"sled::Db")
            .field("keys", &self.latest.len())
            .finish()
    }
}
