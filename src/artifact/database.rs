//! Document store over a [`Storage`] backend

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::Storage;
use crate::error::{AutoopError, Result};

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// Collections of JSON documents keyed by id.
///
/// Every document is persisted as its own `{collection}/{id}` key, and
/// reads are served from an in-memory copy that [`Database::refresh`]
/// rebuilds from storage.
#[derive(Debug)]
pub struct Database<S: Storage> {
    storage: S,
    data: RwLock<Collections>,
}

impl<S: Storage> Database<S> {
    /// Open a database and load every document in `storage`
    pub fn new(storage: S) -> Result<Self> {
        let db = Self {
            storage,
            data: RwLock::new(BTreeMap::new()),
        };
        db.refresh()?;
        Ok(db)
    }

    fn check_name(kind: &str, value: &str) -> Result<()> {
        if value.is_empty() || value.contains('/') {
            return Err(AutoopError::InvalidInput(format!(
                "invalid {} '{}'",
                kind, value
            )));
        }
        Ok(())
    }

    pub fn set<T: Serialize>(&self, collection: &str, id: &str, document: &T) -> Result<()> {
        Self::check_name("collection", collection)?;
        Self::check_name("id", id)?;
        let value = serde_json::to_value(document)?;
        let bytes = serde_json::to_vec(&value)?;
        self.storage.save(&bytes, &format!("{}/{}", collection, id))?;
        self.data
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), value);
        Ok(())
    }

    /// `None` when the id is absent from the collection
    pub fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        let value = self
            .data
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned();
        match value {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Returns whether a document was removed
    pub fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let removed = self
            .data
            .write()
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            self.storage.delete(&format!("{}/{}", collection, id))?;
        }
        Ok(removed)
    }

    /// Every `(id, document)` in a collection, ordered by id
    pub fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<(String, T)>> {
        let docs: Vec<(String, Value)> = self
            .data
            .read()
            .get(collection)
            .map(|docs| docs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        docs.into_iter()
            .map(|(id, v)| Ok((id, serde_json::from_value(v)?)))
            .collect()
    }

    /// Reload the in-memory copy from storage. Keys that are not
    /// `{collection}/{id}` or do not hold JSON are skipped.
    pub fn refresh(&self) -> Result<()> {
        let mut data = Collections::new();
        for key in self.storage.list("")? {
            let Some((collection, id)) = key.split_once('/') else {
                warn!(key, "skipping key outside any collection");
                continue;
            };
            if id.contains('/') {
                warn!(key, "skipping nested key");
                continue;
            }
            let bytes = self.storage.load(&key)?;
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => {
                    data.entry(collection.to_string())
                        .or_default()
                        .insert(id.to_string(), value);
                }
                Err(e) => warn!(key, error = %e, "skipping unreadable document"),
            }
        }
        debug!(collections = data.len(), "database refreshed");
        *self.data.write() = data;
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{LocalStorage, MemoryStorage};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        score: f64,
    }

    #[test]
    fn test_set_get_delete() {
        let db = Database::new(MemoryStorage::new()).unwrap();
        let doc = Doc { name: "a".into(), score: 0.5 };
        db.set("runs", "r1", &doc).unwrap();

        assert_eq!(db.get::<Doc>("runs", "r1").unwrap(), Some(doc));
        assert_eq!(db.get::<Doc>("runs", "r2").unwrap(), None);
        assert_eq!(db.list::<Doc>("runs").unwrap().len(), 1);

        assert!(db.delete("runs", "r1").unwrap());
        assert!(!db.delete("runs", "r1").unwrap());
        assert!(db.list::<Doc>("runs").unwrap().is_empty());
    }

    #[test]
    fn test_refresh_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::new(LocalStorage::new(dir.path()).unwrap()).unwrap();
            db.set("runs", "r1", &Doc { name: "x".into(), score: 1.0 }).unwrap();
            db.set("runs", "r2", &Doc { name: "y".into(), score: 2.0 }).unwrap();
        }

        let reopened = Database::new(LocalStorage::new(dir.path()).unwrap()).unwrap();
        let ids: Vec<String> = reopened
            .list::<Doc>("runs")
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_rejects_nested_ids() {
        let db = Database::new(MemoryStorage::new()).unwrap();
        assert!(db.set("runs", "a/b", &1).is_err());
    }
}
