//! Persistence of the baselayers and overlays.
//!
//! The store is a plain collection store: it assigns ids and creation times,
//! and enforces that a year has at most one baselayer. Everything else is done
//! by the callers.

use crate::layers::*;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub type DocId = u64;

/// A document as persisted, with the fields assigned by the store.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: DocId,
    /// Seconds since the unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: u64,
    #[serde(flatten)]
    pub doc: T,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SnapshotFilter {
    pub year: Option<i32>,
}

impl SnapshotFilter {
    fn accepts(&self, snapshot: &YearSnapshot) -> bool {
        self.year.map(|y| y == snapshot.year).unwrap_or(true)
    }
}

pub trait DocumentStore {
    fn find_all(&self, filter: &SnapshotFilter) -> TractResult<Vec<Stored<YearSnapshot>>>;

    fn find_by_year(&self, year: i32) -> TractResult<Option<Stored<YearSnapshot>>>;

    /// Fails with `DuplicateYear` if the year is already stored.
    fn insert(&mut self, snapshot: YearSnapshot) -> TractResult<Stored<YearSnapshot>>;

    fn delete_by_id(&mut self, id: DocId) -> TractResult<()>;

    fn delete_all_overlays(&mut self) -> TractResult<()>;

    fn insert_overlays(
        &mut self,
        overlays: Vec<OverlayRecord>,
    ) -> TractResult<Vec<Stored<OverlayRecord>>>;

    fn find_overlays(&self, overlay_type: &str) -> TractResult<Vec<Stored<OverlayRecord>>>;
}

/// The full content of a store.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(rename = "nextId", default)]
    next_id: DocId,
    #[serde(default)]
    baselayers: Vec<Stored<YearSnapshot>>,
    #[serde(default)]
    overlays: Vec<Stored<OverlayRecord>>,
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Database {
    fn stamp<T>(&mut self, doc: T) -> Stored<T> {
        self.next_id += 1;
        Stored {
            id: self.next_id,
            created_at: now(),
            doc,
        }
    }

    fn find_all(&self, filter: &SnapshotFilter) -> Vec<Stored<YearSnapshot>> {
        self.baselayers
            .iter()
            .filter(|s| filter.accepts(&s.doc))
            .cloned()
            .collect()
    }

    fn find_by_year(&self, year: i32) -> Option<Stored<YearSnapshot>> {
        self.baselayers.iter().find(|s| s.doc.year == year).cloned()
    }

    fn insert(&mut self, snapshot: YearSnapshot) -> TractResult<Stored<YearSnapshot>> {
        let year = snapshot.year;
        ensure!(
            self.find_by_year(year).is_none(),
            DuplicateYearSnafu { year }
        );
        let stored = self.stamp(snapshot);
        self.baselayers.push(stored.clone());
        Ok(stored)
    }

    fn delete_by_id(&mut self, id: DocId) {
        self.baselayers.retain(|s| s.id != id);
    }

    fn delete_all_overlays(&mut self) {
        self.overlays.clear();
    }

    fn insert_overlays(&mut self, overlays: Vec<OverlayRecord>) -> Vec<Stored<OverlayRecord>> {
        let stored: Vec<Stored<OverlayRecord>> =
            overlays.into_iter().map(|o| self.stamp(o)).collect();
        self.overlays.extend(stored.iter().cloned());
        stored
    }

    fn find_overlays(&self, overlay_type: &str) -> Vec<Stored<OverlayRecord>> {
        self.overlays
            .iter()
            .filter(|o| o.doc.overlay_type == overlay_type)
            .cloned()
            .collect()
    }
}

/// A store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    db: Database,
}

impl DocumentStore for MemoryStore {
    fn find_all(&self, filter: &SnapshotFilter) -> TractResult<Vec<Stored<YearSnapshot>>> {
        Ok(self.db.find_all(filter))
    }

    fn find_by_year(&self, year: i32) -> TractResult<Option<Stored<YearSnapshot>>> {
        Ok(self.db.find_by_year(year))
    }

    fn insert(&mut self, snapshot: YearSnapshot) -> TractResult<Stored<YearSnapshot>> {
        self.db.insert(snapshot)
    }

    fn delete_by_id(&mut self, id: DocId) -> TractResult<()> {
        self.db.delete_by_id(id);
        Ok(())
    }

    fn delete_all_overlays(&mut self) -> TractResult<()> {
        self.db.delete_all_overlays();
        Ok(())
    }

    fn insert_overlays(
        &mut self,
        overlays: Vec<OverlayRecord>,
    ) -> TractResult<Vec<Stored<OverlayRecord>>> {
        Ok(self.db.insert_overlays(overlays))
    }

    fn find_overlays(&self, overlay_type: &str) -> TractResult<Vec<Stored<OverlayRecord>>> {
        Ok(self.db.find_overlays(overlay_type))
    }
}

/// A store kept in a single JSON file. The file is read again by every
/// operation and rewritten by every change. A missing file is an empty store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: &str) -> JsonFileStore {
        JsonFileStore {
            path: PathBuf::from(path),
        }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> TractResult<Database> {
        if !self.path.exists() {
            debug!("JsonFileStore: {} does not exist yet", self.path_str());
            return Ok(Database::default());
        }
        let path = self.path_str();
        let contents = fs::read_to_string(&self.path).context(ReadingFileSnafu { path: &path })?;
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })
    }

    /// The file the database is written to before replacing the store.
    fn temp_path(&self) -> PathBuf {
        let mut p = self.path.clone().into_os_string();
        p.push(".tmp");
        PathBuf::from(p)
    }

    fn save(&self, db: &Database) -> TractResult<()> {
        let contents = serde_json::to_string_pretty(db).context(WritingJsonSnafu {})?;
        let tmp = self.temp_path();
        fs::write(&tmp, contents).context(WritingFileSnafu {
            path: tmp.display().to_string(),
        })?;
        fs::rename(&tmp, &self.path).context(WritingFileSnafu {
            path: self.path_str(),
        })?;
        debug!("JsonFileStore: saved {}", self.path_str());
        Ok(())
    }

    fn update<T>(&self, f: impl FnOnce(&mut Database) -> TractResult<T>) -> TractResult<T> {
        let mut db = self.load()?;
        let res = f(&mut db)?;
        self.save(&db)?;
        Ok(res)
    }
}

impl DocumentStore for JsonFileStore {
    fn find_all(&self, filter: &SnapshotFilter) -> TractResult<Vec<Stored<YearSnapshot>>> {
        Ok(self.load()?.find_all(filter))
    }

    fn find_by_year(&self, year: i32) -> TractResult<Option<Stored<YearSnapshot>>> {
        Ok(self.load()?.find_by_year(year))
    }

    fn insert(&mut self, snapshot: YearSnapshot) -> TractResult<Stored<YearSnapshot>> {
        self.update(|db| db.insert(snapshot))
    }

    fn delete_by_id(&mut self, id: DocId) -> TractResult<()> {
        self.update(|db| {
            db.delete_by_id(id);
            Ok(())
        })
    }

    fn delete_all_overlays(&mut self) -> TractResult<()> {
        self.update(|db| {
            db.delete_all_overlays();
            Ok(())
        })
    }

    fn insert_overlays(
        &mut self,
        overlays: Vec<OverlayRecord>,
    ) -> TractResult<Vec<Stored<OverlayRecord>>> {
        self.update(|db| Ok(db.insert_overlays(overlays)))
    }

    fn find_overlays(&self, overlay_type: &str) -> TractResult<Vec<Stored<OverlayRecord>>> {
        Ok(self.load()?.find_overlays(overlay_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshot(year: i32, geo_ids: &[&str]) -> YearSnapshot {
        YearSnapshot {
            year,
            geographies: geo_ids
                .iter()
                .map(|g| GeographyRecord::new(g, BTreeMap::new()))
                .collect(),
        }
    }

    fn overlay(overlay_type: &str, name: &str) -> OverlayRecord {
        let row = Row::new(vec![("Name".to_string(), Cell::Text(name.to_string()))]);
        OverlayRecord::from_row(overlay_type, &row)
    }

    fn exercise(store: &mut dyn DocumentStore) {
        let a = store.insert(snapshot(2021, &["A"])).unwrap();
        let b = store.insert(snapshot(2022, &["A", "B"])).unwrap();
        assert_ne!(a.id, b.id);

        let err = store.insert(snapshot(2021, &[])).unwrap_err();
        assert!(matches!(err, TractError::DuplicateYear { year: 2021 }));

        assert_eq!(store.find_all(&SnapshotFilter::default()).unwrap().len(), 2);
        let only = store.find_all(&SnapshotFilter { year: Some(2022) }).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0], b);
        assert_eq!(store.find_by_year(2021).unwrap(), Some(a.clone()));

        store.delete_by_id(a.id).unwrap();
        assert_eq!(store.find_by_year(2021).unwrap(), None);
        // The year can be ingested again once deleted.
        store.insert(snapshot(2021, &["C"])).unwrap();

        store
            .insert_overlays(vec![overlay("parks", "Lake"), overlay("schools", "Elm")])
            .unwrap();
        assert_eq!(store.find_overlays("parks").unwrap().len(), 1);
        store.delete_all_overlays().unwrap();
        assert!(store.find_overlays("parks").unwrap().is_empty());
        assert!(store.find_overlays("schools").unwrap().is_empty());
    }

    #[test]
    fn memory_store() {
        let mut store = MemoryStore::default();
        exercise(&mut store);
    }

    #[test]
    fn json_file_store() {
        let path = std::env::temp_dir().join(format!("tractlayers-store-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);
        let path = path.display().to_string();
        let mut store = JsonFileStore::new(&path);
        exercise(&mut store);

        // Another handle on the same file sees the same data.
        let other = JsonFileStore::new(&path);
        let years: Vec<i32> = other
            .find_all(&SnapshotFilter::default())
            .unwrap()
            .iter()
            .map(|s| s.doc.year)
            .collect();
        assert_eq!(years, vec![2022, 2021]);
        assert!(!store.temp_path().exists());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn interrupted_write_leaves_the_store_intact() {
        let path = std::env::temp_dir().join(format!("tractlayers-tmp-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);
        let path = path.display().to_string();
        let mut store = JsonFileStore::new(&path);
        store.insert(snapshot(2021, &["A"])).unwrap();

        // A partial write from an earlier run.
        fs::write(store.temp_path(), "{\"nextId\": 7, \"basel").unwrap();
        assert_eq!(store.find_by_year(2021).unwrap().map(|s| s.doc.year), Some(2021));

        store.insert(snapshot(2022, &["A"])).unwrap();
        assert!(!store.temp_path().exists());
        assert_eq!(store.find_all(&SnapshotFilter::default()).unwrap().len(), 2);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn stored_documents_are_flat() {
        let stored = Stored {
            id: 3,
            created_at: 1700000000,
            doc: snapshot(2020, &[]),
        };
        assert_eq!(
            serde_json::to_value(&stored).unwrap(),
            serde_json::json!({"id": 3, "createdAt": 1700000000, "year": 2020, "geographies": []})
        );
    }
}
