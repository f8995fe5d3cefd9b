//! Client-local persistence for the active route.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StoreError;
use crate::tracker::{ActiveRouteRecord, ACTIVE_ROUTE_KEY};
use crate::traits::RouteStore;

/// Stores the active route as one JSON file named after its storage key.
///
/// Writes go to a temporary file that is renamed into place, so a crash
/// mid-write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Uses `<dir>/active-route.json`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_key(dir, ACTIVE_ROUTE_KEY)
    }

    pub fn with_key(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RouteStore for JsonFileStore {
    fn load(&self) -> Result<Option<ActiveRouteRecord>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record = serde_json::from_reader(io::BufReader::new(file))?;
        Ok(Some(record))
    }

    fn save(&mut self, record: &ActiveRouteRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer(&mut writer, record)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), "route record written");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Keeps the serialized record in memory.
///
/// Goes through JSON like the file store, so round-trip behaviour matches.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    json: Option<String>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: &ActiveRouteRecord) -> Result<Self, StoreError> {
        Ok(Self {
            json: Some(serde_json::to_string(record)?),
            saves: 0,
        })
    }

    pub fn json(&self) -> Option<&str> {
        self.json.as_deref()
    }

    /// Number of `save` calls seen.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl RouteStore for MemoryStore {
    fn load(&self) -> Result<Option<ActiveRouteRecord>, StoreError> {
        self.json
            .as_deref()
            .map(serde_json::from_str::<ActiveRouteRecord>)
            .transpose()
            .map_err(StoreError::from)
    }

    fn save(&mut self, record: &ActiveRouteRecord) -> Result<(), StoreError> {
        self.json = Some(serde_json::to_string(record)?);
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.json = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinates, Leg, OptimizedRoute, PlanSource, Route, Stop};
    use chrono::Utc;

    fn sample_record() -> ActiveRouteRecord {
        let stops = vec![
            Stop::new("permit-7", Coordinates::new(36.03, -115.04), "7 Oak St").with_priority(80.0),
            Stop::new("lead-9", Coordinates::new(36.05, -115.06), "9 Elm St"),
        ];
        let optimized = OptimizedRoute::from_legs(
            stops,
            vec![Leg::estimate(0.0, 15.0), Leg::estimate(1.8, 18.6)],
            None,
            PlanSource::Local,
        );
        let now = Utc::now();
        let route = Route::from_optimized(&optimized, "1 Shop Rd", "1 Shop Rd", now);
        let mut record = ActiveRouteRecord::new(route, now);
        record.route.stops[0].visited = true;
        record.route.current_stop_index = 1;
        record.elapsed_minutes = 42;
        record
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = JsonFileStore::new(dir.path());
        let record = sample_record();

        store.save(&record).expect("save");
        let loaded = store.load().expect("load").expect("record present");

        assert_eq!(loaded, record);
        assert!(store.path().ends_with("active-route.json"));
    }

    #[test]
    fn file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path());

        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn file_store_clear_removes_record_and_tolerates_repeat() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = JsonFileStore::new(dir.path());
        store.save(&sample_record()).expect("save");

        store.clear().expect("clear");
        store.clear().expect("second clear");

        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn file_store_overwrites_previous_record() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = JsonFileStore::new(dir.path());
        let mut record = sample_record();
        store.save(&record).expect("save");

        record.elapsed_minutes = 90;
        store.save(&record).expect("save again");

        let loaded = store.load().expect("load").expect("record present");
        assert_eq!(loaded.elapsed_minutes, 90);
    }

    #[test]
    fn corrupt_file_is_a_json_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path());
        fs::write(store.path(), "{ not json").expect("write");

        assert!(matches!(store.load(), Err(StoreError::Json(_))));
    }

    #[test]
    fn persisted_json_uses_camel_case_fields() {
        let store = MemoryStore::with_record(&sample_record()).expect("serialize");
        let json = store.json().expect("json present");

        assert!(json.contains("\"currentStopIndex\":1"));
        assert!(json.contains("\"priorityScore\":80.0"));
        assert!(json.contains("\"distanceFromPrevious\""));
        assert!(json.contains("\"elapsedMinutes\":42"));
    }

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryStore::new();
        let record = sample_record();

        store.save(&record).expect("save");

        assert_eq!(store.load().expect("load"), Some(record));
        assert_eq!(store.saves(), 1);
    }
}
