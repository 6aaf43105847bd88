//! Directory workspace with one JSON file per dataset
//!
//! Implementation notes:
//! - Datasets are read from disk on first access and cached in memory.
//! - Every mutation writes the dataset file back synchronously before the
//!   cache is updated, so a failed write leaves both unchanged.
//! - Files whose rows do not match their schema are rejected on load.

use super::dataset::Dataset;
use super::{
    DatasetSchema, FeatureStore, FieldDef, GeometryType, Row, StoreError, StoreResult,
    validate_name,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const EXTENSION: &str = "json";

pub struct JsonDirStore {
    /// Workspace directory
    root: PathBuf,
    /// Datasets loaded so far, by name
    cache: Mutex<HashMap<String, Dataset>>,
}

impl JsonDirStore {
    /// Open (and create if needed) a workspace directory
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            StoreError::Io(format!(
                "Failed to create workspace {}: {}",
                root.display(),
                e
            ))
        })?;
        tracing::debug!("Opened JSON workspace {}", root.display());
        Ok(Self {
            root,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing the dataset `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{EXTENSION}"))
    }

    /// Dataset names found in the workspace directory, sorted
    pub fn names(&self) -> StoreResult<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| StoreError::Io(format!("Failed to list workspace: {}", e)))?;
        let mut names = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StoreError::Io(format!("Failed to list workspace: {}", e)))?
                .path();
            if path.extension().is_some_and(|ext| ext == EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Dataset>>> {
        self.cache
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("{e:?}")))
    }

    fn load(&self, name: &str) -> StoreResult<Dataset> {
        let path = self.path_for(name);
        let text = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::DatasetNotFound(name.to_string())
            } else {
                StoreError::Io(format!("Failed to read {}: {}", path.display(), e))
            }
        })?;
        let mut dataset: Dataset = serde_json::from_str(&text).map_err(|e| {
            StoreError::Json(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        dataset.check_rows().map_err(|reason| {
            StoreError::Json(format!("Invalid dataset {}: {}", path.display(), reason))
        })?;
        // The file name is authoritative
        dataset.schema.name = name.to_string();
        Ok(dataset)
    }

    fn flush(&self, dataset: &Dataset) -> StoreResult<()> {
        let path = self.path_for(&dataset.schema.name);
        let text =
            serde_json::to_string_pretty(dataset).map_err(|e| StoreError::Json(e.to_string()))?;
        fs::write(&path, text)
            .map_err(|e| StoreError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Run `f` on the cached dataset, loading it first if needed
    ///
    /// A mutation runs on a copy that replaces the cached dataset only once it
    /// has been written to disk.
    fn with_dataset<T>(
        &self,
        name: &str,
        mutates: bool,
        f: impl FnOnce(&mut Dataset) -> StoreResult<T>,
    ) -> StoreResult<T> {
        validate_name(name)?;
        let mut guard = self.lock()?;
        if !guard.contains_key(name) {
            let dataset = self.load(name)?;
            guard.insert(name.to_string(), dataset);
        }
        let cached = guard
            .get_mut(name)
            .ok_or_else(|| StoreError::DatasetNotFound(name.to_string()))?;
        if !mutates {
            return f(cached);
        }

        let mut updated = cached.clone();
        let result = f(&mut updated)?;
        self.flush(&updated)?;
        *cached = updated;
        Ok(result)
    }

    fn insert_new(&self, dataset: Dataset) -> StoreResult<()> {
        let name = dataset.schema.name.clone();
        validate_name(&name)?;
        let mut guard = self.lock()?;
        if guard.contains_key(&name) || self.path_for(&name).exists() {
            return Err(StoreError::DatasetExists(name));
        }
        self.flush(&dataset)?;
        tracing::debug!("Created dataset {}", self.path_for(&name).display());
        guard.insert(name, dataset);
        Ok(())
    }
}

impl FeatureStore for JsonDirStore {
    fn exists(&self, name: &str) -> StoreResult<bool> {
        validate_name(name)?;
        Ok(self.lock()?.contains_key(name) || self.path_for(name).exists())
    }

    fn describe(&self, name: &str) -> StoreResult<DatasetSchema> {
        self.with_dataset(name, false, |dataset| Ok(dataset.schema.clone()))
    }

    fn create_table(&self, name: &str) -> StoreResult<()> {
        self.insert_new(Dataset::table(name))
    }

    fn create_feature_class(
        &self,
        name: &str,
        geometry_type: GeometryType,
        spatial_reference: Option<&str>,
    ) -> StoreResult<()> {
        self.insert_new(Dataset::feature_class(
            name,
            geometry_type,
            spatial_reference,
        ))
    }

    fn add_field(&self, name: &str, field: FieldDef) -> StoreResult<()> {
        self.with_dataset(name, true, |dataset| dataset.add_field(field))
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        validate_name(name)?;
        let mut guard = self.lock()?;
        let cached = guard.remove(name).is_some();
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if cached {
                    Ok(())
                } else {
                    Err(StoreError::DatasetNotFound(name.to_string()))
                }
            }
            Err(e) => Err(StoreError::Io(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn bulk_read(&self, name: &str, fields: &[&str], order_by: &[&str]) -> StoreResult<Vec<Row>> {
        self.with_dataset(name, false, |dataset| dataset.read(fields, order_by))
    }

    fn bulk_write(&self, name: &str, fields: &[&str], rows: Vec<Row>) -> StoreResult<usize> {
        self.with_dataset(name, true, |dataset| dataset.write(fields, rows))
    }
}
