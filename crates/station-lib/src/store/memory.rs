//! In-process workspace

use super::dataset::Dataset;
use super::{
    DatasetSchema, FeatureStore, FieldDef, GeometryType, Row, StoreError, StoreResult,
    validate_name,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Datasets held in memory for the lifetime of the store
#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: Mutex<BTreeMap<String, Dataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all datasets, sorted
    pub fn names(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, Dataset>>> {
        self.datasets
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("{e:?}")))
    }

    fn insert_new(&self, dataset: Dataset) -> StoreResult<()> {
        validate_name(&dataset.schema.name)?;
        let mut guard = self.lock()?;
        if guard.contains_key(&dataset.schema.name) {
            return Err(StoreError::DatasetExists(dataset.schema.name));
        }
        tracing::trace!("Created in-memory dataset {}", dataset.schema.name);
        guard.insert(dataset.schema.name.clone(), dataset);
        Ok(())
    }

    fn with_dataset<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Dataset) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut guard = self.lock()?;
        let dataset = guard
            .get_mut(name)
            .ok_or_else(|| StoreError::DatasetNotFound(name.to_string()))?;
        f(dataset)
    }
}

impl FeatureStore for MemoryStore {
    fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.lock()?.contains_key(name))
    }

    fn describe(&self, name: &str) -> StoreResult<DatasetSchema> {
        self.with_dataset(name, |dataset| Ok(dataset.schema.clone()))
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
        self.with_dataset(name, |dataset| dataset.add_field(field))
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        self.lock()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::DatasetNotFound(name.to_string()))
    }

    fn bulk_read(&self, name: &str, fields: &[&str], order_by: &[&str]) -> StoreResult<Vec<Row>> {
        self.with_dataset(name, |dataset| dataset.read(fields, order_by))
    }

    fn bulk_write(&self, name: &str, fields: &[&str], rows: Vec<Row>) -> StoreResult<usize> {
        self.with_dataset(name, |dataset| dataset.write(fields, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldType, Value};

    #[test]
    fn test_create_describe_delete() {
        let store = MemoryStore::new();
        store
            .create_feature_class("routes", GeometryType::Polyline, Some("EPSG:32633"))
            .unwrap();
        store
            .add_field("routes", FieldDef::new("RID", FieldType::Long))
            .unwrap();

        let schema = store.describe("routes").unwrap();
        assert_eq!(schema.geometry_type, Some(GeometryType::Polyline));
        assert_eq!(schema.spatial_reference.as_deref(), Some("EPSG:32633"));
        assert_eq!(store.field("routes", "rid").unwrap().field_type, FieldType::Long);
        assert_eq!(
            store.describe_fields("routes").unwrap(),
            vec![FieldDef::new("RID", FieldType::Long)]
        );
        assert!(matches!(
            store.field("routes", "NAME"),
            Err(StoreError::FieldNotFound { .. })
        ));

        assert!(matches!(
            store.create_table("routes"),
            Err(StoreError::DatasetExists(_))
        ));

        store.delete("routes").unwrap();
        assert!(!store.exists("routes").unwrap());
        assert!(matches!(
            store.delete("routes"),
            Err(StoreError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn test_unique_name_skips_existing() {
        let store = MemoryStore::new();
        let first = store.unique_name("event_table").unwrap();
        assert_eq!(first, "event_table0");
        store.create_table(&first).unwrap();
        assert_eq!(store.unique_name("event_table").unwrap(), "event_table1");
    }

    #[test]
    fn test_bulk_write_and_read() {
        let store = MemoryStore::new();
        store.create_table("t").unwrap();
        store
            .add_field("t", FieldDef::new("Measure", FieldType::Double))
            .unwrap();
        let written = store
            .bulk_write(
                "t",
                &["Measure"],
                vec![Row::new(vec![Value::Double(2.0)]), Row::new(vec![Value::Double(1.0)])],
            )
            .unwrap();
        assert_eq!(written, 2);

        let rows = store.bulk_read("t", &["Measure"], &["Measure"]).unwrap();
        assert_eq!(rows[0].values, vec![Value::Double(1.0)]);
        assert_eq!(store.names().unwrap(), vec!["t".to_string()]);
    }

    #[test]
    fn test_missing_dataset() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.describe("nope"),
            Err(StoreError::DatasetNotFound(_))
        ));
        assert!(matches!(
            store.bulk_read("nope", &[], &[]),
            Err(StoreError::DatasetNotFound(_))
        ));
    }
}
