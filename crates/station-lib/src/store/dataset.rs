//! In-memory dataset shared by the store implementations

use super::{
    DatasetSchema, FieldDef, GeometryType, Row, StoreError, StoreResult, Value,
};
use serde::{Deserialize, Serialize};

/// Schema plus rows; each row holds one value per schema field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Dataset {
    pub schema: DatasetSchema,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn table(name: &str) -> Self {
        Self::with_geometry(name, None, None)
    }

    pub fn feature_class(
        name: &str,
        geometry_type: GeometryType,
        spatial_reference: Option<&str>,
    ) -> Self {
        Self::with_geometry(name, Some(geometry_type), spatial_reference)
    }

    fn with_geometry(
        name: &str,
        geometry_type: Option<GeometryType>,
        spatial_reference: Option<&str>,
    ) -> Self {
        Self {
            schema: DatasetSchema {
                name: name.to_string(),
                geometry_type,
                spatial_reference: spatial_reference.map(str::to_string),
                fields: Vec::new(),
            },
            rows: Vec::new(),
        }
    }

    pub fn add_field(&mut self, field: FieldDef) -> StoreResult<()> {
        if self.schema.field(&field.name).is_some() {
            return Err(StoreError::FieldExists {
                dataset: self.schema.name.clone(),
                field: field.name,
            });
        }
        self.schema.fields.push(field);
        for row in &mut self.rows {
            row.values.push(Value::Null);
        }
        Ok(())
    }

    /// Check that every row holds one value per schema field
    pub fn check_rows(&self) -> Result<(), String> {
        let expected = self.schema.fields.len();
        match self
            .rows
            .iter()
            .position(|row| row.values.len() != expected)
        {
            Some(n) => Err(format!(
                "row {n} has {} values for {expected} fields",
                self.rows[n].values.len()
            )),
            None => Ok(()),
        }
    }

    fn indices(&self, fields: &[&str]) -> StoreResult<Vec<usize>> {
        fields
            .iter()
            .map(|field| self.schema.field_index(field))
            .collect()
    }

    pub fn read(&self, fields: &[&str], order_by: &[&str]) -> StoreResult<Vec<Row>> {
        let projection = self.indices(fields)?;
        let ordering = self.indices(order_by)?;

        let mut rows: Vec<&Row> = self.rows.iter().collect();
        if !ordering.is_empty() {
            rows.sort_by(|a, b| {
                ordering
                    .iter()
                    .map(|&i| a.values[i].sort_cmp(&b.values[i]))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Row {
                shape: row.shape.clone(),
                values: projection.iter().map(|&i| row.values[i].clone()).collect(),
            })
            .collect())
    }

    /// Validate the whole batch, then append it
    pub fn write(&mut self, fields: &[&str], rows: Vec<Row>) -> StoreResult<usize> {
        let positions = self.indices(fields)?;
        let name = &self.schema.name;

        let mut full_rows = Vec::with_capacity(rows.len());
        for (n, row) in rows.into_iter().enumerate() {
            if row.values.len() != positions.len() {
                return Err(StoreError::TypeMismatch {
                    dataset: name.clone(),
                    reason: format!(
                        "row {n} has {} values for {} fields",
                        row.values.len(),
                        positions.len()
                    ),
                });
            }

            match (self.schema.geometry_type, &row.shape) {
                (None, None) => {}
                (None, Some(_)) => {
                    return Err(StoreError::GeometryMismatch {
                        dataset: name.clone(),
                        reason: format!("row {n} has a shape but the dataset is a table"),
                    });
                }
                (Some(expected), None) => {
                    return Err(StoreError::GeometryMismatch {
                        dataset: name.clone(),
                        reason: format!("row {n} is missing its {expected} shape"),
                    });
                }
                (Some(expected), Some(shape)) if shape.geometry_type() != expected => {
                    return Err(StoreError::GeometryMismatch {
                        dataset: name.clone(),
                        reason: format!(
                            "row {n} has a {} shape, expected {expected}",
                            shape.geometry_type()
                        ),
                    });
                }
                _ => {}
            }

            let mut values = vec![Value::Null; self.schema.fields.len()];
            for (&i, value) in positions.iter().zip(row.values) {
                self.schema.fields[i]
                    .check(&value)
                    .map_err(|reason| StoreError::TypeMismatch {
                        dataset: name.clone(),
                        reason: format!("row {n}: {reason}"),
                    })?;
                values[i] = value;
            }
            full_rows.push(Row {
                shape: row.shape,
                values,
            });
        }

        let written = full_rows.len();
        self.rows.extend(full_rows);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldType, Shape};
    use geo::Point;

    fn events() -> Dataset {
        let mut dataset = Dataset::table("events");
        dataset
            .add_field(FieldDef::new("ID", FieldType::Text).with_length(Some(8)))
            .unwrap();
        dataset
            .add_field(FieldDef::new("Measure", FieldType::Double))
            .unwrap();
        dataset
    }

    #[test]
    fn test_write_then_read_ordered() {
        let mut dataset = events();
        let rows = vec![
            Row::new(vec![Value::Text("B".into()), Value::Double(5.0)]),
            Row::new(vec![Value::Text("A".into()), Value::Double(10.0)]),
            Row::new(vec![Value::Text("A".into()), Value::Double(0.0)]),
        ];
        assert_eq!(dataset.write(&["ID", "Measure"], rows).unwrap(), 3);

        let read = dataset.read(&["measure", "id"], &["ID", "Measure"]).unwrap();
        let pairs: Vec<_> = read
            .iter()
            .map(|r| (r.values[1].clone(), r.values[0].as_f64().unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (Value::Text("A".into()), 0.0),
                (Value::Text("A".into()), 10.0),
                (Value::Text("B".into()), 5.0)
            ]
        );
    }

    #[test]
    fn test_partial_field_list_fills_nulls() {
        let mut dataset = events();
        dataset
            .write(&["Measure"], vec![Row::new(vec![Value::Double(1.0)])])
            .unwrap();
        assert_eq!(dataset.rows[0].values, vec![Value::Null, Value::Double(1.0)]);
    }

    #[test]
    fn test_batch_is_atomic() {
        let mut dataset = events();
        let rows = vec![
            Row::new(vec![Value::Text("ok".into()), Value::Double(1.0)]),
            Row::new(vec![Value::Text("far too long".into()), Value::Double(2.0)]),
        ];
        assert!(matches!(
            dataset.write(&["ID", "Measure"], rows),
            Err(StoreError::TypeMismatch { .. })
        ));
        assert!(dataset.rows.is_empty());
    }

    #[test]
    fn test_geometry_rules() {
        let mut table = events();
        let shaped = Row::with_shape(
            Shape::Point {
                point: Point::new(0.0, 0.0),
                m: None,
            },
            vec![Value::Double(0.0)],
        );
        assert!(matches!(
            table.write(&["Measure"], vec![shaped.clone()]),
            Err(StoreError::GeometryMismatch { .. })
        ));

        let mut lines = Dataset::feature_class("lines", GeometryType::Polyline, None);
        lines
            .add_field(FieldDef::new("Measure", FieldType::Double))
            .unwrap();
        assert!(matches!(
            lines.write(&["Measure"], vec![shaped]),
            Err(StoreError::GeometryMismatch { .. })
        ));
        assert!(matches!(
            lines.write(&["Measure"], vec![Row::new(vec![Value::Double(0.0)])]),
            Err(StoreError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_check_rows_finds_short_row() {
        let mut dataset = events();
        assert!(dataset.check_rows().is_ok());
        dataset.rows.push(Row::new(vec![Value::Text("A".into())]));
        assert_eq!(
            dataset.check_rows().unwrap_err(),
            "row 0 has 1 values for 2 fields"
        );
    }

    #[test]
    fn test_add_field_twice_and_unknown_field() {
        let mut dataset = events();
        assert!(matches!(
            dataset.add_field(FieldDef::new("measure", FieldType::Double)),
            Err(StoreError::FieldExists { .. })
        ));
        assert!(matches!(
            dataset.read(&["Nope"], &[]),
            Err(StoreError::FieldNotFound { .. })
        ));
    }
}
