//! Storage abstraction for tables and feature classes.
//!
//! The station pipelines never talk to a concrete storage engine. They use the
//! [`FeatureStore`] trait, which exposes the handful of statement-style
//! operations the pipelines need: describe a dataset, create tables and feature
//! classes, add fields, read rows in bulk (optionally ordered) and append rows
//! in bulk. Two implementations are provided:
//!
//! - [`MemoryStore`]: an in-process workspace, used for scratch datasets,
//!   tests and benchmarks.
//! - [`JsonDirStore`]: a directory workspace where every dataset is a single
//!   pretty-printed JSON file, read lazily and written synchronously after
//!   each mutation.
//!
//! Rows are positional: the values of a [`Row`] follow the field list given to
//! [`FeatureStore::bulk_read`] / [`FeatureStore::bulk_write`]. The geometry of a
//! feature class row travels separately in [`Row::shape`].

mod dataset;
mod json_dir;
mod memory;

pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

use crate::RouteId;
use geo::{LineString, MultiLineString, Point};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("dataset {0:?} already exists")]
    DatasetExists(String),

    #[error("dataset {0:?} does not exist")]
    DatasetNotFound(String),

    #[error("invalid dataset name {0:?}")]
    InvalidName(String),

    #[error("field {field:?} already exists in {dataset:?}")]
    FieldExists { dataset: String, field: String },

    #[error("field {field:?} not found in {dataset:?}")]
    FieldNotFound { dataset: String, field: String },

    #[error("type mismatch in {dataset:?}: {reason}")]
    TypeMismatch { dataset: String, reason: String },

    #[error("geometry mismatch in {dataset:?}: {reason}")]
    GeometryMismatch { dataset: String, reason: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("store lock poisoned: {0}")]
    Poisoned(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Attribute field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// 16-bit integer
    Short,
    /// 32-bit integer
    Long,
    Double,
    Text,
}

impl FieldType {
    /// Whether a field of this type can identify routes
    pub fn is_route_id_type(self) -> bool {
        matches!(self, FieldType::Short | FieldType::Long | FieldType::Text)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Short => "Short",
            FieldType::Long => "Long",
            FieldType::Double => "Double",
            FieldType::Text => "Text",
        };
        f.write_str(name)
    }
}

/// Attribute field descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    /// Maximum length of text values, when limited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            length: None,
        }
    }

    pub fn with_length(mut self, length: Option<u32>) -> Self {
        self.length = length;
        self
    }

    /// Field names compare case-insensitively
    #[inline]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Check that `value` can be stored in this field
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let ok = match (self.field_type, value) {
            (_, Value::Null) => true,
            (FieldType::Short, Value::Int(v)) => i16::try_from(*v).is_ok(),
            (FieldType::Long, Value::Int(v)) => i32::try_from(*v).is_ok(),
            (FieldType::Double, Value::Int(_) | Value::Double(_)) => true,
            (FieldType::Text, Value::Text(text)) => {
                if let Some(max) = self.length
                    && text.chars().count() > max as usize
                {
                    return Err(format!(
                        "value {text:?} is longer than {max} characters for field {:?}",
                        self.name
                    ));
                }
                true
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(format!(
                "value {value:?} does not fit {} field {:?}",
                self.field_type, self.name
            ))
        }
    }
}

/// Attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Double(f64),
    Text(String),
}

impl Value {
    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Total order used for ORDER BY: nulls, then numbers, then text
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::Null => 0,
                Value::Int(_) | Value::Double(_) => 1,
                Value::Text(_) => 2,
            }
        }
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => rank(a).cmp(&rank(b)),
            },
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&RouteId> for Value {
    fn from(id: &RouteId) -> Self {
        match id {
            RouteId::Int(v) => Value::Int(*v),
            RouteId::Text(v) => Value::Text(v.clone()),
        }
    }
}

impl TryFrom<&Value> for RouteId {
    type Error = String;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(v) => Ok(RouteId::Int(*v)),
            Value::Text(v) => Ok(RouteId::Text(v.clone())),
            other => Err(format!("{other:?} cannot identify a route")),
        }
    }
}

/// Geometry kinds a feature class can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    Polyline,
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryType::Point => f.write_str("Point"),
            GeometryType::Polyline => f.write_str("Polyline"),
        }
    }
}

/// Feature geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// A point, optionally carrying a measure
    Point {
        point: Point<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        m: Option<f64>,
    },
    /// A polyline made of one or more parts
    Polyline { parts: MultiLineString<f64> },
    /// A single-part polyline with one measure per vertex
    PolylineM {
        line: LineString<f64>,
        measures: Vec<f64>,
    },
}

impl Shape {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Shape::Point { .. } => GeometryType::Point,
            Shape::Polyline { .. } | Shape::PolylineM { .. } => GeometryType::Polyline,
        }
    }

    /// The shape as plain line parts, dropping measures
    pub fn to_lines(&self) -> Option<MultiLineString<f64>> {
        match self {
            Shape::Point { .. } => None,
            Shape::Polyline { parts } => Some(parts.clone()),
            Shape::PolylineM { line, .. } => Some(MultiLineString::new(vec![line.clone()])),
        }
    }
}

impl From<LineString<f64>> for Shape {
    fn from(line: LineString<f64>) -> Self {
        Shape::Polyline {
            parts: MultiLineString::new(vec![line]),
        }
    }
}

/// Name, geometry and fields of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub name: String,
    /// `None` for plain tables
    pub geometry_type: Option<GeometryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_reference: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl DatasetSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.is_named(name))
    }

    fn field_index(&self, name: &str) -> StoreResult<usize> {
        self.fields
            .iter()
            .position(|f| f.is_named(name))
            .ok_or_else(|| StoreError::FieldNotFound {
                dataset: self.name.clone(),
                field: name.to_string(),
            })
    }
}

/// One record: the geometry (for feature classes) and positional values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            shape: None,
            values,
        }
    }

    pub fn with_shape(shape: Shape, values: Vec<Value>) -> Self {
        Self {
            shape: Some(shape),
            values,
        }
    }
}

/// Statement-style access to a workspace of tables and feature classes
///
/// Methods take `&self`; implementations use interior locking so a store can be
/// shared by reference across pipeline stages.
pub trait FeatureStore {
    /// Whether a dataset with this name exists
    fn exists(&self, name: &str) -> StoreResult<bool>;

    /// Schema of a dataset
    fn describe(&self, name: &str) -> StoreResult<DatasetSchema>;

    /// Create an empty attribute table
    fn create_table(&self, name: &str) -> StoreResult<()>;

    /// Create an empty feature class
    fn create_feature_class(
        &self,
        name: &str,
        geometry_type: GeometryType,
        spatial_reference: Option<&str>,
    ) -> StoreResult<()>;

    /// Append a field; existing rows get nulls
    fn add_field(&self, name: &str, field: FieldDef) -> StoreResult<()>;

    /// Remove a dataset
    fn delete(&self, name: &str) -> StoreResult<()>;

    /// Read all rows, projected to `fields`, sorted by `order_by` (stable)
    fn bulk_read(&self, name: &str, fields: &[&str], order_by: &[&str]) -> StoreResult<Vec<Row>>;

    /// Append rows whose values follow `fields`; returns the number written
    ///
    /// The batch is validated as a whole; on error nothing is written.
    fn bulk_write(&self, name: &str, fields: &[&str], rows: Vec<Row>) -> StoreResult<usize>;

    /// A dataset name starting with `base` that does not exist yet
    fn unique_name(&self, base: &str) -> StoreResult<String> {
        for n in 0u64.. {
            let candidate = format!("{base}{n}");
            if !self.exists(&candidate)? {
                return Ok(candidate);
            }
        }
        unreachable!("unbounded range")
    }

    /// Fields of a dataset
    fn describe_fields(&self, name: &str) -> StoreResult<Vec<FieldDef>> {
        Ok(self.describe(name)?.fields)
    }

    /// Descriptor of one field
    fn field(&self, name: &str, field: &str) -> StoreResult<FieldDef> {
        let schema = self.describe(name)?;
        schema
            .field(field)
            .cloned()
            .ok_or_else(|| StoreError::FieldNotFound {
                dataset: name.to_string(),
                field: field.to_string(),
            })
    }
}

/// Dataset names become file names, so path syntax is rejected
pub(crate) fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', ':', '\0']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn test_field_check() {
        let short = FieldDef::new("S", FieldType::Short);
        assert!(short.check(&Value::Int(100)).is_ok());
        assert!(short.check(&Value::Int(100_000)).is_err());
        assert!(short.check(&Value::Text("x".into())).is_err());

        let text = FieldDef::new("T", FieldType::Text).with_length(Some(3));
        assert!(text.check(&Value::Text("abc".into())).is_ok());
        assert!(text.check(&Value::Text("abcd".into())).is_err());
        assert!(text.check(&Value::Null).is_ok());

        let double = FieldDef::new("D", FieldType::Double);
        assert!(double.check(&Value::Int(3)).is_ok());
        assert!(double.check(&Value::Double(3.5)).is_ok());
    }

    #[test]
    fn test_value_sort_order() {
        let mut values = vec![
            Value::Text("b".into()),
            Value::Double(2.5),
            Value::Null,
            Value::Int(3),
            Value::Text("a".into()),
            Value::Int(-1),
        ];
        values.sort_by(Value::sort_cmp);
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(-1),
                Value::Double(2.5),
                Value::Int(3),
                Value::Text("a".into()),
                Value::Text("b".into()),
            ]
        );
    }

    #[test]
    fn test_route_id_value_conversion() {
        let id = RouteId::from("Reach 1");
        let value = Value::from(&id);
        assert_eq!(RouteId::try_from(&value), Ok(id));
        assert!(RouteId::try_from(&Value::Double(1.0)).is_err());
    }

    #[test]
    fn test_value_json_is_untagged() {
        let values = vec![
            Value::Null,
            Value::Int(4),
            Value::Double(2.5),
            Value::Text("x".into()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,4,2.5,"x"]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_shape_kinds() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        let shape = Shape::from(line.clone());
        assert_eq!(shape.geometry_type(), GeometryType::Polyline);
        assert_eq!(shape.to_lines().unwrap().0, vec![line]);

        let point = Shape::Point {
            point: Point::new(1.0, 2.0),
            m: Some(3.0),
        };
        assert_eq!(point.geometry_type(), GeometryType::Point);
        assert!(point.to_lines().is_none());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("out_points").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name("a/b").is_err());
    }
}
