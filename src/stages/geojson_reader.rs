// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;

use crate::config::consts::{FEATURE_COLLECTION, KEY_CONNECTION_STRING};
use crate::engine::RunScope;
use crate::errors::StageError;
use crate::graph::environment::layer_name;
use crate::record::{Record, RecordStream};
use crate::schema::{DataType, FieldDef, GeometryType, SchemaDef};
use crate::traits::{bind_params, ParamMetadata, Params, Stage, StageKind, StoreCapability};

const DEFAULT_SRID: i32 = 4326;
const EXTENSIONS: [&str; 2] = [".geojson", ".json"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReaderConfig {
    #[serde(default)]
    connection_string: Option<Value>,
}

/// Reads GeoJSON FeatureCollections from files or inline documents.
///
/// The connection string is a file path, inline collection (object or JSON
/// text), or a list of those; the collections are read in order.
#[derive(Default)]
pub struct GeoJsonReader {
    config: ReaderConfig,
    loaded: RefCell<Vec<Record>>,
}

impl GeoJsonReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> Result<Vec<Value>, StageError> {
        let connection = self.config.connection_string.as_ref().ok_or_else(|| {
            StageError::InvalidParameter {
                name: KEY_CONNECTION_STRING.to_string(),
                reason: "no data source given".to_string(),
            }
        })?;

        let items: Vec<&Value> = match connection {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        items.into_iter().map(read_document).collect()
    }
}

fn is_geojson_path(text: &str) -> bool {
    let lowered = text.to_lowercase();
    EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

fn is_inline_collection(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some(FEATURE_COLLECTION)
}

fn read_document(connection: &Value) -> Result<Value, StageError> {
    match connection {
        Value::Object(_) if is_inline_collection(connection) => Ok(connection.clone()),
        Value::String(text) if text.trim_start().starts_with('{') => Ok(serde_json::from_str(text)?),
        Value::String(path) => Ok(serde_json::from_str(&fs::read_to_string(path)?)?),
        other => Err(StageError::InvalidParameter {
            name: KEY_CONNECTION_STRING.to_string(),
            reason: format!("unsupported GeoJSON data source {}", other),
        }),
    }
}

/// EPSG code of a collection's named CRS (`EPSG:25830`, `urn:ogc:def:crs:EPSG::25830`).
fn srid_of(document: &Value) -> Option<i32> {
    let name = document.pointer("/crs/properties/name")?.as_str()?;
    if !name.to_uppercase().contains("EPSG") {
        return None;
    }
    name.rsplit(':').next()?.trim().parse().ok()
}

fn infer_schema(name: &str, srid: i32, records: &[Record]) -> Result<SchemaDef, StageError> {
    let first = records.first();
    let geometry_type = first
        .and_then(|r| r.geometry.as_ref())
        .and_then(|g| g.get("type"))
        .and_then(Value::as_str)
        .and_then(GeometryType::from_geojson);

    let fields = first
        .map(|r| {
            r.properties
                .iter()
                .map(|(key, value)| FieldDef::new(key.clone(), DataType::of(value)))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(SchemaDef::new(name, geometry_type, srid).with_fields(fields)?)
}

impl Stage for GeoJsonReader {
    fn kind(&self) -> StageKind {
        StageKind::Source
    }

    fn alias(&self) -> &str {
        "GeoJSON Reader"
    }

    fn category(&self) -> &str {
        "Input"
    }

    fn description(&self) -> &str {
        "Reads features from GeoJSON files or inline FeatureCollections."
    }

    fn params(&self) -> BTreeMap<String, ParamMetadata> {
        BTreeMap::from([(
            KEY_CONNECTION_STRING.to_string(),
            ParamMetadata::new("GeoJSON file path or inline FeatureCollection.", "string")
                .with_default(Value::Null),
        )])
    }

    fn test_capability(&self, connection: &Value, capability: StoreCapability) -> bool {
        if capability != StoreCapability::Read {
            return false;
        }
        match connection {
            Value::String(text) => is_geojson_path(text),
            Value::Object(_) => is_inline_collection(connection),
            _ => false,
        }
    }

    fn configure(&mut self, params: &Params) -> Result<(), StageError> {
        self.config = bind_params(params)?;
        Ok(())
    }

    fn starting_run(
        &self,
        _input_schema: Option<SchemaDef>,
        _scope: RunScope<'_>,
    ) -> Result<Option<SchemaDef>, StageError> {
        let documents = self.documents()?;

        let mut records = Vec::new();
        for document in &documents {
            let features = document
                .get("features")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for feature in features {
                records.push(Record::from_geojson(feature)?);
            }
        }

        let name = self
            .config
            .connection_string
            .as_ref()
            .and_then(layer_name)
            .unwrap_or_else(|| FEATURE_COLLECTION.to_string());
        let srid = documents.first().and_then(srid_of).unwrap_or(DEFAULT_SRID);

        let schema = infer_schema(&name, srid, &records)?;
        *self.loaded.borrow_mut() = records;
        Ok(Some(schema))
    }

    fn run<'s>(
        &'s self,
        _input: RecordStream<'s>,
        _scope: RunScope<'s>,
    ) -> Result<RecordStream<'s>, StageError> {
        let records = self.loaded.borrow().clone();
        Ok(Box::new(records.into_iter().map(Ok)))
    }

    fn finished_run(&self, _scope: RunScope<'_>) -> Result<bool, StageError> {
        self.loaded.borrow_mut().clear();
        Ok(true)
    }

    fn clean(&self) {
        self.loaded.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::point_collection;
    use serde_json::json;

    #[test]
    fn test_capability_by_connection() {
        struct TestCase {
            connection: Value,
            capability: StoreCapability,
            expected: bool,
        }

        let cases = vec![
            TestCase { connection: json!("/tmp/a.geojson"), capability: StoreCapability::Read, expected: true },
            TestCase { connection: json!("/tmp/A.JSON"), capability: StoreCapability::Read, expected: true },
            TestCase { connection: json!("/tmp/a.shp"), capability: StoreCapability::Read, expected: false },
            TestCase { connection: json!("/tmp/a.geojson"), capability: StoreCapability::Create, expected: false },
            TestCase {
                connection: json!({"type": "FeatureCollection", "features": []}),
                capability: StoreCapability::Read,
                expected: true,
            },
            TestCase { connection: json!(3), capability: StoreCapability::Read, expected: false },
        ];

        let reader = GeoJsonReader::new();
        for case in cases {
            assert_eq!(
                reader.test_capability(&case.connection, case.capability),
                case.expected,
                "connection {} {:?}",
                case.connection,
                case.capability
            );
        }
    }

    #[test]
    fn test_srid_forms() {
        let named = |name: &str| json!({"crs": {"properties": {"name": name}}});
        assert_eq!(srid_of(&named("EPSG:25830")), Some(25830));
        assert_eq!(srid_of(&named("urn:ogc:def:crs:EPSG::3857")), Some(3857));
        assert_eq!(srid_of(&named("urn:ogc:def:crs:OGC:1.3:CRS84")), None);
        assert_eq!(srid_of(&json!({})), None);
    }

    #[test]
    fn test_infer_schema_from_first_feature() {
        let document = point_collection(3857, &[json!({"name": "a", "count": 3, "ratio": 0.5})]);
        let records: Vec<Record> = document["features"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| Record::from_geojson(f).unwrap())
            .collect();

        let schema = infer_schema("layer", srid_of(&document).unwrap(), &records).unwrap();
        assert_eq!(schema.srid, 3857);
        assert_eq!(schema.geometry_type, Some(GeometryType::Point));
        assert_eq!(schema.field("count").map(|f| f.data_type), Some(DataType::Integer));
        assert_eq!(schema.field("ratio").map(|f| f.data_type), Some(DataType::Float));
        assert_eq!(schema.field("name").map(|f| f.data_type), Some(DataType::String));
    }

    #[test]
    fn test_read_document_from_file_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roads.geojson");
        let document = point_collection(4326, &[json!({"id": 1})]);
        fs::write(&path, document.to_string()).unwrap();

        let from_file = read_document(&json!(path.to_string_lossy())).unwrap();
        assert_eq!(from_file, document);

        let from_text = read_document(&json!(document.to_string())).unwrap();
        assert_eq!(from_text, document);

        assert!(matches!(
            read_document(&json!(42)),
            Err(StageError::InvalidParameter { .. })
        ));
    }
}
