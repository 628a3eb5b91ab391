// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Records flowing through a pipeline and the stream type connecting stages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::PipelineError;

/// One geometric/tabular feature.
///
/// Geometry is kept as its GeoJSON object; the engine never inspects it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(skip)]
    pub fid: Option<i64>,
    #[serde(rename = "type", default = "feature_kind")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

fn feature_kind() -> String {
    "Feature".to_string()
}

impl Record {
    pub fn new(properties: Map<String, Value>, geometry: Option<Value>) -> Self {
        Self {
            fid: None,
            kind: feature_kind(),
            properties,
            geometry,
        }
    }

    pub fn with_fid(mut self, fid: i64) -> Self {
        self.fid = Some(fid);
        self
    }

    /// Parse a GeoJSON `Feature` object.
    pub fn from_geojson(value: &Value) -> Result<Record, serde_json::Error> {
        let mut record: Record = serde_json::from_value(value.clone())?;
        // GeoJSON ids may also be strings; keep the numeric ones only.
        record.fid = value.get("id").and_then(Value::as_i64);
        Ok(record)
    }

    pub fn to_geojson(&self, fallback_fid: i64) -> Value {
        json!({
            "type": self.kind,
            "id": self.fid.unwrap_or(fallback_fid),
            "properties": self.properties,
            "geometry": self.geometry,
        })
    }
}

/// Lazily pulled sequence of records produced by a stage.
///
/// Every call to a stage's `run` yields a fresh stream; pulling the same
/// stage through two consumers re-evaluates it twice.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<Record, PipelineError>> + 'a>;

/// An empty record stream.
pub fn empty_stream<'a>() -> RecordStream<'a> {
    Box::new(std::iter::empty())
}

/// Fully materialised output of one stage, as returned by a data extraction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordCollection {
    pub srid: i32,
    pub records: Vec<Record>,
}

impl RecordCollection {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render as a GeoJSON FeatureCollection.
    ///
    /// Records without a fid are numbered by their position in the collection.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| record.to_geojson(index as i64))
            .collect();

        json!({
            "type": "FeatureCollection",
            "crs": {
                "type": "name",
                "properties": { "name": format!("EPSG:{}", self.srid) },
            },
            "features": features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_geojson_reads_numeric_id() {
        let value = json!({
            "type": "Feature",
            "id": 7,
            "properties": { "name": "a" },
            "geometry": { "type": "Point", "coordinates": [1.0, 2.0] },
        });

        let record = Record::from_geojson(&value).unwrap();
        assert_eq!(record.fid, Some(7));
        assert_eq!(record.properties["name"], json!("a"));
        assert_eq!(record.kind, "Feature");
    }

    #[test]
    fn test_collection_numbers_records_without_fid() {
        let collection = RecordCollection {
            srid: 4326,
            records: vec![
                Record::new(Map::new(), None),
                Record::new(Map::new(), None).with_fid(42),
            ],
        };

        let geojson = collection.to_geojson();
        assert_eq!(geojson["crs"]["properties"]["name"], json!("EPSG:4326"));
        assert_eq!(geojson["features"][0]["id"], json!(0));
        assert_eq!(geojson["features"][1]["id"], json!(42));
    }
}
