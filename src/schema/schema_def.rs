// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::FieldDef;
use crate::errors::SchemaError;

/// Geometry kind of the records described by a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// Parse a GeoJSON geometry `type` member.
    pub fn from_geojson(name: &str) -> Option<GeometryType> {
        match name {
            "Point" => Some(GeometryType::Point),
            "LineString" => Some(GeometryType::LineString),
            "Polygon" => Some(GeometryType::Polygon),
            "MultiPoint" => Some(GeometryType::MultiPoint),
            "MultiLineString" => Some(GeometryType::MultiLineString),
            "MultiPolygon" => Some(GeometryType::MultiPolygon),
            "GeometryCollection" => Some(GeometryType::GeometryCollection),
            _ => None,
        }
    }
}

/// Spatial extent of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Shape of the records flowing between two stages.
///
/// Field names are unique case-insensitively; the only way to add a field is
/// [`SchemaDef::add_field`], which enforces that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedSchemaDef")]
pub struct SchemaDef {
    /// Dataset (layer/table) name.
    pub name: String,
    /// Record-kind label, e.g. `Feature`.
    pub kind: String,
    /// `None` for records without geometry.
    pub geometry_type: Option<GeometryType>,
    /// EPSG code of the spatial reference.
    pub srid: i32,
    /// Full CRS definition (WKT or PROJ text) when known.
    pub crs: Option<String>,
    pub envelope: Option<Envelope>,
    fields: Vec<FieldDef>,
}

/// Deserialized form of [`SchemaDef`], before field names are checked.
#[derive(Deserialize)]
struct UncheckedSchemaDef {
    name: String,
    kind: String,
    geometry_type: Option<GeometryType>,
    srid: i32,
    crs: Option<String>,
    envelope: Option<Envelope>,
    fields: Vec<FieldDef>,
}

impl TryFrom<UncheckedSchemaDef> for SchemaDef {
    type Error = SchemaError;

    fn try_from(raw: UncheckedSchemaDef) -> Result<Self, Self::Error> {
        let schema = SchemaDef {
            name: raw.name,
            kind: raw.kind,
            geometry_type: raw.geometry_type,
            srid: raw.srid,
            crs: raw.crs,
            envelope: raw.envelope,
            fields: Vec::new(),
        };
        schema.with_fields(raw.fields)
    }
}

impl SchemaDef {
    pub fn new(name: impl Into<String>, geometry_type: Option<GeometryType>, srid: i32) -> Self {
        Self {
            name: name.into(),
            kind: "Feature".to_string(),
            geometry_type,
            srid,
            crs: None,
            envelope: None,
            fields: Vec::new(),
        }
    }

    /// Build a schema from a field list, rejecting duplicate names.
    pub fn with_fields(
        mut self,
        fields: impl IntoIterator<Item = FieldDef>,
    ) -> Result<Self, SchemaError> {
        for field in fields {
            self.add_field(field)?;
        }
        Ok(self)
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.same_name(name))
    }

    pub fn add_field(&mut self, field: FieldDef) -> Result<(), SchemaError> {
        if self.field(&field.name).is_some() {
            return Err(SchemaError::DuplicateField(field.name));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Merge `other` into a copy of this schema.
    ///
    /// Fails when geometry types or spatial references differ. Otherwise the
    /// result keeps this schema's fields in order followed by the fields of
    /// `other` whose names (case-insensitively) are not already present.
    pub fn merge(&self, other: &SchemaDef) -> Result<SchemaDef, SchemaError> {
        if self.geometry_type != other.geometry_type {
            return Err(SchemaError::GeometryTypeMismatch {
                left: self.geometry_type,
                right: other.geometry_type,
            });
        }
        if self.srid != other.srid {
            return Err(SchemaError::SpatialReferenceMismatch {
                left: self.srid,
                right: other.srid,
            });
        }

        let known: HashSet<String> = self.fields.iter().map(|f| f.name.to_lowercase()).collect();
        let mut merged = self.clone();
        merged.fields.extend(
            other
                .fields
                .iter()
                .filter(|f| !known.contains(&f.name.to_lowercase()))
                .cloned(),
        );
        Ok(merged)
    }

    /// Reduce a list of schemas left-to-right with [`SchemaDef::merge`].
    ///
    /// Returns `Ok(None)` for an empty list.
    pub fn merge_all<'a>(
        schemas: impl IntoIterator<Item = &'a SchemaDef>,
    ) -> Result<Option<SchemaDef>, SchemaError> {
        let mut iter = schemas.into_iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let mut merged = first.clone();
        for schema in iter {
            merged = merged.merge(schema)?;
        }
        Ok(Some(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn schema(geometry: Option<GeometryType>, srid: i32, names: &[&str]) -> SchemaDef {
        SchemaDef::new("layer", geometry, srid)
            .with_fields(names.iter().map(|n| FieldDef::new(*n, DataType::String)))
            .unwrap()
    }

    fn names(schema: &SchemaDef) -> Vec<&str> {
        schema.fields().iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_deserialize_rejects_duplicate_field_names() {
        let original = schema(Some(GeometryType::Point), 4326, &["Name", "count"]);
        let mut value = serde_json::to_value(&original).unwrap();

        let restored: SchemaDef = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(restored, original);

        value["fields"][1]["name"] = serde_json::json!("NAME");
        let result = serde_json::from_value::<SchemaDef>(value);
        let error = result.unwrap_err().to_string();
        assert!(error.contains("Duplicate field name"), "{}", error);
    }

    #[test]
    fn test_merge_disjoint_fields_concatenates_in_call_order() {
        let pairs: Vec<(&[&str], &[&str])> = vec![
            (&["a", "b"], &["c"]),
            (&["c"], &["a", "b"]),
            (&[], &["x", "y"]),
            (&["x", "y"], &[]),
        ];

        for (left, right) in pairs {
            let a = schema(Some(GeometryType::Point), 4326, left);
            let b = schema(Some(GeometryType::Point), 4326, right);
            let merged = a.merge(&b).unwrap();

            let expected: Vec<&str> = left.iter().chain(right.iter()).copied().collect();
            assert_eq!(names(&merged), expected);
        }
    }

    #[test]
    fn test_merge_skips_fields_present_case_insensitively() {
        let a = schema(Some(GeometryType::Polygon), 25830, &["id", "Name"]);
        let b = schema(Some(GeometryType::Polygon), 25830, &["NAME", "area", "ID"]);

        let merged = a.merge(&b).unwrap();
        assert_eq!(names(&merged), vec!["id", "Name", "area"]);
    }

    #[test]
    fn test_merge_rejects_geometry_mismatch() {
        let a = schema(Some(GeometryType::Point), 4326, &["a"]);
        let b = schema(Some(GeometryType::Polygon), 4326, &["a"]);
        assert!(matches!(a.merge(&b), Err(SchemaError::GeometryTypeMismatch { .. })));

        let c = schema(None, 4326, &["a"]);
        assert!(matches!(a.merge(&c), Err(SchemaError::GeometryTypeMismatch { .. })));
    }

    #[test]
    fn test_merge_rejects_spatial_reference_mismatch() {
        let a = schema(Some(GeometryType::Point), 4326, &["a"]);
        let b = schema(Some(GeometryType::Point), 3857, &["b"]);
        assert_eq!(
            a.merge(&b),
            Err(SchemaError::SpatialReferenceMismatch { left: 4326, right: 3857 })
        );
    }

    #[test]
    fn test_merge_all_reduces_left_to_right() {
        let a = schema(None, 0, &["a"]);
        let b = schema(None, 0, &["b", "a"]);
        let c = schema(None, 0, &["c"]);

        let merged = SchemaDef::merge_all([&a, &b, &c]).unwrap().unwrap();
        assert_eq!(names(&merged), vec!["a", "b", "c"]);
        assert_eq!(SchemaDef::merge_all(std::iter::empty()).unwrap(), None);
    }

    #[test]
    fn test_add_field_rejects_duplicates() {
        let mut s = schema(None, 0, &["Code"]);
        let result = s.add_field(FieldDef::new("code", DataType::Integer));
        assert_eq!(result, Err(SchemaError::DuplicateField("code".to_string())));
        assert_eq!(s.fields().len(), 1);
    }
}
