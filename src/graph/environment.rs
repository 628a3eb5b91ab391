// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Derived environment tokens and override value coercion.

use serde_json::{Number, Value};
use std::path::{Path, PathBuf};

use crate::config::consts::{
    ENV_FEATURE_CLASS, ENV_PIPELINE_FILE, ENV_PIPELINE_FOLDER, ENV_PIPELINE_PATH,
    FEATURE_COLLECTION,
};
use crate::config::{is_source_flag, value_as_text, PipelineArgs};
use crate::observability::messages::graph::LayerNameUnresolved;
use crate::observability::messages::StructuredLog;

/// Layer (feature class) name of a connection string.
///
/// Lists use their first item. Inline GeoJSON collections, as objects or as
/// JSON text, are named `FeatureCollection`. Objects with a `name` use it.
/// Paths yield the file name up to its first dot. Anything else has no layer
/// name.
pub fn layer_name(connection: &Value) -> Option<String> {
    let connection = match connection {
        Value::Array(items) => items.first()?,
        other => other,
    };

    match connection {
        Value::Object(map) if map.get("type").and_then(Value::as_str) == Some(FEATURE_COLLECTION) => {
            return Some(FEATURE_COLLECTION.to_string());
        }
        Value::String(text) if text.len() > 32 => {
            let compact: String = text.chars().filter(|c| *c != '\n' && *c != ' ').take(32).collect();
            if compact.starts_with("{'type':'FeatureCollection'")
                || compact.starts_with("{\"type\":\"FeatureCollection\"")
            {
                return Some(FEATURE_COLLECTION.to_string());
            }
        }
        _ => {}
    }

    let text = match connection {
        Value::Object(map) => map.get("name").and_then(Value::as_str).filter(|s| !s.is_empty())?,
        Value::String(text) => text.as_str(),
        _ => return None,
    };

    let path = Path::new(text);
    path.extension().filter(|e| !e.is_empty())?;
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() {
        return None;
    }
    stem.split('.').next().map(str::to_string)
}

/// Environment entries available to `${KEY}` / `%KEY%` tokens of one sibling list.
///
/// `FEATURE_CLASS` comes from a `-source` override when present, otherwise
/// from `first_source`, the connection string of the list's first source
/// stage. Every `--pipeline.<KEY>` override adds `KEY`.
pub fn environment(first_source: Option<&Value>, args: &PipelineArgs) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut source_override = false;

    let push_layer = |entries: &mut Vec<(String, String)>, connection: &Value| {
        match layer_name(connection) {
            Some(name) => entries.push((ENV_FEATURE_CLASS.to_string(), name)),
            None => LayerNameUnresolved {
                connection: &value_as_text(connection),
            }
            .log(),
        }
    };

    for (key, value) in args.iter() {
        if is_source_flag(key) {
            source_override = true;
            push_layer(&mut entries, value);
        } else if let Some(name) = PipelineArgs::pipeline_env(key) {
            entries.push((name.to_string(), value_as_text(value)));
        }
    }

    if !source_override {
        if let Some(connection) = first_source {
            push_layer(&mut entries, connection);
        }
    }
    entries
}

/// Replace `${KEY}` and `%KEY%` in a string, or in every string of a list.
///
/// Values naming an existing file or directory are substituted as absolute,
/// forward-slash paths. Unknown tokens are left as they are.
pub fn replace_tokens(value: &mut Value, environment: &[(String, String)]) {
    match value {
        Value::String(text) => {
            for (key, env_value) in environment {
                let replacement = normalize_existing_path(env_value);
                *text = text
                    .replace(&format!("${{{}}}", key), &replacement)
                    .replace(&format!("%{}%", key), &replacement);
            }
        }
        Value::Array(items) => {
            for item in items {
                replace_tokens(item, environment);
            }
        }
        _ => {}
    }
}

fn normalize_existing_path(value: &str) -> String {
    let path = Path::new(value);
    if value.is_empty() || !path.exists() {
        return value.to_string();
    }
    absolute_posix(path)
}

fn absolute_posix(path: &Path) -> String {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    absolute.to_string_lossy().replace('\\', "/")
}

/// Substitute tokens in the raw text of a pipeline file before parsing it.
///
/// Applies the override environment (`${KEY}` / `%KEY%`), then `$KEY` for
/// every override whose key does not start with `-`, then `$PIPELINE_FOLDER`,
/// `$PIPELINE_FILE` and `$PIPELINE_PATH` of `file`.
pub fn substitute_document(text: &str, file: &Path, args: &PipelineArgs) -> String {
    let mut document = Value::String(text.to_string());
    replace_tokens(&mut document, &environment(None, args));
    let mut text = match document {
        Value::String(text) => text,
        _ => text.to_string(),
    };

    for (key, value) in args.iter().filter(|(k, _)| !k.starts_with('-')) {
        text = text.replace(&format!("${}", key), &value_as_text(value));
    }

    let model_path = absolute_posix(file);
    let (folder, name) = match model_path.rsplit_once('/') {
        Some((folder, name)) => (folder.to_string(), name.to_string()),
        None => (String::new(), model_path.clone()),
    };
    for (key, value) in [
        (ENV_PIPELINE_FOLDER, folder),
        (ENV_PIPELINE_FILE, name),
        (ENV_PIPELINE_PATH, model_path.clone()),
    ] {
        text = text.replace(&format!("${}", key), &value);
    }
    text
}

/// Coerce a textual override to the runtime type of the attribute it replaces.
///
/// Integers parse as integers and floats as floats. Lists accept JSON array
/// text or a comma-separated string. Anything else, including non-string
/// override values, is assigned as given.
pub fn coerce_override(existing: Option<&Value>, value: &Value) -> Result<Value, String> {
    let Value::String(text) = value else {
        return Ok(value.clone());
    };
    let trimmed = text.trim();

    match existing {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("expected an integer: {}", e)),
        Some(Value::Number(_)) => trimmed
            .parse::<f64>()
            .map_err(|e| format!("expected a number: {}", e))
            .and_then(|f| {
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| "expected a finite number".to_string())
            }),
        Some(Value::Array(_)) if trimmed.starts_with('[') => {
            match serde_json::from_str::<Value>(trimmed) {
                Ok(list @ Value::Array(_)) => Ok(list),
                Ok(_) => Err("expected a list".to_string()),
                Err(e) => Err(format!("expected a list: {}", e)),
            }
        }
        Some(Value::Array(_)) => Ok(Value::Array(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layer_name_forms() {
        struct TestCase {
            connection: Value,
            expected: Option<&'static str>,
        }

        let cases = vec![
            TestCase { connection: json!("/data/roads.geojson"), expected: Some("roads") },
            TestCase { connection: json!("C:/data/roads.v2.shp"), expected: Some("roads") },
            TestCase { connection: json!(["/a/first.json", "/a/second.json"]), expected: Some("first") },
            TestCase {
                connection: json!({"type": "FeatureCollection", "features": []}),
                expected: Some("FeatureCollection"),
            },
            TestCase {
                connection: json!("{ \"type\": \"FeatureCollection\", \"features\": [] }"),
                expected: Some("FeatureCollection"),
            },
            TestCase { connection: json!({"name": "upload.geojson", "fileData": ""}), expected: Some("upload") },
            TestCase { connection: json!("no_extension"), expected: None },
            TestCase { connection: json!(42), expected: None },
            TestCase { connection: json!([]), expected: None },
        ];

        for case in cases {
            assert_eq!(
                layer_name(&case.connection).as_deref(),
                case.expected,
                "connection {}",
                case.connection
            );
        }
    }

    #[test]
    fn test_environment_prefers_source_override() {
        let args = PipelineArgs::from_tokens(["-i", "/x/parcels.geojson", "--pipeline.ZONE", "north"]);
        let env = environment(Some(&json!("/y/roads.geojson")), &args);
        assert_eq!(
            env,
            vec![
                ("FEATURE_CLASS".to_string(), "parcels".to_string()),
                ("ZONE".to_string(), "north".to_string()),
            ]
        );

        let env = environment(Some(&json!("/y/roads.geojson")), &PipelineArgs::new());
        assert_eq!(env, vec![("FEATURE_CLASS".to_string(), "roads".to_string())]);
    }

    #[test]
    fn test_replace_tokens_leaves_unknown_tokens() {
        let env = vec![("FEATURE_CLASS".to_string(), "roads".to_string())];
        let mut value = json!(["/out/${FEATURE_CLASS}.geojson", "/out/%FEATURE_CLASS%_${OTHER}.json"]);
        replace_tokens(&mut value, &env);
        assert_eq!(value, json!(["/out/roads.geojson", "/out/roads_${OTHER}.json"]));
    }

    #[test]
    fn test_replace_tokens_makes_existing_paths_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().to_string_lossy().to_string();
        let env = vec![("ROOT".to_string(), folder.clone())];

        let mut value = json!("${ROOT}/a.json");
        replace_tokens(&mut value, &env);
        assert_eq!(value, json!(format!("{}/a.json", folder.replace('\\', "/"))));
    }

    #[test]
    fn test_coerce_override() {
        struct TestCase {
            existing: Option<Value>,
            value: Value,
            expected: Result<Value, ()>,
        }

        let cases = vec![
            TestCase { existing: Some(json!(10)), value: json!("5"), expected: Ok(json!(5)) },
            TestCase { existing: Some(json!(1.5)), value: json!("2.25"), expected: Ok(json!(2.25)) },
            TestCase { existing: Some(json!(1)), value: json!("five"), expected: Err(()) },
            TestCase { existing: Some(json!(["a"])), value: json!("b, c"), expected: Ok(json!(["b", "c"])) },
            TestCase { existing: Some(json!([])), value: json!("[1, 2]"), expected: Ok(json!([1, 2])) },
            TestCase { existing: Some(json!("text")), value: json!("5"), expected: Ok(json!("5")) },
            TestCase { existing: None, value: json!("5"), expected: Ok(json!("5")) },
            TestCase { existing: Some(json!(1)), value: json!(7), expected: Ok(json!(7)) },
        ];

        for case in cases {
            let actual = coerce_override(case.existing.as_ref(), &case.value).map_err(|_| ());
            assert_eq!(actual, case.expected, "existing {:?} value {}", case.existing, case.value);
        }
    }

    #[test]
    fn test_substitute_document_tokens() {
        let args = PipelineArgs::from_tokens(["region=north", "--pipeline.ZONE", "z1"]);
        let text = r#"{"a": "$region", "b": "${ZONE}", "c": "$PIPELINE_FILE"}"#;

        let replaced = substitute_document(text, Path::new("/srv/flows/demo.json"), &args);
        assert_eq!(replaced, r#"{"a": "north", "b": "z1", "c": "demo.json"}"#);
    }
}
