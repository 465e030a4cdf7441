//! Shape checks on canonical payloads.
//!
//! Works on plain JSON so payloads from other producers can be checked too.
//! Never fails and never modifies its input; every problem becomes one line in
//! [`ValidationResult::errors`].

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

pub fn validate(payload: &Value) -> ValidationResult {
    ValidationResult::from_errors(shape_errors(payload))
}

fn shape_errors(payload: &Value) -> Vec<String> {
    if let Value::Array(items) = payload {
        return items
            .iter()
            .enumerate()
            .flat_map(|(i, item)| {
                let errs = if item.get("data").is_some_and(Value::is_array) {
                    series_errors(item)
                } else {
                    vec!["not a time series (missing `data` array)".to_string()]
                };
                errs.into_iter().map(move |e| format!("[{}] {}", i, e))
            })
            .collect();
    }

    if payload.get("data").is_some_and(Value::is_array) {
        series_errors(payload)
    } else if payload.get("series").is_some_and(Value::is_object) {
        series_map_errors(payload)
    } else if payload.get("grid").is_some_and(Value::is_object) {
        grid_errors(payload)
    } else {
        vec!["unrecognized payload shape: expected `data`, `series`, `grid` or an array of series".to_string()]
    }
}

fn series_errors(payload: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if !payload.get("meta").is_some_and(Value::is_object) {
        errors.push("missing `meta` object".to_string());
    }
    let Some(items) = payload.get("data").and_then(Value::as_array) else {
        return errors;
    };
    for (i, item) in items.iter().enumerate() {
        if !item.get("ts").is_some_and(|t| t.is_string()) {
            errors.push(format!("data[{}] is missing a `ts` timestamp", i));
        }
        match item.get("value") {
            None => errors.push(format!("data[{}] is missing `value`", i)),
            Some(v) if !(v.is_null() || v.is_number()) => {
                errors.push(format!("data[{}].value is neither a number nor null", i))
            }
            Some(_) => {}
        }
    }
    errors
}

fn series_map_errors(payload: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(series) = payload.get("series").and_then(Value::as_object) {
        for (code, entry) in series {
            if !entry.get("data").is_some_and(Value::is_array) {
                errors.push(format!("series `{}` has no `data` array", code));
            }
        }
    }
    errors
}

fn grid_errors(payload: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(grid) = payload.get("grid") else {
        return errors;
    };

    let axis = |name: &str, errors: &mut Vec<String>| -> Option<usize> {
        match grid.get(name).and_then(Value::as_array) {
            Some(a) if !a.is_empty() => Some(a.len()),
            Some(_) => {
                errors.push(format!("grid.{} is empty", name));
                None
            }
            None => {
                errors.push(format!("grid.{} must be an array", name));
                None
            }
        }
    };
    axis("lons", &mut errors);
    let lats = axis("lats", &mut errors);

    match grid.get("values").and_then(Value::as_array) {
        None => errors.push("grid.values must be an array".to_string()),
        Some(rows) => {
            if let Some(lats) = lats {
                if rows.len() != lats {
                    errors.push(format!(
                        "grid.values has {} rows but grid.lats has {} entries (row count mismatch)",
                        rows.len(),
                        lats
                    ));
                }
            }
        }
    }
    errors
}
