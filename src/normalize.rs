//! Provider JSON → canonical payloads.
//!
//! Value blocks are located by an ordered list of extraction strategies; the
//! first one that yields any dated value wins. A parameter no strategy can find
//! normalises to an empty series rather than an error. All functions here are
//! pure: the same input always produces the same output.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::canonical::{
    DatetimeRange, Grid, GridData, GridMeta, Point, Provenance, SeriesEntry, SeriesMap,
    SeriesMeta, TimeSeries, bbox_of,
};
use crate::catalog::{Provider, describe, label_and_unit, strip_unit_suffix};
use crate::query::Location;

/// Sentinel both providers use for "no data".
pub const MISSING_VALUE: f64 = -999.0;

type Sample = (NaiveDateTime, Option<f64>);
type Strategy = fn(&Value, &str) -> Vec<Sample>;

/// Extraction strategies in priority order.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("properties.parameter", from_properties_parameter),
    ("parameters", from_parameters),
    ("top-level", from_top_level),
    ("meteomatics data", from_meteomatics_first_coordinate),
];

/// What the caller asked for, used to fill metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesContext {
    pub provider: Provider,
    pub location: Option<Location>,
    pub range: DatetimeRange,
}

impl SeriesContext {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            location: None,
            range: DatetimeRange::default(),
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_range(mut self, range: DatetimeRange) -> Self {
        self.range = range;
        self
    }
}

/// Normalises the value block for one parameter into sorted points.
pub fn extract_points(raw: &Value, code: &str) -> Vec<Point> {
    for (name, strategy) in STRATEGIES {
        let samples = strategy(raw, code);
        if !samples.is_empty() {
            log::debug!("found `{}` via {} ({} values)", code, name, samples.len());
            return to_points(samples);
        }
    }
    log::debug!("no value block found for `{}`", code);
    Vec::new()
}

pub fn normalize_series(raw: &Value, code: &str, ctx: &SeriesContext) -> TimeSeries {
    let data = extract_points(raw, code);
    TimeSeries {
        meta: series_meta(raw, code, ctx, &data),
        data,
    }
}

pub fn normalize_series_map(raw: &Value, codes: &[String], ctx: &SeriesContext) -> SeriesMap {
    let mut series = BTreeMap::new();
    let mut all: Vec<Point> = Vec::new();
    for code in codes {
        let data = extract_points(raw, code);
        let (friendly, units) = friendly_and_units(raw, ctx.provider, code);
        all.extend(data.iter().cloned());
        series.insert(
            code.clone(),
            SeriesEntry {
                friendly,
                units,
                data,
            },
        );
    }
    all.sort_by(|a, b| a.ts.cmp(&b.ts));

    let mut meta = series_meta(raw, &codes.join(","), ctx, &all);
    meta.friendly = format!("{} parameters", codes.len());
    meta.units = String::new();
    SeriesMap { meta, series }
}

/// Single parameter ⇒ one series; several ⇒ a series map keyed by code.
pub fn normalize(raw: &Value, codes: &[String], ctx: &SeriesContext) -> crate::Canonical {
    match codes {
        [single] => crate::Canonical::Series(normalize_series(raw, single, ctx)),
        _ => crate::Canonical::SeriesMap(normalize_series_map(raw, codes, ctx)),
    }
}

/// One series per coordinate of a multi-point Meteomatics response.
///
/// When `code` has no value block, every requested location still gets an
/// empty series.
pub fn normalize_locations(
    raw: &Value,
    code: &str,
    locations: &[Location],
    ctx: &SeriesContext,
) -> Vec<TimeSeries> {
    let (friendly, units) = friendly_and_units(raw, ctx.provider, code);
    let Some(block) = meteomatics_block(raw, code) else {
        log::debug!("no value block for `{}`; emitting empty series", code);
        return locations
            .iter()
            .map(|l| {
                let mut meta = series_meta(raw, code, ctx, &[]);
                meta.friendly = friendly.clone();
                meta.units = units.clone();
                meta.lat = Some(l.lat());
                meta.lon = Some(l.lon());
                TimeSeries {
                    meta,
                    data: Vec::new(),
                }
            })
            .collect();
    };

    coordinates_of(block)
        .iter()
        .map(|c| {
            let data = to_points(dated_values(c));
            let mut meta = series_meta(raw, code, ctx, &data);
            meta.friendly = friendly.clone();
            meta.units = units.clone();
            meta.lat = c.get("lat").and_then(Value::as_f64);
            meta.lon = c.get("lon").and_then(Value::as_f64);
            TimeSeries { meta, data }
        })
        .collect()
}

/// Assembles a grid from a Meteomatics bounding-box response at its first timestamp.
///
/// A response without usable coordinates for `code` gives an empty grid.
pub fn normalize_grid(raw: &Value, code: &str, ctx: &SeriesContext) -> Grid {
    let mut cells: Vec<(f64, f64, Vec<Sample>)> = Vec::new();
    if let Some(block) = meteomatics_block(raw, code) {
        for c in coordinates_of(block) {
            let (Some(lat), Some(lon)) = (
                c.get("lat").and_then(Value::as_f64),
                c.get("lon").and_then(Value::as_f64),
            ) else {
                continue;
            };
            cells.push((lat, lon, dated_values(c)));
        }
    }

    let ts = cells
        .iter()
        .filter_map(|(_, _, s)| s.iter().map(|(t, _)| *t).min())
        .min();

    let lats = sorted_axis(cells.iter().map(|(lat, _, _)| *lat));
    let lons = sorted_axis(cells.iter().map(|(_, lon, _)| *lon));
    let mut values = vec![vec![None; lons.len()]; lats.len()];
    for (lat, lon, samples) in &cells {
        let row = lats.iter().position(|x| x == lat);
        let col = lons.iter().position(|x| x == lon);
        if let (Some(row), Some(col)) = (row, col) {
            values[row][col] = samples
                .iter()
                .find(|(t, _)| Some(*t) == ts)
                .and_then(|(_, v)| *v);
        }
    }

    let (friendly, units) = friendly_and_units(raw, ctx.provider, code);
    let meta = GridMeta {
        parameter: code.to_string(),
        friendly,
        units,
        source: ctx.provider.source_name().to_string(),
        bbox: bbox_of(&lons, &lats),
        crs: "EPSG:4326".to_string(),
        nx: lons.len(),
        ny: lats.len(),
        ts: ts.map(|t| format_ts(&t)),
        provenance: Provenance::default(),
    };
    Grid {
        meta,
        grid: GridData { lons, lats, values },
    }
}

fn sorted_axis(it: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = it.filter(|x| x.is_finite()).collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v.dedup();
    v
}

fn series_meta(raw: &Value, code: &str, ctx: &SeriesContext, data: &[Point]) -> SeriesMeta {
    let (friendly, units) = friendly_and_units(raw, ctx.provider, code);
    let (lat, lon) = match ctx.location {
        Some(l) => (Some(l.lat()), Some(l.lon())),
        None => response_location(raw),
    };

    let mut range = ctx.range.clone();
    if range.start.is_none() {
        range.start = data.first().map(|p| p.ts.clone());
    }
    if range.end.is_none() {
        range.end = data.last().map(|p| p.ts.clone());
    }

    SeriesMeta {
        parameter: code.to_string(),
        friendly,
        units,
        source: ctx.provider.source_name().to_string(),
        lat,
        lon,
        datetime_range: range,
        provenance: Provenance::default(),
    }
}

/// Catalog entry first, then NASA POWER's own `parameters.<CODE>` metadata,
/// then the code itself.
fn friendly_and_units(raw: &Value, provider: Provider, code: &str) -> (String, String) {
    if describe(provider, code).is_none() {
        if let Some(meta) = raw.pointer(&format!("/parameters/{}", escape_pointer(code))) {
            let longname = meta.get("longname").and_then(Value::as_str);
            let units = meta.get("units").and_then(Value::as_str);
            if longname.is_some() || units.is_some() {
                return (
                    longname.unwrap_or(code).to_string(),
                    units.unwrap_or_default().to_string(),
                );
            }
        }
    }
    label_and_unit(provider, code)
}

/// Point location echoed by the provider, if any.
fn response_location(raw: &Value) -> (Option<f64>, Option<f64>) {
    // NASA POWER GeoJSON: geometry.coordinates = [lon, lat, elevation]
    if let Some(c) = raw.pointer("/geometry/coordinates").and_then(Value::as_array) {
        if c.len() >= 2 {
            return (c[1].as_f64(), c[0].as_f64());
        }
    }
    if let Some(c) = raw.pointer("/data/0/coordinates/0") {
        return (
            c.get("lat").and_then(Value::as_f64),
            c.get("lon").and_then(Value::as_f64),
        );
    }
    (None, None)
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn from_properties_parameter(raw: &Value, code: &str) -> Vec<Sample> {
    raw.get("properties")
        .and_then(|p| p.get("parameter"))
        .and_then(|p| p.get(code))
        .and_then(Value::as_object)
        .map(from_date_map)
        .unwrap_or_default()
}

fn from_parameters(raw: &Value, code: &str) -> Vec<Sample> {
    raw.get("parameters")
        .and_then(|p| p.get(code))
        .and_then(Value::as_object)
        .map(from_date_map)
        .unwrap_or_default()
}

fn from_top_level(raw: &Value, code: &str) -> Vec<Sample> {
    raw.get(code)
        .and_then(Value::as_object)
        .map(from_date_map)
        .unwrap_or_default()
}

fn from_meteomatics_first_coordinate(raw: &Value, code: &str) -> Vec<Sample> {
    meteomatics_block(raw, code)
        .and_then(|b| coordinates_of(b).first())
        .map(dated_values)
        .unwrap_or_default()
}

/// `{"data":[{"parameter":"t_2m:C","coordinates":[...]}]}`, matching with or without unit.
fn meteomatics_block<'a>(raw: &'a Value, code: &str) -> Option<&'a Value> {
    let blocks = raw.get("data")?.as_array()?;
    let param_of = |b: &Value| b.get("parameter").and_then(Value::as_str).map(str::to_string);
    blocks
        .iter()
        .find(|b| param_of(b).as_deref() == Some(code))
        .or_else(|| {
            let bare = strip_unit_suffix(code);
            blocks
                .iter()
                .find(|b| param_of(b).is_some_and(|p| strip_unit_suffix(&p) == bare))
        })
}

fn coordinates_of(block: &Value) -> &[Value] {
    block
        .get("coordinates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn dated_values(coordinate: &Value) -> Vec<Sample> {
    coordinate
        .get("dates")
        .and_then(Value::as_array)
        .map(|dates| {
            dates
                .iter()
                .filter_map(|d| {
                    let ts = parse_timestamp(d.get("date")?.as_str()?)?;
                    Some((ts, d.get("value").and_then(numeric)))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn from_date_map(map: &Map<String, Value>) -> Vec<Sample> {
    map.iter()
        .filter_map(|(k, v)| parse_timestamp(k).map(|ts| (ts, numeric(v))))
        .collect()
}

/// Numeric value or `None`; the missing-value sentinel and non-finite numbers become `None`.
pub(crate) fn numeric(v: &Value) -> Option<f64> {
    let x = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !x.is_finite() || x == MISSING_VALUE {
        None
    } else {
        Some(x)
    }
}

/// Accepts `YYYYMMDD`, `YYYYMMDDHH`, `YYYY-MM-DD`, RFC 3339 and naive ISO date-times.
pub fn parse_timestamp(key: &str) -> Option<NaiveDateTime> {
    let key = key.trim();
    if key.bytes().all(|b| b.is_ascii_digit()) {
        return match key.len() {
            8 => compact_date(key)?.and_hms_opt(0, 0, 0),
            10 => compact_date(&key[..8])?.and_hms_opt(key[8..].parse().ok()?, 0, 0),
            _ => None,
        };
    }
    if let Ok(d) = NaiveDate::parse_from_str(key, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(key) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(key, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(key, "%Y-%m-%dT%H:%M"))
        .ok()
}

fn compact_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        s[..4].parse().ok()?,
        s[4..6].parse().ok()?,
        s[6..8].parse().ok()?,
    )
}

fn format_ts(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn to_points(mut samples: Vec<Sample>) -> Vec<Point> {
    samples.sort_by_key(|(t, _)| *t);
    samples
        .into_iter()
        .map(|(t, value)| Point {
            ts: format_ts(&t),
            value,
        })
        .collect()
}
