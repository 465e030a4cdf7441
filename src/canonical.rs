use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{AdapterError, Result};
use crate::fetch::FetchMeta;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatetimeRange {
    pub start: Option<String>,
    pub end: Option<String>,
    pub interval_minutes: Option<i64>,
}

/// Fields every canonical payload carries about how it was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Provenance {
    #[serde(rename = "droppedParameters")]
    pub dropped_parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesMeta {
    pub parameter: String,
    pub friendly: String,
    pub units: String,
    pub source: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub datetime_range: DatetimeRange,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    /// `YYYY-MM-DDTHH:MM:SSZ`
    pub ts: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub meta: SeriesMeta,
    pub data: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesEntry {
    pub friendly: String,
    pub units: String,
    pub data: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesMap {
    pub meta: SeriesMeta,
    pub series: BTreeMap<String, SeriesEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridMeta {
    pub parameter: String,
    pub friendly: String,
    pub units: String,
    pub source: String,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub bbox: [f64; 4],
    pub crs: String,
    pub nx: usize,
    pub ny: usize,
    pub ts: Option<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridData {
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    /// `values[row][col]`, one row per latitude.
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    pub meta: GridMeta,
    pub grid: GridData,
}

impl Grid {
    /// Builds a grid on WGS84 axes, deriving bbox and dimensions from them.
    pub fn new(
        parameter: impl Into<String>,
        friendly: impl Into<String>,
        units: impl Into<String>,
        source: impl Into<String>,
        lons: Vec<f64>,
        lats: Vec<f64>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if values.len() != lats.len() {
            return Err(AdapterError::InvalidArgument {
                name: "values",
                reason: format!("{} rows for {} latitudes", values.len(), lats.len()),
            });
        }
        if let Some((i, row)) = values.iter().enumerate().find(|(_, r)| r.len() != lons.len()) {
            return Err(AdapterError::InvalidArgument {
                name: "values",
                reason: format!("row {} has {} columns for {} longitudes", i, row.len(), lons.len()),
            });
        }

        Ok(Self {
            meta: GridMeta {
                parameter: parameter.into(),
                friendly: friendly.into(),
                units: units.into(),
                source: source.into(),
                bbox: bbox_of(&lons, &lats),
                crs: "EPSG:4326".to_string(),
                nx: lons.len(),
                ny: lats.len(),
                ts: None,
                provenance: Provenance::default(),
            },
            grid: GridData { lons, lats, values },
        })
    }
}

pub(crate) fn bbox_of(lons: &[f64], lats: &[f64]) -> [f64; 4] {
    let (min_lon, max_lon) = extent(lons);
    let (min_lat, max_lat) = extent(lats);
    [min_lon, min_lat, max_lon, max_lat]
}

fn extent(v: &[f64]) -> (f64, f64) {
    if v.is_empty() {
        return (0.0, 0.0);
    }
    v.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(*x), hi.max(*x)))
}

/// Any of the shapes the adapter hands to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Canonical {
    Series(TimeSeries),
    SeriesMap(SeriesMap),
    Locations(Vec<TimeSeries>),
    Grid(Grid),
}

impl Canonical {
    fn provenances_mut(&mut self) -> Vec<&mut Provenance> {
        match self {
            Canonical::Series(s) => vec![&mut s.meta.provenance],
            Canonical::SeriesMap(m) => vec![&mut m.meta.provenance],
            Canonical::Locations(v) => v.iter_mut().map(|s| &mut s.meta.provenance).collect(),
            Canonical::Grid(g) => vec![&mut g.meta.provenance],
        }
    }

    pub(crate) fn attach_fetch_meta(&mut self, meta: &FetchMeta) {
        for p in self.provenances_mut() {
            p.dropped_parameters = meta.dropped_parameters.clone();
            p.request_url = Some(meta.request_url.clone());
        }
    }

    pub(crate) fn attach_validation_errors(&mut self, errors: &[String]) {
        for p in self.provenances_mut() {
            p.validation_errors = errors.to_vec();
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Only finite floats and strings are stored, so this cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
