//! Request building, adaptive retry and response normalisation for weather and
//! Earth-observation HTTP APIs.
//!
//! Two providers are supported: the Meteomatics weather API (Basic auth, path
//! encoded queries) and NASA POWER point data. Whatever the provider, callers
//! get one of a few canonical JSON shapes back:
//!
//! - a single series: `{ meta, data: [{ts, value}] }`
//! - a series map: `{ meta, series: { "<code>": { friendly, units, data } } }`
//! - an array of single series (one per location)
//! - a grid: `{ meta, grid: { lons, lats, values } }`
//!
//! When Meteomatics rejects part of a request the client narrows the parameter
//! set (strip unit suffixes once, then drop parameters reported as
//! unavailable) and tries again; parameters that had to go are listed in
//! `meta.droppedParameters`.
//!
//! ## Quick start
//! - Configure authentication via environment variables (`METEOMATICS_USERNAME`,
//!   `METEOMATICS_PASSWORD`) or a `.meteomaticsrc` file (current directory or
//!   home directory).
//! - Build a [`SemanticQuery`] and call [`Client::fetch_meteomatics`] or
//!   [`Client::fetch_power`].
//!
//! ```no_run
//! use chrono::{TimeDelta, TimeZone, Utc};
//! use eo_adapter::{Client, SemanticQuery, TimeSpec};
//!
//! fn main() -> Result<(), eo_adapter::AdapterError> {
//!     let client = Client::from_env()?;
//!     let query = SemanticQuery::builder()
//!         .time(TimeSpec::range(
//!             Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
//!             Utc.with_ymd_and_hms(2025, 7, 7, 0, 0, 0).unwrap(),
//!             TimeDelta::days(1),
//!         )?)
//!         .parameters(["temperature", "wind_speed"])
//!         .point(52.52, 13.405)?
//!         .build()?;
//!     let payload = client.fetch_meteomatics(&query)?;
//!     println!("{}", payload.to_json());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod canonical;
mod catalog;
mod classify;
mod client;
mod config;
mod error;
mod fetch;
mod normalize;
mod query;
mod request;
mod summary;
mod transport;
mod util;
mod validate;

pub use canonical::{
    Canonical, DatetimeRange, Grid, GridData, GridMeta, Point, Provenance, SeriesEntry,
    SeriesMap, SeriesMeta, TimeSeries,
};
pub use catalog::{
    CATALOG, ParameterDescriptor, Provider, Thresholds, UNIT_SEPARATOR, describe, label_and_unit,
    lookup, resolve, strip_unit_suffix, thresholds, unit_suffix,
};
pub use classify::{MALFORMED_PATTERNS, Rejection, classify_rejection};
pub use client::Client;
pub use config::{
    Credentials, DEFAULT_METEOMATICS_URL, DEFAULT_POWER_URL, FetchConfig, ProviderConfig,
    load_credentials,
};
pub use error::{AdapterError, ErrorBody, Result};
pub use fetch::{FetchClient, FetchMeta, FetchOutcome};
pub use normalize::{
    MISSING_VALUE, SeriesContext, extract_points, normalize, normalize_grid, normalize_locations,
    normalize_series, normalize_series_map, parse_timestamp,
};
pub use query::{Coordinates, Location, QueryBuilder, SemanticQuery, TimeSpec};
pub use request::{Community, Resolution, build_meteomatics_url, build_power_url, meteomatics_time};
pub use summary::{
    Condition, Percentiles, RiskAssessment, RiskCategory, SeriesSummary, Trend, TrendDirection,
    assess, comfort_probability, exceedance_probability, monthly_statistics, percentile,
    return_period,
};
pub use transport::{HttpTransport, NetworkError, RawResponse, Transport};
pub use validate::{ValidationResult, validate};
