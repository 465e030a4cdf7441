use chrono::{NaiveDate, Utc};
use std::ops::Range;
use std::time::Duration;

use crate::canonical::{Canonical, DatetimeRange};
use crate::catalog::{Provider, resolve};
use crate::config::{
    Credentials, DEFAULT_METEOMATICS_URL, DEFAULT_POWER_URL, FetchConfig, load_credentials,
};
use crate::error::{AdapterError, Result};
use crate::fetch::{FetchClient, FetchMeta};
use crate::normalize::{SeriesContext, normalize, normalize_grid, normalize_locations};
use crate::query::{Coordinates, Location, SemanticQuery, TimeSpec};
use crate::request::{
    Community, Resolution, build_meteomatics_url, build_power_url, format_instant,
};
use crate::transport::{HttpTransport, Transport};
use crate::validate::validate;

/// Entry point: builds provider requests, runs the adaptive fetch loop and
/// returns canonical payloads.
///
/// All state is owned by the value (transport, credentials, retry policy), so
/// several clients with different settings can coexist.
#[derive(Debug, Clone)]
pub struct Client<T = HttpTransport> {
    meteomatics_url: String,
    power_url: String,
    fetcher: FetchClient<T>,
}

impl Client<HttpTransport> {
    /// Creates a client using environment variables and/or `.meteomaticsrc`.
    ///
    /// This is equivalent to `Client::new(None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `username`/`password` arguments
    /// - environment variables `METEOMATICS_USERNAME` / `METEOMATICS_PASSWORD`
    /// - config file from `METEOMATICS_RC` or `.meteomaticsrc`
    pub fn new(username: Option<String>, password: Option<String>) -> Result<Self> {
        let cfg = load_credentials(username, password)?;
        log::info!(
            "using Meteomatics credentials for user {} at {}",
            cfg.credentials.username,
            cfg.url
        );
        let config = FetchConfig::default();
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_transport(transport, Some(cfg.credentials), config)
            .with_meteomatics_url(cfg.url))
    }

    /// A client without credentials; only NASA POWER requests will succeed.
    pub fn anonymous() -> Result<Self> {
        let config = FetchConfig::default();
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_transport(transport, None, config))
    }

    /// Rebuilds the HTTP transport with a new overall request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        let transport = HttpTransport::new(timeout)?;
        let mut config = self.fetcher.config().clone();
        config.timeout = timeout;
        let credentials = self.fetcher.credentials().cloned();
        self.fetcher = FetchClient::new(transport, credentials, config);
        Ok(self)
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(
        transport: T,
        credentials: Option<Credentials>,
        config: FetchConfig,
    ) -> Self {
        if let Some(c) = &credentials {
            warn_if_expired(c);
        }
        Self {
            meteomatics_url: DEFAULT_METEOMATICS_URL.to_string(),
            power_url: DEFAULT_POWER_URL.to_string(),
            fetcher: FetchClient::new(transport, credentials, config),
        }
    }

    pub fn with_meteomatics_url(mut self, url: impl Into<String>) -> Self {
        self.meteomatics_url = url.into();
        self
    }

    pub fn with_power_url(mut self, url: impl Into<String>) -> Self {
        self.power_url = url.into();
        self
    }

    pub fn with_retry_max(mut self, retry_max: usize) -> Self {
        self.fetcher.config_mut().retry_max = retry_max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.fetcher.config_mut().base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.fetcher.config_mut().max_delay = delay;
        self
    }

    /// Fetches from Meteomatics; the shape follows the coordinates:
    /// a point gives a series (or series map for several parameters),
    /// several points give one series per point and parameter, and a
    /// bounding box gives a grid (single parameter only).
    pub fn fetch_meteomatics(&self, query: &SemanticQuery) -> Result<Canonical> {
        if self.fetcher.credentials().is_none() {
            return Err(AdapterError::CredentialsMissing(
                "Meteomatics requests need credentials (set METEOMATICS_USERNAME / METEOMATICS_PASSWORD or create .meteomaticsrc)"
                    .to_string(),
            ));
        }
        if matches!(query.coordinates, Coordinates::BoundingBox { .. })
            && query.parameters.len() != 1
        {
            return Err(AdapterError::InvalidArgument {
                name: "parameters",
                reason: format!(
                    "grid requests take exactly one parameter, got {}",
                    query.parameters.len()
                ),
            });
        }

        let codes = resolve_all(Provider::Meteomatics, &query.parameters);
        let outcome = self.fetcher.fetch(codes, |codes| {
            build_meteomatics_url(&self.meteomatics_url, &query.time, codes, &query.coordinates)
        })?;

        let mut ctx = SeriesContext::new(Provider::Meteomatics).with_range(range_of(&query.time, None));
        if let Some(l) = query.coordinates.primary() {
            ctx = ctx.with_location(l);
        }
        let sent = &outcome.meta.parameters;

        let canonical = match &query.coordinates {
            Coordinates::Point(_) => normalize(&outcome.body, sent, &ctx),
            Coordinates::Points(locations) => {
                ctx.location = None;
                Canonical::Locations(
                    sent.iter()
                        .flat_map(|code| normalize_locations(&outcome.body, code, locations, &ctx))
                        .collect(),
                )
            }
            Coordinates::BoundingBox { .. } => {
                let code = sent.first().map(String::as_str).unwrap_or_default();
                Canonical::Grid(normalize_grid(&outcome.body, code, &ctx))
            }
        };

        Ok(finish(canonical, &outcome.meta))
    }

    /// Collects `parameter` at midnight UTC on the same day of year in every
    /// year of `years`, in one request. Years without that day (366 outside
    /// leap years) are skipped.
    ///
    /// The result is a single series with one point per year, ready for
    /// [`crate::assess`].
    pub fn fetch_day_of_year_history(
        &self,
        location: Location,
        parameter: &str,
        day_of_year: u32,
        years: Range<i32>,
    ) -> Result<Canonical> {
        if !(1..=366).contains(&day_of_year) {
            return Err(AdapterError::InvalidArgument {
                name: "day_of_year",
                reason: format!("{} is outside 1..=366", day_of_year),
            });
        }
        let instants: Vec<String> = years
            .clone()
            .filter_map(|year| NaiveDate::from_yo_opt(year, day_of_year))
            .map(|d| format!("{}T00:00:00Z", d.format("%Y-%m-%d")))
            .collect();
        if instants.is_empty() {
            return Err(AdapterError::InvalidArgument {
                name: "years",
                reason: format!(
                    "no year in {}..{} has a day {}",
                    years.start, years.end, day_of_year
                ),
            });
        }
        log::debug!(
            "collecting `{}` for day {} over {} year(s)",
            parameter,
            day_of_year,
            instants.len()
        );

        let query = SemanticQuery::builder()
            .time(TimeSpec::Raw(instants.join(",")))
            .parameter(parameter)
            .coordinates(Coordinates::Point(location))
            .build()?;
        self.fetch_meteomatics(&query)
    }

    /// Fetches a NASA POWER point time series (no credentials needed).
    pub fn fetch_power(
        &self,
        query: &SemanticQuery,
        resolution: Resolution,
        community: Community,
    ) -> Result<Canonical> {
        let Coordinates::Point(location) = &query.coordinates else {
            return Err(AdapterError::InvalidArgument {
                name: "coordinates",
                reason: "NASA POWER point queries take a single location".to_string(),
            });
        };

        let codes = resolve_all(Provider::NasaPower, &query.parameters);
        let outcome = self.fetcher.fetch(codes, |codes| {
            build_power_url(
                &self.power_url,
                resolution,
                community,
                &query.time,
                codes,
                location,
            )
        })?;

        let ctx = SeriesContext::new(Provider::NasaPower)
            .with_location(*location)
            .with_range(range_of(&query.time, Some(resolution.interval_minutes())));
        let canonical = normalize(&outcome.body, &outcome.meta.parameters, &ctx);
        Ok(finish(canonical, &outcome.meta))
    }
}

fn resolve_all(provider: Provider, keys: &[String]) -> Vec<String> {
    let mut codes: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        let code = resolve(provider, key);
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

fn range_of(time: &TimeSpec, interval_minutes: Option<i64>) -> DatetimeRange {
    let (start, end) = match time.bounds() {
        Some((s, e)) => (Some(format_instant(&s)), Some(format_instant(&e))),
        None => (None, None),
    };
    DatetimeRange {
        start,
        end,
        interval_minutes: interval_minutes.or_else(|| time.interval_minutes()),
    }
}

/// Attaches provenance and validation results to a normalised payload.
fn finish(mut canonical: Canonical, meta: &FetchMeta) -> Canonical {
    canonical.attach_fetch_meta(meta);
    let report = validate(&canonical.to_json());
    if !report.valid {
        log::warn!(
            "normalised payload failed validation: {}",
            report.errors.join("; ")
        );
        canonical.attach_validation_errors(&report.errors);
    }
    canonical
}

fn warn_if_expired(credentials: &Credentials) {
    let today = Utc::now().date_naive();
    match credentials.days_remaining(today) {
        Some(days) if days < 0 => log::warn!(
            "Meteomatics credentials for {} expired on {}",
            credentials.username,
            credentials.valid_until.map(|d| d.to_string()).unwrap_or_default()
        ),
        Some(days) => log::info!(
            "Meteomatics credentials for {} valid for {} more day(s)",
            credentials.username,
            days
        ),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn resolve_all_maps_and_dedupes() {
        let keys = vec![
            "temperature".to_string(),
            "t_2m:C".to_string(),
            "wind_speed".to_string(),
        ];
        assert_eq!(
            resolve_all(Provider::Meteomatics, &keys),
            vec!["t_2m:C", "wind_speed_10m:ms"]
        );
    }

    #[test]
    fn range_uses_resolution_interval_for_power() {
        let t = TimeSpec::Instant(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap());
        let r = range_of(&t, Some(1440));
        assert_eq!(r.start.as_deref(), Some("2025-07-01T00:00:00Z"));
        assert_eq!(r.end, r.start);
        assert_eq!(r.interval_minutes, Some(1440));
        assert_eq!(range_of(&TimeSpec::Raw("now".into()), None), DatetimeRange::default());
    }
}
