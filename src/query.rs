use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::{AdapterError, Result};

/// A validated WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    lat: f64,
    lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AdapterError::InvalidArgument {
                name: "lat",
                reason: format!("latitude must be between -90 and 90, got {}", lat),
            });
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(AdapterError::InvalidArgument {
                name: "lon",
                reason: format!("longitude must be between -180 and 180, got {}", lon),
            });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Coordinates {
    Point(Location),
    Points(Vec<Location>),
    /// Regular lat/lon lattice; resolutions are in degrees.
    BoundingBox {
        north: f64,
        west: f64,
        south: f64,
        east: f64,
        res_lat: f64,
        res_lon: f64,
    },
}

impl Coordinates {
    pub fn bounding_box(
        north: f64,
        west: f64,
        south: f64,
        east: f64,
        res_lat: f64,
        res_lon: f64,
    ) -> Result<Self> {
        let nw = Location::new(north, west)?;
        let se = Location::new(south, east)?;
        if nw.lat < se.lat {
            return Err(AdapterError::InvalidArgument {
                name: "bbox",
                reason: format!("north ({}) is below south ({})", north, south),
            });
        }
        if nw.lon > se.lon {
            return Err(AdapterError::InvalidArgument {
                name: "bbox",
                reason: format!("west ({}) is east of east ({})", west, east),
            });
        }
        if !(res_lat > 0.0 && res_lon > 0.0) {
            return Err(AdapterError::InvalidArgument {
                name: "bbox",
                reason: "grid resolution must be positive".to_string(),
            });
        }
        Ok(Coordinates::BoundingBox {
            north,
            west,
            south,
            east,
            res_lat,
            res_lon,
        })
    }

    /// The representative point used in response metadata.
    pub fn primary(&self) -> Option<Location> {
        match self {
            Coordinates::Point(l) => Some(*l),
            Coordinates::Points(ls) => ls.first().copied(),
            Coordinates::BoundingBox { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpec {
    Instant(DateTime<Utc>),
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: TimeDelta,
    },
    /// Already written in the provider's own grammar.
    Raw(String),
}

impl TimeSpec {
    pub fn range(start: DateTime<Utc>, end: DateTime<Utc>, interval: TimeDelta) -> Result<Self> {
        let spec = TimeSpec::Range {
            start,
            end,
            interval,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            TimeSpec::Range {
                start,
                end,
                interval,
            } => {
                if start > end {
                    return Err(AdapterError::InvalidArgument {
                        name: "time",
                        reason: format!("start {} is after end {}", start, end),
                    });
                }
                if *interval <= TimeDelta::zero() {
                    return Err(AdapterError::InvalidArgument {
                        name: "time",
                        reason: "interval must be positive".to_string(),
                    });
                }
                if interval.subsec_nanos() != 0 || interval.num_seconds() % 60 != 0 {
                    return Err(AdapterError::InvalidArgument {
                        name: "time",
                        reason: format!(
                            "interval of {}s is not a whole number of minutes",
                            interval.num_seconds()
                        ),
                    });
                }
                Ok(())
            }
            TimeSpec::Raw(s) if s.trim().is_empty() => Err(AdapterError::MissingArgument("time")),
            _ => Ok(()),
        }
    }

    pub fn interval_minutes(&self) -> Option<i64> {
        match self {
            TimeSpec::Range { interval, .. } => Some(interval.num_minutes()),
            _ => None,
        }
    }

    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            TimeSpec::Instant(t) => Some((*t, *t)),
            TimeSpec::Range { start, end, .. } => Some((*start, *end)),
            TimeSpec::Raw(_) => None,
        }
    }
}

/// A provider-agnostic request: what, where and when.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticQuery {
    pub time: TimeSpec,
    /// Ordered, unique semantic keys (or literal provider codes).
    pub parameters: Vec<String>,
    pub coordinates: Coordinates,
}

impl SemanticQuery {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    time: Option<TimeSpec>,
    parameters: Vec<String>,
    coordinates: Option<Coordinates>,
}

impl QueryBuilder {
    pub fn time(mut self, time: TimeSpec) -> Self {
        self.time = Some(time);
        self
    }

    pub fn parameter(mut self, key: impl Into<String>) -> Self {
        self.parameters.push(key.into());
        self
    }

    pub fn parameters<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn point(mut self, lat: f64, lon: f64) -> Result<Self> {
        self.coordinates = Some(Coordinates::Point(Location::new(lat, lon)?));
        Ok(self)
    }

    pub fn coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn build(self) -> Result<SemanticQuery> {
        let time = self.time.ok_or(AdapterError::MissingArgument("time"))?;
        time.validate()?;

        let mut parameters: Vec<String> = Vec::with_capacity(self.parameters.len());
        for p in self.parameters {
            let p = p.trim().to_string();
            if !p.is_empty() && !parameters.contains(&p) {
                parameters.push(p);
            }
        }
        if parameters.is_empty() {
            return Err(AdapterError::MissingArgument("parameters"));
        }

        let coordinates = self
            .coordinates
            .ok_or(AdapterError::MissingArgument("coordinates"))?;
        if let Coordinates::Points(points) = &coordinates {
            if points.is_empty() {
                return Err(AdapterError::MissingArgument("coordinates"));
            }
        }

        Ok(SemanticQuery {
            time,
            parameters,
            coordinates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn latitude_out_of_range_is_rejected() {
        let err = Location::new(95.0, 10.0).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidArgument { name: "lat", .. }));
        assert!(Location::new(-90.0, 180.0).is_ok());
        assert!(Location::new(0.0, 180.5).is_err());
        assert!(Location::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn builder_reports_missing_fields_in_order() {
        let err = SemanticQuery::builder().build().unwrap_err();
        assert!(matches!(err, AdapterError::MissingArgument("time")));

        let err = SemanticQuery::builder()
            .time(TimeSpec::Instant(day(1)))
            .build()
            .unwrap_err();
        assert!(matches!(err, AdapterError::MissingArgument("parameters")));

        let err = SemanticQuery::builder()
            .time(TimeSpec::Instant(day(1)))
            .parameter("temperature")
            .build()
            .unwrap_err();
        assert!(matches!(err, AdapterError::MissingArgument("coordinates")));
    }

    #[test]
    fn builder_dedupes_parameters_in_order() {
        let q = SemanticQuery::builder()
            .time(TimeSpec::Instant(day(1)))
            .parameters(["b", "a", "b", " ", "c", "a"])
            .point(10.0, 20.0)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(q.parameters, vec!["b", "a", "c"]);
    }

    #[test]
    fn range_must_be_ordered_with_positive_interval() {
        assert!(TimeSpec::range(day(2), day(1), TimeDelta::hours(1)).is_err());
        assert!(TimeSpec::range(day(1), day(2), TimeDelta::zero()).is_err());
        let r = TimeSpec::range(day(1), day(1), TimeDelta::hours(1)).unwrap();
        assert_eq!(r.interval_minutes(), Some(60));
    }

    #[test]
    fn interval_must_be_whole_minutes() {
        let err = TimeSpec::range(day(1), day(2), TimeDelta::seconds(90)).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidArgument { name: "time", .. }));
        assert!(TimeSpec::range(day(1), day(2), TimeDelta::milliseconds(60_500)).is_err());
        assert!(TimeSpec::range(day(1), day(2), TimeDelta::seconds(120)).is_ok());
    }

    #[test]
    fn empty_raw_time_counts_as_missing() {
        let err = SemanticQuery::builder()
            .time(TimeSpec::Raw("  ".into()))
            .parameter("t_2m:C")
            .point(0.0, 0.0)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, AdapterError::MissingArgument("time")));
    }

    #[test]
    fn bounding_box_checks_orientation() {
        assert!(Coordinates::bounding_box(50.0, 5.0, 45.0, 10.0, 1.0, 1.0).is_ok());
        assert!(Coordinates::bounding_box(45.0, 5.0, 50.0, 10.0, 1.0, 1.0).is_err());
        assert!(Coordinates::bounding_box(50.0, 10.0, 45.0, 5.0, 1.0, 1.0).is_err());
        assert!(Coordinates::bounding_box(50.0, 5.0, 45.0, 10.0, 0.0, 1.0).is_err());
    }
}
