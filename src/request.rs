//! Provider URL construction.
//!
//! Meteomatics encodes the whole query in the path:
//! `<base>/<time>/<p1,p2,...>/<lat,lon>/json`. The time segment is written in
//! the provider's own grammar (`2025-07-01T00:00:00Z--2025-07-02T00:00:00Z:PT1H`)
//! and its separators must reach the server literally; parameter tokens are
//! percent-encoded except for the `:` that introduces a unit.

use chrono::{DateTime, TimeDelta, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::catalog::UNIT_SEPARATOR;
use crate::error::{AdapterError, Result};
use crate::query::{Coordinates, Location, TimeSpec};

// Structural characters of ISO 8601 instants, ranges (`--`, `/`) and periods.
const TIME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b':')
    .remove(b'-')
    .remove(b'+')
    .remove(b'.')
    .remove(b'/')
    .remove(b',')
    .remove(b'_');

// Parameter tokens keep `-`, `_`, `.` and the unit separator unescaped.
const PARAM_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(UNIT_SEPARATOR as u8);

pub(crate) fn format_instant(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// ISO 8601 period for a positive interval, using the coarsest exact unit.
pub(crate) fn iso_period(interval: TimeDelta) -> String {
    let minutes = interval.num_minutes();
    if interval.num_seconds() % 60 != 0 || minutes <= 0 {
        format!("PT{}S", interval.num_seconds().max(1))
    } else if minutes % 1440 == 0 {
        format!("P{}D", minutes / 1440)
    } else if minutes % 60 == 0 {
        format!("PT{}H", minutes / 60)
    } else {
        format!("PT{}M", minutes)
    }
}

/// Serialises a time specification into the Meteomatics path grammar.
pub fn meteomatics_time(time: &TimeSpec) -> Result<String> {
    time.validate()?;
    Ok(match time {
        TimeSpec::Instant(t) => format_instant(t),
        TimeSpec::Range {
            start,
            end,
            interval,
        } => format!(
            "{}--{}:{}",
            format_instant(start),
            format_instant(end),
            iso_period(*interval)
        ),
        TimeSpec::Raw(s) => s.trim().to_string(),
    })
}

fn encode_time(time: &str) -> String {
    utf8_percent_encode(time, TIME_SAFE).to_string()
}

fn encode_parameters(codes: &[String]) -> String {
    codes
        .iter()
        .map(|c| utf8_percent_encode(c.trim(), PARAM_SAFE).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn location_segment(l: &Location) -> String {
    format!("{},{}", l.lat(), l.lon())
}

pub(crate) fn coordinates_segment(coords: &Coordinates) -> Result<String> {
    match coords {
        Coordinates::Point(l) => Ok(location_segment(l)),
        Coordinates::Points(ls) => {
            if ls.is_empty() {
                return Err(AdapterError::MissingArgument("coordinates"));
            }
            Ok(ls.iter().map(location_segment).collect::<Vec<_>>().join("+"))
        }
        Coordinates::BoundingBox {
            north,
            west,
            south,
            east,
            res_lat,
            res_lon,
        } => Ok(format!(
            "{},{}_{},{}:{},{}",
            north, west, south, east, res_lat, res_lon
        )),
    }
}

/// Builds `<base>/<time>/<codes>/<coordinates>/json`.
///
/// Fails with [`AdapterError::MissingArgument`] when any part is empty, before
/// anything is sent.
pub fn build_meteomatics_url(
    base: &str,
    time: &TimeSpec,
    codes: &[String],
    coordinates: &Coordinates,
) -> Result<String> {
    let time = meteomatics_time(time)?;
    if time.is_empty() {
        return Err(AdapterError::MissingArgument("time"));
    }
    if codes.iter().all(|c| c.trim().is_empty()) {
        return Err(AdapterError::MissingArgument("parameters"));
    }
    let coordinates = coordinates_segment(coordinates)?;

    Ok(format!(
        "{}/{}/{}/{}/json",
        base.trim_end_matches('/'),
        encode_time(&time),
        encode_parameters(codes),
        coordinates
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Daily,
    Hourly,
}

impl Resolution {
    fn path(&self) -> &'static str {
        match self {
            Resolution::Daily => "daily",
            Resolution::Hourly => "hourly",
        }
    }

    fn format(&self, t: &DateTime<Utc>) -> String {
        match self {
            Resolution::Daily => t.format("%Y%m%d").to_string(),
            Resolution::Hourly => t.format("%Y%m%d%H").to_string(),
        }
    }

    pub fn interval_minutes(&self) -> i64 {
        match self {
            Resolution::Daily => 1440,
            Resolution::Hourly => 60,
        }
    }
}

/// NASA POWER user community; selects unit conventions on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Community {
    Ag,
    #[default]
    Re,
    Sb,
}

impl Community {
    fn code(&self) -> &'static str {
        match self {
            Community::Ag => "AG",
            Community::Re => "RE",
            Community::Sb => "SB",
        }
    }
}

/// Builds a NASA POWER temporal point query.
pub fn build_power_url(
    base: &str,
    resolution: Resolution,
    community: Community,
    time: &TimeSpec,
    codes: &[String],
    location: &Location,
) -> Result<String> {
    time.validate()?;
    let (start, end) = time.bounds().ok_or_else(|| AdapterError::InvalidArgument {
        name: "time",
        reason: "NASA POWER needs a structured instant or range, not a raw time string"
            .to_string(),
    })?;
    if codes.iter().all(|c| c.trim().is_empty()) {
        return Err(AdapterError::MissingArgument("parameters"));
    }

    Ok(format!(
        "{}/api/temporal/{}/point?parameters={}&community={}&start={}&end={}&latitude={}&longitude={}&format=JSON",
        base.trim_end_matches('/'),
        resolution.path(),
        encode_parameters(codes),
        community.code(),
        resolution.format(&start),
        resolution.format(&end),
        location.lat(),
        location.lon()
    ))
}
