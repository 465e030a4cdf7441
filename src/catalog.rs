use serde::Serialize;

/// Separator between a Meteomatics parameter name and its unit (`t_2m:C`).
pub const UNIT_SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Meteomatics,
    NasaPower,
}

impl Provider {
    pub fn source_name(&self) -> &'static str {
        match self {
            Provider::Meteomatics => "meteomatics",
            Provider::NasaPower => "nasa_power",
        }
    }
}

/// Static description of one provider parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParameterDescriptor {
    /// Provider-agnostic key, e.g. `temperature`.
    pub key: &'static str,
    #[serde(skip)]
    pub provider: Provider,
    /// Token the provider expects, possibly with a unit suffix.
    pub code: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
}

const fn param(
    key: &'static str,
    provider: Provider,
    code: &'static str,
    label: &'static str,
    unit: &'static str,
) -> ParameterDescriptor {
    ParameterDescriptor {
        key,
        provider,
        code,
        label,
        unit,
    }
}

use Provider::{Meteomatics, NasaPower};

pub static CATALOG: &[ParameterDescriptor] = &[
    param("temperature", Meteomatics, "t_2m:C", "Temperature at 2 m", "°C"),
    param("temperature_max", Meteomatics, "t_max_2m_24h:C", "Maximum temperature (24 h)", "°C"),
    param("temperature_min", Meteomatics, "t_min_2m_24h:C", "Minimum temperature (24 h)", "°C"),
    param("precipitation", Meteomatics, "precip_24h:mm", "Precipitation (24 h)", "mm"),
    param("wind_speed", Meteomatics, "wind_speed_10m:ms", "Wind speed at 10 m", "m/s"),
    param("wind_gusts", Meteomatics, "wind_gusts_10m_24h:ms", "Wind gusts (24 h)", "m/s"),
    param("humidity", Meteomatics, "relative_humidity_2m:p", "Relative humidity at 2 m", "%"),
    param("pressure", Meteomatics, "msl_pressure:hPa", "Mean sea level pressure", "hPa"),
    param("sunshine_duration", Meteomatics, "sunshine_duration_24h:h", "Sunshine duration (24 h)", "h"),
    param("temperature", NasaPower, "T2M", "Temperature at 2 Meters", "°C"),
    param("temperature_max", NasaPower, "T2M_MAX", "Temperature at 2 Meters Maximum", "°C"),
    param("temperature_min", NasaPower, "T2M_MIN", "Temperature at 2 Meters Minimum", "°C"),
    param("precipitation", NasaPower, "PRECTOTCORR", "Precipitation Corrected", "mm/day"),
    param("wind_speed", NasaPower, "WS10M", "Wind Speed at 10 Meters", "m/s"),
    param("humidity", NasaPower, "RH2M", "Relative Humidity at 2 Meters", "%"),
    param("pressure", NasaPower, "PS", "Surface Pressure", "kPa"),
    param("solar_radiation", NasaPower, "ALLSKY_SFC_SW_DWN", "All Sky Surface Shortwave Downward Irradiance", "kW-hr/m^2/day"),
    param("cloud_cover", NasaPower, "CLOUD_AMT", "Cloud Amount", "%"),
];

/// Looks up a semantic key for one provider.
pub fn lookup(provider: Provider, key: &str) -> Option<&'static ParameterDescriptor> {
    CATALOG
        .iter()
        .find(|p| p.provider == provider && p.key.eq_ignore_ascii_case(key))
}

/// Looks up a provider code, tolerating a missing or different unit suffix.
pub fn describe(provider: Provider, code: &str) -> Option<&'static ParameterDescriptor> {
    CATALOG
        .iter()
        .filter(|p| p.provider == provider)
        .find(|p| p.code == code)
        .or_else(|| {
            let bare = strip_unit_suffix(code);
            CATALOG
                .iter()
                .find(|p| p.provider == provider && strip_unit_suffix(p.code) == bare)
        })
}

/// Maps a semantic key to the provider code; unknown keys are taken as literal codes.
pub fn resolve(provider: Provider, key: &str) -> String {
    match lookup(provider, key) {
        Some(p) => p.code.to_string(),
        None => {
            log::debug!(
                "`{}` is not a known {} key, using it as a provider code",
                key,
                provider.source_name()
            );
            key.to_string()
        }
    }
}

/// Human label and unit for a code, falling back to the code and its unit suffix.
pub fn label_and_unit(provider: Provider, code: &str) -> (String, String) {
    match describe(provider, code) {
        Some(p) if p.code == code || unit_suffix(code).is_none() => {
            (p.label.to_string(), p.unit.to_string())
        }
        Some(p) => (
            p.label.to_string(),
            unit_suffix(code).unwrap_or_default().to_string(),
        ),
        None => (
            code.to_string(),
            unit_suffix(code).unwrap_or_default().to_string(),
        ),
    }
}

pub fn strip_unit_suffix(code: &str) -> &str {
    code.split_once(UNIT_SEPARATOR).map_or(code, |(name, _)| name)
}

pub fn unit_suffix(code: &str) -> Option<&str> {
    code.split_once(UNIT_SEPARATOR)
        .map(|(_, unit)| unit)
        .filter(|u| !u.is_empty())
}

/// Reference thresholds for a variable, in the unit of its catalog code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// Hot, wet, windy or humid above this.
    pub high: f64,
    /// Cold, dry or calm below this.
    pub low: f64,
    /// Inclusive `(min, max)`.
    pub comfortable: (f64, f64),
    pub extreme_high: f64,
    pub extreme_low: f64,
}

const fn thresholds_of(
    high: f64,
    low: f64,
    comfortable: (f64, f64),
    extreme_high: f64,
    extreme_low: f64,
) -> Thresholds {
    Thresholds {
        high,
        low,
        comfortable,
        extreme_high,
        extreme_low,
    }
}

// Wind limits are the usual 40/10/25/70/5 km/h expressed in m/s.
static THRESHOLDS: &[(&str, Thresholds)] = &[
    ("temperature", thresholds_of(32.0, 0.0, (18.0, 24.0), 40.0, -10.0)),
    ("temperature_max", thresholds_of(35.0, 5.0, (20.0, 28.0), 45.0, -5.0)),
    ("temperature_min", thresholds_of(25.0, -5.0, (10.0, 20.0), 30.0, -15.0)),
    ("precipitation", thresholds_of(25.0, 0.1, (0.0, 5.0), 50.0, 0.0)),
    ("wind_speed", thresholds_of(11.1, 2.8, (0.0, 6.9), 19.4, 1.4)),
    ("humidity", thresholds_of(80.0, 30.0, (40.0, 60.0), 95.0, 15.0)),
];

/// Thresholds for a provider code (or semantic key). `None` for unknown
/// variables and for codes requested in a unit other than the catalog's.
pub fn thresholds(provider: Provider, code: &str) -> Option<Thresholds> {
    let d = describe(provider, code).or_else(|| lookup(provider, code))?;
    if code != d.key && unit_suffix(code).is_some_and(|u| Some(u) != unit_suffix(d.code)) {
        return None;
    }
    THRESHOLDS
        .iter()
        .find(|(key, _)| *key == d.key)
        .map(|(_, t)| *t)
}
