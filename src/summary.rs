//! Climatological statistics over canonical points.
//!
//! Every function skips null values; a series with no values yields `None`
//! rather than a panic or a NaN.

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::canonical::{Point, TimeSeries};
use crate::catalog::Thresholds;

// Two-sided 95% Student-t critical values for 1..=29 degrees of freedom.
const T_95: [f64; 29] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045,
];
const Z_95: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Exceeds,
    Below,
}

/// Descriptive statistics over the non-null values of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Sample standard deviation; needs at least two values.
    pub std_dev: Option<f64>,
}

impl SeriesSummary {
    pub fn from_series(series: &TimeSeries) -> Self {
        Self::from_points(&series.data)
    }

    pub fn from_points(points: &[Point]) -> Self {
        let values: Vec<f64> = points.iter().filter_map(|p| p.value).collect();
        let count = values.len();
        let missing = points.len() - count;
        if count == 0 {
            return Self {
                count,
                missing,
                mean: None,
                min: None,
                max: None,
                std_dev: None,
            };
        }

        let mean = values.iter().sum::<f64>() / count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std_dev = (count > 1).then(|| {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        });

        Self {
            count,
            missing,
            mean: Some(mean),
            min: Some(min),
            max: Some(max),
            std_dev,
        }
    }

    /// 95% confidence interval for the mean: Student-t below 30 values,
    /// normal above.
    pub fn confidence_interval_95(&self) -> Option<(f64, f64)> {
        let (mean, sd) = (self.mean?, self.std_dev?);
        let n = self.count;
        let critical = T_95.get(n - 2).copied().filter(|_| n < 30).unwrap_or(Z_95);
        let margin = critical * sd / (n as f64).sqrt();
        Some((mean - margin, mean + margin))
    }
}

fn values(points: &[Point]) -> Vec<f64> {
    points.iter().filter_map(|p| p.value).collect()
}

/// Share of non-null values strictly above (or below) `threshold`.
pub fn exceedance_probability(points: &[Point], threshold: f64, condition: Condition) -> Option<f64> {
    let values = values(points);
    if values.is_empty() {
        return None;
    }
    let hits = values
        .iter()
        .filter(|v| match condition {
            Condition::Exceeds => **v > threshold,
            Condition::Below => **v < threshold,
        })
        .count();
    Some(hits as f64 / values.len() as f64)
}

/// Expected number of samples (years, for a day-of-year history) between two
/// events. Infinite when the event never occurred.
pub fn return_period(points: &[Point], threshold: f64, condition: Condition) -> Option<f64> {
    exceedance_probability(points, threshold, condition).map(|p| {
        if p == 0.0 { f64::INFINITY } else { 1.0 / p }
    })
}

/// Share of non-null values inside `[min, max]`.
pub fn comfort_probability(points: &[Point], min: f64, max: f64) -> Option<f64> {
    let values = values(points);
    if values.is_empty() {
        return None;
    }
    let hits = values.iter().filter(|v| (min..=max).contains(*v)).count();
    Some(hits as f64 / values.len() as f64)
}

/// Linearly interpolated percentile of an ascending slice, `q` in `[0, 100]`.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q.clamp(0.0, 100.0) / 100.0 * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Percentiles {
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let mut v = values(points);
        v.sort_by(|a, b| a.total_cmp(b));
        Some(Self {
            p10: percentile(&v, 10.0)?,
            p25: percentile(&v, 25.0)?,
            p50: percentile(&v, 50.0)?,
            p75: percentile(&v, 75.0)?,
            p90: percentile(&v, 90.0)?,
            p95: percentile(&v, 95.0)?,
            p99: percentile(&v, 99.0)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

/// Least-squares line through the non-null values against their position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    /// Change per sample.
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation; 0 for a constant series.
    pub r: f64,
}

impl Trend {
    /// Needs at least two values.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let ys = values(points);
        if ys.len() < 2 {
            return None;
        }
        let n = ys.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = ys.iter().sum::<f64>() / n;

        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for (i, y) in ys.iter().enumerate() {
            let dx = i as f64 - x_mean;
            let dy = y - y_mean;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }

        let slope = sxy / sxx;
        let r = if syy == 0.0 { 0.0 } else { sxy / (sxx * syy).sqrt() };
        Some(Self {
            slope,
            intercept: y_mean - slope * x_mean,
            r,
        })
    }

    pub fn direction(&self) -> TrendDirection {
        if self.slope > 0.0 {
            TrendDirection::Increasing
        } else if self.slope < 0.0 {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Flat
        }
    }
}

/// Per calendar month (1–12) summaries; months without values are omitted.
pub fn monthly_statistics(points: &[Point]) -> BTreeMap<u32, SeriesSummary> {
    let mut by_month: BTreeMap<u32, Vec<Point>> = BTreeMap::new();
    for p in points {
        match NaiveDateTime::parse_from_str(&p.ts, "%Y-%m-%dT%H:%M:%SZ") {
            Ok(t) => by_month.entry(t.month()).or_default().push(p.clone()),
            Err(_) => log::debug!("skipping point with unparseable timestamp `{}`", p.ts),
        }
    }
    by_month
        .into_iter()
        .map(|(month, pts)| (month, SeriesSummary::from_points(&pts)))
        .filter(|(_, s)| s.count > 0)
        .collect()
}

/// Variability class from the coefficient of variation (`std_dev / |mean|`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskCategory {
    pub fn from_summary(summary: &SeriesSummary) -> Option<Self> {
        let (mean, sd) = (summary.mean?, summary.std_dev?);
        let cv = if mean == 0.0 { f64::INFINITY } else { sd / mean.abs() };
        Some(if cv < 0.1 {
            RiskCategory::Low
        } else if cv < 0.3 {
            RiskCategory::Moderate
        } else if cv < 0.5 {
            RiskCategory::High
        } else {
            RiskCategory::VeryHigh
        })
    }
}

/// Everything known about one variable's historical distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub summary: SeriesSummary,
    pub confidence_interval_95: Option<(f64, f64)>,
    pub percentiles: Option<Percentiles>,
    pub trend: Option<Trend>,
    pub high_probability: Option<f64>,
    pub high_return_period: Option<f64>,
    pub low_probability: Option<f64>,
    pub low_return_period: Option<f64>,
    pub comfortable_probability: Option<f64>,
    pub risk_category: Option<RiskCategory>,
}

/// Builds a [`RiskAssessment`]; threshold-based fields stay `None` without
/// thresholds.
pub fn assess(points: &[Point], thresholds: Option<&Thresholds>) -> RiskAssessment {
    let summary = SeriesSummary::from_points(points);
    if summary.count < 10 {
        log::warn!(
            "only {} values available; climatological results may be unreliable",
            summary.count
        );
    }
    let high = thresholds.map(|t| t.high);
    let low = thresholds.map(|t| t.low);

    RiskAssessment {
        confidence_interval_95: summary.confidence_interval_95(),
        percentiles: Percentiles::from_points(points),
        trend: Trend::from_points(points),
        high_probability: high.and_then(|h| exceedance_probability(points, h, Condition::Exceeds)),
        high_return_period: high.and_then(|h| return_period(points, h, Condition::Exceeds)),
        low_probability: low.and_then(|l| exceedance_probability(points, l, Condition::Below)),
        low_return_period: low.and_then(|l| return_period(points, l, Condition::Below)),
        comfortable_probability: thresholds
            .and_then(|t| comfort_probability(points, t.comfortable.0, t.comfortable.1)),
        risk_category: RiskCategory::from_summary(&summary),
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(values: &[Option<f64>]) -> Vec<Point> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Point {
                ts: format!("2025-07-{:02}T00:00:00Z", i + 1),
                value: *v,
            })
            .collect()
    }

    #[test]
    fn summary_ignores_nulls() {
        let s = SeriesSummary::from_points(&pts(&[Some(2.0), None, Some(4.0), Some(6.0)]));
        assert_eq!(s.count, 3);
        assert_eq!(s.missing, 1);
        assert_eq!(s.mean, Some(4.0));
        assert_eq!((s.min, s.max), (Some(2.0), Some(6.0)));
        assert_eq!(s.std_dev, Some(2.0));
    }

    #[test]
    fn empty_and_single_value_series() {
        let s = SeriesSummary::from_points(&pts(&[None, None]));
        assert_eq!((s.count, s.missing, s.mean), (0, 2, None));
        let one = SeriesSummary::from_points(&pts(&[Some(1.5)]));
        assert_eq!(one.std_dev, None);
        assert_eq!(one.mean, Some(1.5));
    }

    #[test]
    fn exceedance() {
        let p = pts(&[Some(30.0), Some(33.0), None, Some(35.0), Some(20.0)]);
        assert_eq!(exceedance_probability(&p, 32.0, Condition::Exceeds), Some(0.5));
        assert_eq!(exceedance_probability(&p, 30.0, Condition::Below), Some(0.25));
        assert_eq!(exceedance_probability(&[], 0.0, Condition::Below), None);
    }

    #[test]
    fn return_period_is_inverse_probability() {
        let p = pts(&[Some(30.0), Some(33.0), Some(35.0), Some(20.0)]);
        assert_eq!(return_period(&p, 34.0, Condition::Exceeds), Some(4.0));
        assert_eq!(return_period(&p, 40.0, Condition::Exceeds), Some(f64::INFINITY));
        assert_eq!(return_period(&pts(&[None]), 0.0, Condition::Below), None);
    }

    #[test]
    fn comfort_range_is_inclusive() {
        let p = pts(&[Some(18.0), Some(24.0), Some(25.0), None, Some(10.0)]);
        assert_eq!(comfort_probability(&p, 18.0, 24.0), Some(0.5));
    }

    #[test]
    fn percentiles_interpolate_linearly() {
        let p = pts(&[Some(4.0), Some(1.0), None, Some(3.0), Some(2.0), Some(5.0)]);
        let q = Percentiles::from_points(&p).unwrap();
        assert_eq!(q.p50, 3.0);
        assert_eq!(q.p25, 2.0);
        assert!((q.p10 - 1.4).abs() < 1e-9);
        assert!((q.p99 - 4.96).abs() < 1e-9);
        assert_eq!(percentile(&[7.0], 90.0), Some(7.0));
        assert_eq!(Percentiles::from_points(&[]), None);
    }

    #[test]
    fn trend_fits_a_line() {
        let rising = Trend::from_points(&pts(&[Some(1.0), Some(3.0), None, Some(5.0), Some(7.0)]))
            .unwrap();
        assert_eq!(rising.slope, 2.0);
        assert_eq!(rising.intercept, 1.0);
        assert_eq!(rising.r, 1.0);
        assert_eq!(rising.direction(), TrendDirection::Increasing);

        let flat = Trend::from_points(&pts(&[Some(2.0), Some(2.0), Some(2.0)])).unwrap();
        assert_eq!((flat.slope, flat.r), (0.0, 0.0));
        assert_eq!(flat.direction(), TrendDirection::Flat);

        assert_eq!(Trend::from_points(&pts(&[Some(1.0)])), None);
    }

    #[test]
    fn monthly_groups_by_calendar_month() {
        let p = vec![
            Point { ts: "2024-07-01T00:00:00Z".into(), value: Some(20.0) },
            Point { ts: "2025-07-15T00:00:00Z".into(), value: Some(24.0) },
            Point { ts: "2025-08-01T00:00:00Z".into(), value: Some(30.0) },
            Point { ts: "2025-09-01T00:00:00Z".into(), value: None },
            Point { ts: "not a date".into(), value: Some(1.0) },
        ];
        let m = monthly_statistics(&p);
        assert_eq!(m.keys().copied().collect::<Vec<_>>(), vec![7, 8]);
        assert_eq!(m[&7].count, 2);
        assert_eq!(m[&7].mean, Some(22.0));
        assert_eq!(m[&8].std_dev, None);
    }

    #[test]
    fn risk_follows_coefficient_of_variation() {
        let low = SeriesSummary::from_points(&pts(&[Some(20.0), Some(21.0), Some(19.0)]));
        assert_eq!(RiskCategory::from_summary(&low), Some(RiskCategory::Low));
        let very_high = SeriesSummary::from_points(&pts(&[Some(-1.0), Some(1.0)]));
        assert_eq!(RiskCategory::from_summary(&very_high), Some(RiskCategory::VeryHigh));
        let single = SeriesSummary::from_points(&pts(&[Some(1.0)]));
        assert_eq!(RiskCategory::from_summary(&single), None);
    }

    #[test]
    fn confidence_interval_uses_t_for_small_samples() {
        let s = SeriesSummary::from_points(&pts(&[Some(2.0), Some(4.0), Some(6.0)]));
        // n = 3, sd = 2, t(2) = 4.303
        let (lo, hi) = s.confidence_interval_95().unwrap();
        let margin = 4.303 * 2.0 / 3f64.sqrt();
        assert!((lo - (4.0 - margin)).abs() < 1e-12);
        assert!((hi - (4.0 + margin)).abs() < 1e-12);
        assert_eq!(SeriesSummary::from_points(&pts(&[Some(1.0)])).confidence_interval_95(), None);
    }

    #[test]
    fn assessment_applies_thresholds() {
        let p = pts(&[Some(30.0), Some(33.0), Some(21.0), Some(-2.0)]);
        let t = Thresholds {
            high: 32.0,
            low: 0.0,
            comfortable: (18.0, 24.0),
            extreme_high: 40.0,
            extreme_low: -10.0,
        };
        let a = assess(&p, Some(&t));
        assert_eq!(a.high_probability, Some(0.25));
        assert_eq!(a.high_return_period, Some(4.0));
        assert_eq!(a.low_probability, Some(0.25));
        assert_eq!(a.comfortable_probability, Some(0.25));
        assert_eq!(a.summary.count, 4);
        assert!(a.percentiles.is_some() && a.trend.is_some());

        let bare = assess(&p, None);
        assert_eq!((bare.high_probability, bare.comfortable_probability), (None, None));
    }
}
