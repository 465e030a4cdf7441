use anyhow::Result;
use chrono::{TimeDelta, TimeZone, Utc};
use eo_adapter::{
    Canonical, Client, Condition, Location, Provider, SemanticQuery, SeriesSummary, TimeSpec,
    assess, exceedance_probability, thresholds,
};

fn main() -> Result<()> {
    // Configure authentication via env vars or a `.meteomaticsrc` file.
    let client = Client::from_env()?;

    let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 7, 7, 0, 0, 0).unwrap();
    let query = SemanticQuery::builder()
        .time(TimeSpec::range(start, end, TimeDelta::hours(1))?)
        .parameters(["temperature", "wind_speed"])
        .point(52.52, 13.405)?
        .build()?;

    let payload = client.fetch_meteomatics(&query)?;
    println!("{}", serde_json::to_string_pretty(&payload.to_json())?);

    if let Canonical::SeriesMap(map) = &payload {
        if !map.meta.provenance.dropped_parameters.is_empty() {
            println!("dropped: {:?}", map.meta.provenance.dropped_parameters);
        }
        for (code, entry) in &map.series {
            let summary = SeriesSummary::from_points(&entry.data);
            println!("{} ({}): {}", entry.friendly, code, serde_json::to_string(&summary)?);
        }
        if let Some(t) = map.series.iter().find(|(code, _)| code.starts_with("t_2m")) {
            if let Some(p) = exceedance_probability(&t.1.data, 30.0, Condition::Exceeds) {
                println!("share of hours above 30 °C: {:.0}%", p * 100.0);
            }
        }
    }

    // Day 182 (1 July, or 30 June in leap years) over the last decade.
    let berlin = Location::new(52.52, 13.405)?;
    let history = client.fetch_day_of_year_history(berlin, "temperature_max", 182, 2015..2025)?;
    if let Canonical::Series(series) = &history {
        let limits = thresholds(Provider::Meteomatics, &series.meta.parameter);
        let assessment = assess(&series.data, limits.as_ref());
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    }
    Ok(())
}
