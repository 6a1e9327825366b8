//! Plain-text rendering of an aggregation.

use std::fmt::Write as _;

use la_crime_analytics_models::{AggregationResult, DataQuality};

/// Renders the neighborhood ranking, safest first, followed by run
/// diagnostics.
pub fn ranking_table(result: &AggregationResult) -> Result<String, std::fmt::Error> {
    let width = result
        .neighborhoods
        .iter()
        .map(|n| n.name.len())
        .max()
        .unwrap_or(0)
        .max("NEIGHBORHOOD".len());

    let mut out = String::new();
    let meta = &result.metadata;
    writeln!(out, "Window: {}", meta.window)?;
    writeln!(
        out,
        "{:>4}  {:<width$}  {:>6}  {:>5}  {:>7}  {:>7}  {:>7}  {:>7}  {:>6}  {:<9}  QUALITY",
        "RANK", "NEIGHBORHOOD", "SCORE", "PCTL", "VIOLENT", "VEHICLE", "BREAKIN", "PETTY", "TOTAL", "TREND",
    )?;
    writeln!(out, "{}", "-".repeat(width + 86))?;

    for (rank, n) in result.neighborhoods.iter().enumerate() {
        let quality = match n.data_quality {
            DataQuality::Sufficient => "",
            DataQuality::Insufficient => "insufficient",
        };
        writeln!(
            out,
            "{:>4}  {:<width$}  {:>6.1}  {:>5.0}  {:>7}  {:>7}  {:>7}  {:>7}  {:>6}  {:<9}  {quality}",
            rank + 1,
            n.name,
            n.safety_score,
            n.safety_percentile,
            n.counts.violent_crime,
            n.counts.vehicle_theft,
            n.counts.break_in,
            n.counts.petty_theft,
            n.total,
            n.trend.as_ref(),
        )?;
    }

    writeln!(
        out,
        "\n{} incidents, {} uncategorized, {} outside every neighborhood",
        meta.total_incidents, meta.unmapped_category, meta.unmatched_neighborhood
    )?;
    for notice in &meta.notices {
        writeln!(out, "note: {notice}")?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use la_crime_analytics_models::{NeighborhoodStatistics, RunMetadata, Trend};
    use la_crime_crime_models::CategoryCounts;
    use la_crime_source_models::{DateWindow, MAX_WINDOW_DAYS};

    use super::*;

    fn stats(name: &str, score: f64, total: u64, quality: DataQuality) -> NeighborhoodStatistics {
        NeighborhoodStatistics {
            name: name.to_string(),
            counts: CategoryCounts {
                violent_crime: total,
                ..CategoryCounts::default()
            },
            total,
            unclassified: 0,
            weighted_total: 0.0,
            safety_score: score,
            safety_percentile: score,
            trend: Trend::Stable,
            previous_total: None,
            data_quality: quality,
            geometric_matches: total,
            name_matches: 0,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn renders_ranked_rows_and_diagnostics() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let result = AggregationResult {
            neighborhoods: vec![
                stats("Venice", 100.0, 2, DataQuality::Insufficient),
                stats("Westlake", 0.0, 40, DataQuality::Sufficient),
            ],
            metadata: RunMetadata {
                window: DateWindow::new(day, day, MAX_WINDOW_DAYS).unwrap(),
                preceding_window: None,
                total_incidents: 45,
                unmapped_category: 2,
                unmatched_neighborhood: 1,
                trend_degraded: true,
                truncated: false,
                notices: vec!["Trend comparison unavailable".to_string()],
                generated_at: Utc::now(),
            },
        };

        let table = ranking_table(&result).unwrap();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines[0], "Window: 2024-03-01..=2024-03-01");
        assert!(lines[3].trim_start().starts_with("1  Venice"));
        assert!(lines[3].ends_with("insufficient"));
        assert!(lines[4].trim_start().starts_with("2  Westlake"));
        assert!(table.contains("45 incidents, 2 uncategorized, 1 outside every neighborhood"));
        assert!(table.contains("note: Trend comparison unavailable"));
    }
}
