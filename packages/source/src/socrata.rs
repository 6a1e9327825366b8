//! LAPD Socrata SODA API source.
//!
//! Pages through the dataset with `$limit`/`$offset`, filtering on the
//! occurrence date with `$where` and ordering on `date_occ,dr_no` so page
//! boundaries are stable. Up to `max_concurrent_pages` pages are in flight
//! at once; results are consumed strictly in page order.
//!
//! Dataset: <https://data.lacity.org/resource/2nrs-mtv8>

use async_trait::async_trait;
use futures::{StreamExt as _, stream};
use la_crime_source_models::{DateWindow, IncidentRecord};
use serde::Deserialize;
use serde_json::Value;

use crate::config::SourceConfig;
use crate::parsing::{parse_hhmm, parse_lat_lng, parse_socrata_date, value_as_string, with_time};
use crate::retry::send_json;
use crate::{FetchOutcome, IncidentSource, SourceError};

/// Column the window filter and ordering apply to.
const DATE_COLUMN: &str = "date_occ";

/// One raw row as returned by the LAPD dataset.
///
/// Every field is optional and loosely typed; [`normalize_record`] decides
/// what is usable.
#[derive(Debug, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    dr_no: Value,
    #[serde(default)]
    date_rptd: Option<String>,
    #[serde(default)]
    date_occ: Option<String>,
    #[serde(default)]
    time_occ: Value,
    #[serde(default)]
    crm_cd_desc: Option<String>,
    #[serde(default)]
    area_name: Option<String>,
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lon: Value,
}

/// LAPD open-data incident source.
pub struct SocrataSource {
    client: reqwest::Client,
    config: SourceConfig,
}

impl SocrataSource {
    /// Creates a source with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Client`] if the HTTP client cannot be built.
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SourceError::Client {
                message: e.to_string(),
            })?;
        if config.app_token.is_none() {
            log::info!("No Socrata app token configured; using anonymous rate limits");
        }
        Ok(Self { client, config })
    }

    /// The configuration this source was built with.
    #[must_use]
    pub const fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn where_clause(window: &DateWindow) -> String {
        format!(
            "{DATE_COLUMN} between '{}T00:00:00' and '{}T23:59:59'",
            window.start(),
            window.end()
        )
    }

    async fn fetch_page(
        &self,
        window: &DateWindow,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let where_clause = Self::where_clause(window);
        let order = format!("{DATE_COLUMN},dr_no");
        let params = [
            ("$where", where_clause),
            ("$order", order),
            ("$limit", limit.to_string()),
            ("$offset", offset.to_string()),
        ];

        log::info!("Fetching LAPD data for {window}: offset={offset}, limit={limit}");

        send_json(
            || {
                let request = self.client.get(&self.config.api_url).query(&params);
                match &self.config.app_token {
                    Some(token) => request.header("X-App-Token", token),
                    None => request,
                }
            },
            &self.config.retry_policy(),
        )
        .await
    }
}

#[async_trait]
impl IncidentSource for SocrataSource {
    fn id(&self) -> &'static str {
        "lapd"
    }

    async fn fetch(&self, window: &DateWindow) -> Result<FetchOutcome, SourceError> {
        if window.len_days() > u64::from(self.config.max_window_days) {
            return Err(SourceError::InvalidWindow {
                message: format!(
                    "{window} spans {} days, maximum is {}",
                    window.len_days(),
                    self.config.max_window_days
                ),
            });
        }

        let page_size = self.config.page_size;
        let max_records = self.config.max_records;

        // `buffered` keeps up to N page requests in flight but yields them in
        // offset order, so concatenation is independent of completion order.
        let offsets = (0..)
            .map(|page: u64| page * page_size)
            .take_while(|offset| *offset < max_records);
        let mut pages = stream::iter(offsets)
            .map(|offset| {
                let limit = page_size.min(max_records - offset);
                async move { (limit, self.fetch_page(window, offset, limit).await) }
            })
            .buffered(self.config.max_concurrent_pages);

        let mut incidents = Vec::new();
        let mut raw_count = 0usize;

        while let Some((limit, page)) = pages.next().await {
            let page = page?;
            let count = page.len();
            raw_count += count;

            incidents.extend(
                page.into_iter()
                    .filter_map(normalize_record)
                    .filter(|incident| window.contains(incident.occurred_at.date_naive())),
            );

            if (count as u64) < limit {
                break;
            }
        }

        let truncated = raw_count as u64 >= max_records;
        if truncated {
            log::warn!("Hit the {max_records} record ceiling for {window}; results are truncated");
        }

        log::info!(
            "Normalized {} incidents from {raw_count} raw records for {window}",
            incidents.len()
        );
        Ok(FetchOutcome {
            records: incidents,
            truncated,
        })
    }
}

/// Converts one raw row into an [`IncidentRecord`].
///
/// Rows without a report number or a parseable occurrence date are dropped.
/// Missing descriptions and area names become empty strings so the row can
/// still be counted as unmapped or unmatched downstream.
#[must_use]
pub fn normalize_record(record: RawRecord) -> Option<IncidentRecord> {
    let Some(report_id) = value_as_string(&record.dr_no) else {
        log::debug!("Dropping record without dr_no");
        return None;
    };

    let Some(occurred_on) = record.date_occ.as_deref().and_then(parse_socrata_date) else {
        log::debug!("Dropping record {report_id}: unparseable date_occ {:?}", record.date_occ);
        return None;
    };
    let occurred_at = with_time(occurred_on, parse_hhmm(&record.time_occ));

    let reported_at = record.date_rptd.as_deref().and_then(parse_socrata_date);
    let coordinates = parse_lat_lng(&record.lat, &record.lon);

    Some(IncidentRecord {
        report_id,
        reported_at,
        occurred_at,
        description: record.crm_cd_desc.unwrap_or_default().trim().to_string(),
        area_name: record.area_name.unwrap_or_default().trim().to_string(),
        latitude: coordinates.map(|(lat, _)| lat),
        longitude: coordinates.map(|(_, lng)| lng),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn normalizes_string_typed_record() {
        let incident = normalize_record(raw(json!({
            "dr_no": "240104321",
            "date_rptd": "2024-03-02T00:00:00.000",
            "date_occ": "2024-03-01T00:00:00.000",
            "time_occ": "2130",
            "crm_cd_desc": " VEHICLE - STOLEN ",
            "area_name": "Pacific",
            "lat": "33.9925",
            "lon": "-118.4695"
        })))
        .unwrap();

        assert_eq!(incident.report_id, "240104321");
        assert_eq!(incident.occurred_at.to_string(), "2024-03-01 21:30:00 UTC");
        assert_eq!(
            incident.reported_at.unwrap().to_string(),
            "2024-03-02 00:00:00 UTC"
        );
        assert_eq!(incident.description, "VEHICLE - STOLEN");
        assert_eq!(incident.coordinates(), Some((-118.4695, 33.9925)));
    }

    #[test]
    fn normalizes_number_typed_record() {
        let incident = normalize_record(raw(json!({
            "dr_no": 240_104_322,
            "date_occ": "2024-03-01",
            "time_occ": 45,
            "crm_cd_desc": "BURGLARY",
            "area_name": "Mid-Wilshire Division",
            "lat": 0,
            "lon": 0
        })))
        .unwrap();

        assert_eq!(incident.report_id, "240104322");
        assert_eq!(incident.occurred_at.to_string(), "2024-03-01 00:45:00 UTC");
        assert!(incident.coordinates().is_none());
        assert!(incident.reported_at.is_none());
    }

    #[test]
    fn drops_records_without_id_or_date() {
        assert!(normalize_record(raw(json!({ "date_occ": "2024-03-01" }))).is_none());
        assert!(normalize_record(raw(json!({ "dr_no": "1", "date_occ": "yesterday" }))).is_none());
    }

    #[test]
    fn where_clause_covers_whole_days() {
        let window = DateWindow::new(
            "2024-01-01".parse().unwrap(),
            "2024-01-31".parse().unwrap(),
            la_crime_source_models::MAX_WINDOW_DAYS,
        )
        .unwrap();
        assert_eq!(
            SocrataSource::where_clause(&window),
            "date_occ between '2024-01-01T00:00:00' and '2024-01-31T23:59:59'"
        );
    }
}
