//! The aggregation run.
//!
//! 1. Fetch the requested window and the equal-length window before it
//!    concurrently. A failure on the requested window is fatal and abandons
//!    the other fetch; a failure on the preceding one only degrades trends to
//!    [`Trend::Stable`](la_crime_analytics_models::Trend::Stable). So does a
//!    truncated fetch on either side.
//! 2. Categorize and bind every record ([`crate::tally`]) on the blocking
//!    pool.
//! 3. Score, rank, and flag each neighborhood ([`crate::scoring`]).

use std::pin::pin;
use std::sync::Arc;

use futures::future::{Either, select};
use la_crime_analytics_models::{AggregationParams, AggregationResult, NeighborhoodStatistics, RunMetadata};
use la_crime_neighborhood::binder::NeighborhoodBinder;
use la_crime_source::{FetchOutcome, IncidentSource, SourceError};
use la_crime_source_models::{DateWindow, IncidentRecord};

use crate::AnalyticsError;
use crate::clock::Clock;
use crate::scoring::{data_quality, percentiles, safety_scores, trend};
use crate::tally::{Tally, tally};

type PrecedingFetch = Option<Result<FetchOutcome, SourceError>>;

/// Builds [`AggregationResult`]s from an incident source and a fixed set of
/// neighborhood boundaries.
pub struct Aggregator {
    source: Arc<dyn IncidentSource>,
    binder: Arc<NeighborhoodBinder>,
    params: AggregationParams,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    /// Creates an aggregator.
    #[must_use]
    pub fn new(
        source: Arc<dyn IncidentSource>,
        binder: Arc<NeighborhoodBinder>,
        params: AggregationParams,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            binder,
            params,
            clock,
        }
    }

    /// Tuning parameters used for every run.
    #[must_use]
    pub const fn params(&self) -> &AggregationParams {
        &self.params
    }

    /// The clock runs are stamped with.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Aggregates incidents for `window`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Source`] if the requested window cannot be
    /// fetched, [`AnalyticsError::NoNeighborhoods`] if there are no
    /// boundaries to aggregate into, and [`AnalyticsError::Tally`] if the
    /// tally task dies.
    pub async fn aggregate(&self, window: DateWindow) -> Result<AggregationResult, AnalyticsError> {
        if self.binder.is_empty() {
            return Err(AnalyticsError::NoNeighborhoods);
        }

        let preceding_window = window.preceding();
        let (primary, preceding) = self.fetch_windows(&window, preceding_window.as_ref()).await?;

        let mut notices = Vec::new();
        if primary.truncated {
            notices.push(format!(
                "Incident fetch for {window} stopped at the record ceiling; counts are incomplete"
            ));
        }

        let previous_records = match (preceding, &preceding_window) {
            (Some(Ok(previous)), Some(previous_window)) if previous.truncated || primary.truncated => {
                log::warn!("Truncated fetch for {window} or {previous_window}, trends degrade to stable");
                notices.push("Trend comparison unavailable: truncated fetch".to_string());
                None
            }
            (Some(Ok(previous)), _) => Some(previous.records),
            (Some(Err(e)), _) => {
                log::warn!("Preceding window for {window} unavailable, trends degrade to stable: {e}");
                notices.push(format!("Trend comparison unavailable: {e}"));
                None
            }
            (None, _) => {
                notices.push("Trend comparison unavailable: no preceding window".to_string());
                None
            }
        };

        let truncated = primary.truncated;
        let (current, previous_totals) = self.tally_windows(primary.records, previous_records).await?;
        let loads: Vec<f64> = current
            .neighborhoods
            .iter()
            .map(|n| self.params.weights.weighted_total(&n.counts))
            .collect();
        let scores = safety_scores(&loads);
        let ranks = percentiles(&scores);
        let now = self.clock.now();

        let mut neighborhoods: Vec<NeighborhoodStatistics> = self
            .binder
            .boundaries()
            .iter()
            .enumerate()
            .map(|(i, boundary)| {
                let counts = current.neighborhoods[i];
                let total = counts.counts.total();
                let previous_total = previous_totals.as_ref().map(|totals| totals[i]);
                NeighborhoodStatistics {
                    name: boundary.name.clone(),
                    counts: counts.counts,
                    total,
                    unclassified: counts.unclassified,
                    weighted_total: loads[i],
                    safety_score: scores[i],
                    safety_percentile: ranks[i],
                    trend: trend(total, previous_total, self.params.trend_threshold),
                    previous_total,
                    data_quality: data_quality(
                        total,
                        counts.name_matches,
                        self.params.min_incidents,
                        self.params.max_name_bound_share,
                    ),
                    geometric_matches: counts.geometric_matches,
                    name_matches: counts.name_matches,
                    last_updated: now,
                }
            })
            .collect();

        neighborhoods.sort_by(|a, b| {
            b.safety_score
                .total_cmp(&a.safety_score)
                .then_with(|| a.name.cmp(&b.name))
        });

        let trend_degraded = previous_totals.is_none();

        log::info!(
            "Aggregated {} incidents for {window} into {} neighborhoods \
             ({} unmapped, {} unmatched{})",
            current.processed,
            neighborhoods.len(),
            current.unmapped_category,
            current.unmatched_neighborhood,
            if trend_degraded { ", trends degraded" } else { "" },
        );

        Ok(AggregationResult {
            neighborhoods,
            metadata: RunMetadata {
                window,
                preceding_window,
                total_incidents: current.processed,
                unmapped_category: current.unmapped_category,
                unmatched_neighborhood: current.unmatched_neighborhood,
                trend_degraded,
                truncated,
                notices,
                generated_at: now,
            },
        })
    }

    /// Fetches both windows concurrently. Returns as soon as the requested
    /// window fails, dropping the preceding fetch.
    async fn fetch_windows(
        &self,
        window: &DateWindow,
        preceding: Option<&DateWindow>,
    ) -> Result<(FetchOutcome, PrecedingFetch), AnalyticsError> {
        let primary = self.source.fetch(window);
        let preceding = pin!(async move {
            match preceding {
                Some(previous) => Some(self.source.fetch(previous).await),
                None => None,
            }
        });

        match select(primary, preceding).await {
            Either::Left((primary, preceding)) => {
                let primary = primary.map_err(|e| primary_failed(window, e))?;
                Ok((primary, preceding.await))
            }
            Either::Right((preceding, primary)) => {
                let primary = primary.await.map_err(|e| primary_failed(window, e))?;
                Ok((primary, preceding))
            }
        }
    }

    async fn tally_windows(
        &self,
        current: Vec<IncidentRecord>,
        previous: Option<Vec<IncidentRecord>>,
    ) -> Result<(Tally, Option<Vec<u64>>), AnalyticsError> {
        let binder = Arc::clone(&self.binder);
        tokio::task::spawn_blocking(move || {
            let previous_totals = previous.map(|records| tally(&records, &binder).totals());
            (tally(&current, &binder), previous_totals)
        })
        .await
        .map_err(|e| AnalyticsError::Tally {
            message: e.to_string(),
        })
    }
}

fn primary_failed(window: &DateWindow, error: SourceError) -> AnalyticsError {
    log::error!("Aggregation for {window} failed: {error}");
    AnalyticsError::Source(error)
}
