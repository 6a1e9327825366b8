//! The inbound query interface.
//!
//! Every read goes through the [`AggregationCache`]; explicit refreshes
//! bypass the read but still store their result.

use std::sync::Arc;

use chrono::NaiveDate;
use la_crime_analytics::AnalyticsError;
use la_crime_analytics::aggregator::Aggregator;
use la_crime_analytics::clock::{Clock, SystemClock};
use la_crime_analytics_models::{AggregationParams, AggregationResult};
use la_crime_neighborhood::binder::NeighborhoodBinder;
use la_crime_neighborhood::load::load_file;
use la_crime_source::SourceError;
use la_crime_source::socrata::SocrataSource;
use la_crime_source_models::{DateWindow, InvalidWindowError};

use crate::StartupError;
use crate::cache::AggregationCache;
use crate::key::AggregationKey;
use crate::settings::Settings;

/// A result handed to a caller.
#[derive(Debug, Clone)]
pub struct ServedAggregation {
    /// The aggregation.
    pub result: Arc<AggregationResult>,
    /// Set when the rebuild failed and this is the last successful result
    /// for the same window instead.
    pub stale: bool,
}

/// Query front end over one [`Aggregator`] and its cache.
pub struct AggregationService {
    aggregator: Arc<Aggregator>,
    cache: AggregationCache,
    max_window_days: u32,
}

impl AggregationService {
    /// Wires an aggregator to a cache.
    #[must_use]
    pub const fn new(aggregator: Arc<Aggregator>, cache: AggregationCache, max_window_days: u32) -> Self {
        Self {
            aggregator,
            cache,
            max_window_days,
        }
    }

    /// Assembles the production service: Socrata source, boundaries from
    /// disk, and the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the boundary file cannot be loaded or the
    /// HTTP client cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self, StartupError> {
        let boundaries = load_file(&settings.neighborhoods.path, &settings.neighborhoods.name_property)?;
        let binder = Arc::new(NeighborhoodBinder::new(boundaries));
        let source = Arc::new(SocrataSource::new(settings.source.clone())?);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let aggregator = Arc::new(Aggregator::new(
            source,
            binder,
            settings.aggregation.clone(),
            Arc::clone(&clock),
        ));
        let cache = AggregationCache::new(settings.cache.ttl(), clock)
            .with_retention(settings.cache.stale_ttl(), settings.cache.max_entries);
        Ok(Self::new(aggregator, cache, settings.source.max_window_days))
    }

    /// Scoring parameters every aggregation uses.
    #[must_use]
    pub fn params(&self) -> &AggregationParams {
        self.aggregator.params()
    }

    /// The underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &AggregationCache {
        &self.cache
    }

    /// The window covering the last `days` days, ending today.
    ///
    /// # Errors
    ///
    /// Returns an invalid-window error if `days` is 0 or above the maximum.
    pub fn window_for_days(&self, days: u32) -> Result<DateWindow, AnalyticsError> {
        let today = self.aggregator.clock().today();
        DateWindow::ending_on(today, days, self.max_window_days).map_err(invalid_window)
    }

    /// The window `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-window error if `end` precedes `start` or the
    /// span exceeds the maximum.
    pub fn window_for_range(&self, start: NaiveDate, end: NaiveDate) -> Result<DateWindow, AnalyticsError> {
        DateWindow::new(start, end, self.max_window_days).map_err(invalid_window)
    }

    /// Cache key for `window` under this service's parameters.
    #[must_use]
    pub fn key(&self, window: DateWindow) -> AggregationKey {
        AggregationKey::new(window, self.aggregator.params())
    }

    /// Aggregation for the last `days` days.
    ///
    /// # Errors
    ///
    /// See [`Self::get_aggregation`].
    pub async fn get_aggregation_days(&self, days: u32) -> Result<ServedAggregation, AnalyticsError> {
        let window = self.window_for_days(days)?;
        self.get_aggregation(window).await
    }

    /// Aggregation for `start..=end`.
    ///
    /// # Errors
    ///
    /// See [`Self::get_aggregation`].
    pub async fn get_aggregation_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ServedAggregation, AnalyticsError> {
        let window = self.window_for_range(start, end)?;
        self.get_aggregation(window).await
    }

    /// Cached aggregation for `window`, building it on a miss.
    ///
    /// If the build fails and an earlier result for the same window exists,
    /// that result is served with `stale` set.
    ///
    /// # Errors
    ///
    /// Returns the build error when there is nothing to fall back to, and
    /// always for invalid windows.
    pub async fn get_aggregation(&self, window: DateWindow) -> Result<ServedAggregation, AnalyticsError> {
        let key = self.key(window);
        let aggregator = Arc::clone(&self.aggregator);
        match self
            .cache
            .get_or_build(key.clone(), move || async move { aggregator.aggregate(window).await })
            .await
        {
            Ok(result) => Ok(ServedAggregation { result, stale: false }),
            Err(e) => self.fall_back(&key, e),
        }
    }

    /// Rebuilds the last `days` days regardless of what is cached and
    /// stores the result.
    ///
    /// # Errors
    ///
    /// Returns the build error; no stale fallback is attempted.
    pub async fn force_refresh(&self, days: u32) -> Result<Arc<AggregationResult>, AnalyticsError> {
        let window = self.window_for_days(days)?;
        let aggregator = Arc::clone(&self.aggregator);
        self.cache
            .force_refresh(self.key(window), async move { aggregator.aggregate(window).await })
            .await
    }

    /// Drops every cached result.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    fn fall_back(&self, key: &AggregationKey, error: AnalyticsError) -> Result<ServedAggregation, AnalyticsError> {
        if error.is_invalid_window() {
            return Err(error);
        }
        match self.cache.last_good(key) {
            Some(result) => {
                log::warn!("Serving stale aggregation for {key}: {error}");
                Ok(ServedAggregation { result, stale: true })
            }
            None => {
                log::error!("Aggregation for {key} unavailable: {error}");
                Err(error)
            }
        }
    }
}

fn invalid_window(error: InvalidWindowError) -> AnalyticsError {
    AnalyticsError::Source(SourceError::from(error))
}
