//! Categorize-and-bind reduction over incident records.
//!
//! Each chunk of records is folded into its own [`Tally`]; chunks are merged
//! at the end. Large inputs are split across scoped threads, which is safe
//! because categorization and binding are pure over shared immutable data.

use std::num::NonZeroUsize;

use la_crime_crime_models::CategoryCounts;
use la_crime_neighborhood::binder::NeighborhoodBinder;
use la_crime_neighborhood_models::BindingMethod;
use la_crime_source::type_mapping::categorize;
use la_crime_source_models::IncidentRecord;

/// Record count below which tallying stays on the calling thread.
const PARALLEL_THRESHOLD: usize = 20_000;

/// Counters for one neighborhood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeighborhoodTally {
    /// Categorized incidents.
    pub counts: CategoryCounts,
    /// Bound but uncategorized incidents.
    pub unclassified: u64,
    /// Categorized incidents bound by coordinates.
    pub geometric_matches: u64,
    /// Categorized incidents bound by division name.
    pub name_matches: u64,
}

impl NeighborhoodTally {
    fn merge(&mut self, other: &Self) {
        self.counts.merge(&other.counts);
        self.unclassified += other.unclassified;
        self.geometric_matches += other.geometric_matches;
        self.name_matches += other.name_matches;
    }
}

/// Counters for one window, indexed like the binder's boundary list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// One entry per boundary, in declaration order.
    pub neighborhoods: Vec<NeighborhoodTally>,
    /// Records seen.
    pub processed: u64,
    /// Records whose description matched no category.
    pub unmapped_category: u64,
    /// Records that bound to no neighborhood.
    pub unmatched_neighborhood: u64,
}

impl Tally {
    /// An empty tally for `neighborhoods` boundaries.
    #[must_use]
    pub fn new(neighborhoods: usize) -> Self {
        Self {
            neighborhoods: vec![NeighborhoodTally::default(); neighborhoods],
            processed: 0,
            unmapped_category: 0,
            unmatched_neighborhood: 0,
        }
    }

    /// Adds another tally over the same boundary list into this one.
    pub fn merge(&mut self, other: &Self) {
        for (mine, theirs) in self.neighborhoods.iter_mut().zip(&other.neighborhoods) {
            mine.merge(theirs);
        }
        self.processed += other.processed;
        self.unmapped_category += other.unmapped_category;
        self.unmatched_neighborhood += other.unmatched_neighborhood;
    }

    fn record(&mut self, record: &IncidentRecord, binder: &NeighborhoodBinder) {
        self.processed += 1;
        let category = categorize(&record.description);
        if category.is_none() {
            self.unmapped_category += 1;
        }

        let Some(binding) = binder.bind(record) else {
            self.unmatched_neighborhood += 1;
            log::trace!(
                "Report {} ({:?}) matched no neighborhood",
                record.report_id,
                record.area_name
            );
            return;
        };

        let entry = &mut self.neighborhoods[binding.index];
        let Some(category) = category else {
            entry.unclassified += 1;
            return;
        };
        entry.counts.increment(category);
        match binding.method {
            BindingMethod::Geometric => entry.geometric_matches += 1,
            BindingMethod::AreaName => entry.name_matches += 1,
        }
    }

    /// Total categorized incidents per neighborhood.
    #[must_use]
    pub fn totals(&self) -> Vec<u64> {
        self.neighborhoods.iter().map(|n| n.counts.total()).collect()
    }
}

/// Categorizes and binds every record.
#[must_use]
pub fn tally(records: &[IncidentRecord], binder: &NeighborhoodBinder) -> Tally {
    let workers = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    if records.len() < PARALLEL_THRESHOLD || workers < 2 {
        return tally_chunk(records, binder);
    }

    let chunk_size = records.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = records
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || tally_chunk(chunk, binder)))
            .collect();

        handles
            .into_iter()
            .fold(Tally::new(binder.len()), |mut total, handle| {
                let partial = handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                total.merge(&partial);
                total
            })
    })
}

fn tally_chunk(records: &[IncidentRecord], binder: &NeighborhoodBinder) -> Tally {
    let mut tally = Tally::new(binder.len());
    for record in records {
        tally.record(record, binder);
    }
    tally
}
