#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime category taxonomy types and scoring weights.
//!
//! Every incident the pipeline keeps is classified into exactly one of the
//! four [`CrimeCategory`] buckets. Descriptions that match none of them are
//! counted as unmapped and never reach per-category totals.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The fixed crime taxonomy used for neighborhood statistics.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CrimeCategory {
    /// Homicide, robbery, rape, aggravated assault and similar
    ViolentCrime,
    /// Theft of a motor vehicle
    VehicleTheft,
    /// Burglary of a residence or business
    BreakIn,
    /// Shoplifting, theft from vehicles, bike theft and other small theft
    PettyTheft,
}

impl CrimeCategory {
    /// Relative weight of one incident of this category when computing a
    /// neighborhood's weighted incident load.
    #[must_use]
    pub const fn default_weight(self) -> f64 {
        match self {
            Self::ViolentCrime => 3.0,
            Self::BreakIn => 2.0,
            Self::VehicleTheft => 1.5,
            Self::PettyTheft => 1.0,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ViolentCrime => "Violent crime",
            Self::VehicleTheft => "Vehicle theft",
            Self::BreakIn => "Break-in",
            Self::PettyTheft => "Petty theft",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ViolentCrime,
            Self::VehicleTheft,
            Self::BreakIn,
            Self::PettyTheft,
        ]
    }
}

/// Per-category incident tallies for one neighborhood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounts {
    /// Violent crime incidents.
    pub violent_crime: u64,
    /// Vehicle theft incidents.
    pub vehicle_theft: u64,
    /// Break-in incidents.
    pub break_in: u64,
    /// Petty theft incidents.
    pub petty_theft: u64,
}

impl CategoryCounts {
    /// Returns the count for a single category.
    #[must_use]
    pub const fn get(&self, category: CrimeCategory) -> u64 {
        match category {
            CrimeCategory::ViolentCrime => self.violent_crime,
            CrimeCategory::VehicleTheft => self.vehicle_theft,
            CrimeCategory::BreakIn => self.break_in,
            CrimeCategory::PettyTheft => self.petty_theft,
        }
    }

    /// Adds one incident of `category`.
    pub const fn increment(&mut self, category: CrimeCategory) {
        match category {
            CrimeCategory::ViolentCrime => self.violent_crime += 1,
            CrimeCategory::VehicleTheft => self.vehicle_theft += 1,
            CrimeCategory::BreakIn => self.break_in += 1,
            CrimeCategory::PettyTheft => self.petty_theft += 1,
        }
    }

    /// Adds another set of counts into this one.
    pub const fn merge(&mut self, other: &Self) {
        self.violent_crime += other.violent_crime;
        self.vehicle_theft += other.vehicle_theft;
        self.break_in += other.break_in;
        self.petty_theft += other.petty_theft;
    }

    /// Sum over all categories.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.violent_crime + self.vehicle_theft + self.break_in + self.petty_theft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_names() {
        for category in CrimeCategory::all() {
            let parsed: CrimeCategory = category.to_string().parse().unwrap();
            assert_eq!(parsed, *category);
        }
        assert_eq!(CrimeCategory::BreakIn.to_string(), "break-in");
    }

    #[test]
    fn violent_crime_weighs_most() {
        for category in CrimeCategory::all() {
            assert!(
                CrimeCategory::ViolentCrime.default_weight() >= category.default_weight(),
                "{category:?} outweighs violent crime"
            );
        }
    }

    #[test]
    fn counts_track_totals() {
        let mut counts = CategoryCounts::default();
        counts.increment(CrimeCategory::VehicleTheft);
        counts.increment(CrimeCategory::VehicleTheft);
        counts.increment(CrimeCategory::PettyTheft);

        let mut other = CategoryCounts::default();
        other.increment(CrimeCategory::ViolentCrime);
        counts.merge(&other);

        assert_eq!(counts.get(CrimeCategory::VehicleTheft), 2);
        assert_eq!(counts.get(CrimeCategory::ViolentCrime), 1);
        assert_eq!(counts.get(CrimeCategory::BreakIn), 0);
        assert_eq!(counts.total(), 4);
    }
}
