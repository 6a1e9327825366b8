//! Offense description → [`CrimeCategory`] mapping.
//!
//! Matching is a case-insensitive substring test against an ordered rule
//! table. The first rule with a matching keyword wins, so rules that are
//! more specific than a later, broader rule must come first:
//!
//! 1. Theft from a vehicle (`"BURGLARY FROM VEHICLE"`, `"THEFT FROM MOTOR
//!    VEHICLE"`) is petty theft, ahead of the break-in rule that would
//!    otherwise claim anything containing `"BURGLARY"`.
//! 2. Violent crime, ahead of vehicle theft so that `"ROBBERY"` of a vehicle
//!    stays violent.
//! 3. Vehicle theft.
//! 4. Break-in.
//! 5. General petty theft.

use la_crime_crime_models::CrimeCategory;

/// One row of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    /// Category assigned when any keyword matches.
    pub category: CrimeCategory,
    /// Upper-case keywords, matched as substrings.
    pub keywords: &'static [&'static str],
}

impl CategoryRule {
    /// Whether the upper-cased `description` contains any keyword.
    #[must_use]
    pub fn matches(&self, upper_description: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| upper_description.contains(keyword))
    }
}

/// The category rule table, in evaluation order.
pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: CrimeCategory::PettyTheft,
        keywords: &[
            "BURGLARY FROM VEHICLE",
            "THEFT FROM MOTOR VEHICLE",
            "THEFT FROM VEHICLE",
        ],
    },
    CategoryRule {
        category: CrimeCategory::ViolentCrime,
        keywords: &[
            "HOMICIDE",
            "MANSLAUGHTER",
            "MURDER",
            "ROBBERY",
            "RAPE",
            "SEXUAL PENETRATION",
            "ASSAULT WITH DEADLY WEAPON",
            "AGGRAVATED ASSAULT",
            "KIDNAPPING",
            "SHOTS FIRED",
            "BRANDISH WEAPON",
        ],
    },
    CategoryRule {
        category: CrimeCategory::VehicleTheft,
        keywords: &[
            "VEHICLE - STOLEN",
            "VEHICLE - ATTEMPT STOLEN",
            "VEHICLE, STOLEN",
            "STOLEN VEHICLE",
            "GRAND THEFT AUTO",
        ],
    },
    CategoryRule {
        category: CrimeCategory::BreakIn,
        keywords: &["BURGLARY", "BREAKING AND ENTERING", "BREAK-IN"],
    },
    CategoryRule {
        category: CrimeCategory::PettyTheft,
        keywords: &[
            "PETTY THEFT",
            "THEFT PLAIN",
            "THEFT-GRAND",
            "THEFT, PERSON",
            "SHOPLIFTING",
            "PICKPOCKET",
            "PURSE SNATCHING",
            "BIKE - STOLEN",
            "BUNCO",
        ],
    },
];

/// Maps an offense description to a category.
///
/// Returns `None` for descriptions no rule covers. Pure: the same input
/// always yields the same output.
#[must_use]
pub fn categorize(description: &str) -> Option<CrimeCategory> {
    categorize_with(CATEGORY_RULES, description)
}

/// Maps an offense description using a caller-supplied rule table.
#[must_use]
pub fn categorize_with(rules: &[CategoryRule], description: &str) -> Option<CrimeCategory> {
    let upper = description.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }
    rules
        .iter()
        .find(|rule| rule.matches(&upper))
        .map(|rule| rule.category)
}
