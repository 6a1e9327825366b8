//! Police-division name → neighborhood name matching.
//!
//! Used only when an incident has no coordinates or its coordinates fall
//! outside every boundary. Division boundaries do not line up with
//! neighborhood boundaries, so any match made here is reported as
//! [`BindingMethod::AreaName`](la_crime_neighborhood_models::BindingMethod)
//! and treated as lower confidence.
//!
//! [`NAME_RULES`] is evaluated in order and the first rule producing a match
//! wins. Exact matches come first so that `"North Hollywood"` never lands in
//! `"Hollywood"` just because that boundary was declared earlier.

/// LAPD divisions whose names do not contain (and are not contained in) the
/// neighborhood they cover.
pub const AREA_ALIASES: &[(&str, &str)] = &[
    ("77th street", "florence"),
    ("n hollywood", "north hollywood"),
    ("west la", "west los angeles"),
    ("olympic", "koreatown"),
    ("rampart", "westlake"),
    ("newton", "south park"),
    ("southeast", "watts"),
    ("central", "downtown"),
    ("foothill", "sunland"),
    ("mission", "mission hills"),
    ("devonshire", "chatsworth"),
    ("pacific", "venice"),
];

/// One name-matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRule {
    /// Case-insensitive equality after trimming a trailing `" division"`.
    Exact,
    /// The division appears in [`AREA_ALIASES`] and maps to this neighborhood.
    Alias,
    /// Either name contains the other (case-insensitive).
    Contains,
}

/// Name-matching strategies in evaluation order.
pub const NAME_RULES: &[NameRule] = &[NameRule::Exact, NameRule::Alias, NameRule::Contains];

impl NameRule {
    /// Whether the normalized `area` and `neighborhood` names match under
    /// this rule. Both arguments must already be passed through
    /// [`normalize_name`].
    #[must_use]
    pub fn matches(self, area: &str, neighborhood: &str) -> bool {
        if area.is_empty() || neighborhood.is_empty() {
            return false;
        }
        match self {
            Self::Exact => strip_division(area) == neighborhood,
            Self::Alias => AREA_ALIASES
                .iter()
                .any(|(division, target)| *division == strip_division(area) && *target == neighborhood),
            Self::Contains => area.contains(neighborhood) || neighborhood.contains(area),
        }
    }
}

/// Lower-cases and collapses whitespace so names compare consistently.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Drops a trailing `" division"` from a normalized police area name.
fn strip_division(area: &str) -> &str {
    area.strip_suffix(" division").unwrap_or(area)
}

/// Returns the position of the first neighborhood matching `area_name`.
///
/// `neighborhoods` must hold names already passed through
/// [`normalize_name`], in declaration order.
#[must_use]
pub fn match_area_name(area_name: &str, neighborhoods: &[String]) -> Option<usize> {
    let area = normalize_name(area_name);
    if area.is_empty() {
        return None;
    }
    NAME_RULES.iter().find_map(|rule| {
        neighborhoods
            .iter()
            .position(|neighborhood| rule.matches(&area, neighborhood))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| normalize_name(n)).collect()
    }

    #[test]
    fn division_suffix_is_ignored() {
        let hoods = names(&["Venice", "Mid-Wilshire", "Hollywood"]);
        assert_eq!(match_area_name("Mid-Wilshire Division", &hoods), Some(1));
    }

    #[test]
    fn exact_match_beats_earlier_partial_overlap() {
        let hoods = names(&["Hollywood", "North Hollywood"]);
        assert_eq!(match_area_name("North Hollywood", &hoods), Some(1));
        assert_eq!(match_area_name("Hollywood", &hoods), Some(0));
    }

    #[test]
    fn alias_maps_division_to_neighborhood() {
        let hoods = names(&["Hollywood", "North Hollywood", "Florence"]);
        assert_eq!(match_area_name("N Hollywood", &hoods), Some(1));
        assert_eq!(match_area_name("77th Street", &hoods), Some(2));
    }

    #[test]
    fn neighborhood_name_containing_area_matches() {
        let hoods = names(&["Venice", "Harbor City"]);
        assert_eq!(match_area_name("harbor", &hoods), Some(1));
    }

    #[test]
    fn empty_and_unknown_areas_do_not_match() {
        let hoods = names(&["Venice"]);
        assert_eq!(match_area_name("", &hoods), None);
        assert_eq!(match_area_name("   ", &hoods), None);
        assert_eq!(match_area_name("Topanga", &hoods), None);
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_name("  Mid-Wilshire   Division "), "mid-wilshire division");
    }

    #[test]
    fn aliases_are_normalized() {
        for (division, target) in AREA_ALIASES {
            assert_eq!(normalize_name(division), *division);
            assert_eq!(normalize_name(target), *target);
        }
    }
}
