//! Title-based category labels.
//!
//! Rules are ordered and the first match wins, so more specific rules sit
//! above the generic ones they overlap with.

pub const FALLBACK_CATEGORY: &str = "Creative Workshop";
pub const FALLBACK_SERIES_CATEGORY: &str = "Other";

/// Display order of series categories on the schedule page.
pub const SERIES_CATEGORY_ORDER: [&str; 9] = [
    "Pottery",
    "Mosaic",
    "Glass Fusion",
    "Candle",
    "Terrarium & Bonsai",
    "Painting",
    "Kids & Family",
    "Private",
    "Other",
];

struct Rule {
    all_of: &'static [&'static str],
    any_of: &'static [&'static str],
    label: &'static str,
}

impl Rule {
    fn matches(&self, lower: &str) -> bool {
        self.all_of.iter().all(|needle| lower.contains(needle))
            && (self.any_of.is_empty() || self.any_of.iter().any(|needle| lower.contains(needle)))
    }
}

const EVENT_RULES: &[Rule] = &[
    Rule { all_of: &["date night", "wheel"], any_of: &[], label: "Date Night Wheel" },
    Rule { all_of: &[], any_of: &["wheel", "pottery"], label: "Wheel Throwing" },
    Rule { all_of: &[], any_of: &["turkish", "lamp"], label: "Turkish Lamp" },
    Rule { all_of: &["glass fusion"], any_of: &[], label: "Glass Fusion" },
    Rule { all_of: &["mosaic"], any_of: &[], label: "Mosaics" },
    Rule { all_of: &["bonsai"], any_of: &[], label: "Bonsai" },
    Rule { all_of: &["terrarium"], any_of: &[], label: "Terrarium" },
    Rule { all_of: &["candle"], any_of: &[], label: "Candle Making" },
    Rule { all_of: &["paint"], any_of: &[], label: "Painting" },
    Rule { all_of: &["watercolor"], any_of: &[], label: "Watercolor" },
];

const SERIES_RULES: &[Rule] = &[
    Rule { all_of: &[], any_of: &["pottery", "wheel", "clay"], label: "Pottery" },
    Rule { all_of: &["mosaic"], any_of: &[], label: "Mosaic" },
    Rule { all_of: &["glass"], any_of: &["fusion", "fusing"], label: "Glass Fusion" },
    Rule { all_of: &[], any_of: &["lamp", "turkish"], label: "Mosaic" },
    Rule { all_of: &["candle"], any_of: &[], label: "Candle" },
    Rule { all_of: &[], any_of: &["bonsai", "terrarium"], label: "Terrarium & Bonsai" },
    Rule { all_of: &["paint"], any_of: &[], label: "Painting" },
    Rule { all_of: &[], any_of: &["kid", "family", "parent"], label: "Kids & Family" },
    Rule { all_of: &["private"], any_of: &[], label: "Private" },
];

fn first_match(rules: &[Rule], title: &str, fallback: &'static str) -> &'static str {
    let lower = title.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.matches(&lower))
        .map(|rule| rule.label)
        .unwrap_or(fallback)
}

/// Category label for a normalized event title. Total: unmatched titles get
/// [`FALLBACK_CATEGORY`].
pub fn classify(title: &str) -> &'static str {
    first_match(EVENT_RULES, title, FALLBACK_CATEGORY)
}

/// Coarser grouping used for the public appointment-type schedule.
pub fn series_category(title: &str) -> &'static str {
    first_match(SERIES_RULES, title, FALLBACK_SERIES_CATEGORY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_rule_beats_generic_wheel_rule() {
        assert_eq!(classify("Date Night Wheel Throwing"), "Date Night Wheel");
        assert_eq!(classify("Intro to Wheel Throwing"), "Wheel Throwing");
        assert_eq!(classify("Date Night Pottery"), "Wheel Throwing");
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(classify("TURKISH MOSAIC LAMP"), "Turkish Lamp");
        assert_eq!(classify("glass FUSION night"), "Glass Fusion");
        assert_eq!(classify("Sip & Paint"), "Painting");
    }

    #[test]
    fn unmatched_titles_fall_back() {
        assert_eq!(classify(""), FALLBACK_CATEGORY);
        assert_eq!(classify("Gift Card"), FALLBACK_CATEGORY);
        assert_eq!(series_category("Gift Card"), FALLBACK_SERIES_CATEGORY);
    }

    #[test]
    fn series_rules_group_lamps_with_mosaics() {
        assert_eq!(series_category("Turkish Lamp Workshop"), "Mosaic");
        assert_eq!(series_category("Glass Fusing Basics"), "Glass Fusion");
        assert_eq!(series_category("Stained glass"), FALLBACK_SERIES_CATEGORY);
        assert_eq!(series_category("Parent & Me Clay"), "Pottery");
        assert_eq!(series_category("Family Candle Pour"), "Candle");
    }

    #[test]
    fn every_series_label_has_a_display_slot() {
        for rule in SERIES_RULES {
            assert!(SERIES_CATEGORY_ORDER.contains(&rule.label), "{}", rule.label);
        }
        assert!(SERIES_CATEGORY_ORDER.contains(&FALLBACK_SERIES_CATEGORY));
    }
}
