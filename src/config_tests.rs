// File: config_tests.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - The smuggles developers

#[cfg(test)]
mod tests {
    use crate::config::filter_mutations;
    use rstest::*;
    use std::collections::BTreeMap;

    fn sample() -> BTreeMap<String, String> {
        [
            "space-before-colon",
            "space-double",
            "space-suffix",
            "lineprefix-space",
            "value-suffix",
        ]
        .iter()
        .map(|n| (n.to_string(), format!("Transfer-Encoding: {}", n)))
        .collect()
    }

    #[test]
    fn no_filters_keeps_everything() {
        let filtered = filter_mutations(sample(), &[], &[]).unwrap();
        assert_eq!(filtered.len(), sample().len());
    }

    #[test]
    fn enable_prefix_disable_suffix() {
        let enable = vec!["space-*".to_string()];
        let disable = vec!["*-suffix".to_string()];
        let filtered = filter_mutations(sample(), &enable, &disable).unwrap();

        let names: Vec<&str> = filtered.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["space-before-colon", "space-double"]);
    }

    #[test]
    fn disable_wins_over_enable() {
        let enable = vec!["value-suffix".to_string()];
        let disable = vec!["value-suffix".to_string()];
        let filtered = filter_mutations(sample(), &enable, &disable).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn filter_is_idempotent() {
        let enable = vec!["space-*".to_string()];
        let disable = vec!["*-suffix".to_string()];
        let once = filter_mutations(sample(), &enable, &disable).unwrap();
        let twice = filter_mutations(once.clone(), &enable, &disable).unwrap();
        assert_eq!(once, twice);
    }

    #[rstest]
    #[case("space-?efore-colon", true)]
    #[case("space-?", false)]
    #[case("*colon", true)]
    #[case("colon*", false)]
    fn question_mark_matches_one_char(#[case] pattern: &str, #[case] matches: bool) {
        let enable = vec![pattern.to_string()];
        let filtered = filter_mutations(sample(), &enable, &[]).unwrap();
        assert_eq!(filtered.contains_key("space-before-colon"), matches);
    }

    #[test]
    fn regex_metacharacters_stay_literal() {
        // `[` would be a regex class opener if it leaked through unescaped
        let enable = vec!["space-[".to_string()];
        let filtered = filter_mutations(sample(), &enable, &[]).unwrap();
        assert!(filtered.is_empty());
    }
}
