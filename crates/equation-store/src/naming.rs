//! Default record names of the form `<word> N`

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A word (table names may contain underscores) followed by a number
    static ref NUMBERED_NAME: Regex = Regex::new(r"^[a-zA-Z_]+\s([0-9]+)$").unwrap();
}

/// `"<prefix> N"`, where N is one more than the largest trailing number
/// among existing numbered names (1 if there are none)
pub fn next_default_name<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let last = existing
        .into_iter()
        .filter_map(|name| NUMBERED_NAME.captures(name))
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .max()
        .unwrap_or(0);

    format!("{} {}", prefix, last.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_first_name() {
        assert_eq!(next_default_name("equation", []), "equation 1");
    }

    #[test]
    fn test_uses_largest_number_not_count() {
        let names = ["equation 2", "Genesis", "equation 7", "variable 9x"];
        assert_eq!(next_default_name("equation", names), "equation 8");
    }

    #[test]
    fn test_any_word_counts() {
        // Renamed records keep their numbers in play
        let names = ["Energy 12", "equation 3"];
        assert_eq!(next_default_name("equation", names), "equation 13");
    }

    #[test]
    fn test_underscored_table_names() {
        let names = ["eqn_group 1", "eqn_group 2"];
        assert_eq!(next_default_name("eqn_group", names), "eqn_group 3");
    }

    proptest! {
        #[test]
        fn prop_default_name_is_fresh(numbers in prop::collection::vec(0u32..10_000, 0..20)) {
            let names: Vec<String> = numbers.iter().map(|n| format!("equation {}", n)).collect();
            let next = next_default_name("equation", names.iter().map(String::as_str));
            prop_assert!(!names.contains(&next));
        }
    }
}
