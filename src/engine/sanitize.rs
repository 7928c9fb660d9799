use std::collections::HashSet;

use serde_json::Value;

use crate::skills::ToolArgs;

/// Values models emit when they don't actually know an argument.
const DEFAULT_PLACEHOLDERS: &[&str] = &[
    "user_provided_location",
    "user_location",
    "your_location",
    "location_here",
    "unknown",
    "null",
    "",
];

/// Sentinel strings compared case-insensitively against argument values.
#[derive(Debug, Clone)]
pub struct PlaceholderSet {
    values: HashSet<String>,
}

impl Default for PlaceholderSet {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDERS.iter().copied())
    }
}

impl PlaceholderSet {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            values: values.into_iter().map(|v| v.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn is_placeholder(&self, value: &str) -> bool {
        self.values.contains(&value.to_lowercase())
    }

    /// Replace every placeholder string value with the absent marker.
    /// Returns the keys that were cleared.
    pub fn sanitize(&self, args: &mut ToolArgs) -> Vec<String> {
        let mut cleared = Vec::new();
        for (key, value) in args.iter_mut() {
            let hit = matches!(value, Value::String(s) if self.is_placeholder(s));
            if hit {
                *value = Value::Null;
                cleared.push(key.clone());
            }
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        let set = PlaceholderSet::default();
        assert!(set.is_placeholder("UNKNOWN"));
        assert!(set.is_placeholder("Your_Location"));
        assert!(set.is_placeholder(""));
        assert!(!set.is_placeholder("Mumbai"));
    }

    #[test]
    fn sanitize_clears_only_placeholder_strings() {
        let set = PlaceholderSet::default();
        let mut args = ToolArgs::parse(Some(
            r#"{"city": "user_location", "pincode": "NULL", "units": "metric", "level": 5}"#,
        ))
        .unwrap();

        let mut cleared = set.sanitize(&mut args);
        cleared.sort();
        assert_eq!(cleared, vec!["city", "pincode"]);
        assert!(args.is_absent("city"));
        assert!(args.is_absent("pincode"));
        assert_eq!(args.str("units"), Some("metric"));
        assert_eq!(args.i64("level"), Some(5));
    }

    #[test]
    fn custom_set() {
        let set = PlaceholderSet::new(["TBD"]);
        assert!(set.is_placeholder("tbd"));
        assert!(!set.is_placeholder("unknown"));
    }
}
