//! Validation and last-write-wins merging of mirrored preference cookies.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::profile::{CookieBag, CookieValue};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^kappalib_[a-z0-9_]{1,50}$").expect("valid cookie name regex")
});

static VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,200}$").expect("valid cookie value regex"));

#[must_use]
pub fn validate_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

#[must_use]
pub fn validate_value(value: &str) -> bool {
    VALUE_RE.is_match(value)
}

/// Drops every entry whose name or value is malformed.
#[must_use]
pub fn validate<S: std::hash::BuildHasher>(incoming: HashMap<String, CookieValue, S>) -> CookieBag {
    incoming
        .into_iter()
        .filter(|(name, cookie)| validate_name(name) && validate_value(&cookie.value))
        .collect()
}

/// Incoming entries replace existing ones only with a strictly newer
/// `updated_at`. Client clocks are trusted as-is.
#[must_use]
pub fn merge(mut existing: CookieBag, incoming: CookieBag) -> CookieBag {
    for (name, cookie) in incoming {
        match existing.get(&name) {
            Some(current) if current.updated_at >= cookie.updated_at => {}
            _ => {
                existing.insert(name, cookie);
            }
        }
    }
    existing
}

/// Stored bags that fail to parse are treated as empty.
#[must_use]
pub fn parse_stored(json: &str) -> CookieBag {
    serde_json::from_str(json).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(value: &str, updated_at: i64) -> CookieValue {
        CookieValue {
            value: value.to_string(),
            updated_at,
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("kappalib_theme"));
        assert!(validate_name("kappalib_font_size_2"));
        assert!(!validate_name("kappalib_"));
        assert!(!validate_name("theme"));
        assert!(!validate_name("kappalib_Theme"));
        assert!(!validate_name(&format!("kappalib_{}", "a".repeat(51))));
    }

    #[test]
    fn test_validate_value() {
        assert!(validate_value("dark"));
        assert!(validate_value("a-b_C9"));
        assert!(!validate_value(""));
        assert!(!validate_value("has space"));
        assert!(!validate_value("<script>"));
        assert!(!validate_value(&"x".repeat(201)));
    }

    #[test]
    fn test_validate_keeps_only_valid_entries() {
        let incoming = HashMap::from([
            ("kappalib_theme".to_string(), cookie("dark", 1)),
            ("kappalib_bad".to_string(), cookie("no way", 1)),
            ("session".to_string(), cookie("abc", 1)),
        ]);
        let bag = validate(incoming);
        assert_eq!(bag.len(), 1);
        assert!(bag.contains_key("kappalib_theme"));
    }

    #[test]
    fn test_merge_newer_incoming_wins() {
        let existing = CookieBag::from([("kappalib_theme".to_string(), cookie("light", 10))]);
        let incoming = CookieBag::from([("kappalib_theme".to_string(), cookie("dark", 11))]);
        let merged = merge(existing, incoming);
        assert_eq!(merged["kappalib_theme"].value, "dark");
    }

    #[test]
    fn test_merge_older_or_equal_incoming_loses() {
        let existing = CookieBag::from([("kappalib_theme".to_string(), cookie("light", 10))]);
        let incoming = CookieBag::from([("kappalib_theme".to_string(), cookie("dark", 10))]);
        assert_eq!(merge(existing.clone(), incoming)["kappalib_theme"].value, "light");

        let incoming = CookieBag::from([("kappalib_theme".to_string(), cookie("dark", 3))]);
        assert_eq!(merge(existing, incoming)["kappalib_theme"].value, "light");
    }

    #[test]
    fn test_merge_one_sided_entries_pass_through() {
        let existing = CookieBag::from([("kappalib_a".to_string(), cookie("1", 1))]);
        let incoming = CookieBag::from([("kappalib_b".to_string(), cookie("2", 1))]);
        let merged = merge(existing, incoming);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_parse_stored_tolerates_garbage() {
        assert!(parse_stored("not json").is_empty());
        assert!(parse_stored("{}").is_empty());
        let bag = parse_stored(r#"{"kappalib_theme":{"value":"dark","updated_at":5}}"#);
        assert_eq!(bag["kappalib_theme"].updated_at, 5);
    }
}
