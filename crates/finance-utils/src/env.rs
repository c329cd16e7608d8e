//! Typed environment variable helpers
//!
//! All lookups go through a `Fn(&str) -> Option<String>` so that callers can
//! substitute a map in tests instead of mutating the process environment.

use std::path::PathBuf;
use std::str::FromStr;

/// Load variables from a `.env` file in the current directory or its parents.
///
/// Returns the path of the file that was loaded, if any. Variables that are
/// already set in the process environment are left untouched.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

/// Lookup backed by the real process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get a non-empty value for `key`
pub fn lookup_non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get `key`, falling back to `default` when unset or empty
pub fn lookup_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup_non_empty(lookup, key).unwrap_or_else(|| default.to_string())
}

/// Interpret a raw flag value. `true`, `1`, `yes` and `on` are truthy.
pub fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        None => default,
    }
}

/// Interpret a raw numeric value, falling back to `default` when it doesn't parse.
pub fn parse_int<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Boolean lookup
pub fn lookup_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    parse_bool(lookup(key).as_deref(), default)
}

/// Numeric lookup
pub fn lookup_int<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    parse_int(lookup(key).as_deref(), default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(Some("true"), false));
        assert!(parse_bool(Some("YES"), false));
        assert!(parse_bool(Some(" on "), false));
        assert!(parse_bool(Some("1"), false));
        assert!(!parse_bool(Some("false"), true));
        assert!(!parse_bool(Some("nope"), true));
        assert!(parse_bool(None, true));
        assert!(!parse_bool(None, false));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(Some("42"), 0_u32), 42);
        assert_eq!(parse_int(Some(" 7 "), 0_u64), 7);
        assert_eq!(parse_int(Some("abc"), 60_u32), 60);
        assert_eq!(parse_int::<u32>(None, 587), 587);
    }

    #[test]
    fn test_lookup_non_empty() {
        let vars = map(&[("SET", "value"), ("BLANK", "   ")]);
        let lookup = |k: &str| vars.get(k).cloned();

        assert_eq!(lookup_non_empty(&lookup, "SET"), Some("value".to_string()));
        assert_eq!(lookup_non_empty(&lookup, "BLANK"), None);
        assert_eq!(lookup_non_empty(&lookup, "MISSING"), None);
        assert_eq!(lookup_or(&lookup, "BLANK", "fallback"), "fallback");
    }

    #[test]
    fn test_typed_lookups() {
        let vars = map(&[("FLAG", "on"), ("COUNT", "12")]);
        let lookup = |k: &str| vars.get(k).cloned();

        assert!(lookup_bool(&lookup, "FLAG", false));
        assert!(lookup_bool(&lookup, "MISSING", true));
        assert_eq!(lookup_int(&lookup, "COUNT", 0_u32), 12);
        assert_eq!(lookup_int(&lookup, "MISSING", 3_u32), 3);
    }
}
