//! Environment placeholder expansion for configuration strings.
//!
//! Both `%NAME%` and `${NAME}` forms are recognised. Placeholders naming an
//! unset variable are left exactly as written.

use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"%([A-Za-z_][A-Za-z0-9_]*)%|\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .expect("placeholder pattern is valid")
    })
}

/// Expands placeholders using the process environment.
pub fn expand(text: &str) -> String {
    expand_with(text, |name| std::env::var(name).ok())
}

/// Expands placeholders using a caller-supplied lookup.
pub fn expand_with<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    placeholder_regex()
        .replace_all(text, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Expands an optional config value; `None` stays `None`.
pub fn expand_opt(text: Option<&str>) -> Option<String> {
    text.map(expand)
}
