//! Glob and domain matching for link exclusion and allow-listing.
//!
//! Globs support `*` (any run of characters, including none) and `?`
//! (exactly one character). Matching is case-insensitive and anchored at
//! both ends; every other character is literal.

use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Compile a glob into an anchored, case-insensitive regex.
pub fn compile_glob(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');

    RegexBuilder::new(&source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

/// True if `value` matches the whole `pattern`.
pub fn match_glob(pattern: &str, value: &str) -> bool {
    compile_glob(pattern).is_ok_and(|re| re.is_match(value))
}

/// True if any pattern matches; an empty pattern list never matches.
pub fn match_any_glob<S: AsRef<str>>(value: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|p| match_glob(p.as_ref(), value))
}

/// Case-insensitive hostname match.
///
/// `*.example.com` matches `example.com` itself and any subdomain of it;
/// any other pattern must equal the hostname.
pub fn match_domain(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.trim().to_lowercase();
    let hostname = hostname.to_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => {
            hostname == base
                || hostname
                    .strip_suffix(base)
                    .is_some_and(|rest| rest.ends_with('.'))
        }
        None => hostname == pattern,
    }
}

/// A precompiled list of globs.
#[derive(Debug, Clone, Default)]
pub struct GlobSet {
    patterns: Vec<(String, Regex)>,
}

impl GlobSet {
    /// Compile every pattern. Patterns that fail to compile (only possible
    /// past the regex size limit) are logged and left out.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| {
                let p = p.as_ref();
                match compile_glob(p) {
                    Ok(re) => Some((p.to_string(), re)),
                    Err(err) => {
                        warn!(target: "paramtrail::matcher", pattern = p, error = %err, "skipping uncompilable glob");
                        None
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    /// First pattern matching `value`, if any.
    pub fn first_match(&self, value: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, re)| re.is_match(value))
            .map(|(p, _)| p.as_str())
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.first_match(value).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
