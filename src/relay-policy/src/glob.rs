//! Segment-based path glob matching.
//!
//! Patterns and paths are split on `/` and compared segment by segment:
//!
//! - a literal segment must equal the path segment exactly
//! - `*` matches exactly one non-empty segment
//! - a segment mixing `*` with text (`*.rs`, `test_*`) matches one non-empty
//!   segment, each `*` standing for any run of characters inside it
//! - `**` matches zero or more whole segments
//!
//! Matching is anchored at both ends. `**` is resolved by backtracking with a
//! memo table keyed on (pattern index, path index), so the worst case stays
//! polynomial in the number of segments.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Exact text.
    Literal(String),
    /// `*`: any single non-empty segment.
    Any,
    /// Text containing `*` wildcards, confined to one segment.
    Wildcard(Vec<char>),
    /// `**`: zero or more segments.
    Globstar,
}

impl Segment {
    fn parse(raw: &str, pattern: &str) -> Result<Self, PolicyError> {
        if raw == "**" {
            return Ok(Segment::Globstar);
        }
        if raw.contains("**") {
            return Err(PolicyError::invalid_pattern(
                pattern,
                format!("'**' must be a whole segment, found '{raw}'"),
            ));
        }
        if raw == "*" {
            Ok(Segment::Any)
        } else if raw.contains('*') {
            Ok(Segment::Wildcard(raw.chars().collect()))
        } else {
            Ok(Segment::Literal(raw.to_string()))
        }
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(text) => text == segment,
            Segment::Any => !segment.is_empty(),
            Segment::Wildcard(chars) => {
                let text: Vec<char> = segment.chars().collect();
                !text.is_empty() && wildcard_match(chars, &text)
            }
            // Handled by the segment walker.
            Segment::Globstar => false,
        }
    }
}

/// Match `text` against a single-segment wildcard pattern.
///
/// Greedy two-pointer walk: remember the last `*` and where it started
/// consuming, and on a mismatch let that star swallow one more character.
fn wildcard_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Strip a leading `./` and any trailing `/` before splitting.
fn normalize(input: &str) -> &str {
    let mut trimmed = input;
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    let without_trailing = trimmed.trim_end_matches('/');
    if without_trailing.is_empty() && trimmed.starts_with('/') {
        // The root itself.
        "/"
    } else {
        without_trailing
    }
}

/// Split into segments, resolving `.` and `..` lexically.
///
/// Returns `None` when a `..` climbs above the first segment (or above `/`
/// for absolute input). An absolute input keeps a leading empty segment as
/// its root.
fn resolve_segments(input: &str) -> Option<Vec<&str>> {
    let normalized = normalize(input);
    let (mut segments, body) = match normalized {
        "" => return Some(Vec::new()),
        "/" => return Some(vec![""]),
        n => match n.strip_prefix('/') {
            Some(rest) => (vec![""], rest),
            None => (Vec::new(), n),
        },
    };

    let floor = segments.len();
    for segment in body.split('/') {
        match segment {
            "." => {}
            ".." => {
                if segments.len() == floor {
                    return None;
                }
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    Some(segments)
}

/// Whether `path` climbs above its own root through `..` segments.
pub fn escapes_root(path: &str) -> bool {
    resolve_segments(path).is_none()
}

/// A compiled glob pattern.
///
/// Compile once with [`GlobPattern::new`] and reuse; the source text is kept
/// so decisions can report which rule matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GlobPattern {
    source: String,
    segments: Vec<Segment>,
}

impl GlobPattern {
    /// Compile a pattern.
    ///
    /// `.` and `..` segments are resolved first. Rejects a `..` that climbs
    /// above the pattern root, interior empty segments (`a//b`) and `**`
    /// glued to other characters (`a**`). A leading `/` is kept as an
    /// anchored empty root segment so absolute patterns only match absolute
    /// paths.
    pub fn new(pattern: &str) -> Result<Self, PolicyError> {
        let absolute = normalize(pattern).starts_with('/');
        let raw_segments = resolve_segments(pattern).ok_or_else(|| {
            PolicyError::invalid_pattern(pattern, "'..' climbs above the pattern root")
        })?;
        let mut segments = Vec::with_capacity(raw_segments.len());

        for (index, raw) in raw_segments.iter().enumerate() {
            if raw.is_empty() {
                if index == 0 && absolute {
                    segments.push(Segment::Literal(String::new()));
                    continue;
                }
                return Err(PolicyError::invalid_pattern(pattern, "empty path segment"));
            }

            let segment = Segment::parse(raw, pattern)?;
            // `**/**` is the same as `**`.
            if segment == Segment::Globstar && segments.last() == Some(&Segment::Globstar) {
                continue;
            }
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains any wildcard.
    pub fn has_wildcards(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)))
    }

    /// Test a path against this pattern.
    ///
    /// A path that escapes its root matches nothing.
    pub fn matches(&self, path: &str) -> bool {
        let Some(path_segments) = resolve_segments(path) else {
            return false;
        };

        // Fast path: without `**` every segment lines up one to one.
        if !self.segments.contains(&Segment::Globstar) {
            return self.segments.len() == path_segments.len()
                && self
                    .segments
                    .iter()
                    .zip(&path_segments)
                    .all(|(pattern, segment)| pattern.matches(segment));
        }

        let width = path_segments.len() + 1;
        let mut memo = vec![None; (self.segments.len() + 1) * width];
        self.match_from(&path_segments, 0, 0, width, &mut memo)
    }

    fn match_from(
        &self,
        path: &[&str],
        pi: usize,
        si: usize,
        width: usize,
        memo: &mut [Option<bool>],
    ) -> bool {
        let key = pi * width + si;
        if let Some(cached) = memo[key] {
            return cached;
        }

        let result = match self.segments.get(pi) {
            None => si == path.len(),
            Some(Segment::Globstar) => {
                (si..=path.len()).any(|next| self.match_from(path, pi + 1, next, width, memo))
            }
            Some(segment) => {
                si < path.len()
                    && segment.matches(path[si])
                    && self.match_from(path, pi + 1, si + 1, width, memo)
            }
        };

        memo[key] = Some(result);
        result
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for GlobPattern {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        GlobPattern::new(&value)
    }
}

impl From<GlobPattern> for String {
    fn from(pattern: GlobPattern) -> Self {
        pattern.source
    }
}

/// Match `path` against `pattern` in one call.
///
/// A pattern that fails to compile matches nothing.
pub fn matches(pattern: &str, path: &str) -> bool {
    match GlobPattern::new(pattern) {
        Ok(compiled) => compiled.matches(path),
        Err(err) => {
            tracing::debug!("glob pattern rejected: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_star_stays_in_segment() {
        assert!(matches("src/*.rs", "src/lib.rs"));
        assert!(!matches("src/*.rs", "src/a/lib.rs"));
        assert!(matches("src/*", "src/main.rs"));
        assert!(!matches("src/*", "src"));
    }

    #[test]
    fn test_globstar_zero_or_more() {
        assert!(matches("**/secrets/**", "secrets/key.pem"));
        assert!(matches("**/secrets/**", "a/b/secrets/c"));
        assert!(matches("**/secrets/**", "a/b/secrets/c/d"));
        assert!(!matches("**/secrets/**", "secretsx/key.pem"));
        assert!(matches("src/**", "src"));
        assert!(matches("**", "any/depth/at/all"));
    }

    #[test]
    fn test_literal_pattern_is_equality() {
        assert!(matches("Cargo.toml", "Cargo.toml"));
        assert!(!matches("Cargo.toml", "cargo.toml"));
        assert!(!matches("src/main.rs", "src/main.rs.bak"));
    }

    #[test]
    fn test_empty_pattern_matches_only_empty_path() {
        assert!(matches("", ""));
        assert!(!matches("", "a"));
        assert!(!matches("a", ""));
    }

    #[test]
    fn test_trailing_slash_normalized() {
        assert!(matches("src/", "src"));
        assert!(matches("src", "src/"));
        assert!(matches("./src/*.rs", "src/lib.rs"));
    }

    #[test]
    fn test_wildcard_segment_must_be_non_empty() {
        assert!(matches("test_*", "test_"));
        assert!(!matches("*", ""));
        assert!(matches("*_test.rs", "parser_test.rs"));
        assert!(matches("a*b*c", "aXbYc"));
        assert!(!matches("a*b*c", "aXbY"));
    }

    #[test]
    fn test_absolute_patterns() {
        assert!(matches("/etc/*", "/etc/passwd"));
        assert!(!matches("/etc/*", "etc/passwd"));
        assert!(matches("/**", "/var/log/syslog"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(GlobPattern::new("a//b").is_err());
        assert!(GlobPattern::new("src/a**").is_err());
        assert!(GlobPattern::new("***").is_err());
        assert!(!matches("a//b", "a//b"));
    }

    #[test]
    fn test_dot_segments_resolved() {
        assert!(matches("a/b", "a/./b"));
        assert!(matches("a/b", "a/x/../b"));
        assert!(matches("a/b", "./a/b/."));
        assert!(!matches("a/b", "a/b/.."));
        assert!(matches("src/*.rs", "src/bin/../lib.rs"));
        assert!(matches("lib/*.rs", "src/../lib/a.rs"));
        assert!(matches("/etc/*", "/var/../etc/passwd"));
    }

    #[test]
    fn test_root_escape() {
        assert!(escapes_root(".."));
        assert!(escapes_root("../etc/passwd"));
        assert!(escapes_root("src/../../x"));
        assert!(escapes_root("/../etc"));
        assert!(!escapes_root("src/../x"));
        assert!(!matches("**", "../x"));
        assert!(!matches("/**", "/../etc"));
    }

    #[test]
    fn test_dot_segments_in_patterns() {
        let pattern = GlobPattern::new("src/../lib/*.rs").unwrap();
        assert!(pattern.matches("lib/a.rs"));
        assert_eq!(pattern.as_str(), "src/../lib/*.rs");

        assert!(GlobPattern::new("../x").is_err());
        assert!(GlobPattern::new("a/../../x").is_err());
        assert!(GlobPattern::new("a/..//b").is_err());
    }

    #[test]
    fn test_repeated_globstars_collapse() {
        let pattern = GlobPattern::new("**/**/*.rs").unwrap();
        assert!(pattern.matches("lib.rs"));
        assert!(pattern.matches("a/b/lib.rs"));
    }

    #[test]
    fn test_many_globstars_stay_fast() {
        let pattern = GlobPattern::new("**/a/**/a/**/a/**/a/**/b").unwrap();
        let path = vec!["a"; 60].join("/");
        assert!(!pattern.matches(&path));
    }

    #[test]
    fn test_has_wildcards() {
        assert!(!GlobPattern::new("src/main.rs").unwrap().has_wildcards());
        assert!(GlobPattern::new("src/*.rs").unwrap().has_wildcards());
        assert!(GlobPattern::new("**").unwrap().has_wildcards());
    }
}
