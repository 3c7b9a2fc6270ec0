//! Ant-style path patterns.
//!
//! A pattern is a `/`-separated list of segments:
//!
//! - `?` matches exactly one character inside a segment
//! - `*` matches zero or more characters inside a segment
//! - `**` matches zero or more whole segments
//!
//! `/cars.jsp` matches only that page, `/admin/*` matches `/admin/users` but not
//! `/admin/users/7`, and `/**` matches every path.

use percent_encoding::percent_decode_str;
use std::fmt;

use crate::error::{AuthzError, Result};

const ANY_SEGMENTS: &str = "**";

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<String>,
}

impl PathPattern {
    /// Compile a pattern. Patterns must be absolute (`/...`); the bare `**`
    /// is accepted as an alias of `/**`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed != ANY_SEGMENTS && !trimmed.starts_with('/') {
            return Err(AuthzError::InvalidPattern {
                pattern: raw.to_string(),
                reason: "must start with '/'".to_string(),
            });
        }

        let mut segments: Vec<String> = Vec::new();
        for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
            if segment != ANY_SEGMENTS && segment.contains(ANY_SEGMENTS) {
                return Err(AuthzError::InvalidPattern {
                    pattern: raw.to_string(),
                    reason: "'**' must be a whole path segment".to_string(),
                });
            }
            // consecutive ** segments are equivalent to one
            if segment == ANY_SEGMENTS && segments.last().map(String::as_str) == Some(ANY_SEGMENTS)
            {
                continue;
            }
            segments.push(segment.to_string());
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The pattern as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True for `/**`, the pattern that matches every path.
    pub fn is_catch_all(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == ANY_SEGMENTS
    }

    /// Test a request path against this pattern. The path is normalized first,
    /// see [`normalize_path`].
    pub fn matches(&self, path: &str) -> bool {
        let segments = path_segments(path);
        match_segments(&self.segments, &segments)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Normalize a request path: drop the query string and fragment, decode
/// percent escapes, collapse empty and `.` segments, resolve `..` and drop the
/// trailing slash.
///
/// Decoding happens before the path is split, so `%2F` separates segments and
/// `%2E%2E` climbs like `..`, the same way the static file service reads the
/// path. `..` never climbs above the root, so `/../users.jsp` is `/users.jsp`.
pub fn normalize_path(path: &str) -> String {
    let segments = path_segments(path);
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn path_segments(path: &str) -> Vec<String> {
    let path = path.split(|c| c == '?' || c == '#').next().unwrap_or_default();
    // invalid UTF-8 turns into U+FFFD, which no literal pattern segment matches
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_string()),
        }
    }
    segments
}

fn match_segments(pattern: &[String], path: &[String]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((first, rest)) if first == ANY_SEGMENTS => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((first, rest)) => match path.split_first() {
            Some((segment, path_rest)) => {
                match_segment(first, segment) && match_segments(rest, path_rest)
            }
            None => false,
        },
    }
}

/// Wildcard match of a single segment (`*` and `?`), greedy with backtracking
/// to the most recent star.
fn match_segment(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut resume = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            resume = t;
            p += 1;
        } else if let Some(star_at) = star {
            p = star_at + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
