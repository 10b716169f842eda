//! Path matching for services and operations.
//!
//! A service claims a request by its base path; an operation claims the
//! residual path left after the base is stripped, using a pattern of literal
//! and `{name}` template segments.

use super::types::decode_path_segment;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Normalize a configured service base path.
///
/// Adds a leading `/`, drops trailing `/`s. The root (`""` or `/`) becomes
/// the empty string.
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Match a request path against a service base path.
///
/// Returns the residual path when the base is a segment-aligned prefix of
/// `full_path`. An empty or `/` base matches everything and leaves the full
/// path as residual; an exact match leaves `/`.
pub fn match_base_path<'a>(full_path: &'a str, base_path: &str) -> Option<&'a str> {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return Some(full_path);
    }

    let rest = full_path.strip_prefix(base)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Error raised for a malformed operation path pattern
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("invalid template segment '{0}'")]
    InvalidSegment(String),
    #[error("duplicate template parameter '{0}'")]
    DuplicateParameter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Compiled operation path pattern, e.g. `/users/{id}/orders`.
///
/// Empty segments are ignored on both sides, so a trailing `/` never
/// changes whether a path matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::new();

        for segment in segments(pattern) {
            if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if name.is_empty() || name.contains(['{', '}']) {
                    return Err(PatternError::InvalidSegment(segment.to_string()));
                }
                if !seen.insert(name) {
                    return Err(PatternError::DuplicateParameter(name.to_string()));
                }
                compiled.push(Segment::Param(name.to_string()));
            } else if segment.contains(['{', '}']) {
                return Err(PatternError::InvalidSegment(segment.to_string()));
            } else {
                compiled.push(Segment::Literal(segment.to_string()));
            }
        }

        let raw = format!("/{}", segments(pattern).collect::<Vec<_>>().join("/"));
        Ok(Self {
            raw,
            segments: compiled,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of literal segments, used to rank competing matches
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Match a residual path, returning the bound template parameters
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut parts = segments(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), decode_path_segment(part));
                }
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
