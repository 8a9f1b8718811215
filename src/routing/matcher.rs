//! Route pattern matching.
//!
//! # Responsibilities
//! - Parse fragment route patterns (`/shop/sale`, `/shop/:rest*`)
//! - Match a request path against a compiled pattern
//!
//! # Design Decisions
//! - Literal segments are matched case-sensitively
//! - A single trailing `:name*` segment captures the remainder of the path,
//!   including zero segments (`/shop/:rest*` matches `/shop`)
//! - No other wildcard forms: `*`, `:id` and mid-path wildcards are rejected
//! - A trailing slash is insignificant on both patterns and paths
//! - No regex to guarantee O(n) matching

use thiserror::Error;

/// Reasons a route pattern is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("route pattern `{0}` must start with `/`")]
    MissingLeadingSlash(String),

    #[error("route pattern `{0}` has a wildcard before its final segment")]
    WildcardNotLast(String),

    #[error("route pattern `{pattern}` uses unsupported segment `{segment}`")]
    UnsupportedSegment { pattern: String, segment: String },
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    literals: Vec<String>,
    wildcard: Option<String>,
}

impl RoutePattern {
    /// Compile a pattern.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
        }

        let segments = split_segments(pattern);
        let mut literals = Vec::with_capacity(segments.len());
        let mut wildcard = None;

        for (index, segment) in segments.iter().enumerate() {
            let is_last = index + 1 == segments.len();

            if let Some(name) = segment.strip_prefix(':').and_then(|s| s.strip_suffix('*')) {
                if !is_last {
                    return Err(PatternError::WildcardNotLast(pattern.to_string()));
                }
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(PatternError::UnsupportedSegment {
                        pattern: pattern.to_string(),
                        segment: segment.to_string(),
                    });
                }
                wildcard = Some(name.to_string());
            } else if segment.starts_with(':') || segment.contains('*') {
                return Err(PatternError::UnsupportedSegment {
                    pattern: pattern.to_string(),
                    segment: segment.to_string(),
                });
            } else {
                literals.push(segment.to_string());
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            literals,
            wildcard,
        })
    }

    /// The pattern as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Name of the trailing wildcard capture, if any.
    pub fn wildcard_name(&self) -> Option<&str> {
        self.wildcard.as_deref()
    }

    /// Match the full `path`. On success returns the captured remainder
    /// (empty when the pattern has no wildcard or it captured nothing).
    pub fn match_path(&self, path: &str) -> Option<String> {
        let segments = split_segments(path);

        if segments.len() < self.literals.len() {
            return None;
        }
        if self.wildcard.is_none() && segments.len() != self.literals.len() {
            return None;
        }
        if !self.literals.iter().zip(&segments).all(|(l, s)| l == s) {
            return None;
        }

        Some(segments[self.literals.len()..].join("/"))
    }

    /// Whether `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.match_path(path).is_some()
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    let trimmed = path.trim_start_matches('/');
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let pattern = RoutePattern::parse("/shop/sale").unwrap();
        assert!(pattern.matches("/shop/sale"));
        assert!(pattern.matches("/shop/sale/"));
        assert!(!pattern.matches("/shop"));
        assert!(!pattern.matches("/shop/sale/today"));
        assert!(!pattern.matches("/Shop/sale")); // Case sensitive
    }

    #[test]
    fn test_trailing_wildcard() {
        let pattern = RoutePattern::parse("/shop/:_*").unwrap();
        assert_eq!(pattern.wildcard_name(), Some("_"));
        assert_eq!(pattern.match_path("/shop"), Some(String::new()));
        assert_eq!(pattern.match_path("/shop/sale"), Some("sale".to_string()));
        assert_eq!(pattern.match_path("/shop/a/b/c"), Some("a/b/c".to_string()));
        assert_eq!(pattern.match_path("/shopping"), None);
        assert_eq!(pattern.match_path("/"), None);
    }

    #[test]
    fn test_root_patterns() {
        let root = RoutePattern::parse("/").unwrap();
        assert!(root.matches("/"));
        assert!(!root.matches("/a"));

        let everything = RoutePattern::parse("/:path*").unwrap();
        assert!(everything.matches("/"));
        assert!(everything.matches("/a/b"));
    }

    #[test]
    fn test_rejected_patterns() {
        assert!(matches!(
            RoutePattern::parse("shop"),
            Err(PatternError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/:rest*/tail"),
            Err(PatternError::WildcardNotLast(_))
        ));
        assert!(matches!(
            RoutePattern::parse("/shop/:id"),
            Err(PatternError::UnsupportedSegment { .. })
        ));
        assert!(matches!(
            RoutePattern::parse("/shop/*"),
            Err(PatternError::UnsupportedSegment { .. })
        ));
    }
}
