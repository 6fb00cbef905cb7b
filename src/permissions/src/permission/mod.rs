//! Permission strings: parsing and implication
//!
//! A permission is a colon-separated list of segments, each segment a
//! comma-separated set of alternatives:
//!
//! ```text
//! document:read,write:*
//! ```
//!
//! A segment containing `*` matches anything at its position and everything
//! below it, so parsing stops at the first wildcard segment.

pub mod cache;

pub use cache::{CacheStats, PermissionCache, PermissionCacheConfig};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Segment separator
pub const SEGMENT_SEPARATOR: char = ':';

/// Alternative separator within a segment
pub const ALTERNATIVE_SEPARATOR: char = ',';

/// Wildcard alternative
pub const WILDCARD: &str = "*";

/// Errors raised while parsing a permission string
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The permission string is empty
    #[error("Permission string cannot be empty")]
    EmptyPermission,

    /// A `:`-separated segment is empty
    #[error("Permission '{0}' is illegal - contains an empty segment")]
    EmptySegment(String),

    /// A `,`-separated alternative is empty
    #[error("Permission '{0}' is illegal - contains an empty sub-token")]
    EmptySubtoken(String),
}

/// One position of a permission
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches any alternative at this position and all deeper positions
    Wildcard,

    /// Set of accepted alternatives (never empty)
    Alternatives(BTreeSet<String>),
}

impl Segment {
    /// Returns `true` if this is the wildcard segment
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Segment::Wildcard)
    }

    /// Returns `true` if every alternative of `requested` is accepted here
    fn covers(&self, requested: &Segment) -> bool {
        match (self, requested) {
            (Segment::Wildcard, _) => true,
            // Only a wildcard covers a wildcard
            (Segment::Alternatives(_), Segment::Wildcard) => false,
            (Segment::Alternatives(held), Segment::Alternatives(wanted)) => {
                wanted.iter().all(|alt| held.contains(alt))
            }
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Wildcard => f.write_str(WILDCARD),
            Segment::Alternatives(alternatives) => {
                for (idx, alt) in alternatives.iter().enumerate() {
                    if idx > 0 {
                        write!(f, "{}", ALTERNATIVE_SEPARATOR)?;
                    }
                    f.write_str(alt)?;
                }
                Ok(())
            }
        }
    }
}

/// Immutable parsed permission
///
/// Always has at least one segment and every non-wildcard segment has at
/// least one alternative. Instances are only produced by [`Permission::parse`].
///
/// # Examples
///
/// ```
/// use cretoai_permissions::Permission;
///
/// let held = Permission::parse("document:read,write").unwrap();
/// let wanted = Permission::parse("document:read:draft").unwrap();
/// assert!(held.implies(&wanted));
/// assert!(!wanted.implies(&held));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission {
    segments: Vec<Segment>,
}

impl Permission {
    /// Parse a permission string
    ///
    /// Segments and alternatives are trimmed. A segment holding a `*`
    /// alternative becomes [`Segment::Wildcard`] and every following segment
    /// of the input is discarded, so `a:*:b` parses to the same permission as
    /// `a:*`.
    ///
    /// # Errors
    ///
    /// - [`ParseError::EmptyPermission`] for an empty (or blank) string
    /// - [`ParseError::EmptySegment`] for `a::b`
    /// - [`ParseError::EmptySubtoken`] for `a:,b`
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s.trim().is_empty() {
            return Err(ParseError::EmptyPermission);
        }

        let mut segments = Vec::new();
        for raw_segment in s.split(SEGMENT_SEPARATOR) {
            let raw_segment = raw_segment.trim();
            if raw_segment.is_empty() {
                return Err(ParseError::EmptySegment(s.to_string()));
            }

            let mut alternatives = BTreeSet::new();
            for alt in raw_segment.split(ALTERNATIVE_SEPARATOR) {
                let alt = alt.trim();
                if alt.is_empty() {
                    return Err(ParseError::EmptySubtoken(s.to_string()));
                }
                alternatives.insert(alt.to_string());
            }

            if alternatives.contains(WILDCARD) {
                segments.push(Segment::Wildcard);
                break;
            }
            segments.push(Segment::Alternatives(alternatives));
        }

        Ok(Self { segments })
    }

    /// Returns the parsed segments in order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`; a permission has at least one segment
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Does holding `self` authorize `requested`?
    ///
    /// Segments are compared position by position:
    /// - when `self` runs out first it is the broader permission: `true`
    /// - when `requested` runs out first it is broader than `self`: `false`
    /// - a wildcard segment in `self` accepts anything at that position
    /// - otherwise every alternative of the requested segment must be one of
    ///   ours
    pub fn implies(&self, requested: &Permission) -> bool {
        let mut requested_segments = requested.segments.iter();

        for held in &self.segments {
            let Some(wanted) = requested_segments.next() else {
                return false;
            };

            if !held.covers(wanted) {
                return false;
            }
        }

        true
    }

    /// Does `granted` authorize `self`?
    pub fn implied_by(&self, granted: &Permission) -> bool {
        granted.implies(self)
    }
}

impl FromStr for Permission {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                write!(f, "{}", SEGMENT_SEPARATOR)?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}
