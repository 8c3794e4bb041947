//! Document path parsing for the in-memory backend.
//!
//! Accepts the store's legacy syntax and the `$`-rooted form:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `.` or `$` | Root |
//! | `.key` / `key` | Object property |
//! | `["key"]` | Object property with arbitrary characters |
//! | `[n]` | Array element, negative counts from the end |
//! | `.items[0].name` | Nested |

use std::fmt;
use std::str::FromStr;

/// A single step into a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(i64),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathParseError {
    #[error("empty property name at position {0}")]
    EmptyKey(usize),
    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),
    #[error("invalid array index at position {0}: {1}")]
    InvalidIndex(usize, String),
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

/// Parsed location inside a JSON document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Splits the path into its parent and final segment, `None` for the root.
    pub fn split_last(&self) -> Option<(JsonPath, &PathSegment)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            JsonPath {
                segments: parent.to_vec(),
            },
            last,
        ))
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, ".");
        }
        for seg in &self.segments {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl FromStr for JsonPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        if chars.first() == Some(&'$') {
            i += 1;
        }

        // A bare leading property name is allowed: `a.b` is the same as `.a.b`
        let mut expect_key = i < chars.len() && chars[i] != '.' && chars[i] != '[';

        while i < chars.len() {
            if expect_key || chars[i] == '.' {
                if !expect_key {
                    i += 1;
                    // A lone trailing dot (or the root `.`) adds nothing
                    if i == chars.len() && segments.is_empty() {
                        break;
                    }
                }
                expect_key = false;
                let start = i;
                while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                    i += 1;
                }
                if start == i {
                    return Err(PathParseError::EmptyKey(start));
                }
                segments.push(PathSegment::Key(chars[start..i].iter().collect()));
            } else if chars[i] == '[' {
                let open = i;
                let close = chars[open..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| open + offset)
                    .ok_or(PathParseError::UnclosedBracket(open))?;
                let inner: String = chars[open + 1..close].iter().collect();
                segments.push(parse_bracket(open, inner.trim())?);
                i = close + 1;
            } else {
                return Err(PathParseError::UnexpectedChar(chars[i], i));
            }
        }

        Ok(JsonPath { segments })
    }
}

fn parse_bracket(position: usize, inner: &str) -> Result<PathSegment, PathParseError> {
    let quoted = inner.len() >= 2
        && ((inner.starts_with('"') && inner.ends_with('"'))
            || (inner.starts_with('\'') && inner.ends_with('\'')));
    if quoted {
        let key = &inner[1..inner.len() - 1];
        if key.is_empty() {
            return Err(PathParseError::EmptyKey(position));
        }
        return Ok(PathSegment::Key(key.to_string()));
    }
    inner
        .parse::<i64>()
        .map(PathSegment::Index)
        .map_err(|_| PathParseError::InvalidIndex(position, inner.to_string()))
}
