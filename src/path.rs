//! Dot-qualified member paths.
//!
//! A path such as `address.city` is stored as its segments so that nested
//! members are grouped by whole segments. `address2.city` never lands under
//! `address`.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::error::BindError;

/// Separator between path segments.
pub const SEPARATOR: char = '.';

fn identifier() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
}

/// Path of a member relative to the root entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MemberPath {
    segments: Vec<String>,
}

impl MemberPath {
    /// The empty path, naming the root entity itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dot-qualified path, validating every segment.
    ///
    /// # Example
    ///
    /// ```
    /// use flatbind::MemberPath;
    ///
    /// let path = MemberPath::parse("start.x").unwrap();
    /// assert_eq!(path.len(), 2);
    /// assert_eq!(path.local_name(), Some("x"));
    /// ```
    pub fn parse(path: &str) -> Result<Self, BindError> {
        if path.is_empty() {
            return Err(BindError::bad_path(path, "path is empty"));
        }
        let mut segments = Vec::new();
        for segment in path.split(SEPARATOR) {
            validate_segment(path, segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Append one segment.
    pub fn child(&self, local_name: &str) -> Result<Self, BindError> {
        let mut segments = self.segments.clone();
        segments.push(local_name.to_string());
        let path = Self { segments };
        validate_segment(&path.to_string(), local_name)?;
        Ok(path)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` for the root path.
    pub fn local_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path with the last segment removed.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Segment-wise prefix test.
    pub fn starts_with(&self, prefix: &MemberPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Prefix of the first `depth` segments.
    pub fn truncate(&self, depth: usize) -> Self {
        Self {
            segments: self.segments[..depth.min(self.segments.len())].to_vec(),
        }
    }
}

fn validate_segment(path: &str, segment: &str) -> Result<(), BindError> {
    if segment.is_empty() {
        return Err(BindError::bad_path(path, "empty segment"));
    }
    if !identifier().is_match(segment) {
        return Err(BindError::bad_path(
            path,
            format!("'{}' is not a valid member name", segment),
        ));
    }
    Ok(())
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}
