//! Absolute paths into a node tree.
//!
//! A [`Path`] is an ordered list of [`PathSegment`]s. Its text form is
//! slash-delimited and always absolute:
//!
//! - `/devices/dcm4chee-arc/connections/0`: keys and a 0-based index
//! - `/devices/dcm4chee-arc/connections/cn=dicom`: a predicate segment
//!   selecting the first child object whose `cn` field equals `dicom`
//! - `/devices/'my device'/'0'`: quoted keys (spaces, numeric keys,
//!   brackets and other reserved characters)

use std::fmt;
use std::str::FromStr;

use cfgdoc_types::{ConfigError, Result};
use serde::{Deserialize, Serialize};

use crate::lexer::{write_atom, Cursor, Head};

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// Child of an object node by key.
    Key(String),
    /// Element of a list node, 0-based.
    Index(usize),
    /// First child object whose field `key` has the textual value `value`.
    Predicate { key: String, value: String },
}

impl PathSegment {
    pub fn key(key: impl Into<String>) -> Self {
        PathSegment::Key(key.into())
    }

    pub fn predicate(key: impl Into<String>, value: impl Into<String>) -> Self {
        PathSegment::Predicate {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write_atom(f, key),
            PathSegment::Index(i) => write!(f, "{i}"),
            PathSegment::Predicate { key, value } => {
                write_atom(f, key)?;
                f.write_str("=")?;
                write_atom(f, value)
            }
        }
    }
}

/// An absolute location in a node tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// The root path `/`.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Parse the slash-delimited text form.
    pub fn parse(text: &str) -> Result<Self> {
        let mut cursor = Cursor::new(text);
        cursor.expect('/')?;
        let mut segments = Vec::new();
        if cursor.at_end() {
            return Ok(Self::root());
        }
        loop {
            let raw = cursor.segment()?;
            if !raw.predicates.is_empty() {
                return Err(ConfigError::malformed_path(
                    text,
                    "bracketed predicates are only valid in search expressions",
                ));
            }
            let segment = match raw.head {
                Head::Atom(atom) if atom.quoted => PathSegment::Key(atom.text),
                Head::Atom(atom) => match atom.text.parse::<usize>() {
                    Ok(i) if atom.text.chars().all(|c| c.is_ascii_digit()) => {
                        PathSegment::Index(i)
                    }
                    _ => PathSegment::Key(atom.text),
                },
                Head::Pair(key, value) => PathSegment::Predicate {
                    key: key.text,
                    value: value.text,
                },
                Head::Wildcard | Head::Descendants => {
                    return Err(ConfigError::malformed_path(
                        text,
                        "wildcards are only valid in search expressions",
                    ))
                }
            };
            segments.push(segment);
            if cursor.at_end() {
                break;
            }
            cursor.expect('/')?;
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Child path through an object key.
    #[must_use]
    pub fn child(&self, key: impl Into<String>) -> Self {
        self.join(PathSegment::Key(key.into()))
    }

    /// Child path through a list index.
    #[must_use]
    pub fn index(&self, i: usize) -> Self {
        self.join(PathSegment::Index(i))
    }

    #[must_use]
    pub fn join(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Whether `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &Path) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// Whether the path contains predicate segments that must be resolved
    /// against a document before it names a single location.
    pub fn has_predicates(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PathSegment::Predicate { .. }))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self> {
        Path::parse(&s)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl FromIterator<PathSegment> for Path {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_keys_indices_and_predicates() {
        let path = Path::parse("/devices/dcm4chee/connections/0/cn=dicom").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::key("devices"),
                PathSegment::key("dcm4chee"),
                PathSegment::key("connections"),
                PathSegment::Index(0),
                PathSegment::predicate("cn", "dicom"),
            ]
        );
        assert_eq!(path.to_string(), "/devices/dcm4chee/connections/0/cn=dicom");
    }

    #[test]
    fn root_forms() {
        assert!(Path::parse("/").unwrap().is_root());
        assert_eq!(Path::root().to_string(), "/");
    }

    #[test]
    fn relative_and_trailing_slash_rejected() {
        assert!(matches!(
            Path::parse("devices/a"),
            Err(ConfigError::MalformedPath { .. })
        ));
        assert!(Path::parse("/devices/").is_err());
        assert!(Path::parse("/a//b").is_err());
    }

    #[test]
    fn wildcards_and_brackets_rejected() {
        assert!(Path::parse("/devices/*").is_err());
        assert!(Path::parse("/devices/**").is_err());
        assert!(Path::parse("/devices/a[x='1']").is_err());
    }

    #[test]
    fn special_keys_roundtrip() {
        let path = Path::root()
            .child("my device")
            .child("x[1]")
            .child("0")
            .child("it's")
            .index(3);
        let text = path.to_string();
        assert_eq!(text, "/'my device'/'x[1]'/'0'/'it''s'/3");
        assert_eq!(Path::parse(&text).unwrap(), path);
    }

    #[test]
    fn parent_and_prefix() {
        let path = Path::parse("/a/b/c").unwrap();
        assert_eq!(path.parent().unwrap().to_string(), "/a/b");
        assert!(path.starts_with(&Path::parse("/a").unwrap()));
        assert!(path.starts_with(&path));
        assert!(!Path::parse("/a").unwrap().starts_with(&path));
        assert!(Path::root().parent().is_none());
    }

    #[test]
    fn serde_uses_text_form() {
        let path = Path::parse("/devices/'a b'/0").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#""/devices/'a b'/0""#);
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }

    fn segment_strategy() -> impl Strategy<Value = PathSegment> {
        prop_oneof![
            "[ -~]{0,12}".prop_map(PathSegment::Key),
            (0usize..1000).prop_map(PathSegment::Index),
            ("[a-zA-Z#_ \\[\\]]{1,8}", "[ -~]{0,8}")
                .prop_map(|(k, v)| PathSegment::Predicate { key: k, value: v }),
        ]
    }

    proptest! {
        #[test]
        fn any_path_survives_format_and_parse(
            segments in proptest::collection::vec(segment_strategy(), 0..6)
        ) {
            let path = Path::from_segments(segments);
            let parsed = Path::parse(&path.to_string()).unwrap();
            prop_assert_eq!(parsed, path);
        }
    }
}
