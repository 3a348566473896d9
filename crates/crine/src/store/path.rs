//! Addressing for the document hierarchy.
//!
//! Paths alternate collection and document segments: `users` is a
//! collection, `users/{uid}` a document, `users/{uid}/customers` a
//! collection nested under it, and so on.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Longest segment the backend accepts, in bytes.
pub const MAX_SEGMENT_BYTES: usize = 1500;

/// Segments wrapped in double underscores are reserved by the backend.
static RESERVED_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__.*__$").expect("reserved segment pattern is valid"));

/// Check that a single segment can be used in a path.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] describing the first rule the segment breaks.
pub fn validate_segment(segment: &str) -> Result<()> {
    let reason = if segment.is_empty() {
        Some("segment is empty".to_string())
    } else if segment.contains('/') {
        Some("segment contains '/'".to_string())
    } else if segment == "." || segment == ".." {
        Some("segment cannot be '.' or '..'".to_string())
    } else if RESERVED_SEGMENT.is_match(segment) {
        Some("segments of the form __name__ are reserved".to_string())
    } else if segment.len() > MAX_SEGMENT_BYTES {
        Some(format!("segment is longer than {MAX_SEGMENT_BYTES} bytes"))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::invalid_path(segment, reason)),
        None => Ok(()),
    }
}

/// Path to a collection (odd number of segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    segments: Vec<String>,
}

/// Path to a single document (even number of segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl CollectionPath {
    /// A top-level collection.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid segment.
    pub fn root(name: &str) -> Result<Self> {
        validate_segment(name)?;
        Ok(Self {
            segments: vec![name.to_string()],
        })
    }

    /// The document with the given id inside this collection.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid segment.
    pub fn doc(&self, id: &str) -> Result<DocumentPath> {
        validate_segment(id)?;
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        Ok(DocumentPath { segments })
    }

    /// The document for an id produced by [`new_document_id`], which is
    /// always a valid segment.
    ///
    /// [`new_document_id`]: super::clock::new_document_id
    pub(crate) fn generated_doc(&self, id: &str) -> DocumentPath {
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        DocumentPath { segments }
    }

    /// The last segment, i.e. the collection's own name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// The document owning this collection, or `None` for a top-level one.
    #[must_use]
    pub fn parent(&self) -> Option<DocumentPath> {
        if self.segments.len() < 3 {
            return None;
        }
        Some(DocumentPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Parse a slash-separated collection path.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment is invalid or the segment count is even.
    pub fn parse(path: &str) -> Result<Self> {
        let segments = split(path)?;
        if segments.len() % 2 == 0 {
            return Err(Error::invalid_path(
                path,
                "a collection path needs an odd number of segments",
            ));
        }
        Ok(Self { segments })
    }
}

impl DocumentPath {
    /// A subcollection nested under this document.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a valid segment.
    pub fn collection(&self, name: &str) -> Result<CollectionPath> {
        validate_segment(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(CollectionPath { segments })
    }

    /// The document id (last segment).
    #[must_use]
    pub fn id(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// The collection containing this document.
    #[must_use]
    pub fn parent(&self) -> CollectionPath {
        CollectionPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    /// Parse a slash-separated document path.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment is invalid or the segment count is odd.
    pub fn parse(path: &str) -> Result<Self> {
        let segments = split(path)?;
        if segments.len() % 2 != 0 {
            return Err(Error::invalid_path(
                path,
                "a document path needs an even number of segments",
            ));
        }
        Ok(Self { segments })
    }
}

fn split(path: &str) -> Result<Vec<String>> {
    if path.is_empty() {
        return Err(Error::invalid_path(path, "path is empty"));
    }
    path.split('/')
        .map(|segment| {
            validate_segment(segment).map_err(|_| {
                Error::invalid_path(path, format!("invalid segment '{segment}'"))
            })?;
            Ok(segment.to_string())
        })
        .collect()
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_nested_paths() {
        let users = CollectionPath::root("users").unwrap();
        let user = users.doc("u1").unwrap();
        let customers = user.collection("customers").unwrap();
        let customer = customers.doc("c1").unwrap();

        assert_eq!(user.to_string(), "users/u1");
        assert_eq!(customers.to_string(), "users/u1/customers");
        assert_eq!(customer.to_string(), "users/u1/customers/c1");
        assert_eq!(customer.id(), "c1");
        assert_eq!(customers.name(), "customers");
        assert_eq!(customer.parent(), customers);
        assert_eq!(customers.parent(), Some(user));
        assert_eq!(users.parent(), None);
    }

    #[test]
    fn test_parse_round_trips_display() {
        let doc = DocumentPath::parse("users/u1/drawings/c9").unwrap();
        assert_eq!(doc.to_string(), "users/u1/drawings/c9");

        let col = CollectionPath::parse("customerForms").unwrap();
        assert_eq!(col.to_string(), "customerForms");
    }

    #[test]
    fn test_parse_rejects_wrong_parity() {
        assert!(DocumentPath::parse("users").is_err());
        assert!(CollectionPath::parse("users/u1").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(DocumentPath::parse("").is_err());
        assert!(DocumentPath::parse("users//u1").is_err());
    }

    #[test]
    fn test_validate_segment_rules() {
        assert!(validate_segment("abc123").is_ok());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment(".").is_err());
        assert!(validate_segment("..").is_err());
        assert!(validate_segment("__name__").is_err());
        assert!(validate_segment("__partial").is_ok());
        assert!(validate_segment(&"x".repeat(MAX_SEGMENT_BYTES)).is_ok());
        assert!(validate_segment(&"x".repeat(MAX_SEGMENT_BYTES + 1)).is_err());
    }

    #[test]
    fn test_doc_rejects_slash_in_id() {
        let users = CollectionPath::root("users").unwrap();
        let err = users.doc("u1/customers").unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }
}
