//! # Path Addressing
//!
//! `/`-delimited addressing into the generic document tree.
//!
//! ## Addressing Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Document tree (serde_yaml::Value)                                      │
//! │                                                                         │
//! │  client:                        path "client/address"                   │
//! │    address: "Street 1"    ◄──── Key("client") / Key("address")          │
//! │  event:                                                                 │
//! │    dates:                       path "event/dates/0/begin"              │
//! │      - begin: 2013-07-17  ◄──── numeric segments address sequence       │
//! │                                 indices                                 │
//! │                                                                         │
//! │  ""  (empty path)         ◄──── the document root                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Paths are split eagerly at parse time, never re-parsed per access. A path
//! resolves to exactly one node or is absent; there are no wildcards.
//!
//! ## Edge Cases
//! - `get` through a missing intermediate node yields `None`, not an error
//! - `set` through a node of the wrong shape is a fatal structural error
//!   (schema corruption), never a silent overwrite

use std::fmt;

use serde_yaml::{Mapping, Value};

use crate::error::{CoreError, CoreResult};

/// The generic decoded document: a tree of mappings, sequences and scalars.
pub type Document = Value;

/// Separator between path segments.
pub const SEPARATOR: char = '/';

// =============================================================================
// Segments
// =============================================================================

/// A single segment of a field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Seg {
    /// Mapping key access.
    Key(String),
    /// Sequence index access.
    Index(usize),
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, "{k}"),
            Seg::Index(i) => write!(f, "{i}"),
        }
    }
}

// =============================================================================
// FieldPath
// =============================================================================

/// An ordered sequence of key/index segments addressing one document node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<Seg>);

impl FieldPath {
    /// The empty path, denoting the document root.
    #[inline]
    pub fn root() -> Self {
        FieldPath(Vec::new())
    }

    /// Parses a `/`-delimited path string.
    ///
    /// All-digit segments become sequence indices, everything else a
    /// mapping key. The empty string parses to the root path.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return FieldPath::root();
        }
        FieldPath(
            raw.split(SEPARATOR)
                .map(|part| match part.parse::<usize>() {
                    Ok(index) if !part.is_empty() => Seg::Index(index),
                    _ => Seg::Key(part.to_string()),
                })
                .collect(),
        )
    }

    /// Returns the segments of this path.
    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    /// Returns true if this path denotes the document root.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if this path is a prefix of `other` (or equal to it).
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        other.0.len() >= self.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a == b)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(raw: &str) -> Self {
        FieldPath::parse(raw)
    }
}

// =============================================================================
// Reads
// =============================================================================

/// Resolves a path to a node, or `None` when any segment is absent.
pub fn get<'a>(doc: &'a Document, path: &FieldPath) -> Option<&'a Value> {
    let mut node = doc;
    for seg in path.segments() {
        node = match seg {
            Seg::Key(k) => node.get(k.as_str())?,
            Seg::Index(i) => node.get(*i)?,
        };
    }
    Some(node)
}

/// Returns true if the path resolves to a node.
#[inline]
pub fn has(doc: &Document, path: &FieldPath) -> bool {
    get(doc, path).is_some()
}

/// Convenience: resolves a path string to a string scalar.
pub fn get_str<'a>(doc: &'a Document, path: &str) -> Option<&'a str> {
    get(doc, &FieldPath::parse(path)).and_then(Value::as_str)
}

// =============================================================================
// Writes
// =============================================================================

/// Writes a value at a path, creating intermediate mapping/sequence nodes
/// as needed and overwriting the terminal value.
///
/// Missing intermediates are created from `Null`; a sequence is padded with
/// `Null` entries up to the addressed index. Hitting an existing node of the
/// wrong shape is a fatal [`CoreError::StructuralConflict`].
pub fn set(doc: &mut Document, path: &FieldPath, value: Value) -> CoreResult<()> {
    if path.is_root() {
        *doc = value;
        return Ok(());
    }

    let mut node = doc;
    let last = path.segments().len() - 1;
    for (depth, seg) in path.segments().iter().enumerate() {
        let terminal = depth == last;
        match seg {
            Seg::Key(k) => {
                if node.is_null() {
                    *node = Value::Mapping(Mapping::new());
                }
                let mapping = node.as_mapping_mut().ok_or_else(|| structural(path, depth, "mapping"))?;
                let key = Value::String(k.clone());
                if terminal {
                    mapping.insert(key, value);
                    return Ok(());
                }
                if !mapping.contains_key(&key) {
                    mapping.insert(key.clone(), Value::Null);
                }
                node = mapping.get_mut(&key).expect("key was just inserted");
            }
            Seg::Index(i) => {
                if node.is_null() {
                    *node = Value::Sequence(Vec::new());
                }
                let seq = node.as_sequence_mut().ok_or_else(|| structural(path, depth, "sequence"))?;
                while seq.len() <= *i {
                    seq.push(Value::Null);
                }
                if terminal {
                    seq[*i] = value;
                    return Ok(());
                }
                node = &mut seq[*i];
            }
        }
    }
    unreachable!("loop returns at the terminal segment");
}

fn structural(path: &FieldPath, depth: usize, expected: &'static str) -> CoreError {
    let prefix: Vec<String> = path.segments()[..depth].iter().map(Seg::to_string).collect();
    CoreError::StructuralConflict {
        path: prefix.join("/"),
        expected,
    }
}

// =============================================================================
// Graft
// =============================================================================

/// Merges a secondary document into `doc`.
///
/// Both arguments must be mappings at the root. Top-level conflicts are won
/// by the subtree; below the top level two mappings merge recursively, and a
/// conflict on anything else is a fatal structural error.
pub fn graft(doc: &mut Document, subtree: Document) -> CoreResult<()> {
    let Value::Mapping(subtree) = subtree else {
        return Err(CoreError::StructuralConflict {
            path: String::new(),
            expected: "mapping",
        });
    };
    if doc.is_null() {
        *doc = Value::Mapping(Mapping::new());
    }
    let Some(target) = doc.as_mapping_mut() else {
        return Err(CoreError::StructuralConflict {
            path: String::new(),
            expected: "mapping",
        });
    };

    for (key, incoming) in subtree {
        match target.get_mut(&key) {
            None => {
                target.insert(key, incoming);
            }
            Some(existing) => match (existing, incoming) {
                (Value::Mapping(existing), Value::Mapping(incoming)) => {
                    merge_nested(existing, incoming, &display_key(&key))?;
                }
                // Top-level conflict on anything else: subtree wins.
                (existing, incoming) => *existing = incoming,
            },
        }
    }
    Ok(())
}

/// Recursive merge below the top level: leaf conflicts are errors.
fn merge_nested(target: &mut Mapping, incoming: Mapping, at: &str) -> CoreResult<()> {
    for (key, value) in incoming {
        let here = format!("{at}/{}", display_key(&key));
        match target.get_mut(&key) {
            None => {
                target.insert(key, value);
            }
            Some(Value::Mapping(existing)) => match value {
                Value::Mapping(incoming) => merge_nested(existing, incoming, &here)?,
                _ => {
                    return Err(CoreError::StructuralConflict {
                        path: here,
                        expected: "mapping",
                    })
                }
            },
            Some(existing) => {
                // Identical leaves merge trivially; anything else is schema
                // corruption.
                if *existing != value {
                    return Err(CoreError::StructuralConflict {
                        path: here,
                        expected: "mergeable leaf",
                    });
                }
            }
        }
    }
    Ok(())
}

fn display_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Document {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_segments() {
        let path = FieldPath::parse("event/dates/0/begin");
        let expected = [
            Seg::Key("event".into()),
            Seg::Key("dates".into()),
            Seg::Index(0),
            Seg::Key("begin".into()),
        ];
        assert_eq!(path.segments(), &expected[..]);
    }

    #[test]
    fn test_parse_and_display_round_trip() {
        for raw in ["client/address", "event/dates/0/begin", "manager"] {
            assert_eq!(FieldPath::parse(raw).to_string(), raw);
        }
        assert!(FieldPath::parse("").is_root());
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut d = Value::Null;
        for raw in ["client/address", "event/dates/0/begin", "a/0/1/b"] {
            let path = FieldPath::parse(raw);
            set(&mut d, &path, Value::String("x".into())).unwrap();
            assert_eq!(get(&d, &path).and_then(Value::as_str), Some("x"));
        }
    }

    #[test]
    fn test_get_missing_intermediate_is_absent() {
        let d = doc("client:\n  address: Street 1\n");
        assert!(get(&d, &FieldPath::parse("event/name")).is_none());
        assert!(!has(&d, &FieldPath::parse("client/email")));
        assert_eq!(get_str(&d, "client/address"), Some("Street 1"));
    }

    #[test]
    fn test_empty_path_denotes_root() {
        let d = doc("a: 1\n");
        assert_eq!(get(&d, &FieldPath::root()), Some(&d));

        let mut d = d;
        set(&mut d, &FieldPath::root(), Value::Bool(true)).unwrap();
        assert_eq!(d, Value::Bool(true));
    }

    #[test]
    fn test_set_creates_intermediates_and_pads_sequences() {
        let mut d = Value::Null;
        set(
            &mut d,
            &FieldPath::parse("event/dates/2/begin"),
            Value::String("2013-07-17".into()),
        )
        .unwrap();

        let dates = get(&d, &FieldPath::parse("event/dates")).unwrap();
        let seq = dates.as_sequence().unwrap();
        assert_eq!(seq.len(), 3);
        assert!(seq[0].is_null());
        assert_eq!(get_str(&d, "event/dates/2/begin"), Some("2013-07-17"));
    }

    #[test]
    fn test_set_through_scalar_is_structural_error() {
        let mut d = doc("client: just a string\n");
        let err = set(
            &mut d,
            &FieldPath::parse("client/address"),
            Value::Bool(true),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::StructuralConflict { ref path, expected: "mapping" } if path == "client"
        ));
        // The scalar was not silently overwritten.
        assert_eq!(get_str(&d, "client"), Some("just a string"));
    }

    #[test]
    fn test_graft_inserts_and_wins_at_top_level() {
        let mut d = doc("manager: Old Name\nproducts:\n  beer:\n    price: 1\n");
        let extra = doc("manager: New Name\nhours:\n  salary: 8\n");
        graft(&mut d, extra).unwrap();

        assert_eq!(get_str(&d, "manager"), Some("New Name"));
        assert!(has(&d, &FieldPath::parse("hours/salary")));
        assert!(has(&d, &FieldPath::parse("products/beer/price")));
    }

    #[test]
    fn test_graft_merges_nested_mappings() {
        let mut d = doc("client:\n  title: Herr\n");
        let extra = doc("client:\n  last_name: Doe\n");
        graft(&mut d, extra).unwrap();
        assert_eq!(get_str(&d, "client/title"), Some("Herr"));
        assert_eq!(get_str(&d, "client/last_name"), Some("Doe"));
    }

    #[test]
    fn test_graft_leaf_conflict_is_error() {
        let mut d = doc("client:\n  title: Herr\n");
        let extra = doc("client:\n  title: Frau\n");
        let err = graft(&mut d, extra).unwrap_err();
        assert!(matches!(err, CoreError::StructuralConflict { .. }));
    }

    #[test]
    fn test_prefix_relation() {
        let parent = FieldPath::parse("client");
        let child = FieldPath::parse("client/address");
        assert!(parent.is_prefix_of(&child));
        assert!(parent.is_prefix_of(&parent));
        assert!(!child.is_prefix_of(&parent));
    }
}
