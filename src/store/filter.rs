//! Structured query predicates over file metadata records.
//!
//! A [`FileFilter`] renders to a BSON query document for the MongoDB backend
//! and can also be evaluated directly against a [`FileMetadata`] record,
//! which is what the in-memory backend does.

use std::cmp::Ordering;

use mongodb::bson::{doc, Bson, Document};

use super::types::{FileId, FileMetadata, MetadataValue};

/// Comparison operator for a field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn operator(self) -> &'static str {
        match self {
            Comparison::Eq => "$eq",
            Comparison::Ne => "$ne",
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Gte => ordering != Ordering::Less,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Lte => ordering != Ordering::Greater,
        }
    }
}

/// Predicate selecting file metadata records.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FileFilter {
    /// Every record.
    #[default]
    All,
    /// The record with this identifier.
    Id(FileId),
    /// Records with exactly this filename.
    Filename(String),
    /// Records whose field at `path` compares to `value` with `op`.
    Field {
        path: String,
        op: Comparison,
        value: MetadataValue,
    },
    /// Records where the field at `path` is present (or absent).
    Exists { path: String, exists: bool },
    /// Records matching every inner filter.
    And(Vec<FileFilter>),
    /// Records matching at least one inner filter.
    Or(Vec<FileFilter>),
}

impl FileFilter {
    /// Match by identifier.
    pub fn id(id: FileId) -> Self {
        FileFilter::Id(id)
    }

    /// Match by filename.
    pub fn filename(name: impl Into<String>) -> Self {
        FileFilter::Filename(name.into())
    }

    /// Match a field against a value.
    pub fn field(path: impl Into<String>, op: Comparison, value: impl Into<MetadataValue>) -> Self {
        FileFilter::Field {
            path: path.into(),
            op,
            value: value.into(),
        }
    }

    /// Match a metadata entry by equality.
    pub fn metadata(key: &str, value: impl Into<MetadataValue>) -> Self {
        Self::field(format!("metadata.{key}"), Comparison::Eq, value)
    }

    /// Match records where `path` is present.
    pub fn exists(path: impl Into<String>) -> Self {
        FileFilter::Exists {
            path: path.into(),
            exists: true,
        }
    }

    /// Combine with another filter; both must match.
    pub fn and(self, other: FileFilter) -> Self {
        match self {
            FileFilter::And(mut filters) => {
                filters.push(other);
                FileFilter::And(filters)
            }
            FileFilter::All => other,
            first => FileFilter::And(vec![first, other]),
        }
    }

    /// Combine with another filter; either may match.
    pub fn or(self, other: FileFilter) -> Self {
        match self {
            FileFilter::Or(mut filters) => {
                filters.push(other);
                FileFilter::Or(filters)
            }
            first => FileFilter::Or(vec![first, other]),
        }
    }

    /// Render the filter as a query document for the files collection.
    pub fn to_document(&self) -> Document {
        match self {
            FileFilter::All => Document::new(),
            FileFilter::Id(id) => doc! { "_id": Bson::from(*id) },
            FileFilter::Filename(name) => doc! { "filename": name.as_str() },
            FileFilter::Field { path, op, value } => {
                let mut condition = Document::new();
                condition.insert(op.operator(), Bson::from(value.clone()));
                let mut query = Document::new();
                query.insert(path.as_str(), condition);
                query
            }
            FileFilter::Exists { path, exists } => {
                let mut query = Document::new();
                query.insert(path.as_str(), doc! { "$exists": *exists });
                query
            }
            // `$and`/`$or` reject empty arrays on the server
            FileFilter::And(filters) if filters.is_empty() => Document::new(),
            FileFilter::Or(filters) if filters.is_empty() => doc! { "_id": { "$exists": false } },
            FileFilter::And(filters) => doc! {
                "$and": filters.iter().map(|f| Bson::Document(f.to_document())).collect::<Vec<_>>()
            },
            FileFilter::Or(filters) => doc! {
                "$or": filters.iter().map(|f| Bson::Document(f.to_document())).collect::<Vec<_>>()
            },
        }
    }

    /// Evaluate the filter against a record.
    pub fn matches(&self, record: &FileMetadata) -> bool {
        match self {
            FileFilter::All => true,
            FileFilter::Id(id) => record.id == *id,
            FileFilter::Filename(name) => record.filename == *name,
            FileFilter::Field { path, op, value } => {
                field_matches(record.field_value(path).as_ref(), *op, value)
            }
            FileFilter::Exists { path, exists } => record.field_value(path).is_some() == *exists,
            FileFilter::And(filters) => filters.iter().all(|f| f.matches(record)),
            FileFilter::Or(filters) => filters.iter().any(|f| f.matches(record)),
        }
    }
}

fn field_matches(actual: Option<&MetadataValue>, op: Comparison, expected: &MetadataValue) -> bool {
    let Some(actual) = actual else {
        // A missing field equals null and differs from everything else.
        return match op {
            Comparison::Eq => *expected == MetadataValue::Null,
            Comparison::Ne => *expected != MetadataValue::Null,
            _ => false,
        };
    };

    if let (MetadataValue::Array(items), false) =
        (actual, matches!(expected, MetadataValue::Array(_)))
    {
        // Scalar against array: any element may satisfy the comparison.
        // `$ne` requires that no element is equal.
        return match op {
            Comparison::Ne => !items
                .iter()
                .any(|item| item.compare(expected) == Some(Ordering::Equal)),
            _ => items
                .iter()
                .any(|item| item.compare(expected).is_some_and(|o| op.accepts(o))),
        };
    }

    match actual.compare(expected) {
        Some(ordering) => op.accepts(ordering),
        // Unordered values are never equal.
        None => op == Comparison::Ne,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::Metadata;
    use chrono::Utc;

    fn record(filename: &str, length: u64, owner: Option<&str>) -> FileMetadata {
        let mut metadata = Metadata::new();
        if let Some(owner) = owner {
            metadata.insert("owner".to_string(), MetadataValue::from(owner));
        }
        FileMetadata {
            id: FileId::new(),
            length,
            chunk_size: 261_120,
            upload_date: Utc::now(),
            content_hash: None,
            filename: filename.to_string(),
            content_type: None,
            aliases: vec!["alt.txt".to_string(), "other.txt".to_string()],
            metadata,
        }
    }

    #[test]
    fn test_all_renders_empty_document() {
        assert_eq!(FileFilter::All.to_document(), Document::new());
    }

    #[test]
    fn test_id_renders_object_id() {
        let id = FileId::new();
        let doc = FileFilter::id(id).to_document();
        assert_eq!(doc.get_object_id("_id").unwrap(), id.object_id());
    }

    #[test]
    fn test_field_renders_operator() {
        let doc = FileFilter::field("length", Comparison::Gte, 10i64).to_document();
        assert_eq!(doc, doc! { "length": { "$gte": 10i64 } });
    }

    #[test]
    fn test_and_renders_nested() {
        let doc = FileFilter::filename("a.txt")
            .and(FileFilter::metadata("owner", "alice"))
            .to_document();
        assert_eq!(
            doc,
            doc! { "$and": [
                { "filename": "a.txt" },
                { "metadata.owner": { "$eq": "alice" } }
            ] }
        );
    }

    #[test]
    fn test_empty_or_matches_nothing() {
        let filter = FileFilter::Or(vec![]);
        assert!(!filter.matches(&record("a.txt", 1, None)));
        assert_eq!(filter.to_document(), doc! { "_id": { "$exists": false } });
    }

    #[test]
    fn test_all_and_combines_to_other() {
        let filter = FileFilter::All.and(FileFilter::filename("x"));
        assert_eq!(filter, FileFilter::filename("x"));
    }

    #[test]
    fn test_matches_filename_and_id() {
        let r = record("a.txt", 10, None);
        assert!(FileFilter::filename("a.txt").matches(&r));
        assert!(!FileFilter::filename("b.txt").matches(&r));
        assert!(FileFilter::id(r.id).matches(&r));
        assert!(!FileFilter::id(FileId::new()).matches(&r));
    }

    #[test]
    fn test_matches_numeric_comparisons() {
        let r = record("a.txt", 10, None);
        assert!(FileFilter::field("length", Comparison::Gt, 5i64).matches(&r));
        assert!(FileFilter::field("length", Comparison::Lte, 10i64).matches(&r));
        assert!(!FileFilter::field("length", Comparison::Lt, 10i64).matches(&r));
        assert!(FileFilter::field("length", Comparison::Eq, 10.0).matches(&r));
    }

    #[test]
    fn test_matches_metadata_and_missing_fields() {
        let with_owner = record("a.txt", 1, Some("alice"));
        let without_owner = record("b.txt", 1, None);

        let filter = FileFilter::metadata("owner", "alice");
        assert!(filter.matches(&with_owner));
        assert!(!filter.matches(&without_owner));

        let ne = FileFilter::field("metadata.owner", Comparison::Ne, "alice");
        assert!(!ne.matches(&with_owner));
        assert!(ne.matches(&without_owner));

        assert!(FileFilter::exists("metadata.owner").matches(&with_owner));
        assert!(!FileFilter::exists("metadata.owner").matches(&without_owner));
    }

    #[test]
    fn test_matches_array_membership() {
        let r = record("a.txt", 1, None);
        assert!(FileFilter::field("aliases", Comparison::Eq, "alt.txt").matches(&r));
        assert!(!FileFilter::field("aliases", Comparison::Eq, "nope.txt").matches(&r));
        assert!(!FileFilter::field("aliases", Comparison::Ne, "other.txt").matches(&r));
    }

    #[test]
    fn test_matches_type_mismatch() {
        let r = record("a.txt", 1, None);
        assert!(!FileFilter::field("filename", Comparison::Eq, 1i64).matches(&r));
        assert!(FileFilter::field("filename", Comparison::Ne, 1i64).matches(&r));
        assert!(!FileFilter::field("filename", Comparison::Gt, 1i64).matches(&r));
    }

    #[test]
    fn test_matches_or() {
        let r = record("a.txt", 1, None);
        let filter = FileFilter::filename("x").or(FileFilter::filename("a.txt"));
        assert!(filter.matches(&r));
    }
}
