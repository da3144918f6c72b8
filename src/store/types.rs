//! Value types shared by the facade and the storage backends.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{GridStoreError, Result};

/// Identifier of a stored file.
///
/// Wraps the store's `ObjectId`; its text form is 24 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(ObjectId);

impl FileId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// Parse an identifier from its hex form.
    pub fn parse(s: &str) -> Result<Self> {
        ObjectId::parse_str(s)
            .map(Self)
            .map_err(|e| GridStoreError::InvalidIdentifier(format!("{s:?}: {e}")))
    }

    /// The underlying `ObjectId`.
    pub fn object_id(&self) -> ObjectId {
        self.0
    }

    /// Hex form of the identifier.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ObjectId> for FileId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl From<FileId> for Bson {
    fn from(id: FileId) -> Self {
        Bson::ObjectId(id.0)
    }
}

impl FromStr for FileId {
    type Err = GridStoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl Serialize for FileId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_hex())
    }
}

/// Free-form metadata attached to a stored file.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single value in a [`Metadata`] bag.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    ObjectId(ObjectId),
    Array(Vec<MetadataValue>),
    Document(Metadata),
}

impl MetadataValue {
    /// Compare two values the way the store orders them within one type.
    ///
    /// Integers and floats compare numerically with each other. Values of
    /// unrelated types are unordered.
    pub fn compare(&self, other: &MetadataValue) -> Option<Ordering> {
        use MetadataValue::*;

        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (String(a), String(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (ObjectId(a), ObjectId(b)) => Some(a.bytes().cmp(&b.bytes())),
            (Array(a), Array(b)) if a == b => Some(Ordering::Equal),
            (Document(a), Document(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<i32> for MetadataValue {
    fn from(v: i32) -> Self {
        MetadataValue::Int(i64::from(v))
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(v: DateTime<Utc>) -> Self {
        MetadataValue::DateTime(v)
    }
}

impl From<FileId> for MetadataValue {
    fn from(v: FileId) -> Self {
        MetadataValue::ObjectId(v.object_id())
    }
}

impl From<MetadataValue> for Bson {
    fn from(value: MetadataValue) -> Self {
        match value {
            MetadataValue::Null => Bson::Null,
            MetadataValue::Bool(b) => Bson::Boolean(b),
            MetadataValue::Int(i) => Bson::Int64(i),
            MetadataValue::Float(f) => Bson::Double(f),
            MetadataValue::String(s) => Bson::String(s),
            MetadataValue::DateTime(dt) => {
                Bson::DateTime(bson::DateTime::from_millis(dt.timestamp_millis()))
            }
            MetadataValue::ObjectId(oid) => Bson::ObjectId(oid),
            MetadataValue::Array(items) => Bson::Array(items.into_iter().map(Bson::from).collect()),
            MetadataValue::Document(map) => Bson::Document(metadata_to_document(map)),
        }
    }
}

impl From<Bson> for MetadataValue {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => MetadataValue::Null,
            Bson::Boolean(b) => MetadataValue::Bool(b),
            Bson::Int32(i) => MetadataValue::Int(i64::from(i)),
            Bson::Int64(i) => MetadataValue::Int(i),
            Bson::Double(f) => MetadataValue::Float(f),
            Bson::String(s) => MetadataValue::String(s),
            Bson::DateTime(dt) => match DateTime::from_timestamp_millis(dt.timestamp_millis()) {
                Some(dt) => MetadataValue::DateTime(dt),
                None => MetadataValue::Int(dt.timestamp_millis()),
            },
            Bson::ObjectId(oid) => MetadataValue::ObjectId(oid),
            Bson::Array(items) => {
                MetadataValue::Array(items.into_iter().map(MetadataValue::from).collect())
            }
            Bson::Document(doc) => MetadataValue::Document(metadata_from_document(doc)),
            // Remaining BSON types have no counterpart; keep their extended-JSON text.
            other => MetadataValue::String(other.to_string()),
        }
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => MetadataValue::Null,
            Value::Bool(b) => MetadataValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => MetadataValue::Int(i),
                None => MetadataValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => MetadataValue::String(s),
            Value::Array(items) => {
                MetadataValue::Array(items.into_iter().map(MetadataValue::from).collect())
            }
            Value::Object(map) => MetadataValue::Document(
                map.into_iter()
                    .map(|(k, v)| (k, MetadataValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for MetadataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            MetadataValue::Null => serializer.serialize_none(),
            MetadataValue::Bool(b) => serializer.serialize_bool(*b),
            MetadataValue::Int(i) => serializer.serialize_i64(*i),
            MetadataValue::Float(f) => serializer.serialize_f64(*f),
            MetadataValue::String(s) => serializer.serialize_str(s),
            MetadataValue::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            MetadataValue::ObjectId(oid) => serializer.serialize_str(&oid.to_hex()),
            MetadataValue::Array(items) => serializer.collect_seq(items),
            MetadataValue::Document(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Convert a metadata bag into a BSON document.
pub fn metadata_to_document(metadata: Metadata) -> Document {
    metadata
        .into_iter()
        .map(|(k, v)| (k, Bson::from(v)))
        .collect()
}

/// Convert a BSON document into a metadata bag.
pub fn metadata_from_document(doc: Document) -> Metadata {
    doc.into_iter()
        .map(|(k, v)| (k, MetadataValue::from(v)))
        .collect()
}

/// Content digest recorded alongside a file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "algorithm", content = "hex", rename_all = "lowercase")]
pub enum ContentHash {
    /// The `md5` field some GridFS writers add to the files document.
    Md5(String),
    /// SHA-256 of the content, kept by the memory backend.
    Sha256(String),
}

impl ContentHash {
    /// Lowercase hex digest.
    pub fn hex(&self) -> &str {
        match self {
            ContentHash::Md5(hex) | ContentHash::Sha256(hex) => hex,
        }
    }
}

/// Metadata record of a stored file, as reported by the store.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FileMetadata {
    /// Unique file identifier.
    pub id: FileId,
    /// File size in bytes.
    pub length: u64,
    /// Chunk size used when the file was written.
    pub chunk_size: u32,
    /// When the upload completed.
    pub upload_date: DateTime<Utc>,
    /// Content digest recorded by the store, if any.
    pub content_hash: Option<ContentHash>,
    /// Filename given at upload.
    pub filename: String,
    /// MIME content type.
    pub content_type: Option<String>,
    /// Alternate names.
    pub aliases: Vec<String>,
    /// Free-form metadata.
    pub metadata: Metadata,
}

impl FileMetadata {
    /// Look up a field by its store document path (`filename`, `metadata.owner`, ...).
    ///
    /// Returns `None` when the field is absent. Empty `aliases` and
    /// `metadata` count as absent, since the store does not write them.
    pub fn field_value(&self, path: &str) -> Option<MetadataValue> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let value = match head {
            "_id" => MetadataValue::ObjectId(self.id.object_id()),
            "filename" => MetadataValue::String(self.filename.clone()),
            "length" => MetadataValue::Int(i64::try_from(self.length).unwrap_or(i64::MAX)),
            "chunkSize" => MetadataValue::Int(i64::from(self.chunk_size)),
            "uploadDate" => MetadataValue::DateTime(self.upload_date),
            "md5" => match &self.content_hash {
                Some(ContentHash::Md5(hex)) => MetadataValue::String(hex.clone()),
                _ => return None,
            },
            "contentType" => MetadataValue::String(self.content_type.clone()?),
            "aliases" | "metadata" if self.is_unset(head) => return None,
            "aliases" => MetadataValue::Array(
                self.aliases
                    .iter()
                    .cloned()
                    .map(MetadataValue::String)
                    .collect(),
            ),
            "metadata" => MetadataValue::Document(self.metadata.clone()),
            _ => return None,
        };

        match rest {
            None => Some(value),
            Some(rest) => rest.split('.').try_fold(value, |current, key| match current {
                MetadataValue::Document(mut map) => map.remove(key),
                _ => None,
            }),
        }
    }

    fn is_unset(&self, field: &str) -> bool {
        match field {
            "aliases" => self.aliases.is_empty(),
            "metadata" => self.metadata.is_empty(),
            _ => false,
        }
    }
}

/// Options describing a new upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    /// Filename to record. Required.
    pub filename: String,
    /// Chunk size override, in bytes.
    pub chunk_size: Option<u32>,
    /// MIME content type.
    pub content_type: Option<String>,
    /// Alternate names.
    pub aliases: Vec<String>,
    /// Free-form metadata.
    pub metadata: Metadata,
}

impl WriteOptions {
    /// Create upload options for the given filename.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// How a downloaded file is named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadName {
    /// Use this literal filename.
    Named(String),
    /// Derive the name from the record (see [`resolve_path`](super::resolve_path)).
    FromRecord,
}

/// Options controlling where a download lands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Naming strategy; a random name is generated when unset.
    pub filename: Option<DownloadName>,
    /// Directory to write into; the system temp dir when unset.
    pub target_dir: Option<PathBuf>,
}

impl DownloadOptions {
    /// Create default download options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a literal filename.
    pub fn named(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(DownloadName::Named(filename.into()));
        self
    }

    /// Derive the filename from the record.
    pub fn from_record(mut self) -> Self {
        self.filename = Some(DownloadName::FromRecord);
        self
    }

    /// Write into the given directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }
}

/// Sort direction for [`FindOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Paging and ordering for metadata queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Number of leading matches to skip.
    pub skip: Option<u64>,
    /// Maximum number of records to return.
    pub limit: Option<u64>,
    /// Field path and direction to sort by.
    pub sort: Option<(String, SortDirection)>,
}

impl FindOptions {
    /// Create empty find options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the first `skip` matches.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Return at most `limit` records. Zero means no limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sort by a field path.
    pub fn sort_by(mut self, path: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some((path.into(), direction));
        self
    }
}
