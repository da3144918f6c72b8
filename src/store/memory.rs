//! In-process store backend.
//!
//! Keeps every bucket's files in memory. Records come back in insertion
//! order, deleting an unknown id is an error, and the default chunk size
//! matches the driver's, so code exercised against this backend sees the
//! same observable behavior it would against MongoDB.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{Bucket, ByteStream, StoreConnection};
use super::filter::FileFilter;
use super::types::{
    ContentHash, FileId, FileMetadata, FindOptions, SortDirection, WriteOptions,
};
use super::DEFAULT_CHUNK_SIZE;
use crate::{GridStoreError, Result};

#[derive(Debug, Clone)]
struct StoredFile {
    record: FileMetadata,
    content: Arc<[u8]>,
}

type BucketTable = HashMap<String, Vec<StoredFile>>;

/// Connection to an in-memory store.
///
/// Clones share the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    buckets: Arc<RwLock<BucketTable>>,
}

impl MemoryConnection {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreConnection for MemoryConnection {
    type Bucket = MemoryBucket;

    fn bucket(&self, name: &str) -> MemoryBucket {
        MemoryBucket {
            name: name.to_string(),
            buckets: Arc::clone(&self.buckets),
        }
    }
}

/// A named bucket inside a [`MemoryConnection`].
#[derive(Debug, Clone)]
pub struct MemoryBucket {
    name: String,
    buckets: Arc<RwLock<BucketTable>>,
}

impl MemoryBucket {
    fn missing(&self, id: &FileId) -> GridStoreError {
        GridStoreError::Store(format!("file {id} not found in bucket {}", self.name))
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: &FileFilter, options: &FindOptions) -> Result<Vec<FileMetadata>> {
        let buckets = self.buckets.read().await;
        let mut records: Vec<FileMetadata> = buckets
            .get(&self.name)
            .map(|files| {
                files
                    .iter()
                    .filter(|f| filter.matches(&f.record))
                    .map(|f| f.record.clone())
                    .collect()
            })
            .unwrap_or_default();
        drop(buckets);

        if let Some((path, direction)) = &options.sort {
            // Stable sort keeps insertion order among equal keys.
            records.sort_by(|a, b| {
                let ordering = match (a.field_value(path), b.field_value(path)) {
                    (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        let skip = options.skip.unwrap_or(0) as usize;
        // A zero limit means no limit, as with the driver.
        let limit = match options.limit {
            None | Some(0) => usize::MAX,
            Some(l) => l as usize,
        };
        Ok(records.into_iter().skip(skip).take(limit).collect())
    }

    async fn open_download_stream(&self, id: &FileId) -> Result<ByteStream> {
        let buckets = self.buckets.read().await;
        let content = buckets
            .get(&self.name)
            .and_then(|files| files.iter().find(|f| f.record.id == *id))
            .map(|f| Arc::clone(&f.content))
            .ok_or_else(|| self.missing(id))?;

        Ok(Box::pin(Cursor::new(content)))
    }

    async fn upload_from_reader(
        &self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        options: &WriteOptions,
    ) -> Result<FileMetadata> {
        let mut content = Vec::new();
        source
            .read_to_end(&mut content)
            .await
            .map_err(GridStoreError::Transfer)?;

        let record = FileMetadata {
            id: FileId::new(),
            length: content.len() as u64,
            chunk_size: options.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            upload_date: Utc::now(),
            content_hash: Some(ContentHash::Sha256(format!(
                "{:x}",
                Sha256::digest(&content)
            ))),
            filename: options.filename.clone(),
            content_type: options.content_type.clone(),
            aliases: options.aliases.clone(),
            metadata: options.metadata.clone(),
        };

        debug!(
            "Stored {} bytes as {} in memory bucket {}",
            record.length, record.id, self.name
        );

        self.buckets
            .write()
            .await
            .entry(self.name.clone())
            .or_default()
            .push(StoredFile {
                record: record.clone(),
                content: content.into(),
            });

        Ok(record)
    }

    async fn rename(&self, id: &FileId, filename: &str) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let file = buckets
            .get_mut(&self.name)
            .and_then(|files| files.iter_mut().find(|f| f.record.id == *id))
            .ok_or_else(|| self.missing(id))?;

        file.record.filename = filename.to_string();
        Ok(())
    }

    async fn delete(&self, id: &FileId) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let files = buckets.get_mut(&self.name).ok_or_else(|| self.missing(id))?;
        let position = files
            .iter()
            .position(|f| f.record.id == *id)
            .ok_or_else(|| self.missing(id))?;

        files.remove(position);
        Ok(())
    }
}
