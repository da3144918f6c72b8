//! MongoDB store backend.
//!
//! Chunking, chunk reassembly and index management are done by the
//! driver's `GridFsBucket`. Metadata queries read the `<bucket>.files`
//! collection directly so that every field of the files document
//! (`contentType`, `aliases`, `md5`) is visible, not just the subset the
//! driver models.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::gridfs::GridFsBucket;
use mongodb::options::GridFsBucketOptions;
use mongodb::{Client, Collection, Database};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::compat::{FuturesAsyncReadCompatExt, FuturesAsyncWriteCompatExt};
use tracing::{debug, info};

use super::backend::{Bucket, ByteStream, StoreConnection};
use super::filter::FileFilter;
use super::types::{
    metadata_from_document, metadata_to_document, ContentHash, FileId, FileMetadata,
    FindOptions, SortDirection, WriteOptions,
};
use crate::config::StoreConfig;
use crate::{GridStoreError, Result};

/// Connection to a MongoDB database.
///
/// Wraps an already-open [`Database`]; cloning is cheap and shares the
/// driver's connection pool.
#[derive(Debug, Clone)]
pub struct MongoConnection {
    database: Database,
    chunk_size: Option<u32>,
}

impl MongoConnection {
    /// Wrap an open database handle.
    pub fn new(database: Database) -> Self {
        Self {
            database,
            chunk_size: None,
        }
    }

    /// Open a client for `config.uri` and select `config.database`.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        info!("Connecting to MongoDB database {:?}", config.database);

        let client = Client::with_uri_str(&config.uri).await?;
        let database = client.database(&config.database);

        Ok(Self {
            database,
            chunk_size: config.chunk_size_bytes,
        })
    }

    /// Use this chunk size for uploads that do not set their own.
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// The wrapped database handle.
    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl StoreConnection for MongoConnection {
    type Bucket = MongoBucket;

    fn bucket(&self, name: &str) -> MongoBucket {
        let mut options = GridFsBucketOptions::default();
        options.bucket_name = Some(name.to_string());
        options.chunk_size_bytes = self.chunk_size;

        MongoBucket {
            name: name.to_string(),
            bucket: self.database.gridfs_bucket(options),
            files: self.database.collection(&format!("{name}.files")),
        }
    }
}

/// A GridFS bucket.
#[derive(Debug, Clone)]
pub struct MongoBucket {
    name: String,
    bucket: GridFsBucket,
    files: Collection<Document>,
}

impl MongoBucket {
    async fn fetch(&self, id: &FileId) -> Result<Option<FileMetadata>> {
        self.files
            .find_one(doc! { "_id": Bson::from(*id) })
            .await?
            .map(record_from_document)
            .transpose()
    }
}

#[async_trait]
impl Bucket for MongoBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: &FileFilter, options: &FindOptions) -> Result<Vec<FileMetadata>> {
        let query = filter.to_document();
        debug!("Querying {}.files with {}", self.name, query);

        let mut action = self.files.find(query);
        if let Some(skip) = options.skip {
            action = action.skip(skip);
        }
        if let Some(limit) = options.limit {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some((path, direction)) = &options.sort {
            let order = match direction {
                SortDirection::Ascending => 1,
                SortDirection::Descending => -1,
            };
            let mut sort = Document::new();
            sort.insert(path.as_str(), order);
            action = action.sort(sort);
        }

        let documents: Vec<Document> = action.await?.try_collect().await?;
        documents.into_iter().map(record_from_document).collect()
    }

    async fn open_download_stream(&self, id: &FileId) -> Result<ByteStream> {
        let stream = self.bucket.open_download_stream(Bson::from(*id)).await?;
        Ok(Box::pin(stream.compat()))
    }

    async fn upload_from_reader(
        &self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        options: &WriteOptions,
    ) -> Result<FileMetadata> {
        let id = FileId::new();

        let mut action = self
            .bucket
            .open_upload_stream(&options.filename)
            .id(Bson::from(id));
        if let Some(chunk_size) = options.chunk_size {
            action = action.chunk_size_bytes(chunk_size);
        }
        if !options.metadata.is_empty() {
            action = action.metadata(metadata_to_document(options.metadata.clone()));
        }
        let upload = action.await?;

        // Dropping an unfinished upload lets the driver discard its chunks.
        let mut writer = upload.compat_write();
        let written = tokio::io::copy(source, &mut writer)
            .await
            .map_err(GridStoreError::Transfer)?;
        writer.shutdown().await.map_err(GridStoreError::Transfer)?;
        debug!("Wrote {} bytes to {}.chunks as {}", written, self.name, id);

        // The driver's upload options have no contentType or aliases fields.
        let mut extra = Document::new();
        if let Some(content_type) = &options.content_type {
            extra.insert("contentType", content_type.as_str());
        }
        if !options.aliases.is_empty() {
            extra.insert("aliases", options.aliases.clone());
        }
        if !extra.is_empty() {
            self.files
                .update_one(doc! { "_id": Bson::from(id) }, doc! { "$set": extra })
                .await?;
        }

        self.fetch(&id).await?.ok_or_else(|| {
            GridStoreError::Store(format!(
                "upload {id} completed but {}.files has no document for it",
                self.name
            ))
        })
    }

    async fn rename(&self, id: &FileId, filename: &str) -> Result<()> {
        self.bucket.rename(Bson::from(*id), filename).await?;
        Ok(())
    }

    async fn delete(&self, id: &FileId) -> Result<()> {
        self.bucket.delete(Bson::from(*id)).await?;
        Ok(())
    }
}

fn read_u64(doc: &Document, key: &str) -> u64 {
    match doc.get(key) {
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Double(f)) if *f >= 0.0 => *f as u64,
        _ => 0,
    }
}

/// Map a `<bucket>.files` document onto a [`FileMetadata`].
fn record_from_document(doc: Document) -> Result<FileMetadata> {
    let id = doc
        .get_object_id("_id")
        .map_err(|e| GridStoreError::Store(format!("files document has no ObjectId _id: {e}")))?;

    let upload_date = doc
        .get_datetime("uploadDate")
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()))
        .unwrap_or_default();

    let aliases = doc
        .get_array("aliases")
        .map(|items| {
            items
                .iter()
                .filter_map(|b| b.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let metadata = doc
        .get_document("metadata")
        .ok()
        .cloned()
        .map(metadata_from_document)
        .unwrap_or_default();

    Ok(FileMetadata {
        id: FileId::from(id),
        length: read_u64(&doc, "length"),
        chunk_size: u32::try_from(read_u64(&doc, "chunkSize")).unwrap_or(u32::MAX),
        upload_date,
        content_hash: doc
            .get_str("md5")
            .ok()
            .map(|hex| ContentHash::Md5(hex.to_string())),
        filename: doc.get_str("filename").unwrap_or_default().to_string(),
        content_type: doc.get_str("contentType").ok().map(str::to_string),
        aliases,
        metadata,
    })
}
