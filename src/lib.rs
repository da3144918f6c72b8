//! gridstore - async file storage over MongoDB GridFS buckets
//!
//! Wraps a bucket's chunked file storage in a small set of async
//! operations: query metadata, stream a file out, download it to a local
//! path, stream or upload a file in, rename and delete.

pub mod config;
pub mod error;
pub mod logging;
pub mod store;

pub use config::Config;
pub use error::{GridStoreError, Result};
pub use store::{
    resolve_path, Bucket, ByteStream, Comparison, ContentHash, DownloadName, DownloadOptions,
    FileFilter, FileId, FileMetadata, FindOptions, GridStore, MemoryConnection, Metadata,
    MetadataValue, MongoConnection, SortDirection, StoreConnection, WriteOptions,
    DEFAULT_BUCKET_NAME,
};
