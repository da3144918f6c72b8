//! File store module for gridstore.
//!
//! This module provides the chunked file store facade:
//! - Metadata queries over a bucket's files collection
//! - Streaming downloads to readers or local files
//! - Streaming uploads from readers or local files
//! - Deletion and renaming by identifier
//!
//! Storage itself is delegated to a backend implementing [`StoreConnection`]:
//! [`MongoConnection`] for MongoDB GridFS, [`MemoryConnection`] in process.

mod backend;
mod facade;
mod filter;
mod memory;
mod mongo;
mod path;
mod types;

pub use backend::{Bucket, ByteStream, StoreConnection};
pub use facade::GridStore;
pub use filter::{Comparison, FileFilter};
pub use memory::{MemoryBucket, MemoryConnection};
pub use mongo::{MongoBucket, MongoConnection};
pub use path::resolve_path;
pub use types::{
    metadata_from_document, metadata_to_document, ContentHash, DownloadName, DownloadOptions,
    FileId, FileMetadata, FindOptions, Metadata, MetadataValue, SortDirection, WriteOptions,
};

/// Bucket name used when none is configured.
pub const DEFAULT_BUCKET_NAME: &str = "fs";

/// Chunk size applied by the store when an upload does not set one (255 KiB).
pub const DEFAULT_CHUNK_SIZE: u32 = 255 * 1024;
