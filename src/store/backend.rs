//! Backend trait definitions for gridstore.
//!
//! A [`StoreConnection`] is a cheap, cloneable handle to an open database.
//! It hands out [`Bucket`]s by name; a bucket is rebuilt from the
//! connection on every access and never cached.

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::filter::FileFilter;
use super::types::{FileId, FileMetadata, FindOptions, WriteOptions};
use crate::Result;

/// Readable byte stream over a stored file's content.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Handle to an open store, able to derive buckets by name.
pub trait StoreConnection: Send + Sync {
    /// The bucket type this connection produces.
    type Bucket: Bucket;

    /// Build a bucket handle for `name`.
    fn bucket(&self, name: &str) -> Self::Bucket;
}

/// Chunked file storage over one named bucket.
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Name of the bucket.
    fn name(&self) -> &str;

    /// List metadata records matching `filter`.
    async fn find(&self, filter: &FileFilter, options: &FindOptions) -> Result<Vec<FileMetadata>>;

    /// Open a stream over the content of the file with `id`.
    async fn open_download_stream(&self, id: &FileId) -> Result<ByteStream>;

    /// Store everything read from `source` as a new file.
    ///
    /// Read failures on `source` are reported as
    /// [`GridStoreError::Transfer`](crate::GridStoreError::Transfer).
    async fn upload_from_reader(
        &self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        options: &WriteOptions,
    ) -> Result<FileMetadata>;

    /// Change the filename of the file with `id`.
    async fn rename(&self, id: &FileId, filename: &str) -> Result<()>;

    /// Delete the file with `id` and all of its chunks.
    async fn delete(&self, id: &FileId) -> Result<()>;
}
