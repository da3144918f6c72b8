//! File store facade for gridstore.
//!
//! This module provides high-level file operations including:
//! - Metadata lookup by filter, identifier or filename
//! - Streaming reads and downloads to local files
//! - Streaming writes and uploads from local files
//! - Deletion and renaming

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info};

use super::backend::{Bucket, ByteStream, StoreConnection};
use super::filter::FileFilter;
use super::path::resolve_path;
use super::types::{
    DownloadOptions, FileId, FileMetadata, FindOptions, SortDirection, WriteOptions,
};
use super::DEFAULT_BUCKET_NAME;
use crate::{GridStoreError, Result};

/// File store bound to one bucket of a connection.
///
/// Every operation derives a fresh bucket handle from the connection, so the
/// store holds no per-bucket state and can be shared freely between tasks.
#[derive(Debug, Clone)]
pub struct GridStore<C> {
    connection: C,
    bucket_name: String,
}

impl<C: StoreConnection> GridStore<C> {
    /// Create a store over the [`DEFAULT_BUCKET_NAME`] bucket.
    pub fn new(connection: C) -> Self {
        Self::with_bucket(connection, DEFAULT_BUCKET_NAME)
    }

    /// Create a store over a named bucket.
    pub fn with_bucket(connection: C, bucket_name: impl Into<String>) -> Self {
        Self {
            connection,
            bucket_name: bucket_name.into(),
        }
    }

    /// Name of the bucket this store operates on.
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Build a bucket handle from the connection and bucket name.
    pub fn bucket(&self) -> C::Bucket {
        self.connection.bucket(&self.bucket_name)
    }

    /// List every record matching `filter`, in store order.
    ///
    /// Returns an empty list when nothing matches.
    pub async fn find(&self, filter: &FileFilter) -> Result<Vec<FileMetadata>> {
        self.find_with_options(filter, &FindOptions::default()).await
    }

    /// List records matching `filter` with paging and ordering applied.
    pub async fn find_with_options(
        &self,
        filter: &FileFilter,
        options: &FindOptions,
    ) -> Result<Vec<FileMetadata>> {
        let records = self.bucket().find(filter, options).await?;
        debug!(
            "Found {} record(s) in bucket {}",
            records.len(),
            self.bucket_name
        );
        Ok(records)
    }

    /// Return the first record matching `filter`.
    ///
    /// # Errors
    /// [`GridStoreError::NotFound`] when nothing matches.
    pub async fn find_one(&self, filter: &FileFilter) -> Result<FileMetadata> {
        self.find(filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GridStoreError::NotFound("file".to_string()))
    }

    /// Return the record with the given identifier.
    ///
    /// # Errors
    /// - [`GridStoreError::InvalidIdentifier`] when `id` is not a valid identifier
    /// - [`GridStoreError::NotFound`] when no record has that identifier
    pub async fn find_by_id(&self, id: &str) -> Result<FileMetadata> {
        let id = FileId::parse(id)?;
        self.find_one(&FileFilter::id(id))
            .await
            .map_err(|e| match e {
                GridStoreError::NotFound(_) => GridStoreError::NotFound(format!("file {id}")),
                other => other,
            })
    }

    /// Return the most recently uploaded record with the given filename.
    pub async fn find_by_name(&self, filename: &str) -> Result<FileMetadata> {
        let options = FindOptions::new()
            .sort_by("uploadDate", SortDirection::Descending)
            .limit(1);
        self.find_with_options(&FileFilter::filename(filename), &options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GridStoreError::NotFound(format!("file named {filename:?}")))
    }

    /// Open a stream over the content of the file with `id`.
    ///
    /// The identifier is resolved first; lookup errors are returned before
    /// any stream is opened. Errors raised while reading belong to the caller.
    pub async fn read_file_stream(&self, id: &str) -> Result<ByteStream> {
        let record = self.find_by_id(id).await?;
        self.bucket().open_download_stream(&record.id).await
    }

    /// Download the file with `id` to a local path.
    ///
    /// The destination is chosen by [`resolve_path`]. Returns the path once
    /// every byte has been written and flushed.
    ///
    /// # Errors
    /// - lookup errors from [`find_by_id`](Self::find_by_id)
    /// - [`GridStoreError::PathUnavailable`] when the destination's parent is
    ///   not a directory or the file cannot be created
    /// - [`GridStoreError::Transfer`] when reading or writing fails midway;
    ///   the partial file is left in place
    pub async fn download_file(&self, id: &str, options: &DownloadOptions) -> Result<PathBuf> {
        let record = self.find_by_id(id).await?;
        let path = resolve_path(&record, options);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let is_dir = tokio::fs::metadata(parent)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Err(GridStoreError::PathUnavailable {
                    path: parent.to_path_buf(),
                    source: None,
                });
            }
        }

        let mut source = self.bucket().open_download_stream(&record.id).await?;
        let mut destination = File::create(&path).await.map_err(|e| {
            GridStoreError::PathUnavailable {
                path: path.clone(),
                source: Some(e),
            }
        })?;

        // `copy` settles exactly once: with the byte count, or with the first
        // error from either side.
        let written = tokio::io::copy(&mut source, &mut destination)
            .await
            .map_err(GridStoreError::Transfer)?;
        destination
            .flush()
            .await
            .map_err(GridStoreError::Transfer)?;

        debug!("Downloaded {} bytes of {} to {:?}", written, record.id, path);
        Ok(path)
    }

    /// Store everything read from `source` as a new file.
    ///
    /// # Errors
    /// - [`GridStoreError::Validation`] when `options.filename` is empty
    /// - [`GridStoreError::Transfer`] when `source` fails while being read
    /// - store errors, forwarded as reported
    pub async fn write_file_stream<R>(
        &self,
        mut source: R,
        options: &WriteOptions,
    ) -> Result<FileMetadata>
    where
        R: AsyncRead + Send + Unpin,
    {
        if options.filename.is_empty() {
            return Err(GridStoreError::Validation(
                "filename must not be empty".to_string(),
            ));
        }

        let record = self.bucket().upload_from_reader(&mut source, options).await?;
        info!(
            "Stored {:?} as {} ({} bytes) in bucket {}",
            record.filename, record.id, record.length, self.bucket_name
        );
        Ok(record)
    }

    /// Upload a local file.
    ///
    /// When `delete_file` is true the source is removed afterwards, whether
    /// the upload succeeded, failed, or the returned future was dropped.
    /// Removal failures are logged and otherwise ignored.
    ///
    /// # Errors
    /// - [`GridStoreError::FileNotFound`] when `path` does not exist; nothing
    ///   is uploaded or removed in that case
    /// - [`GridStoreError::Io`] when the existence check itself fails
    /// - any error from [`write_file_stream`](Self::write_file_stream)
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        options: &WriteOptions,
        delete_file: bool,
    ) -> Result<FileMetadata> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            return Err(GridStoreError::FileNotFound(path.to_path_buf()));
        }

        // Owns the source from here on; dropping it removes the file.
        let cleanup = delete_file
            .then(|| TempPath::try_from_path(path))
            .transpose()?;

        let result = match File::open(path).await {
            Ok(source) => self.write_file_stream(source, options).await,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(GridStoreError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => Err(GridStoreError::Io(e)),
        };

        if let Some(cleanup) = cleanup {
            if let Err(e) = cleanup.close() {
                debug!("Could not remove upload source {:?}: {}", path, e);
            }
        }

        result
    }

    /// Delete the file with `id`.
    ///
    /// Returns `true` once the store confirms the deletion. Store failures,
    /// including an unknown identifier, are returned as reported by the
    /// store rather than as [`GridStoreError::NotFound`].
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = FileId::parse(id)?;
        self.bucket().delete(&id).await?;
        info!("Deleted {} from bucket {}", id, self.bucket_name);
        Ok(true)
    }

    /// Change the filename of the file with `id`.
    ///
    /// Store failures are forwarded the same way as in [`delete`](Self::delete).
    pub async fn rename(&self, id: &str, filename: &str) -> Result<()> {
        if filename.is_empty() {
            return Err(GridStoreError::Validation(
                "filename must not be empty".to_string(),
            ));
        }

        let id = FileId::parse(id)?;
        self.bucket().rename(&id, filename).await?;
        info!("Renamed {} to {:?} in bucket {}", id, filename, self.bucket_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConnection;
    use tokio::io::AsyncReadExt;

    fn store() -> GridStore<MemoryConnection> {
        GridStore::new(MemoryConnection::new())
    }

    #[test]
    fn test_default_bucket_name() {
        assert_eq!(store().bucket_name(), DEFAULT_BUCKET_NAME);
        assert_eq!(store().bucket().name(), "fs");
    }

    #[test]
    fn test_with_bucket() {
        let store = GridStore::with_bucket(MemoryConnection::new(), "photos");
        assert_eq!(store.bucket_name(), "photos");
        assert_eq!(store.bucket().name(), "photos");
    }

    #[tokio::test]
    async fn test_write_rejects_empty_filename() {
        let result = store()
            .write_file_stream(&b"data"[..], &WriteOptions::new(""))
            .await;
        assert!(matches!(result, Err(GridStoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_find_one_not_found() {
        let result = store().find_one(&FileFilter::All).await;
        assert!(matches!(result, Err(GridStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_name_prefers_newest() {
        let store = store();
        store
            .write_file_stream(&b"v1"[..], &WriteOptions::new("notes.txt"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newest = store
            .write_file_stream(&b"v2"[..], &WriteOptions::new("notes.txt"))
            .await
            .unwrap();

        let found = store.find_by_name("notes.txt").await.unwrap();
        assert_eq!(found.id, newest.id);

        let result = store.find_by_name("missing.txt").await;
        assert!(matches!(result, Err(GridStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_read_file_stream_content() {
        let store = store();
        let record = store
            .write_file_stream(&b"stream me"[..], &WriteOptions::new("s.txt"))
            .await
            .unwrap();

        let mut stream = store.read_file_stream(&record.id.to_hex()).await.unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "stream me");
    }

    #[tokio::test]
    async fn test_rename_validation_and_invalid_id() {
        let store = store();
        let result = store.rename("507f1f77bcf86cd799439011", "").await;
        assert!(matches!(result, Err(GridStoreError::Validation(_))));

        let result = store.rename("bad", "x.txt").await;
        assert!(matches!(result, Err(GridStoreError::InvalidIdentifier(_))));
    }

    #[tokio::test]
    async fn test_delete_invalid_id() {
        let result = store().delete("zzz").await;
        assert!(matches!(result, Err(GridStoreError::InvalidIdentifier(_))));
    }
}
