//! Test helpers for store integration tests.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use gridstore::store::MemoryBucket;
use gridstore::{
    Bucket, ByteStream, FileFilter, FileId, FileMetadata, FindOptions, GridStore,
    MemoryConnection, Result, StoreConnection, WriteOptions,
};

/// Create a store over a fresh in-memory connection.
pub fn memory_store() -> GridStore<MemoryConnection> {
    GridStore::new(MemoryConnection::new())
}

/// Write `content` to `dir/name` and return the path.
pub fn write_source(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write source file");
    path
}

/// Drain a stream into a byte vector.
pub async fn read_all(mut stream: ByteStream) -> Vec<u8> {
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .await
        .expect("Failed to read stream");
    buf
}

/// Reader that yields `prefix` and then fails.
pub struct FailingReader {
    prefix: Vec<u8>,
    sent: bool,
}

impl FailingReader {
    pub fn new(prefix: &[u8]) -> Self {
        Self {
            prefix: prefix.to_vec(),
            sent: false,
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.sent && !self.prefix.is_empty() {
            self.sent = true;
            let len = self.prefix.len().min(buf.remaining());
            buf.put_slice(&self.prefix[..len]);
            return Poll::Ready(Ok(()));
        }
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "source went away",
        )))
    }
}

/// Memory-backed connection whose downloads stop after `keep` bytes with an error.
#[derive(Debug, Clone, Default)]
pub struct TruncatingConnection {
    inner: MemoryConnection,
    keep: usize,
}

impl TruncatingConnection {
    pub fn new(keep: usize) -> Self {
        Self {
            inner: MemoryConnection::new(),
            keep,
        }
    }
}

impl StoreConnection for TruncatingConnection {
    type Bucket = TruncatingBucket;

    fn bucket(&self, name: &str) -> TruncatingBucket {
        TruncatingBucket {
            inner: self.inner.bucket(name),
            keep: self.keep,
        }
    }
}

pub struct TruncatingBucket {
    inner: MemoryBucket,
    keep: usize,
}

#[async_trait]
impl Bucket for TruncatingBucket {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find(&self, filter: &FileFilter, options: &FindOptions) -> Result<Vec<FileMetadata>> {
        self.inner.find(filter, options).await
    }

    async fn open_download_stream(&self, id: &FileId) -> Result<ByteStream> {
        let mut content = read_all(self.inner.open_download_stream(id).await?).await;
        content.truncate(self.keep);
        Ok(Box::pin(FailingReader::new(&content)))
    }

    async fn upload_from_reader(
        &self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        options: &WriteOptions,
    ) -> Result<FileMetadata> {
        self.inner.upload_from_reader(source, options).await
    }

    async fn rename(&self, id: &FileId, filename: &str) -> Result<()> {
        self.inner.rename(id, filename).await
    }

    async fn delete(&self, id: &FileId) -> Result<()> {
        self.inner.delete(id).await
    }
}
