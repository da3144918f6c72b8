//! Live MongoDB tests.
//!
//! Ignored by default. Run with a reachable server:
//!
//! ```text
//! MONGODB_URI=mongodb://localhost:27017 cargo test --test mongo_live -- --ignored
//! ```

mod common;

use common::read_all;
use gridstore::config::StoreConfig;
use gridstore::{
    DownloadOptions, FileFilter, GridStore, GridStoreError, MongoConnection, WriteOptions,
};
use tempfile::TempDir;

async fn live_store() -> GridStore<MongoConnection> {
    let config = StoreConfig {
        uri: std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
        database: format!("gridstore_test_{}", uuid::Uuid::new_v4().simple()),
        ..StoreConfig::default()
    };
    let connection = MongoConnection::connect(&config)
        .await
        .expect("Failed to connect to MongoDB");
    GridStore::new(connection)
}

#[tokio::test]
#[ignore = "requires a running MongoDB server"]
async fn test_live_round_trip() {
    let store = live_store().await;
    let dir = TempDir::new().unwrap();

    let options = WriteOptions::new("live.txt")
        .with_content_type("text/plain")
        .with_alias("alias.txt")
        .with_metadata("suite", "live");
    let record = store
        .write_file_stream(&b"hello from gridstore"[..], &options)
        .await
        .unwrap();

    assert_eq!(record.filename, "live.txt");
    assert_eq!(record.length, 20);
    assert_eq!(record.content_type.as_deref(), Some("text/plain"));
    assert_eq!(record.aliases, vec!["alias.txt".to_string()]);

    let id = record.id.to_hex();
    let found = store
        .find_one(&FileFilter::metadata("suite", "live"))
        .await
        .unwrap();
    assert_eq!(found.id, record.id);

    let bytes = read_all(store.read_file_stream(&id).await.unwrap()).await;
    assert_eq!(bytes, b"hello from gridstore");

    let path = store
        .download_file(&id, &DownloadOptions::new().named("out.txt").in_dir(dir.path()))
        .await
        .unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"hello from gridstore");

    assert!(store.delete(&id).await.unwrap());
    assert!(matches!(
        store.find_by_id(&id).await,
        Err(GridStoreError::NotFound(_))
    ));
    assert!(matches!(
        store.delete(&id).await,
        Err(GridStoreError::Store(_))
    ));

    store.connection().database().drop().await.unwrap();
}
