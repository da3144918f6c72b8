//! Local destination paths for downloads.

use std::path::PathBuf;

use uuid::Uuid;

use super::types::{DownloadName, DownloadOptions, FileMetadata};

/// Compute where a download of `record` should be written.
///
/// | `target_dir` | `filename`             | result                         |
/// |--------------|------------------------|--------------------------------|
/// | unset        | `Named(s)`             | `{temp}/{s}`                   |
/// | unset        | `FromRecord`           | `{temp}/{record.id}`           |
/// | unset        | unset                  | `{temp}/{random uuid}`         |
/// | set          | `Named(s)`             | `{target_dir}/{s}`             |
/// | set          | `FromRecord`           | `{record.filename}`            |
/// | set          | unset                  | `{target_dir}/{random uuid}`   |
///
/// `{temp}` is [`std::env::temp_dir`]. With a target directory,
/// `FromRecord` yields the record's filename as-is and does not join it
/// onto `target_dir`; existing callers depend on that.
///
/// Performs no I/O.
pub fn resolve_path(record: &FileMetadata, options: &DownloadOptions) -> PathBuf {
    match (&options.target_dir, &options.filename) {
        (None, Some(DownloadName::Named(name))) => std::env::temp_dir().join(name),
        (None, Some(DownloadName::FromRecord)) => std::env::temp_dir().join(record.id.to_hex()),
        (None, None) => std::env::temp_dir().join(random_name()),
        (Some(dir), Some(DownloadName::Named(name))) => dir.join(name),
        (Some(_), Some(DownloadName::FromRecord)) => PathBuf::from(&record.filename),
        (Some(dir), None) => dir.join(random_name()),
    }
}

fn random_name() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::{FileId, Metadata};
    use chrono::Utc;
    use std::path::Path;

    fn record() -> FileMetadata {
        FileMetadata {
            id: FileId::parse("507f1f77bcf86cd799439011").unwrap(),
            length: 3,
            chunk_size: 261_120,
            upload_date: Utc::now(),
            content_hash: None,
            filename: "report.pdf".to_string(),
            content_type: None,
            aliases: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    fn is_uuid(name: &std::ffi::OsStr) -> bool {
        name.to_str().is_some_and(|s| Uuid::parse_str(s).is_ok())
    }

    #[test]
    fn test_temp_dir_named() {
        let path = resolve_path(&record(), &DownloadOptions::new().named("out.bin"));
        assert_eq!(path, std::env::temp_dir().join("out.bin"));
    }

    #[test]
    fn test_temp_dir_from_record_uses_id() {
        let path = resolve_path(&record(), &DownloadOptions::new().from_record());
        assert_eq!(
            path,
            std::env::temp_dir().join("507f1f77bcf86cd799439011")
        );
    }

    #[test]
    fn test_temp_dir_random() {
        let options = DownloadOptions::new();
        let first = resolve_path(&record(), &options);
        let second = resolve_path(&record(), &options);

        assert_eq!(first.parent(), Some(std::env::temp_dir().as_path()));
        assert!(is_uuid(first.file_name().unwrap()));
        assert_ne!(first, second);
    }

    #[test]
    fn test_target_dir_named() {
        let options = DownloadOptions::new().named("out.bin").in_dir("/data/downloads");
        assert_eq!(
            resolve_path(&record(), &options),
            Path::new("/data/downloads/out.bin")
        );
    }

    #[test]
    fn test_target_dir_from_record_ignores_dir() {
        // The record filename is returned on its own, without the target directory.
        let options = DownloadOptions::new().from_record().in_dir("/data/downloads");
        assert_eq!(resolve_path(&record(), &options), Path::new("report.pdf"));
    }

    #[test]
    fn test_target_dir_random() {
        let options = DownloadOptions::new().in_dir("/data/downloads");
        let path = resolve_path(&record(), &options);

        assert_eq!(path.parent(), Some(Path::new("/data/downloads")));
        assert!(is_uuid(path.file_name().unwrap()));
    }
}
