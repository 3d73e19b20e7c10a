//! File-based offload: the wire payload names a file in a shared directory

use super::decode_reference;
use crate::{converter::Converter, encoder::Encoder, serialization, sink::ErrorSink, value::Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Receiving side: reads the named file, hands its bytes to the base converter
/// and deletes the file.
#[derive(Debug, Clone)]
pub struct FileOffload {
    directory: PathBuf,
    base: Box<Converter>,
}

impl FileOffload {
    /// Create new file offload converter
    pub fn new(directory: impl Into<PathBuf>, base: Converter) -> Self {
        Self {
            directory: directory.into(),
            base: Box::new(base),
        }
    }

    /// Shared directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Wrapped converter
    pub fn base(&self) -> &Converter {
        &self.base
    }

    pub(crate) async fn resolve(&self, payload: &[u8], errors: &mut ErrorSink) -> Option<Value> {
        let filename = decode_reference(payload, "filename", errors)?;

        if Path::new(&filename).components().count() != 1 {
            errors.add(format!("Not a plain filename: {}", filename));
            return None;
        }

        let path = self.directory.join(&filename);
        let bytes = match serialization::read_file(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                errors.add(format!(
                    "Failed to read offloaded payload from {}: {}",
                    path.display(),
                    e
                ));
                return None;
            }
        };

        debug!("Read {} offloaded bytes from {}", bytes.len(), path.display());

        // Bytes count as consumed once read, the file goes even if decoding fails.
        let result = self.base.convert(Some(bytes.as_slice()), errors).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to delete offloaded payload {}: {}", path.display(), e);
        }

        result
    }
}

/// Sending side: encodes with the base encoder, writes the bytes to a fresh
/// file and sends its name.
#[derive(Debug, Clone)]
pub struct FileOffloadEncoder {
    directory: PathBuf,
    base: Box<Encoder>,
}

impl FileOffloadEncoder {
    /// Create new file offload encoder
    pub fn new(directory: impl Into<PathBuf>, base: Encoder) -> Self {
        Self {
            directory: directory.into(),
            base: Box::new(base),
        }
    }

    /// Shared directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Wrapped encoder
    pub fn base(&self) -> &Encoder {
        &self.base
    }

    pub(crate) async fn offload(&self, value: &Value, errors: &mut ErrorSink) -> Option<Vec<u8>> {
        let bytes = self.base.encode(Some(value), errors).await?;

        let filename = format!("{}.bin", Uuid::new_v4());
        let path = self.directory.join(&filename);

        if let Err(e) = serialization::write_file(&path, &bytes).await {
            errors.add(format!(
                "Failed to write offloaded payload to {}: {}",
                path.display(),
                e
            ));
            return None;
        }

        debug!("Offloaded {} bytes to {}", bytes.len(), path.display());
        Some(filename.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_is_removed_after_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msg.bin");
        serialization::write_file(&path, b"offloaded").await.unwrap();

        let converter = Converter::FileOffload(FileOffload::new(dir.path(), Converter::Text));
        let mut errors = ErrorSink::new();
        let result = converter.convert(Some(&b"msg.bin"[..]), &mut errors).await;

        assert_eq!(result, Some(Value::from("offloaded")));
        assert!(errors.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_removed_even_if_inner_conversion_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        serialization::write_file(&path, &[0xffu8, 0xfe]).await.unwrap();

        let converter = Converter::FileOffload(FileOffload::new(dir.path(), Converter::Text));
        let mut errors = ErrorSink::new();
        let result = converter.convert(Some(&b"bad.bin"[..]), &mut errors).await;

        assert!(result.is_none());
        assert!(!errors.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::FileOffload(FileOffload::new(dir.path(), Converter::Text));

        let mut errors = ErrorSink::new();
        let result = converter.convert(Some(&b"absent.bin"[..]), &mut errors).await;

        assert!(result.is_none());
        assert!(errors.errors()[0].contains("absent.bin"));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::FileOffload(FileOffload::new(dir.path(), Converter::Text));

        let mut errors = ErrorSink::new();
        let result = converter
            .convert(Some(&b"../etc/passwd"[..]), &mut errors)
            .await;

        assert!(result.is_none());
        assert!(errors.errors()[0].contains("Not a plain filename"));
    }

    #[test]
    fn test_generates_passes_through() {
        let converter = Converter::FileOffload(FileOffload::new("/tmp", Converter::Text));
        assert_eq!(converter.generates(), Converter::Text.generates());
    }
}
