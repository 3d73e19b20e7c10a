//! bincode read/write helpers shared by the binary converter and file offload

use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Serialize to bytes
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Deserialize from bytes
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Write a serialized byte buffer to the file
pub async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let encoded = to_bytes(&data)?;
    tokio::fs::write(path, encoded).await?;
    Ok(())
}

/// Read a byte buffer written by [`write_file`]
pub async fn read_file(path: &Path) -> Result<Vec<u8>> {
    let encoded = tokio::fs::read(path).await?;
    from_bytes(&encoded)
}
