//! Serializable converter/encoder configuration

use crate::{
    converter::Converter,
    encoder::Encoder,
    offload::{FileOffload, FileOffloadEncoder, RemoteOffload, RemoteOffloadEncoder},
    Error, Result,
};
use data_exchange::{ClientConfig, DataExchangeClient};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

/// Receiving-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConverterConfig {
    /// bincode-serialized value
    Binary,
    /// UTF-8 string
    Text,
    /// Filename in a shared directory
    FileOffload {
        /// Shared directory
        directory: PathBuf,
        /// Converter applied to the file's bytes
        base: Box<ConverterConfig>,
    },
    /// Token on a remote data exchange
    RemoteOffload {
        /// Exchange to download from
        exchange: ClientConfig,
        /// Remove the token once its data was converted
        #[serde(default = "default_true")]
        remove_after_retrieval: bool,
        /// Converter applied to the downloaded bytes
        base: Box<ConverterConfig>,
    },
}

/// Sending-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EncoderConfig {
    /// bincode-serialize the value
    Binary,
    /// UTF-8 bytes of a text value
    Text,
    /// Write to a shared directory
    FileOffload {
        /// Shared directory
        directory: PathBuf,
        /// Encoder producing the file's bytes
        base: Box<EncoderConfig>,
    },
    /// Upload to a remote data exchange
    RemoteOffload {
        /// Exchange to upload to
        exchange: ClientConfig,
        /// Encoder producing the uploaded bytes
        base: Box<EncoderConfig>,
    },
}

fn check_directory(directory: &Path) -> Result<()> {
    if directory.as_os_str().is_empty() {
        return Err(Error::Config("Offload directory must not be empty".to_string()));
    }
    if !directory.is_dir() {
        return Err(Error::Config(format!(
            "Offload directory does not exist: {}",
            directory.display()
        )));
    }
    Ok(())
}

fn check_url(exchange: &ClientConfig) -> Result<()> {
    if exchange.url.trim().is_empty() {
        return Err(Error::Config("Data exchange URL must not be empty".to_string()));
    }
    Ok(())
}

impl ConverterConfig {
    /// Validate and build the converter
    pub fn build(&self) -> Result<Converter> {
        Ok(match self {
            ConverterConfig::Binary => Converter::Binary,
            ConverterConfig::Text => Converter::Text,
            ConverterConfig::FileOffload { directory, base } => {
                check_directory(directory)?;
                Converter::FileOffload(FileOffload::new(directory.clone(), base.build()?))
            }
            ConverterConfig::RemoteOffload {
                exchange,
                remove_after_retrieval,
                base,
            } => {
                check_url(exchange)?;
                Converter::RemoteOffload(RemoteOffload::new(
                    DataExchangeClient::new(exchange)?,
                    *remove_after_retrieval,
                    base.build()?,
                ))
            }
        })
    }
}

impl EncoderConfig {
    /// Validate and build the encoder
    pub fn build(&self) -> Result<Encoder> {
        Ok(match self {
            EncoderConfig::Binary => Encoder::Binary,
            EncoderConfig::Text => Encoder::Text,
            EncoderConfig::FileOffload { directory, base } => {
                check_directory(directory)?;
                Encoder::FileOffload(FileOffloadEncoder::new(directory.clone(), base.build()?))
            }
            EncoderConfig::RemoteOffload { exchange, base } => {
                check_url(exchange)?;
                Encoder::RemoteOffload(RemoteOffloadEncoder::new(
                    DataExchangeClient::new(exchange)?,
                    base.build()?,
                ))
            }
        })
    }
}
