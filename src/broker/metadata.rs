//! On-disk topic metadata.
//!
//! Stored as JSON in `<data_path>/nsqd.dat`. Writes go to a temporary file in
//! the same directory followed by a rename, so a crash mid-write leaves the
//! previous file intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::broker::BrokerError;

/// File name of the metadata file inside the data directory.
pub const METADATA_FILE: &str = "nsqd.dat";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub topics: Vec<TopicMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMetadata {
    pub name: String,
}

pub fn metadata_path(data_path: &Path) -> PathBuf {
    data_path.join(METADATA_FILE)
}

/// Read metadata; `Ok(None)` when the file does not exist yet.
pub fn read(path: &Path) -> Result<Option<Metadata>, BrokerError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&content)?))
}

/// Write metadata atomically.
pub fn write(path: &Path, metadata: &Metadata) -> Result<(), BrokerError> {
    let data = serde_json::to_vec(metadata)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(METADATA_FILE);
    let tmp = path.with_file_name(format!("{}.{}.tmp", file_name, std::process::id()));

    fs::write(&tmp, &data)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
