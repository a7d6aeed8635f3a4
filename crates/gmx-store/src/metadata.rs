//! `metadata.json`: schema, columns and the partition table of a stored dataset.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gmx_model::{RowKey, Schema};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};

pub const FORMAT_VERSION: u32 = 1;
pub const METADATA_FILE: &str = "metadata.json";
pub const PARTS_DIR: &str = "parts";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub format_version: u32,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub schema: Schema,
    pub columns: Vec<String>,
    pub partitions: Vec<PartitionEntry>,
}

/// One row of the partition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    /// File stem under `parts/`, e.g. `part-00003`.
    pub stem: String,
    pub rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_key: Option<RowKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_key: Option<RowKey>,
    pub rows_sha256: String,
    /// Absent when the dataset has no columns or no entry fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries_sha256: Option<String>,
}

impl PartitionEntry {
    pub fn stem_for(index: usize) -> String {
        format!("part-{index:05}")
    }

    pub fn rows_path(&self, root: &Path) -> PathBuf {
        root.join(PARTS_DIR).join(format!("{}.rows.parquet", self.stem))
    }

    pub fn entries_path(&self, root: &Path) -> PathBuf {
        root.join(PARTS_DIR)
            .join(format!("{}.entries.parquet", self.stem))
    }
}

impl DatasetMetadata {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(METADATA_FILE);
        if !path.is_file() {
            return Err(StoreError::NotADataset {
                path: root.to_path_buf(),
            });
        }
        let text = fs::read_to_string(&path).map_err(|source| StoreError::io(&path, source))?;
        let metadata: Self = serde_json::from_str(&text)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;
        if metadata.format_version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path,
                found: metadata.format_version,
                expected: FORMAT_VERSION,
            });
        }
        metadata.schema.validate()?;
        Ok(metadata)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(METADATA_FILE);
        let text = serde_json::to_string_pretty(self)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;
        fs::write(&path, text).map_err(|source| StoreError::io(&path, source))
    }

    pub fn total_rows(&self) -> usize {
        self.partitions.iter().map(|entry| entry.rows).sum()
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Read a file and check it against its recorded digest.
pub(crate) fn read_verified(path: &Path, expected: &str) -> Result<Vec<u8>> {
    let bytes = fs::read(path).map_err(|source| StoreError::io(path, source))?;
    let actual = sha256_hex(&bytes);
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(StoreError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn part_paths_use_padded_stems() {
        let entry = PartitionEntry {
            stem: PartitionEntry::stem_for(7),
            rows: 0,
            first_key: None,
            last_key: None,
            rows_sha256: String::new(),
            entries_sha256: None,
        };
        assert_eq!(
            entry.rows_path(Path::new("out")),
            Path::new("out/parts/part-00007.rows.parquet")
        );
    }
}
