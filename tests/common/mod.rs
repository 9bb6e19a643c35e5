//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use filestore::{ConvertError, ConvertResult, RecordConverter};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

/// Test record, serialized as `"<key> | <value>"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: i32,
    pub value: String,
}

pub fn entry(key: i32, value: &str) -> Entry {
    Entry {
        key,
        value: value.to_string(),
    }
}

pub fn entry_id(e: &Entry) -> i32 {
    e.key
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EntryConverter;

impl RecordConverter<Entry> for EntryConverter {
    fn to_token(&self, record: &Entry) -> ConvertResult<String> {
        if record.value.contains('\n') {
            return Err(ConvertError::malformed(&record.value, "value contains a newline"));
        }
        Ok(format!("{} | {}", record.key, record.value))
    }

    fn from_token(&self, token: &str) -> ConvertResult<Entry> {
        let (key, value) = token
            .split_once(" | ")
            .ok_or_else(|| ConvertError::malformed(token, "expected '<key> | <value>'"))?;
        let key = key
            .trim()
            .parse()
            .map_err(|_| ConvertError::malformed(token, "key is not an integer"))?;
        Ok(entry(key, value))
    }
}

pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Creates `name` under `dir` holding `content`.
pub fn create_store_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write store file");
    path
}

pub fn sorted(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by_key(|e| e.key);
    entries
}

/// Names of the regular files in `dir`, sorted.
pub fn file_names(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.path())
        .expect("Failed to list dir")
        .map(|e| e.expect("Failed to read entry"))
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
