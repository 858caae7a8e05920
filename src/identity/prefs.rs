// Preference Store
//
// One JSON object per namespace under <data_dir>/shared_prefs/.
// Unknown keys are preserved on write.

use crate::error::MinerError;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    /// Open the named preference namespace inside `data_dir`
    pub fn open(data_dir: &Path, namespace: &str) -> Self {
        Self {
            path: data_dir.join("shared_prefs").join(format!("{}.json", namespace)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>, MinerError> {
        let prefs = self.read()?;
        Ok(prefs.get(key).and_then(Value::as_str).map(str::to_string))
    }

    pub fn put_string(&self, key: &str, value: &str) -> Result<(), MinerError> {
        let mut prefs = self.read()?;
        prefs.insert(key.to_string(), Value::String(value.to_string()));
        self.write(&prefs)
            .map_err(|e| MinerError::identity(&self.path, e))
    }

    fn read(&self) -> Result<Map<String, Value>, MinerError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| MinerError::identity(&self.path, e))?;

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(MinerError::identity(&self.path, "preference file is not a JSON object")),
            Err(e) => Err(MinerError::identity(&self.path, e)),
        }
    }

    fn write(&self, prefs: &Map<String, Value>) -> io::Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "preference path has no parent"))?;
        fs::create_dir_all(parent)?;

        let json_str = serde_json::to_string_pretty(prefs)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Same-directory temp file so the rename stays atomic
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(json_str.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(path = %self.path.display(), "Updated preferences");
        Ok(())
    }
}
