use serde::Deserialize;
use std::path::PathBuf;

use super::SettingsError;

#[derive(Debug)]
pub struct Storage {
    pub base_dir: PathBuf,
}

impl Storage {
    pub fn new(sources: Vec<PartialStorage>) -> Result<Self, SettingsError> {
        let base_dir = sources
            .into_iter()
            .find_map(|s| s.base_dir)
            .ok_or_else(|| SettingsError::MissingValue("storage.base_dir".to_string()))?;

        if base_dir.as_os_str().is_empty() {
            return Err(SettingsError::InvalidValue {
                key: "storage.base_dir".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        Ok(Storage { base_dir })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialStorage {
    pub base_dir: Option<PathBuf>,
}
