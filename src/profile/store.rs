//! Profile persistence
//!
//! The registered profile is stored as a single JSON blob under a fixed key
//! inside the data directory. There is never more than one record.

use super::schema::{PremisesProfile, ProfileUpdate};
use super::ProfileError;
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed storage key for the profile blob
pub const PROFILE_STORAGE_KEY: &str = "kuntur_user_data.json";

/// Reads and writes the single registered profile
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    /// Store rooted at a data directory
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(PROFILE_STORAGE_KEY),
        }
    }

    /// Location of the blob on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored profile, `None` when nothing is registered
    pub fn load(&self) -> Result<Option<PremisesProfile>, ProfileError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let profile: PremisesProfile = serde_json::from_str(&content)?;

        tracing::debug!("Loaded profile '{}' from {:?}", profile.nombre_local, self.path);

        Ok(Some(profile))
    }

    /// Replace the stored profile
    pub fn save(&self, profile: &PremisesProfile) -> Result<(), ProfileError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(profile)?;
        fs::write(&self.path, content)?;

        tracing::debug!("Saved profile '{}' to {:?}", profile.nombre_local, self.path);

        Ok(())
    }

    /// Merge an update into the stored profile
    pub fn update(&self, update: ProfileUpdate) -> Result<PremisesProfile, ProfileError> {
        let mut profile = self.load()?.ok_or(ProfileError::NotFound)?;
        update.apply(&mut profile);
        self.save(&profile)?;
        Ok(profile)
    }

    /// Remove the stored profile
    pub fn clear(&self) -> Result<(), ProfileError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            tracing::info!("Cleared stored profile");
        }
        Ok(())
    }
}
