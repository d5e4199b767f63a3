//! The single-slot registration profile record.
//!
//! Only the profile survives restarts; session keys are regenerated at
//! every login, so there is deliberately nothing key-shaped here.

use std::fs;
use std::path::Path;

use confab_shared::UserProfile;

use crate::error::Result;

/// Persist the registration profile, replacing any previous record.
pub fn save_profile(path: &Path, profile: &UserProfile) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(profile)?;
    fs::write(path, bytes)?;
    tracing::debug!(path = %path.display(), "saved profile");
    Ok(())
}

/// Load the saved profile, or `None` when no registration exists yet.
pub fn load_profile(path: &Path) -> Result<Option<UserProfile>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remove the saved profile (logout). Missing file is not an error.
pub fn clear_profile(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
