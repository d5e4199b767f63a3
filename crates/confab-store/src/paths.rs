use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{Result, StoreError};

/// Platform-appropriate data directory for the Confab client:
/// - Linux:   `~/.local/share/confab/`
/// - macOS:   `~/Library/Application Support/com.confab.confab/`
/// - Windows: `{FOLDERID_RoamingAppData}\confab\confab\data\`
pub fn default_data_dir() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("com", "confab", "confab").ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().to_path_buf())
}
