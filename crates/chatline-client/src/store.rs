//! File-backed identity store.
//!
//! One file holds the plain username. A missing file means no prior session.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chatline_core::{IdentityStore, StoreError};

/// Directory under the user config dir that holds Chatline state.
pub const CONFIG_DIR_NAME: &str = "chatline";

/// File name of the persisted username.
pub const IDENTITY_FILE_NAME: &str = "username";

/// Username persisted in a single file.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: Arc<PathBuf>,
}

impl FileIdentityStore {
    /// Store at `path`. Nothing is touched until the first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Arc::new(path.into()) }
    }

    /// `<config dir>/chatline/username`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(IDENTITY_FILE_NAME))
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path.as_path()) {
            Ok(contents) => {
                let username = contents.trim();
                Ok((!username.is_empty()).then(|| username.to_string()))
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, username: &str) -> Result<(), StoreError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::EmptyUsername);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(self.path.as_path(), username)?;
        tracing::debug!(path = %self.path.display(), "persisted username");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(self.path.as_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
