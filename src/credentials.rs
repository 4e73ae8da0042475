use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::WidgetError;
use crate::types::{Credentials, TokenInfo};

pub const APP_DIR: &str = "spotlet";
const CREDENTIALS_FILE: &str = "credentials.json";
const TOKEN_CACHE_FILE: &str = "token_cache.json";

/// Owns the on-disk credential and token files under the per-app data
/// directory.
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new() -> Result<Self, WidgetError> {
        let dir = dirs::data_dir()
            .ok_or_else(|| WidgetError::ConfigMissing("no user data directory".into()))?
            .join(APP_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Store rooted at an explicit directory. Used by tests.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    fn token_cache_path(&self) -> PathBuf {
        self.dir.join(TOKEN_CACHE_FILE)
    }

    pub fn load_credentials(&self) -> Result<Credentials, WidgetError> {
        let path = self.credentials_path();
        let data = fs::read_to_string(&path)
            .map_err(|e| WidgetError::ConfigMissing(format!("{}: {}", path.display(), e)))?;
        let creds: Credentials = serde_json::from_str(&data)
            .map_err(|e| WidgetError::ConfigMissing(format!("{}: {}", path.display(), e)))?;
        if creds.client_id.trim().is_empty() || creds.redirect_uri.trim().is_empty() {
            return Err(WidgetError::ConfigMissing(
                "client_id or redirect_uri is empty".into(),
            ));
        }
        Ok(creds)
    }

    /// Returns the cached token, or `None` when no cache exists. A corrupt
    /// cache is treated as absent so the user simply logs in again.
    pub fn load_token(&self) -> Result<Option<TokenInfo>, WidgetError> {
        let path = self.token_cache_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        match serde_json::from_str::<TokenInfo>(&data) {
            Ok(token) if !token.access_token.is_empty() => Ok(Some(token)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Discarding unreadable token cache: {}", e);
                Ok(None)
            }
        }
    }

    /// Overwrites the cache with the latest provider response.
    pub fn save_token(&self, token: &TokenInfo) -> Result<(), WidgetError> {
        fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_string(token)?;
        fs::write(self.token_cache_path(), data)?;
        info!("Token cache written");
        Ok(())
    }

    /// Disconnect deletes the cache outright.
    pub fn clear_token(&self) -> Result<(), WidgetError> {
        let path = self.token_cache_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
