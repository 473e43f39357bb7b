use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::credential::{AccessToken, Credential};

/// File name used when no location is configured.
pub const DEFAULT_TOKEN_FILE: &str = ".auth-token";

#[derive(Error, Debug)]
pub enum CredentialStoreError {
    #[error("invalid path: `{0}`")]
    InvalidPath(String),
    #[error("unable to read stored token: `{0}`")]
    Read(String),
    #[error("unable to write token: `{0}`")]
    Write(String),
}

/// Durable storage for the single cached credential.
pub trait CredentialStore {
    /// Returns the stored credential, `None` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Credential>, CredentialStoreError>;
    /// Replaces whatever was stored before. The stored age starts over from zero.
    fn save(&self, credential: &Credential) -> Result<(), CredentialStoreError>;
}

/// Keeps the raw token text in a file. The file modification time is the acquisition instant.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn parent_dir(&self) -> Result<&Path, CredentialStoreError> {
        if self.path.file_name().is_none() {
            return Err(CredentialStoreError::InvalidPath(format!(
                "{} does not name a file",
                self.path.display()
            )));
        }
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Ok(parent),
            _ => Ok(Path::new(".")),
        }
    }
}

impl Default for FileCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_FILE)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, CredentialStoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored token");
                return Ok(None);
            }
            Err(e) => return Err(CredentialStoreError::Read(e.to_string())),
        };

        let credential = read_credential(file)?;
        if credential.is_none() {
            debug!(path = %self.path.display(), "stored token is empty");
        }
        Ok(credential)
    }

    fn save(&self, credential: &Credential) -> Result<(), CredentialStoreError> {
        let dir = self.parent_dir()?;

        // Written next to the destination so the final rename never crosses filesystems.
        let mut file =
            NamedTempFile::new_in(dir).map_err(|e| CredentialStoreError::Write(e.to_string()))?;
        file.write_all(credential.access_token().as_bytes())
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| CredentialStoreError::Write(e.to_string()))?;
        file.persist(&self.path)
            .map_err(|e| CredentialStoreError::Write(e.error.to_string()))?;

        debug!(path = %self.path.display(), "token stored");
        Ok(())
    }
}

/// Token text and modification time both come from the same open handle. Saves replace the
/// file by rename, so a concurrent save cannot pair the old token with the new mtime.
fn read_credential(mut file: File) -> Result<Option<Credential>, CredentialStoreError> {
    let modified = file
        .metadata()
        .and_then(|metadata| metadata.modified())
        .map_err(|e| CredentialStoreError::Read(e.to_string()))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| CredentialStoreError::Read(e.to_string()))?;

    let token = content.lines().next().unwrap_or_default().trim();
    if token.is_empty() {
        return Ok(None);
    }

    Ok(Some(Credential::new(
        AccessToken::from(token),
        DateTime::<Utc>::from(modified),
    )))
}
