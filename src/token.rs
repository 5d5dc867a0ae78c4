//! Client code and session token files
//!
//! The content is opaque to us: whatever the operator pastes is stored as-is
//! and read back with trailing whitespace removed.

use crate::sink::LogSink;
use crate::variant::Service;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("client code is empty, nothing to save")]
    Empty,

    #[error("{} is empty", path.display())]
    EmptyFile { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("cannot delete {}: {source}", path.display())]
    Delete { path: PathBuf, source: io::Error },
}

fn trim_token(raw: &str) -> &str {
    raw.trim_end_matches(['\t', '\n', '\r', ' '])
}

/// Credential files for both services, kept in the cloud directory
#[derive(Debug, Clone)]
pub struct TokenStore {
    cloud_dir: PathBuf,
}

impl TokenStore {
    pub fn new(cloud_dir: impl Into<PathBuf>) -> Self {
        Self {
            cloud_dir: cloud_dir.into(),
        }
    }

    pub fn client_code_path(&self, service: Service) -> PathBuf {
        self.cloud_dir.join(service.client_code_file())
    }

    /// Store the client code verbatim, creating the cloud directory if needed
    pub fn save_client_code(
        &self,
        service: Service,
        code: &str,
        sink: &dyn LogSink,
    ) -> Result<PathBuf, TokenError> {
        if code.is_empty() {
            sink.line("[Token] empty, nothing to save");
            return Err(TokenError::Empty);
        }

        let path = self.client_code_path(service);
        let write = fs::create_dir_all(&self.cloud_dir).and_then(|_| fs::write(&path, code));
        match write {
            Ok(()) => {
                sink.line("[Token] saved");
                info!(%service, path = %path.display(), "Client code saved");
                Ok(path)
            }
            Err(source) => {
                sink.line("[Token] ERROR: write");
                warn!(%service, path = %path.display(), error = %source, "Saving client code failed");
                Err(TokenError::Write { path, source })
            }
        }
    }

    /// Stored client code, or `None` when nothing has been saved yet
    pub fn load_client_code(&self, service: Service) -> Result<Option<String>, TokenError> {
        let path = self.client_code_path(service);
        match fs::read(&path) {
            Ok(raw) if raw.is_empty() => Ok(None),
            Ok(raw) => {
                debug!(%service, "Loaded client code from default file");
                Ok(Some(trim_token(&String::from_utf8_lossy(&raw)).to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TokenError::Read { path, source }),
        }
    }

    /// Read a client code from an arbitrary file chosen by the operator
    pub fn read_code_file(path: &Path, sink: &dyn LogSink) -> Result<String, TokenError> {
        let raw = fs::read(path).map_err(|source| {
            sink.line("[Token] ERROR: open file");
            TokenError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if raw.is_empty() {
            sink.line("[Token] ERROR: empty file");
            return Err(TokenError::EmptyFile {
                path: path.to_path_buf(),
            });
        }

        sink.line("[Token] loaded");
        Ok(trim_token(&String::from_utf8_lossy(&raw)).to_string())
    }

    /// Delete the session tokens a handler obtained, forcing a fresh login
    ///
    /// The client code itself is kept. Returns the files that were removed.
    pub fn purge(&self, service: Service, sink: &dyn LogSink) -> Result<Vec<PathBuf>, TokenError> {
        let mut removed = Vec::new();
        for name in service.session_token_files() {
            let path = self.cloud_dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    sink.line(&format!("[Token] {}: ERROR: purge", service));
                    return Err(TokenError::Delete { path, source });
                }
            }
        }

        sink.line(&format!("[Token] {}: purged", service));
        info!(%service, removed = removed.len(), "Session tokens purged");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("Cloud"));
        let sink = MemorySink::new();

        store
            .save_client_code(Service::Dropbox, "abc123 \r\n", &sink)
            .unwrap();
        assert_eq!(
            fs::read_to_string(store.client_code_path(Service::Dropbox)).unwrap(),
            "abc123 \r\n"
        );
        assert_eq!(
            store.load_client_code(Service::Dropbox).unwrap(),
            Some("abc123".to_string())
        );
        assert_eq!(sink.lines(), vec!["[Token] saved"]);
    }

    #[test]
    fn test_save_empty_refused() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        let sink = MemorySink::new();

        let err = store
            .save_client_code(Service::GoogleDrive, "", &sink)
            .unwrap_err();
        assert!(matches!(err, TokenError::Empty));
        assert!(!store.client_code_path(Service::GoogleDrive).exists());
        assert!(sink.contains("empty, nothing to save"));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        assert_eq!(store.load_client_code(Service::Dropbox).unwrap(), None);
    }

    #[test]
    fn test_read_code_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("code.txt");
        fs::write(&path, "XYZ\t\n\n").unwrap();
        let sink = MemorySink::new();
        assert_eq!(TokenStore::read_code_file(&path, &sink).unwrap(), "XYZ");
        assert!(sink.contains("[Token] loaded"));
    }

    #[test]
    fn test_read_code_file_empty_and_missing() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "").unwrap();
        let sink = MemorySink::new();

        assert!(matches!(
            TokenStore::read_code_file(&empty, &sink),
            Err(TokenError::EmptyFile { .. })
        ));
        assert!(matches!(
            TokenStore::read_code_file(&dir.path().join("missing.txt"), &sink),
            Err(TokenError::Read { .. })
        ));
        assert_eq!(
            sink.lines(),
            vec!["[Token] ERROR: empty file", "[Token] ERROR: open file"]
        );
    }

    #[test]
    fn test_purge_google_removes_both_tokens_keeps_code() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        for name in [
            "google_drive_access_token",
            "google_drive_refresh_token",
            "google_drive_client_code",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        let sink = MemorySink::new();

        let removed = store.purge(Service::GoogleDrive, &sink).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(dir.path().join("google_drive_client_code").exists());
        assert!(!dir.path().join("google_drive_access_token").exists());
        assert!(sink.contains("[Token] Google Drive: purged"));
    }

    #[test]
    fn test_purge_without_tokens_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path());
        let removed = store.purge(Service::Dropbox, &crate::sink::NullSink).unwrap();
        assert!(removed.is_empty());
    }
}
