// Copyright 2024 ZSoftly Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The device-grant token cache (component A).
//!
//! One file per start URL, named by the lowercase hex SHA-1 of the start
//! URL, kept interoperable with the reference `aws sso login` cache layout
//! at `~/.aws/sso/cache/`. The SHA-1 is purely a naming scheme (see
//! `DESIGN.md`); it is not a security boundary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{Error, ErrorKind, Result};

/// A device-grant token, as written by the Identity Broker and read by
/// every command needing identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "startUrl")]
    pub start_url: String,
    pub region: String,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// A token is valid iff it has not yet expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Disk-resident cache of device-grant tokens, keyed by start URL.
#[derive(Debug, Clone)]
pub struct TokenCache {
    directory: PathBuf,
}

impl TokenCache {
    /// Create a cache rooted at the given directory (normally
    /// `<home>/.aws/sso/cache`).
    pub fn new<P: Into<PathBuf>>(directory: P) -> TokenCache {
        TokenCache {
            directory: directory.into(),
        }
    }

    /// The reference cache location under the user's home directory.
    pub fn default_location() -> Result<TokenCache> {
        let mut home = dirs::home_dir().ok_or_else(|| {
            Error::new(ErrorKind::Configuration, "cannot determine home directory")
        })?;
        home.push(".aws");
        home.push("sso");
        home.push("cache");
        Ok(TokenCache::new(home))
    }

    fn filename_for(&self, start_url: &str) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(start_url.as_bytes());
        let digest = hasher.finalize();
        self.directory.join(format!("{}.json", hex::encode(digest)))
    }

    /// Resolve a candidate path and guard against path traversal: the
    /// result must be a direct child of the cache directory.
    fn guarded_child(&self, candidate: PathBuf) -> Option<PathBuf> {
        if candidate.parent() == Some(self.directory.as_path()) {
            Some(candidate)
        } else {
            None
        }
    }

    /// Read the cached token for the given start URL.
    ///
    /// A missing cache directory is treated as `Ok(None)`, not an error.
    pub fn read(&self, start_url: &str) -> Result<Option<Token>> {
        if !self.directory.is_dir() {
            return Ok(None);
        }

        let direct = self.filename_for(start_url);
        if let Some(path) = self.guarded_child(direct) {
            if path.is_file() {
                if let Some(token) = self.try_load(&path)? {
                    if token.start_url == start_url {
                        return Ok(Some(token));
                    }
                }
            }
        }

        // Filename lookup missed or the in-file URL mismatched: fall back
        // to scanning the directory. The in-file start URL is always
        // authoritative over the filename.
        self.scan_for(start_url)
    }

    fn scan_for(&self, start_url: &str) -> Result<Option<Token>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(e) => e,
            Err(_) => return Ok(None),
        };

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Failed to read cache directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if self.guarded_child(path.clone()).is_none() {
                continue;
            }
            match self.try_load(&path) {
                Ok(Some(token)) if token.start_url == start_url => return Ok(Some(token)),
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping unreadable cache file {}: {}", path.display(), e);
                    continue;
                }
            }
        }

        Ok(None)
    }

    fn try_load(&self, path: &Path) -> Result<Option<Token>> {
        let contents = fs::read_to_string(path)?;
        match serde_json::from_str::<Token>(&contents) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!("Malformed token cache file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Write a token to its cache file, creating the directory (owner-only)
    /// if needed and writing the file atomically with owner-only mode.
    pub fn write(&self, token: &Token) -> Result<()> {
        ensure_private_dir(&self.directory)?;

        let path = self.filename_for(&token.start_url);
        let contents = serde_json::to_string_pretty(token)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.directory).map_err(|e| {
            Error::wrap(ErrorKind::Io, "failed to create temporary cache file", e)
        })?;
        tmp.write_all(contents.as_bytes())?;
        set_owner_only(tmp.path())?;
        tmp.persist(&path).map_err(|e| {
            Error::wrap(
                ErrorKind::Io,
                format!("failed to write token cache file {}", path.display()),
                e.error,
            )
        })?;

        debug!(
            "Wrote token cache for {} to {}",
            token.start_url,
            path.display()
        );
        Ok(())
    }

    /// Remove the cached token for a start URL, if any. Used by
    /// `logout(profile)` to clear a single profile's derived credentials.
    pub fn remove(&self, start_url: &str) -> Result<()> {
        let path = self.filename_for(start_url);
        if path.is_file() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn ensure_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
    }
    let mut perms = fs::metadata(dir)?.permissions();
    perms.set_mode(0o700);
    fs::set_permissions(dir, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    fn sample(start_url: &str, expires_in: Duration) -> Token {
        Token {
            start_url: start_url.to_string(),
            region: "us-east-1".to_string(),
            access_token: "TOK1".to_string(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[test]
    fn round_trip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        let token = sample("https://acme.awsapps.com/start", Duration::hours(8));
        cache.write(&token).unwrap();

        let read_back = cache.read(&token.start_url).unwrap().unwrap();
        assert_eq!(read_back.start_url, token.start_url);
        assert_eq!(read_back.access_token, token.access_token);
        assert_eq!(read_back.expires_at, token.expires_at);
    }

    #[test]
    fn missing_directory_is_not_found_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let cache = TokenCache::new(missing);
        assert!(cache.read("https://example.com/start").unwrap().is_none());
    }

    #[test]
    fn expired_token_is_not_valid() {
        let token = sample("https://acme.awsapps.com/start", Duration::seconds(-1));
        assert!(!token.is_valid(Utc::now()));
    }

    #[test]
    fn filename_is_sha1_of_start_url() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        let url = "https://acme.awsapps.com/start";
        let expected = {
            let mut hasher = Sha1::new();
            hasher.update(url.as_bytes());
            format!("{}.json", hex::encode(hasher.finalize()))
        };
        assert_eq!(
            cache.filename_for(url).file_name().unwrap().to_str().unwrap(),
            expected
        );
    }

    #[test]
    fn scan_falls_back_when_filename_mismatches() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path());
        let token = sample("https://acme.awsapps.com/start", Duration::hours(1));
        // Write under a filename that does not correspond to the hash.
        fs::create_dir_all(dir.path()).unwrap();
        let stray = dir.path().join("stray.json");
        fs::write(&stray, serde_json::to_string(&token).unwrap()).unwrap();

        let found = cache.read(&token.start_url).unwrap();
        assert_eq!(found.unwrap().access_token, "TOK1");
    }
}
