//! Client-side token storage.
//!
//! Tokens are bearer credentials scoped to one entity; the store maps
//! `entityID → tokenString` so a fresh token is only requested when the
//! cached one is missing or expired.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{ClientError, Result};

/// A scoped token cache.
pub trait TokenStore: Send + Sync {
    /// Store a token for an entity, replacing any previous one.
    fn put(&self, entity_id: &str, token: &str) -> Result<()>;

    /// Fetch the cached token for an entity, if any.
    fn get(&self, entity_id: &str) -> Result<Option<String>>;

    /// Forget the cached token for an entity.
    fn forget(&self, entity_id: &str) -> Result<()>;
}

/// Process-lifetime token cache.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn put(&self, entity_id: &str, token: &str) -> Result<()> {
        self.tokens
            .lock()
            .expect("token map poisoned")
            .insert(entity_id.to_string(), token.to_string());
        Ok(())
    }

    fn get(&self, entity_id: &str) -> Result<Option<String>> {
        Ok(self
            .tokens
            .lock()
            .expect("token map poisoned")
            .get(entity_id)
            .cloned())
    }

    fn forget(&self, entity_id: &str) -> Result<()> {
        self.tokens
            .lock()
            .expect("token map poisoned")
            .remove(entity_id);
        Ok(())
    }
}

/// Filesystem token cache under the user's data directory.
///
/// One file per entity at `<base>/tokens/<entity>.token`, created with
/// owner-only permissions on unix.
pub struct FsTokenStore {
    base: PathBuf,
}

impl FsTokenStore {
    /// A store rooted at the default data directory
    /// (`$XDG_DATA_HOME/warden`, falling back to `~/.local/share/warden`).
    pub fn new() -> Result<Self> {
        let base = std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share"))
            })
            .ok_or_else(|| {
                ClientError::TokenStore("no data directory could be determined".to_string())
            })?
            .join("warden");
        Ok(Self { base })
    }

    /// A store rooted at an explicit directory.
    pub fn at(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn token_path(&self, entity_id: &str) -> Result<PathBuf> {
        // Entity IDs become file names; refuse anything that could
        // escape the store directory.
        if entity_id.is_empty() || entity_id.contains(['/', '\\']) || entity_id.contains("..") {
            return Err(ClientError::TokenStore(format!(
                "entity ID unsuitable for token storage: {entity_id:?}"
            )));
        }
        Ok(self.base.join("tokens").join(format!("{entity_id}.token")))
    }
}

impl TokenStore for FsTokenStore {
    fn put(&self, entity_id: &str, token: &str) -> Result<()> {
        let path = self.token_path(entity_id)?;
        let dir = path.parent().expect("token path always has a parent");
        fs::create_dir_all(dir)?;
        fs::write(&path, token)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn get(&self, entity_id: &str) -> Result<Option<String>> {
        let path = self.token_path(entity_id)?;
        match fs::read_to_string(&path) {
            Ok(token) => Ok(Some(token.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn forget(&self, entity_id: &str) -> Result<()> {
        let path = self.token_path(entity_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert!(store.get("foo").unwrap().is_none());
        store.put("foo", "token-a").unwrap();
        assert_eq!(store.get("foo").unwrap().as_deref(), Some("token-a"));
        store.put("foo", "token-b").unwrap();
        assert_eq!(store.get("foo").unwrap().as_deref(), Some("token-b"));
        store.forget("foo").unwrap();
        assert!(store.get("foo").unwrap().is_none());
    }

    #[test]
    fn fs_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTokenStore::at(dir.path());

        assert!(store.get("foo").unwrap().is_none());
        store.put("foo", "token-a").unwrap();
        assert_eq!(store.get("foo").unwrap().as_deref(), Some("token-a"));
        store.forget("foo").unwrap();
        assert!(store.get("foo").unwrap().is_none());
        // Forgetting twice is fine.
        store.forget("foo").unwrap();
    }

    #[test]
    fn fs_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsTokenStore::at(dir.path());
        assert!(store.put("../evil", "t").is_err());
        assert!(store.put("", "t").is_err());
    }
}
