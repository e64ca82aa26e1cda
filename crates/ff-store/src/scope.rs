use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::error::Result;
use crate::store::Store;

pub const DEFAULT_SCOPE: &str = "default";

/// Default base directory for all footfall storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".footfall")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

// ---------------------------------------------------------------------------
// Pure helpers (no I/O, fully unit-testable)
// ---------------------------------------------------------------------------

/// Sanitize a scope name for use as a filename.
fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolve the storage scope identifier.
///
/// Priority chain:
/// 1. Explicit `--scope` name
/// 2. `FOOTFALL_SCOPE` environment value
/// 3. [`DEFAULT_SCOPE`]
///
/// Empty names (after trimming) fall through to the next source.
fn resolve_scope_id(explicit: Option<&str>, from_env: Option<&str>) -> String {
    [explicit, from_env]
        .into_iter()
        .flatten()
        .map(sanitize_name)
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_SCOPE.to_string())
}

// ---------------------------------------------------------------------------
// Scoped store
// ---------------------------------------------------------------------------

/// One storage scope (one client profile) on disk.
///
/// Layout:
/// ```text
/// ~/.footfall/
/// ├── footfall.toml
/// └── scopes/
///     ├── default.db
///     └── <scope>.db
/// ```
pub struct ScopeStore {
    store: Store,
    scope_id: String,
}

impl ScopeStore {
    /// Open the scope database, creating directories as needed.
    /// `scope_name`: explicit scope (overrides `FOOTFALL_SCOPE`).
    /// `base_dir`: override the base directory (for testing).
    pub fn open(scope_name: Option<&str>, base_dir: Option<&Path>) -> Result<Self> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        let scopes_dir = base.join("scopes");

        fs::create_dir_all(&scopes_dir)?;

        let from_env = env::var("FOOTFALL_SCOPE").ok();
        let scope_id = resolve_scope_id(scope_name, from_env.as_deref());
        let path = scopes_dir.join(format!("{scope_id}.db"));
        tracing::debug!("opening scope '{scope_id}' at {}", path.display());

        Ok(Self {
            store: Store::open(&path)?,
            scope_id,
        })
    }

    /// Open with an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            store: Store::open_in_memory()?,
            scope_id: "test".to_string(),
        })
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ff_core::{KeyValueStore, keys};

    #[test]
    fn test_directory_creation() {
        let dir = tempfile::tempdir().unwrap();

        let scope = ScopeStore::open(Some("work-profile"), Some(dir.path())).unwrap();
        assert_eq!(scope.scope_id(), "work-profile");
        assert!(dir.path().join("scopes").is_dir());
        assert!(dir.path().join("scopes/work-profile.db").exists());
    }

    #[test]
    fn test_scope_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = ScopeStore::open(Some("a"), Some(dir.path()))
            .unwrap()
            .into_store();
        let b = ScopeStore::open(Some("b"), Some(dir.path()))
            .unwrap()
            .into_store();

        a.set(keys::VISITOR_ID, "VIS-1-AAAAAAAAAAAA").unwrap();
        assert_eq!(b.get(keys::VISITOR_ID).unwrap(), None);
    }

    #[test]
    fn test_in_memory_scope() {
        let scope = ScopeStore::open_in_memory().unwrap();
        assert_eq!(scope.scope_id(), "test");
        assert_eq!(scope.store().db_size(), 0);
    }

    #[test]
    fn test_scope_name_sanitization() {
        assert_eq!(sanitize_name("hello world"), "hello_world");
        assert_eq!(sanitize_name("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_name("valid-name_123"), "valid-name_123");
        assert_eq!(sanitize_name("  padded  "), "padded");
        assert_eq!(sanitize_name("ünïcode"), "_n_code");
    }

    #[test]
    fn test_resolve_explicit_wins() {
        assert_eq!(resolve_scope_id(Some("mine"), Some("env")), "mine");
    }

    #[test]
    fn test_resolve_env_when_no_explicit() {
        assert_eq!(resolve_scope_id(None, Some("from-env")), "from-env");
    }

    #[test]
    fn test_resolve_empty_falls_through() {
        assert_eq!(resolve_scope_id(Some(""), Some("env")), "env");
        assert_eq!(resolve_scope_id(Some("   "), None), DEFAULT_SCOPE);
        assert_eq!(resolve_scope_id(None, None), DEFAULT_SCOPE);
    }

    #[test]
    fn test_resolve_sanitizes() {
        assert_eq!(resolve_scope_id(Some("my/profile name!"), None), "my_profile_name_");
    }
}
