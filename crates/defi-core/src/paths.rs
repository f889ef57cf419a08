use crate::error::{DefiError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DEFI_DIR: &str = ".defi";
pub const HOME_ENV: &str = "DEFI_HOME";

pub const CONFIG_FILE: &str = "config.yaml";
pub const STORE_FILE: &str = "actions.redb";
pub const LOCK_FILE: &str = "actions.lock";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Resolve the state directory.
///
/// Priority:
/// 1. `explicit` (the `--store` flag)
/// 2. `DEFI_HOME`
/// 3. `~/.defi`
pub fn resolve_home(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    home::home_dir()
        .map(|h| h.join(DEFI_DIR))
        .ok_or(DefiError::HomeNotFound)
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE)
}

pub fn store_path(home: &Path) -> PathBuf {
    home.join(STORE_FILE)
}

pub fn lock_path(home: &Path) -> PathBuf {
    home.join(LOCK_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_home_wins() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve_home(Some(dir.path())).unwrap();
        assert_eq!(resolved, dir.path());
        assert_eq!(store_path(&resolved), dir.path().join("actions.redb"));
        assert_eq!(lock_path(&resolved), dir.path().join("actions.lock"));
    }
}
