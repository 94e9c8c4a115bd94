//! Profile store.
//!
//! A profile is a `<name>.txt` file in `~/.proxy-profiles/profiles/` holding a
//! single proxy address (`host:port`, not validated). Profiles are created and
//! edited by the user; this module only enumerates and reads them.

use std::fs;
use std::io::ErrorKind;
use tracing::debug;

use crate::error::{ProxyError, Result};
use crate::paths::Paths;

/// Extension that marks a file in the store as a profile
pub const PROFILE_EXTENSION: &str = "txt";

/// Read-only view over the profile directory
#[derive(Debug, Clone)]
pub struct ProfileStore<'a> {
    paths: &'a Paths,
}

impl<'a> ProfileStore<'a> {
    pub fn new(paths: &'a Paths) -> Self {
        Self { paths }
    }

    /// List available profile names, sorted lexically
    ///
    /// Creates the profile directory if it is absent. An empty store is valid.
    pub fn list_profiles(&self) -> Result<Vec<String>> {
        let dir = &self.paths.profiles_dir;
        fs::create_dir_all(dir).map_err(|e| ProxyError::storage(dir, e))?;

        let mut profiles = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| ProxyError::storage(dir, e))? {
            let entry = entry.map_err(|e| ProxyError::storage(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                profiles.push(name.to_string());
            }
        }
        profiles.sort();

        debug!(count = profiles.len(), dir = %dir.display(), "enumerated profiles");
        Ok(profiles)
    }

    /// Read the stored address for `name`
    ///
    /// Returns `None` when no such profile exists, or when the file holds only
    /// whitespace. Any listed name resolves; names that could escape the store
    /// are treated as unknown.
    pub fn read_profile(&self, name: &str) -> Result<Option<String>> {
        if validate_profile_name(name).is_err() {
            return Ok(None);
        }

        let path = self.paths.profile_file(name);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let address = content.trim();
                if address.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(address.to_string()))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProxyError::storage(path, e)),
        }
    }

    /// Read every profile in enumeration order
    ///
    /// Empty profile files are skipped; read errors are returned.
    pub fn read_all(&self) -> Result<Vec<(String, String)>> {
        let mut entries = Vec::new();
        for name in self.list_profiles()? {
            if let Some(address) = self.read_profile(&name)? {
                entries.push((name, address));
            }
        }
        Ok(entries)
    }
}

/// Validate profile name
///
/// Rejects names that would not map to a single file inside the profile
/// directory: empty, `.`/`..`, or containing a path separator or NUL.
/// Spaces and non-ASCII characters are fine.
pub fn validate_profile_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);

    if valid {
        Ok(())
    } else {
        Err(ProxyError::InvalidProfileName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{setup_test_paths, write_profile};
    use tempfile::TempDir;

    #[test]
    fn test_profile_name_validation() {
        assert!(validate_profile_name("work").is_ok());
        assert!(validate_profile_name("my-profile").is_ok());
        assert!(validate_profile_name("test_123").is_ok());
        assert!(validate_profile_name("corp.eu").is_ok());
        assert!(validate_profile_name("corp proxy").is_ok());
        assert!(validate_profile_name("büro").is_ok());
        assert!(validate_profile_name(&"x".repeat(100)).is_ok());

        assert!(validate_profile_name("").is_err());
        assert!(validate_profile_name(".").is_err());
        assert!(validate_profile_name("..").is_err());
        assert!(validate_profile_name("test/profile").is_err());
        assert!(validate_profile_name("test\\profile").is_err());
        assert!(validate_profile_name("nul\0byte").is_err());
    }

    #[test]
    fn test_list_creates_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        let store = ProfileStore::new(&paths);

        assert!(!paths.profiles_dir.exists());
        assert!(store.list_profiles().unwrap().is_empty());
        assert!(paths.profiles_dir.is_dir());
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_profile(&paths, "work", "10.0.0.1:8080");
        write_profile(&paths, "home", "10.0.0.2:3128");
        fs::write(paths.profiles_dir.join("notes.md"), "ignored").unwrap();
        fs::create_dir(paths.profiles_dir.join("sub.txt")).unwrap();

        let store = ProfileStore::new(&paths);
        assert_eq!(store.list_profiles().unwrap(), vec!["home", "work"]);
    }

    #[test]
    fn test_read_profile_trims() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_profile(&paths, "work", "  10.0.0.1:8080\n");

        let store = ProfileStore::new(&paths);
        assert_eq!(
            store.read_profile("work").unwrap().as_deref(),
            Some("10.0.0.1:8080")
        );
    }

    #[test]
    fn test_read_profile_missing_or_empty() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_profile(&paths, "blank", "\n");

        let store = ProfileStore::new(&paths);
        assert_eq!(store.read_profile("vpn").unwrap(), None);
        assert_eq!(store.read_profile("blank").unwrap(), None);
        assert_eq!(store.read_profile("../current_proxy").unwrap(), None);
    }

    #[test]
    fn test_listed_names_resolve() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_profile(&paths, "corp proxy", "10.9.9.9:8080");
        write_profile(&paths, "büro", "10.9.9.10:3128");

        let store = ProfileStore::new(&paths);
        let names = store.list_profiles().unwrap();
        assert_eq!(names, vec!["büro", "corp proxy"]);
        for name in &names {
            assert!(store.read_profile(name).unwrap().is_some(), "{name} did not resolve");
        }
    }

    #[test]
    fn test_read_all() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp_dir);
        write_profile(&paths, "work", "10.0.0.1:8080");
        write_profile(&paths, "blank", "");

        let store = ProfileStore::new(&paths);
        assert_eq!(
            store.read_all().unwrap(),
            vec![("work".to_string(), "10.0.0.1:8080".to_string())]
        );
        assert_eq!(store.list_profiles().unwrap(), vec!["blank", "work"]);
    }
}
