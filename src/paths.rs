use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::PathBuf;

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "PROXYSWITCH_HOME";

/// All computed paths used by proxyswitch
#[derive(Debug, Clone)]
pub struct Paths {
    /// ~/.proxy-profiles
    pub base_dir: PathBuf,
    /// ~/.proxy-profiles/profiles
    pub profiles_dir: PathBuf,
    /// ~/.proxy-profiles/current_proxy.txt
    pub active_file: PathBuf,
    /// ~/.proxy-profiles/current_proxy.lock
    pub lock_file: PathBuf,
    /// ~/.proxy-profiles/config.json
    pub config_file: PathBuf,
}

impl Paths {
    pub fn new() -> Result<Self> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::with_base(PathBuf::from(home)));
        }

        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        Ok(Self::with_base(base_dirs.home_dir().join(".proxy-profiles")))
    }

    /// Lay out every path beneath `base_dir`
    pub fn with_base(base_dir: PathBuf) -> Self {
        let profiles_dir = base_dir.join("profiles");
        let active_file = base_dir.join("current_proxy.txt");
        let lock_file = base_dir.join("current_proxy.lock");
        let config_file = base_dir.join("config.json");

        Self {
            base_dir,
            profiles_dir,
            active_file,
            lock_file,
            config_file,
        }
    }

    /// Get the path to a specific profile file
    pub fn profile_file(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{}.txt", name))
    }

    /// Ensure the profile store directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.profiles_dir).with_context(|| {
            format!(
                "Failed to create profiles directory: {:?}",
                self.profiles_dir
            )
        })?;
        Ok(())
    }
}
