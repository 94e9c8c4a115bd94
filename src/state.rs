//! Session state: the persisted active address and the live proxy variables.
//!
//! Two sources of truth coexist and may diverge:
//! - `current_proxy.txt` answers "is a proxy active across restarts"
//! - the `HTTP_PROXY`/`HTTPS_PROXY` variables answer "is a proxy active in
//!   this process"
//!
//! Environment access goes through [`ProxyEnv`] so tests run against an
//! isolated [`MemoryEnv`] instead of the real process environment.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ProxyError, Result};
use crate::fs_utils::{atomic_write, with_exclusive_lock};
use crate::paths::Paths;

pub const HTTP_PROXY_VAR: &str = "HTTP_PROXY";
pub const HTTPS_PROXY_VAR: &str = "HTTPS_PROXY";

/// Scheme prefixed to a raw `host:port` address
pub const PROXY_SCHEME: &str = "http://";

/// Build the proxy URL exported for a raw address
pub fn proxy_url(address: &str) -> String {
    format!("{PROXY_SCHEME}{address}")
}

/// Access to the process-visible proxy variables
pub trait ProxyEnv {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// The real process environment
///
/// Changes are visible to this process and the children it spawns only.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl ProxyEnv for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn set(&mut self, key: &str, value: &str) {
        // SAFETY: proxyswitch is single-threaded; no other thread reads the
        // environment while it is being modified.
        unsafe { std::env::set_var(key, value) };
    }

    fn remove(&mut self, key: &str) {
        // SAFETY: see `set`.
        unsafe { std::env::remove_var(key) };
    }
}

/// In-memory environment for isolated sessions
#[derive(Debug, Default, Clone)]
pub struct MemoryEnv {
    vars: HashMap<String, String>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl ProxyEnv for MemoryEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.vars.remove(key);
    }
}

/// Persisted address plus live environment for one invocation
#[derive(Debug)]
pub struct SessionState<E: ProxyEnv> {
    active_file: PathBuf,
    lock_file: PathBuf,
    env: E,
}

impl SessionState<ProcessEnv> {
    /// Session backed by the real process environment
    pub fn open(paths: &Paths) -> Self {
        Self::with_env(paths, ProcessEnv)
    }
}

impl<E: ProxyEnv> SessionState<E> {
    pub fn with_env(paths: &Paths, env: E) -> Self {
        Self {
            active_file: paths.active_file.clone(),
            lock_file: paths.lock_file.clone(),
            env,
        }
    }

    pub fn active_file(&self) -> &Path {
        &self.active_file
    }

    /// Durably overwrite the persisted address
    ///
    /// Concurrent writers serialize on the lock file; the last one wins.
    pub fn save_active_address(&self, address: &str) -> Result<()> {
        with_exclusive_lock(&self.lock_file, || {
            atomic_write(&self.active_file, address)
        })?;
        info!(address, file = %self.active_file.display(), "persisted active proxy");
        Ok(())
    }

    /// Load the persisted address, `None` if never set or cleared
    pub fn load_persisted_address(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.active_file) {
            Ok(content) => {
                let address = content.trim();
                Ok((!address.is_empty()).then(|| address.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProxyError::storage(&self.active_file, e)),
        }
    }

    /// Remove the persisted record; a missing record is not an error
    pub fn clear_persisted_address(&self) -> Result<()> {
        with_exclusive_lock(&self.lock_file, || {
            match fs::remove_file(&self.active_file) {
                Ok(()) => {
                    info!(file = %self.active_file.display(), "removed persisted proxy");
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ProxyError::storage(&self.active_file, e)),
            }
        })
    }

    /// When the persisted address was last written
    pub fn persisted_since(&self) -> Option<DateTime<Local>> {
        let modified = fs::metadata(&self.active_file).ok()?.modified().ok()?;
        Some(DateTime::<Local>::from(modified))
    }

    /// Export `http://<address>` as both the HTTP and HTTPS proxy
    pub fn apply_to_environment(&mut self, address: &str) {
        let url = proxy_url(address);
        self.env.set(HTTP_PROXY_VAR, &url);
        self.env.set(HTTPS_PROXY_VAR, &url);
        debug!(%url, "exported proxy variables");
    }

    /// Remove both proxy variables
    pub fn clear_environment(&mut self) {
        self.env.remove(HTTP_PROXY_VAR);
        self.env.remove(HTTPS_PROXY_VAR);
        debug!("cleared proxy variables");
    }

    pub fn live_http(&self) -> Option<String> {
        self.env.get(HTTP_PROXY_VAR)
    }

    pub fn live_https(&self) -> Option<String> {
        self.env.get(HTTPS_PROXY_VAR)
    }
}
