//! Test utilities shared across test modules
//!
//! This module provides common helper functions for testing, avoiding duplication
//! across multiple test suites.

use crate::paths::Paths;
use crate::reachability::{Outcome, Reachability};
use std::cell::RefCell;
use tempfile::TempDir;

/// Create a Paths struct for testing using a temporary directory
///
/// Mimics the real ~/.proxy-profiles/ layout inside the temp directory.
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths::with_base(temp_dir.path().join(".proxy-profiles"))
}

/// Place a profile file in the store
pub fn write_profile(paths: &Paths, name: &str, address: &str) {
    std::fs::create_dir_all(&paths.profiles_dir).unwrap();
    std::fs::write(paths.profile_file(name), address).unwrap();
}

/// Reachability fake that records probed hosts and returns a fixed outcome
pub struct FakeReachability {
    pub outcome: Outcome,
    pub probed: RefCell<Vec<String>>,
}

impl FakeReachability {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            probed: RefCell::new(Vec::new()),
        }
    }
}

impl Reachability for FakeReachability {
    fn check(&self, host: &str) -> Outcome {
        self.probed.borrow_mut().push(host.to_string());
        self.outcome.clone()
    }
}
