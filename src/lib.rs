pub mod activation;
pub mod commands;
pub mod config;
pub mod doctor;
pub mod error;
pub mod fs_utils;
pub mod paths;
pub mod profiles;
pub mod reachability;
pub mod state;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
