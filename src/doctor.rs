//! Diagnostic tool for proxyswitch.
//!
//! This module implements the `proxyswitch doctor` command, which checks:
//! - Existence of the storage directories (informational, they are created
//!   on first use).
//! - Validity of the config file.
//! - Profile files (empty files, addresses without a port).
//! - Agreement between the persisted address and the process environment.
//! - Reachability of the configured host.
//!
//! Each step reports pass/warn/fail lines; the return value says whether any
//! step failed.

use anstyle::AnsiColor;

use crate::activation::find_matching_profile;
use crate::config::Config;
use crate::error::ProxyError;
use crate::paths::Paths;
use crate::profiles::ProfileStore;
use crate::reachability::Reachability;
use crate::state::{ProxyEnv, SessionState, proxy_url};
use crate::ui::Ui;

/// Run the doctor diagnostics, returning `true` when no step failed
///
/// `config` is the effective configuration (file plus command line overrides);
/// `config_error` is the failure from reading the config file, if any.
pub fn run_doctor<E: ProxyEnv>(
    paths: &Paths,
    config: &Config,
    config_error: Option<&ProxyError>,
    session: &SessionState<E>,
    probe: &dyn Reachability,
    ui: &Ui,
) -> bool {
    ui.section("proxyswitch Doctor");
    ui.newline();

    let mut healthy = true;

    // Missing directories are created on first use
    check_step(ui, "Directories", || {
        for (label, dir) in [
            ("Base directory", &paths.base_dir),
            ("Profiles directory", &paths.profiles_dir),
        ] {
            if dir.is_dir() {
                ui.println(format!("  {} {} exists: {}", ui.icon_ok(), label, dir.display()));
            } else {
                ui.println(format!(
                    "  {} {} not created yet: {}",
                    ui.icon_info(),
                    label,
                    dir.display()
                ));
            }
        }
        true
    });

    healthy &= check_step(ui, "Config File", || match config_error {
        Some(e) => {
            ui.println(format!("  {} {}", ui.icon_err(), e));
            ui.println(format!("  {} Continuing with defaults", ui.icon_info()));
            false
        }
        None => {
            if paths.config_file.exists() {
                ui.println(format!("  {} Config file valid", ui.icon_ok()));
            } else {
                ui.println(format!("  {} No config file (using defaults)", ui.icon_info()));
            }
            true
        }
    });

    let store = ProfileStore::new(paths);
    let mut entries = Vec::new();
    healthy &= check_step(ui, "Profiles", || {
        let names = match store.list_profiles() {
            Ok(names) => names,
            Err(e) => {
                ui.println(format!("  {} Failed to list profiles: {}", ui.icon_err(), e));
                return false;
            }
        };

        if names.is_empty() {
            ui.println(format!("  {} No profiles found", ui.icon_warn()));
            return true;
        }

        ui.println(format!("  Found {} profiles:", names.len()));
        let mut all_valid = true;
        for name in names {
            match store.read_profile(&name) {
                Ok(Some(address)) => {
                    if address.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()) {
                        ui.println(format!("    {} {} -> {}", ui.icon_ok(), name, address));
                    } else {
                        ui.println(format!(
                            "    {} {} -> {} (no port)",
                            ui.icon_warn(),
                            name,
                            address
                        ));
                    }
                    entries.push((name, address));
                }
                Ok(None) => {
                    ui.println(format!("    {} {} (empty file)", ui.icon_err(), name));
                    all_valid = false;
                }
                Err(e) => {
                    ui.println(format!("    {} {} ({})", ui.icon_err(), name, e));
                    all_valid = false;
                }
            }
        }
        all_valid
    });

    healthy &= check_step(ui, "Session State", || {
        let persisted = match session.load_persisted_address() {
            Ok(persisted) => persisted,
            Err(e) => {
                ui.println(format!("  {} {}", ui.icon_err(), e));
                return false;
            }
        };

        match &persisted {
            Some(address) => {
                ui.println(format!("  {} Persisted proxy: {}", ui.icon_info(), address));
                let url = proxy_url(address);
                match find_matching_profile(Some(url.as_str()), &entries) {
                    Some(name) => ui.println(format!("  {} Matches profile: {}", ui.icon_ok(), name)),
                    None => ui.println(format!(
                        "  {} Persisted proxy matches no profile",
                        ui.icon_warn()
                    )),
                }
            }
            None => ui.println(format!("  {} No persisted proxy", ui.icon_info())),
        }

        let live_http = session.live_http();
        let live_https = session.live_https();
        ui.println(format!(
            "  {} HTTP_PROXY: {}",
            ui.icon_info(),
            ui.proxy_value(live_http.as_deref())
        ));
        ui.println(format!(
            "  {} HTTPS_PROXY: {}",
            ui.icon_info(),
            ui.proxy_value(live_https.as_deref())
        ));

        let persisted_url = persisted.as_deref().map(proxy_url);
        if live_http.is_some() && persisted_url.is_some() && live_http != persisted_url {
            ui.println(format!(
                "  {} Environment and persisted proxy differ",
                ui.icon_warn()
            ));
        }
        true
    });

    // Connectivity is informational and never fails the doctor run
    check_step(ui, "Reachability", || {
        let outcome = probe.check(&config.ping_host);
        if outcome.is_success() {
            ui.println(format!("  {} {}: {}", ui.icon_ok(), config.ping_host, outcome));
        } else {
            ui.println(format!("  {} {}: {}", ui.icon_warn(), config.ping_host, outcome));
        }
        true
    });

    healthy
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F) -> bool
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    let success = check_fn();
    if !success {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
    success
}
