//! High-level command orchestration for the CLI.
//!
//! This module contains the handler functions behind each invocation form:
//! the interactive menu, direct activation by profile name, and the `list`,
//! `current`, `off` and `check` subcommands. Handlers translate user input
//! into [`Request`] values for the activation core and render the result
//! through `crate::ui`.
//!
//! Handlers are generic over the environment and the reachability probe;
//! `main.rs` passes the real process environment and `ping`, tests pass
//! `MemoryEnv` and a fake.

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use inquire::{Confirm, InquireError, Select};
use std::fmt;
use tracing::{debug, warn};

use crate::activation::{
    Action, ActivationCore, Phase, ProxyStatus, Request, find_matching_profile,
};
use crate::config::Config;
use crate::error::ProxyError;
use crate::paths::Paths;
use crate::profiles::ProfileStore;
use crate::reachability::{Outcome, Reachability};
use crate::state::{HTTP_PROXY_VAR, HTTPS_PROXY_VAR, ProxyEnv, SessionState};
use crate::ui::Ui;

const DISABLE_LABEL: &str = "No Proxy (Disable Current Proxy)";

/// One entry of the interactive menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    Disable,
    Profile {
        name: String,
        address: Option<String>,
        active: bool,
    },
}

impl MenuChoice {
    pub fn request(&self) -> Request {
        match self {
            MenuChoice::Disable => Request::Disable,
            MenuChoice::Profile { name, .. } => Request::Profile(name.clone()),
        }
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuChoice::Disable => write!(f, "{}", DISABLE_LABEL),
            MenuChoice::Profile {
                name,
                address,
                active,
            } => {
                write!(f, "{}", name)?;
                if let Some(address) = address {
                    write!(f, "  ({})", address)?;
                }
                if *active {
                    write!(f, " [active]")?;
                }
                Ok(())
            }
        }
    }
}

/// Menu entries: "disable" first when a proxy is active, then every profile
pub fn menu_choices(
    status: &ProxyStatus,
    profiles: &[String],
    store: &ProfileStore<'_>,
) -> Result<Vec<MenuChoice>> {
    let mut choices = Vec::new();
    if status.is_active() {
        choices.push(MenuChoice::Disable);
    }

    let entries = store.read_all()?;
    let matched = find_matching_profile(status.http.as_deref(), &entries);

    for name in profiles {
        let address = entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a.clone());
        choices.push(MenuChoice::Profile {
            name: name.clone(),
            address,
            active: matched == Some(name.as_str()),
        });
    }
    Ok(choices)
}

fn activation_core<'a, E: ProxyEnv>(
    paths: &'a Paths,
    config: &Config,
    session: &'a mut SessionState<E>,
) -> ActivationCore<'a, E> {
    ActivationCore::new(session, ProfileStore::new(paths))
        .https_follows_persisted(config.https_follows_persisted)
}

/// Run the reachability probe against the configured host and print the result
pub fn report_reachability(config: &Config, probe: &dyn Reachability, ui: &Ui) -> Outcome {
    let host = config.ping_host.as_str();
    let spinner = ui.spinner(format!("Pinging {}...", host));
    let outcome = probe.check(host);

    match &outcome {
        Outcome::Latency(time) => ui.spinner_finish_ok(&spinner, format!("Pinging {}: {}", host, time)),
        Outcome::Reachable => ui.spinner_finish_ok(&spinner, format!("Pinging {} successful.", host)),
        other => {
            if let Some(err) = other.failure() {
                warn!(host, error = %err, "reachability check failed");
            }
            let msg = match other {
                Outcome::Failed(reason) => format!("Ping error: {}", reason),
                Outcome::TimedOut(after) => {
                    format!("Ping timed out after {}s.", after.as_secs())
                }
                _ => "Ping failed.".to_string(),
            };
            ui.spinner_finish_warn(&spinner, msg);
        }
    }
    outcome
}

fn describe_active(status: &ProxyStatus, matched: Option<&str>, ui: &Ui) {
    let Some(http) = status.http.as_deref() else {
        ui.println(format!("Current proxy: {}", ui.dim("None")));
        return;
    };
    let profile = match matched {
        Some(name) => format!("(Profile: {})", ui.bold(name)),
        None => ui.dim("(No matching profile)"),
    };
    ui.println(format!(
        "Current proxy is set: {} {}",
        ui.proxy_value(Some(http)),
        profile
    ));
}

fn export_hint(ui: &Ui) {
    ui.println(ui.dim(
        "Variables are set for this process only. To export them in your shell run: eval \"$(proxyswitch current --print-env)\"",
    ));
}

/// Interactive mode: show status, offer a single-choice menu, apply the choice
pub fn interactive<E: ProxyEnv>(
    paths: &Paths,
    config: &Config,
    session: &mut SessionState<E>,
    probe: &dyn Reachability,
    ui: &Ui,
    check: bool,
) -> Result<()> {
    interactive_with(paths, config, session, probe, ui, check, prompt_menu)
}

/// Interactive mode with an injectable selector
///
/// `select` receives the menu and returns the chosen entry, or `None` when
/// the user cancelled.
pub fn interactive_with<E, F>(
    paths: &Paths,
    config: &Config,
    session: &mut SessionState<E>,
    probe: &dyn Reachability,
    ui: &Ui,
    check: bool,
    select: F,
) -> Result<()>
where
    E: ProxyEnv,
    F: FnOnce(Vec<MenuChoice>) -> Result<Option<MenuChoice>>,
{
    let mut core = activation_core(paths, config, session);
    let profiles = core.store().list_profiles()?;
    let status = core.current_status()?;

    describe_active(&status, core.matching_profile()?.as_deref(), ui);
    if status.is_active() && check {
        report_reachability(config, probe, ui);
    }

    let choices = menu_choices(&status, &profiles, core.store())?;
    if choices.is_empty() {
        ui.warn(ProxyError::NoProfilesAvailable.to_string());
        ui.newline();
        ui.println("Create one by placing a file with a proxy address in:");
        ui.println(format!(
            "  {}",
            ui.bold(format!("{}/<name>.txt", paths.profiles_dir.display()))
        ));
        return Ok(());
    }

    let Some(choice) = select(choices)? else {
        ui.info("No changes made.");
        return Ok(());
    };
    debug!(%choice, "menu selection");

    match core.run(choice.request())? {
        Phase::Applied(status) => match &choice {
            MenuChoice::Disable => ui.ok("Proxy unset for this session"),
            MenuChoice::Profile { name, .. } => ui.ok(format!(
                "Proxy set for this session: {} (Profile: {})",
                status.http.as_deref().unwrap_or_default(),
                name
            )),
        },
        Phase::Rejected(name) => return Err(ProxyError::ProfileNotFound(name).into()),
        other => bail!("Activation stopped in a non-terminal phase: {:?}", other),
    }

    let status = core.current_status()?;
    if status.is_active() {
        if check {
            report_reachability(config, probe, ui);
        }
        export_hint(ui);
    } else {
        ui.println("Proxy is disabled.");
    }
    Ok(())
}

/// Present the menu with inquire
pub fn prompt_menu(choices: Vec<MenuChoice>) -> Result<Option<MenuChoice>> {
    match Select::new("Select a profile", choices)
        .with_help_message("↑↓ to move, Enter to select, Esc to cancel")
        .prompt()
    {
        Ok(choice) => Ok(Some(choice)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e).context("Profile selection failed"),
    }
}

/// Ask whether to unset the active proxy before switching
pub fn prompt_unset_first(current: &str) -> Result<bool> {
    Confirm::new("Do you want to unset it first?")
        .with_default(false)
        .with_help_message(&format!("Currently active: {}", current))
        .prompt()
        .or_else(|e| match e {
            InquireError::OperationCanceled | InquireError::OperationInterrupted => Ok(false),
            other => Err(other),
        })
        .context("Confirmation failed")
}

/// Direct mode: activate `name` without the menu
pub fn use_profile<E: ProxyEnv>(
    paths: &Paths,
    config: &Config,
    session: &mut SessionState<E>,
    probe: &dyn Reachability,
    ui: &Ui,
    name: &str,
    check: bool,
) -> Result<()> {
    use_profile_with(paths, config, session, probe, ui, name, check, prompt_unset_first)
}

/// Direct mode with an injectable confirmation
#[allow(clippy::too_many_arguments)]
pub fn use_profile_with<E, F>(
    paths: &Paths,
    config: &Config,
    session: &mut SessionState<E>,
    probe: &dyn Reachability,
    ui: &Ui,
    name: &str,
    check: bool,
    confirm: F,
) -> Result<()>
where
    E: ProxyEnv,
    F: FnOnce(&str) -> Result<bool>,
{
    let mut core = activation_core(paths, config, session);

    let Phase::Resolved(action) = core.step(Phase::Unknown(Request::Profile(name.to_string())))?
    else {
        bail!("Profile '{}' could not be resolved", name);
    };
    if let Action::NotFound(name) = &action {
        bail!(
            "{}\nHint: Use 'proxyswitch list' to see available profiles.",
            ProxyError::ProfileNotFound(name.clone())
        );
    }

    let status = core.current_status()?;
    if let Some(current) = status.http.as_deref() {
        ui.println(format!("Current proxy is set: {}", ui.proxy_value(Some(current))));
        if check {
            report_reachability(config, probe, ui);
        }
        if config.confirm_replace && confirm(current)? {
            core.deactivate()?;
            ui.ok("Proxy unset for this session");
        }
    }

    let Phase::Applied(status) = core.step(Phase::Resolved(action))? else {
        bail!("Failed to activate profile '{}'", name);
    };
    ui.ok(format!(
        "Proxy set for this session: {} (Profile: {})",
        status.http.as_deref().unwrap_or_default(),
        name
    ));

    if check {
        report_reachability(config, probe, ui);
    }
    export_hint(ui);
    Ok(())
}

/// List all available profiles with their addresses
pub fn list<E: ProxyEnv>(
    paths: &Paths,
    config: &Config,
    session: &mut SessionState<E>,
    ui: &Ui,
) -> Result<()> {
    let core = activation_core(paths, config, session);
    let entries = core.store().read_all()?;
    let names = core.store().list_profiles()?;

    if names.is_empty() {
        ui.warn("No profiles found.");
        ui.newline();
        ui.println("Create one with:");
        ui.println(format!(
            "  echo 10.0.0.1:8080 > {}",
            paths.profile_file("work").display()
        ));
        return Ok(());
    }

    let status = core.current_status()?;
    let matched = find_matching_profile(status.http.as_deref(), &entries);

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Profile"),
        ui.header_cell("Address"),
        ui.header_cell("Status"),
    ]);

    for name in &names {
        let is_active = matched == Some(name.as_str());
        let icon = if is_active { ui.icon_ok() } else { " " };
        let address_cell = match entries.iter().find(|(n, _)| n == name) {
            Some((_, address)) => ui.cell(address),
            None => ui.colored_cell("(empty)", AnsiColor::Yellow),
        };
        let status_cell = if is_active {
            ui.colored_cell("active", AnsiColor::Green)
        } else {
            ui.cell("-")
        };

        table.add_row(vec![ui.cell(icon), ui.cell(name), address_cell, status_cell]);
    }

    ui.section("Profiles");
    ui.println(table.to_string());
    Ok(())
}

/// Shell lines that reproduce `status` in a POSIX shell
pub fn env_script(status: &ProxyStatus) -> String {
    let mut lines = Vec::new();
    for (var, value) in [
        (HTTP_PROXY_VAR, status.http.as_deref()),
        (HTTPS_PROXY_VAR, status.https.as_deref()),
    ] {
        match value {
            Some(url) => lines.push(format!("export {}='{}'", var, url.replace('\'', "'\\''"))),
            None => lines.push(format!("unset {}", var)),
        }
    }
    lines.join("\n")
}

/// Show the active proxy, where it comes from, and the matching profile
pub fn current<E: ProxyEnv>(
    paths: &Paths,
    config: &Config,
    session: &mut SessionState<E>,
    ui: &Ui,
    print_env: bool,
) -> Result<()> {
    let core = activation_core(paths, config, session);
    let status = core.current_status()?;

    if print_env {
        ui.println(env_script(&status));
        return Ok(());
    }

    let persisted = core.session().load_persisted_address()?;
    let matched = core.matching_profile()?;

    ui.section("Current Proxy");
    ui.newline();

    let mut table = ui.simple_table();
    table.add_row(vec![
        ui.cell("HTTP proxy:"),
        ui.cell(ui.proxy_value(status.http.as_deref())),
    ]);
    table.add_row(vec![
        ui.cell("HTTPS proxy:"),
        ui.cell(ui.proxy_value(status.https.as_deref())),
    ]);

    match &persisted {
        Some(address) => {
            table.add_row(vec![ui.cell("Persisted:"), ui.cell(address)]);
            if let Some(since) = core.session().persisted_since() {
                table.add_row(vec![
                    ui.cell("Activated:"),
                    ui.cell(since.format("%Y-%m-%d %H:%M:%S").to_string()),
                ]);
            }
        }
        None => {
            table.add_row(vec![ui.cell("Persisted:"), ui.cell("(none)")]);
        }
    }

    let profile_cell = match (&matched, status.is_active()) {
        (Some(name), _) => ui.colored_cell(name, AnsiColor::Green),
        (None, true) => ui.colored_cell("(no matching profile)", AnsiColor::Yellow),
        (None, false) => ui.cell("-"),
    };
    table.add_row(vec![ui.cell("Profile:"), profile_cell]);

    ui.println(table.to_string());

    if status.http.is_some() && status.https.is_none() {
        ui.newline();
        ui.println(ui.dim(
            "HTTPS is inactive until the proxy is re-activated in this session.",
        ));
    }
    Ok(())
}

/// Disable the current proxy
pub fn off<E: ProxyEnv>(
    paths: &Paths,
    config: &Config,
    session: &mut SessionState<E>,
    ui: &Ui,
    print_env: bool,
) -> Result<()> {
    let mut core = activation_core(paths, config, session);
    let Phase::Applied(status) = core.run(Request::Disable)? else {
        bail!("Failed to disable the proxy");
    };

    if print_env {
        ui.println(env_script(&status));
    } else {
        ui.ok("Proxy unset for this session");
    }
    Ok(())
}

/// Run a standalone reachability check
pub fn check(config: &Config, probe: &dyn Reachability, ui: &Ui, host: Option<&str>) -> Result<()> {
    let mut config = config.clone();
    if let Some(host) = host {
        config.ping_host = host.to_string();
    }

    let outcome = report_reachability(&config, probe, ui);
    match outcome.failure() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
