use anyhow::{Result, bail};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use proxyswitch::{
    commands,
    config::Config,
    doctor::run_doctor,
    paths::Paths,
    reachability::PingCheck,
    state::SessionState,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "proxyswitch")]
#[command(about = "Proxy Profile Switcher - store named proxy endpoints and activate one per session")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Profile to activate directly (omit for the interactive menu)
    profile: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Host used by the reachability check
    #[arg(long, global = true, value_name = "HOST")]
    host: Option<String>,

    /// Reachability check timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Skip the reachability check after switching
    #[arg(long, global = true)]
    no_check: bool,

    /// Replace an active proxy without asking
    #[arg(long, global = true)]
    no_confirm: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all available profiles
    List,

    /// Show the active proxy and the profile it belongs to
    Current {
        /// Print shell commands exporting the proxy variables
        #[arg(long)]
        print_env: bool,
    },

    /// Disable the current proxy
    Off {
        /// Print shell commands unsetting the proxy variables
        #[arg(long)]
        print_env: bool,
    },

    /// Check connectivity with a single ping
    Check {
        /// Host to ping (defaults to the configured host)
        host: Option<String>,
    },

    /// Run diagnostics on the proxyswitch setup
    Doctor,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Completions { shell }) = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "proxyswitch", &mut std::io::stdout());
        return Ok(());
    }

    let paths = Paths::new()?;
    let ui = Ui::new(cli.color, cli.no_color);

    let (mut config, config_error) = match Config::read(&paths.config_file) {
        Ok(config) => (config, None),
        // Doctor reports a broken config file instead of aborting
        Err(e) if matches!(cli.command, Some(Commands::Doctor)) => (Config::default(), Some(e)),
        Err(e) => return Err(e.into()),
    };
    if let Some(host) = cli.host {
        config.ping_host = host;
    }
    if let Some(secs) = cli.timeout {
        if secs == 0 {
            bail!("--timeout must be greater than zero");
        }
        config.ping_timeout_secs = secs;
    }
    if cli.no_confirm {
        config.confirm_replace = false;
    }

    let probe = PingCheck::new(config.ping_timeout());
    let mut session = SessionState::open(&paths);
    let check = !cli.no_check;

    match (cli.command, cli.profile) {
        (Some(Commands::List), _) => commands::list(&paths, &config, &mut session, &ui),
        (Some(Commands::Current { print_env }), _) => {
            commands::current(&paths, &config, &mut session, &ui, print_env)
        }
        (Some(Commands::Off { print_env }), _) => {
            commands::off(&paths, &config, &mut session, &ui, print_env)
        }
        (Some(Commands::Check { host }), _) => {
            commands::check(&config, &probe, &ui, host.as_deref())
        }
        (Some(Commands::Doctor), _) => {
            if !run_doctor(&paths, &config, config_error.as_ref(), &session, &probe, &ui) {
                bail!("Doctor found issues");
            }
            Ok(())
        }
        (Some(Commands::Completions { .. }), _) => Ok(()),
        (None, Some(name)) => {
            commands::use_profile(&paths, &config, &mut session, &probe, &ui, &name, check)
        }
        (None, None) => commands::interactive(&paths, &config, &mut session, &probe, &ui, check),
    }
}
