use alive::configuration::config::{expand_tilde, Config};
use alive::configuration::types::{DEFAULT_LOG_FILE, PACKAGE_NAME, PACKAGE_VERSION};
use alive::controller::controller_handler::{serve_daemon, Controller, DaemonHandoff, Operation, Outcome};
use alive::daemon::control::{channel, forward_unix_signals, KillSignaller};
use alive::daemon::detach::{detach, ForkRole};
use alive::error_handling::types::ControllerError;
use alive::logging::{self, LogHandle};
use alive::network::transport::TcpConnector;
use clap::{ArgGroup, Parser};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::process;
use tokio::runtime::{Builder, Runtime};

#[derive(Parser, Debug)]
#[command(name = "alive")]
#[command(version)]
#[command(about = "Automatic login and keep-alive for ISP login gateways")]
#[command(group(
    ArgGroup::new("operation")
        .required(true)
        .args(["login", "logout", "status", "quit"])
))]
struct Args {
    /// Log in, and start the keep-alive daemon if configured
    #[arg(short = 'l', long)]
    login: bool,

    /// Log out and stop the keep-alive daemon
    #[arg(short = 'o', long)]
    logout: bool,

    /// Show login and daemon status
    #[arg(short = 's', long)]
    status: bool,

    /// Stop the keep-alive daemon without logging out
    #[arg(short = 'q', long)]
    quit: bool,

    /// Configuration file to use
    #[arg(short = 'c', long, env = "ALIVE_CONF", value_name = "FILE")]
    conf_file: Option<PathBuf>,

    /// PID file of the keep-alive daemon
    #[arg(short = 'p', long, value_name = "FILE")]
    pid_file: Option<PathBuf>,

    /// Login server port
    #[arg(short = 'P', long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Log progress
    #[arg(short, long)]
    verbose: bool,

    /// Log everything, implies --verbose
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn operation(&self) -> Operation {
        if self.login {
            Operation::Login
        } else if self.logout {
            Operation::Logout
        } else if self.status {
            Operation::Status
        } else {
            Operation::Quit
        }
    }
}

fn runtime() -> Result<Runtime, ControllerError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ControllerError::RuntimeFailed)
}

/// Loads the configuration file and applies the command-line overrides.
fn load_config(args: &Args) -> Result<Config, ControllerError> {
    let mut config = Config::load(args.conf_file.as_deref())?;
    config.apply_overrides(args.pid_file.clone(), args.port);
    debug!("Configuration: {:?}", config);
    Ok(config)
}

/// The runtime, blocking pool included, is dropped on return so that forking afterwards is safe.
fn run_foreground(config: Config, operation: Operation) -> Result<Outcome, ControllerError> {
    let runtime = runtime()?;
    let controller = Controller::new(config, TcpConnector, KillSignaller);
    runtime.block_on(controller.process(operation))
}

fn run_daemon(handoff: DaemonHandoff) -> Result<u64, ControllerError> {
    let runtime = runtime()?;
    runtime.block_on(async {
        let (control, rx) = channel();
        forward_unix_signals(control).map_err(ControllerError::RuntimeFailed)?;
        serve_daemon(handoff, TcpConnector, rx).await
    })
}

/// Forks the keep-alive daemon. Returns in the original process only.
fn start_daemon(handoff: DaemonHandoff, log: &LogHandle) -> Result<(), ControllerError> {
    match detach().map_err(ControllerError::RuntimeFailed)? {
        ForkRole::Parent(child) => {
            debug!("Daemon launched through intermediate process {}", child);
            Ok(())
        }
        ForkRole::Daemon => {
            // stderr is /dev/null from here on. Without a log file there is no way to report.
            let targets = [handoff.log_file.clone(), expand_tilde(DEFAULT_LOG_FILE)];
            match log.redirect_to_first(&targets) {
                Ok(used) if used != handoff.log_file => warn!(
                    "Cannot open log file {}, logging to {} instead.",
                    handoff.log_file.display(),
                    used.display()
                ),
                Ok(_) => {}
                Err(_) => process::exit(1),
            }
            let code = match run_daemon(handoff) {
                Ok(cycles) => {
                    debug!("Daemon finished after {} cycle(s)", cycles);
                    0
                }
                Err(e) => {
                    error!("Keep-alive daemon failed: {}", e);
                    1
                }
            };
            process::exit(code);
        }
    }
}

fn main() {
    let args = Args::parse();

    let log = match logging::init(logging::level_for(args.verbose, args.debug)) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Unable to initialise logging: {}", e);
            process::exit(1);
        }
    };
    info!("{} v{}", PACKAGE_NAME, PACKAGE_VERSION);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration. {}", e);
            process::exit(1);
        }
    };

    let outcome = match run_foreground(config, args.operation()) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if let Some(handoff) = outcome.daemon {
        if let Err(e) = start_daemon(handoff, &log) {
            error!("Cannot start keep-alive daemon: {}", e);
            process::exit(1);
        }
    }

    process::exit(if outcome.success { 0 } else { 1 });
}
