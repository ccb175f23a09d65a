use crate::configuration::config::Config;
use crate::daemon::control::{ControlReceiver, DaemonSignal, Signaller};
use crate::daemon::keep_alive::KeepAliveDaemon;
use crate::daemon::pid_lock::{self, PidLock, RunningDaemon};
use crate::error_handling::types::*;
use crate::network::transport::Connector;
use crate::session_management::login_client::LoginClient;
use crate::session_management::session::Session;
use log::{debug, error, info, warn};
use std::path::PathBuf;

/// The user-facing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    Logout,
    Status,
    Quit,
}

/// Everything the detached daemon needs once the foreground process is gone.
#[derive(Debug, Clone)]
pub struct DaemonHandoff {
    pub session: Session,
    pub pid_files: Vec<PathBuf>,
    pub log_file: PathBuf,
}

#[derive(Debug)]
pub struct Outcome {
    pub success: bool,
    /// Set when a keep-alive daemon should be started.
    pub daemon: Option<DaemonHandoff>,
}

impl Outcome {
    fn done(success: bool) -> Self {
        Self {
            success,
            daemon: None,
        }
    }
}

pub struct Controller<C: Connector, S: Signaller> {
    config: Config,
    client: LoginClient<C>,
    signaller: S,
    pid_files: Vec<PathBuf>,
}

impl<C: Connector, S: Signaller> Controller<C, S> {
    pub fn new(config: Config, connector: C, signaller: S) -> Self {
        let pid_files = config.pid_candidates();
        Self {
            config,
            client: LoginClient::new(connector),
            signaller,
            pid_files,
        }
    }

    /// Runs one operation against the gateway and the running daemon, if there is one.
    pub async fn process(mut self, operation: Operation) -> Result<Outcome, ControllerError> {
        let running = PidLock::find(&self.pid_files)?;
        if let Some(daemon) = &running {
            debug!(
                "Keep-alive daemon running, pid {} ({})",
                daemon.pid,
                daemon.path.display()
            );
        }

        match operation {
            Operation::Login => self.login(running).await,
            Operation::Logout => self.logout(running).await,
            Operation::Status => Ok(self.status(running).await),
            Operation::Quit => self.quit(running).map(|()| Outcome::done(true)),
        }
    }

    async fn login(&mut self, running: Option<RunningDaemon>) -> Result<Outcome, ControllerError> {
        if let Some(daemon) = running {
            match self.signaller.send(daemon.pid, DaemonSignal::Reload) {
                Ok(()) => {
                    info!(
                        "Keep-alive daemon already running (pid {}), forcing relogin.",
                        daemon.pid
                    );
                    return Ok(Outcome::done(true));
                }
                Err(e) => {
                    warn!(
                        "Cannot signal daemon pid {}: {}, maybe a stale lockfile.",
                        daemon.pid, e
                    );
                    pid_lock::remove(&daemon.path)?;
                }
            }
        }

        let session = &mut self.config.session;
        // Failures are logged by the client. The outcome is read from `logged_in`.
        let _ = self.client.pre_login(session).await;
        if !session.logged_in {
            let _ = self.client.do_login(session).await;
        }

        if session.logged_in {
            info!("Logged in to {}.", session.login_server);
        } else {
            error!("Login to {} failed.", session.login_server);
        }

        let daemon = if session.daemon.enabled {
            if let Err(e) = pid_lock::remove(&self.config.pid_file) {
                warn!("Cannot remove old PID file: {}", e);
            }
            Some(DaemonHandoff {
                session: session.clone(),
                pid_files: self.pid_files.clone(),
                log_file: self.config.log_file.clone(),
            })
        } else {
            None
        };

        Ok(Outcome {
            success: session.logged_in,
            daemon,
        })
    }

    async fn logout(&mut self, running: Option<RunningDaemon>) -> Result<Outcome, ControllerError> {
        let logged_out = self.client.logout(&mut self.config.session).await;
        if let Err(e) = &logged_out {
            error!("Logout failed: {}", e);
        }

        self.quit(running)?;
        Ok(Outcome::done(logged_out.is_ok()))
    }

    async fn status(&mut self, running: Option<RunningDaemon>) -> Outcome {
        let session = &mut self.config.session;
        if let Err(e) = self.client.pre_login(session).await {
            warn!("Cannot reach login server: {}", e);
        }

        println!(
            "Current status: {}",
            if session.logged_in {
                "CONNECTED"
            } else {
                "DISCONNECTED"
            }
        );
        match running {
            Some(daemon) => println!("Keep-alive daemon running, pid: {}", daemon.pid),
            None => println!("Keep-alive daemon not running."),
        }
        Outcome::done(true)
    }

    /// Stops the running daemon, if any. No logout is performed.
    fn quit(&self, running: Option<RunningDaemon>) -> Result<(), ControllerError> {
        let Some(daemon) = running else {
            info!("No keep-alive daemon running.");
            return Ok(());
        };

        self.signaller
            .send(daemon.pid, DaemonSignal::Terminate)
            .map_err(|e| ControllerError::SignalFailed(daemon.pid, e))?;
        info!("Keep-alive daemon (pid {}) stopped.", daemon.pid);
        pid_lock::remove(&daemon.path)?;
        Ok(())
    }
}

/// Body of the detached daemon: takes the PID lock, runs the keep-alive loop until told to stop,
/// then releases the lock.
///
/// Returns the number of completed cycles.
pub async fn serve_daemon<C: Connector>(
    handoff: DaemonHandoff,
    connector: C,
    control: ControlReceiver,
) -> Result<u64, ControllerError> {
    let pid = std::process::id() as i32;
    let lock = match PidLock::acquire(&handoff.pid_files, pid) {
        Ok(lock) => lock,
        Err(e) => {
            error!("{}", e);
            error!("Aborting daemon - cannot communicate PID to outside world.");
            return Err(e.into());
        }
    };
    info!(
        "Keep-alive daemon started, pid: {} ({})",
        pid,
        lock.path().display()
    );

    let mut daemon = KeepAliveDaemon::new(LoginClient::new(connector), handoff.session, control);
    let cycles = daemon.run().await;

    lock.release()?;
    info!("Keep-alive daemon exiting.");
    Ok(cycles)
}
