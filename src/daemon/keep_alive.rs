//! # Keep-alive loop
//!
//! Runs inside the detached daemon. Each cycle sleeps for the configured delay (or less, when a
//! reload arrives), pings the gateway and, in login mode, logs in again if the session dropped.
//!
//! The login state is logged after the first cycle and then once per edge, not every cycle.

use crate::configuration::types::DaemonMode;
use crate::daemon::control::{ControlReceiver, Wake};
use crate::network::transport::Connector;
use crate::session_management::login_client::LoginClient;
use crate::session_management::session::Session;
use log::{debug, error, info};

/// Outcome of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// The cycle was started by a reload rather than the timer.
    pub forced: bool,
    pub logged_in: bool,
}

impl CycleReport {
    pub fn summary(&self) -> &'static str {
        match (self.forced, self.logged_in) {
            (true, true) => "Forced relogin successful.",
            (true, false) => "Forced relogin FAILED!",
            (false, true) => "Periodic relogin OK.",
            (false, false) => "Periodic relogin FAILED.",
        }
    }

    pub fn transition(&self) -> &'static str {
        if self.logged_in {
            "Login successful."
        } else {
            "Login FAILED!"
        }
    }
}

/// What [`KeepAliveDaemon`] wrote for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleLog {
    /// Set on the first cycle and whenever the login state flips.
    pub transition: Option<&'static str>,
    /// Logged at `info` for forced cycles, at `debug` otherwise.
    pub summary: &'static str,
}

pub struct KeepAliveDaemon<C: Connector> {
    client: LoginClient<C>,
    session: Session,
    control: ControlReceiver,
    last_logged_in: Option<bool>,
}

impl<C: Connector> KeepAliveDaemon<C> {
    pub fn new(client: LoginClient<C>, session: Session, control: ControlReceiver) -> Self {
        Self {
            client,
            session,
            control,
            last_logged_in: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Loops until termination is requested. Returns the number of completed cycles.
    ///
    /// A termination request also cuts a running cycle short.
    pub async fn run(&mut self) -> u64 {
        let mut cycles = 0;
        info!(
            "Keep-alive loop running: {:?} mode, every {}s",
            self.session.daemon.mode,
            self.session.daemon.delay.as_secs()
        );

        loop {
            let forced = match self.control.next_wake(self.session.daemon.delay).await {
                Wake::Terminate => break,
                Wake::Reload => true,
                Wake::Timer => false,
            };

            let Self {
                client,
                session,
                control,
                ..
            } = self;
            let report = tokio::select! {
                biased;
                _ = control.terminated() => {
                    info!("Terminated during a keep-alive cycle.");
                    break;
                }
                logged_in = Self::cycle(client, session) => CycleReport { forced, logged_in },
            };

            cycles += 1;
            self.report(report);
        }

        info!("Keep-alive loop stopped after {} cycle(s).", cycles);
        cycles
    }

    /// Ping, then log in again if the mode asks for it and the ping shows no session.
    async fn cycle(client: &LoginClient<C>, session: &mut Session) -> bool {
        // Errors are already logged by the client, the retry below takes care of them.
        let _ = client.pre_login(session).await;

        if session.daemon.mode == DaemonMode::Login && !session.logged_in {
            client.ensure_logged_in(session).await;
        }
        session.logged_in
    }

    fn report(&mut self, report: CycleReport) -> CycleLog {
        let mut transition = None;
        if self.last_logged_in != Some(report.logged_in) {
            let line = report.transition();
            if report.logged_in {
                info!("{}", line);
            } else {
                error!("{}", line);
            }
            self.last_logged_in = Some(report.logged_in);
            transition = Some(line);
        }

        let summary = report.summary();
        if report.forced {
            info!("{}", summary);
        } else {
            debug!("{}", summary);
        }
        CycleLog {
            transition,
            summary,
        }
    }
}
