//! Wake-up and shutdown channel for the keep-alive loop, and the bridge from OS signals into it.
//!
//! The loop never sees a signal directly. SIGHUP is turned into [`DaemonControl::reload`]
//! (cut the current sleep short and run a cycle now), SIGTERM and SIGINT into
//! [`DaemonControl::terminate`] (stop as soon as possible).
//!
//! Other processes reach a running daemon through a [`Signaller`].

use log::{debug, error, info};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{watch, Notify};
use tokio::time::sleep;

/// Why the loop woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Terminate,
    Reload,
    Timer,
}

/// Sending side, cheap to clone.
#[derive(Debug, Clone)]
pub struct DaemonControl {
    reload: Arc<Notify>,
    terminate: Arc<watch::Sender<bool>>,
}

impl DaemonControl {
    /// Cuts the current sleep short. A reload sent while a cycle is running is kept and wakes the
    /// next sleep immediately.
    pub fn reload(&self) {
        self.reload.notify_one();
    }

    pub fn terminate(&self) {
        self.terminate.send_replace(true);
    }
}

/// Receiving side, owned by the loop.
#[derive(Debug)]
pub struct ControlReceiver {
    reload: Arc<Notify>,
    terminate: watch::Receiver<bool>,
}

impl ControlReceiver {
    pub fn is_terminated(&self) -> bool {
        *self.terminate.borrow()
    }

    /// Sleeps for `delay`, or less if told to reload or terminate. Termination wins when both
    /// are pending.
    pub async fn next_wake(&mut self, delay: Duration) -> Wake {
        if self.is_terminated() {
            return Wake::Terminate;
        }

        tokio::select! {
            biased;
            _ = wait_for_terminate(&mut self.terminate) => Wake::Terminate,
            _ = self.reload.notified() => Wake::Reload,
            _ = sleep(delay) => Wake::Timer,
        }
    }

    /// Resolves once termination is requested.
    pub async fn terminated(&mut self) {
        wait_for_terminate(&mut self.terminate).await
    }
}

async fn wait_for_terminate(rx: &mut watch::Receiver<bool>) {
    // With every sender gone nobody can ask for termination any more.
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub fn channel() -> (DaemonControl, ControlReceiver) {
    let reload = Arc::new(Notify::new());
    let (tx, rx) = watch::channel(false);
    (
        DaemonControl {
            reload: reload.clone(),
            terminate: Arc::new(tx),
        },
        ControlReceiver {
            reload,
            terminate: rx,
        },
    )
}

/// Installs SIGHUP, SIGTERM and SIGINT handlers and forwards them into `control`.
///
/// Must be called from within a tokio runtime. The forwarding task lives as long as the runtime.
pub fn forward_unix_signals(control: DaemonControl) -> io::Result<()> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = hangup.recv() => {
                    info!("SIGHUP received, forcing relogin.");
                    control.reload();
                }
                Some(()) = term.recv() => {
                    info!("SIGTERM received, shutting down.");
                    control.terminate();
                }
                Some(()) = interrupt.recv() => {
                    info!("SIGINT received, shutting down.");
                    control.terminate();
                }
                else => break,
            }
        }
        debug!("Signal forwarding stopped");
    });

    Ok(())
}

/// A request sent to a running daemon from another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonSignal {
    Reload,
    Terminate,
}

impl DaemonSignal {
    fn as_raw(self) -> libc::c_int {
        match self {
            DaemonSignal::Reload => libc::SIGHUP,
            DaemonSignal::Terminate => libc::SIGTERM,
        }
    }
}

pub trait Signaller {
    fn send(&self, pid: i32, signal: DaemonSignal) -> io::Result<()>;
}

/// Delivers [`DaemonSignal`]s with `kill(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KillSignaller;

impl Signaller for KillSignaller {
    fn send(&self, pid: i32, signal: DaemonSignal) -> io::Result<()> {
        if pid <= 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to signal pid {}", pid),
            ));
        }
        debug!("Sending {:?} to pid {}", signal, pid);
        // SAFETY: kill has no memory-safety preconditions; pid is a single positive process id.
        let rc = unsafe { libc::kill(pid, signal.as_raw()) };
        if rc == 0 {
            Ok(())
        } else {
            let err = io::Error::last_os_error();
            error!("Failed to signal pid {}: {}", pid, err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_wake() {
        let (_control, mut rx) = channel();
        let start = tokio::time::Instant::now();
        assert_eq!(rx.next_wake(Duration::from_secs(300)).await, Wake::Timer);
        assert_eq!(start.elapsed(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_cuts_sleep_short() {
        let (control, mut rx) = channel();
        let start = tokio::time::Instant::now();

        tokio::spawn(async move {
            sleep(Duration::from_secs(10)).await;
            control.reload();
        });

        assert_eq!(rx.next_wake(Duration::from_secs(300)).await, Wake::Reload);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_before_sleep_is_not_lost() {
        let (control, mut rx) = channel();
        control.reload();
        assert_eq!(rx.next_wake(Duration::from_secs(300)).await, Wake::Reload);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminate_wins_over_reload() {
        let (control, mut rx) = channel();
        control.reload();
        control.terminate();
        assert!(rx.is_terminated());
        assert_eq!(rx.next_wake(Duration::from_secs(300)).await, Wake::Terminate);
        assert_eq!(rx.next_wake(Duration::from_secs(300)).await, Wake::Terminate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_control_only_leaves_the_timer() {
        let (control, mut rx) = channel();
        drop(control);
        assert_eq!(rx.next_wake(Duration::from_secs(1)).await, Wake::Timer);
    }

    #[test]
    fn test_kill_signaller_rejects_bad_pid() {
        assert!(KillSignaller.send(0, DaemonSignal::Terminate).is_err());
        assert!(KillSignaller.send(-1, DaemonSignal::Reload).is_err());
    }
}
