//! Background keep-alive process.
//!
//! - [`keep_alive`]: the periodic ping / relogin loop
//! - [`control`]: reload and terminate requests, and the OS signals mapped onto them
//! - [`detach`]: forking into the background
//! - [`pid_lock`]: the PID file other invocations use to find the daemon

pub mod control;
pub mod detach;
pub mod keep_alive;
pub mod pid_lock;

pub use control::{DaemonControl, DaemonSignal, KillSignaller, Signaller};
pub use keep_alive::KeepAliveDaemon;
pub use pid_lock::{PidLock, RunningDaemon};
