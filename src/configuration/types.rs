use std::time::Duration;

pub const PACKAGE_NAME: &str = "alive";
pub const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_PID_FILE: &str = "/var/run/alive.pid";
pub const DEFAULT_LOG_FILE: &str = "~/.alive.log";

/// Tried in order after the configured PID file.
pub const FALLBACK_PID_FILES: [&str; 4] = [
    "/tmp/alive.pid",
    "~/alive.pid",
    "/tmp/qadsl.pid",
    "~/qadsl.pid",
];

/// Searched in order when no (existing) file is given on the command line.
pub const CONF_FILE_CANDIDATES: [&str; 4] = [
    "~/.aliverc",
    "~/.qadslrc",
    "/etc/alive.conf",
    "/etc/qadsl.conf",
];

/// What the background process does on every cycle.
///
/// - `Ping`: only loads the init page, which resets the gateway's idle timer.
/// - `Login`: pings, and logs in again whenever the ping shows a logged out session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonMode {
    Ping,
    Login,
}

impl DaemonMode {
    /// Anything starting with "login" (any case) selects `Login`, everything else is `Ping`.
    pub fn from_setting(value: &str) -> Self {
        let is_login = value
            .get(..5)
            .map(|prefix| prefix.eq_ignore_ascii_case("login"))
            .unwrap_or(false);
        if is_login {
            DaemonMode::Login
        } else {
            DaemonMode::Ping
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPolicy {
    pub enabled: bool,
    pub mode: DaemonMode,
    pub delay: Duration,
}

impl Default for DaemonPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: DaemonMode::Login,
            delay: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_mode_from_setting() {
        assert_eq!(DaemonMode::from_setting("login"), DaemonMode::Login);
        assert_eq!(DaemonMode::from_setting("LOGIN"), DaemonMode::Login);
        assert_eq!(DaemonMode::from_setting("login-daemon"), DaemonMode::Login);
        assert_eq!(DaemonMode::from_setting("ping"), DaemonMode::Ping);
        assert_eq!(DaemonMode::from_setting("log"), DaemonMode::Ping);
        assert_eq!(DaemonMode::from_setting(""), DaemonMode::Ping);
    }
}
