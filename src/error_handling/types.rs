use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    TomlError(String),
    NotFound(String),
    MissingCredential(String),
    BadValue(String),
    UnknownKey(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotFound(e) => write!(f, "Configuration file not found: {}", e),
            ConfigError::MissingCredential(e) => write!(f, "Missing credential: {}", e),
            ConfigError::BadValue(e) => write!(f, "Invalid value: {}", e),
            ConfigError::UnknownKey(e) => write!(f, "Unknown parameter: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum NetworkError {
    DnsFailure { host: String, source: Option<io::Error> },
    ConnectFailure { host: String, source: io::Error },
    ConnectTimeout(String),
    SendFailed(io::Error),
    WriteTimeout,
    ReceiveFailed(io::Error),
    ReadTimeout,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::DnsFailure { host, source: Some(e) } => {
                write!(f, "cannot find the IP# of the login server ({}): {}", host, e)
            }
            NetworkError::DnsFailure { host, source: None } => {
                write!(f, "cannot find the IP# of the login server ({})", host)
            }
            NetworkError::ConnectFailure { host, source } => {
                write!(f, "Failed to connect to login server ({}): {}", host, source)
            }
            NetworkError::ConnectTimeout(host) => {
                write!(f, "Timed out connecting to login server ({})", host)
            }
            NetworkError::SendFailed(e) => write!(f, "Send request failed: {}", e),
            NetworkError::WriteTimeout => write!(f, "Timed out sending request"),
            NetworkError::ReceiveFailed(e) => write!(f, "Read reply failed: {}", e),
            NetworkError::ReadTimeout => write!(f, "Timed out waiting for reply"),
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug)]
pub enum SessionError {
    Network(NetworkError),
    LogoutNotConfirmed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Network(e) => write!(f, "Network error: {}", e),
            SessionError::LogoutNotConfirmed => {
                write!(f, "Logout reply did not confirm the logout")
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<NetworkError> for SessionError {
    fn from(err: NetworkError) -> Self {
        SessionError::Network(err)
    }
}

#[derive(Debug)]
pub enum LockError {
    NoUsablePath,
    AlreadyLocked(PathBuf),
    WriteFailed(PathBuf, io::Error),
    ReadFailed(PathBuf, io::Error),
    RemoveFailed(PathBuf, io::Error),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::NoUsablePath => write!(f, "No usable PID file location"),
            LockError::AlreadyLocked(p) => {
                write!(f, "PID file {} is locked by another process", p.display())
            }
            LockError::WriteFailed(p, e) => {
                write!(f, "Cannot write PID file {}: {}", p.display(), e)
            }
            LockError::ReadFailed(p, e) => write!(f, "Cannot read PID file {}: {}", p.display(), e),
            LockError::RemoveFailed(p, e) => {
                write!(f, "Cannot remove PID file {}: {}", p.display(), e)
            }
        }
    }
}

impl std::error::Error for LockError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    LockError(LockError),
    SignalFailed(i32, io::Error),
    RuntimeFailed(io::Error),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::LockError(e) => write!(f, "Lock error: {}", e),
            ControllerError::SignalFailed(pid, e) => {
                write!(f, "Cannot signal process {}: {}", pid, e)
            }
            ControllerError::RuntimeFailed(e) => write!(f, "Runtime error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<LockError> for ControllerError {
    fn from(err: LockError) -> Self {
        ControllerError::LockError(err)
    }
}
