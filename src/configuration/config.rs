use super::parameters::ParameterTable;
use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::session_management::session::Session;
use log::{debug, error, warn};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration: where things live on disk plus the session the state machine works on.
///
/// Built once at start-up from the configuration file, then adjusted by the command-line
/// overrides (`--pid-file`, `--port`).
#[derive(Debug, Clone)]
pub struct Config {
    pub conf_file: PathBuf,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
    pub session: Session,
}

impl Config {
    /// Locates the configuration file and loads it.
    ///
    /// `requested` is the file given on the command line, if any. When it does not exist the
    /// standard locations are searched instead.
    pub fn load(requested: Option<&Path>) -> Result<Self, ConfigError> {
        let path = locate(requested)?;
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let mut table = ParameterTable::with_defaults();

        let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
        let stored = if is_toml {
            table.read_toml(&text)?
        } else {
            table.read_legacy(&text)
        };
        debug!("Read {} value(s) from {}", stored, path.display());
        for param in table.iter() {
            if param.canonical() != "password" {
                debug!("{} = {:?}", param.canonical(), param.value());
            }
        }

        Self::from_parameters(&table, path)
    }

    pub fn from_parameters(table: &ParameterTable, conf_file: &Path) -> Result<Self, ConfigError> {
        let text = |key: &str| table.get(key).unwrap_or_default().to_string();
        let optional = |key: &str| {
            table
                .get(key)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let username = required(table, "username", conf_file)?;
        let password = required(table, "password", conf_file)?;

        let server_port = match table.get("server_port") {
            Some(port) => port
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| ConfigError::BadValue(format!("server_port: {}", port)))?,
            None => DEFAULT_PORT,
        };

        let delay_minutes = table.get("daemon_delay").unwrap_or("5");
        let delay_secs = delay_minutes
            .parse::<u64>()
            .ok()
            .filter(|m| *m > 0)
            .and_then(|m| m.checked_mul(60))
            .ok_or_else(|| ConfigError::BadValue(format!("daemon_delay: {}", delay_minutes)))?;

        let daemon = DaemonPolicy {
            enabled: table.get_bool("daemon_start"),
            mode: DaemonMode::from_setting(table.get("daemon_type").unwrap_or("login")),
            delay: Duration::from_secs(delay_secs),
        };

        let session = Session {
            login_server: text("login_server"),
            server_port,
            init_page: text("init_page"),
            login_page: text("login_page"),
            logout_page: text("logout_page"),
            username_key: text("username_key"),
            password_key: text("password_key"),
            login_header: optional("login_string_header"),
            login_footer: optional("login_string_footer"),
            username,
            password,
            logged_in_marker: text("logged_in_string"),
            logged_out_marker: text("logged_out_string"),
            logged_in: false,
            last_reply: Vec::new(),
            daemon,
        };

        if session.login_server.is_empty() {
            return Err(ConfigError::BadValue("login_server is empty".to_string()));
        }
        if session.logged_in_marker.is_empty() || session.logged_out_marker.is_empty() {
            return Err(ConfigError::BadValue(
                "logged_in_string and logged_out_string must not be empty".to_string(),
            ));
        }

        Ok(Self {
            conf_file: conf_file.to_path_buf(),
            pid_file: expand_tilde(table.get("pid_file").unwrap_or(DEFAULT_PID_FILE)),
            log_file: expand_tilde(table.get("log_file").unwrap_or(DEFAULT_LOG_FILE)),
            session,
        })
    }

    /// Command-line values win over the configuration file.
    pub fn apply_overrides(&mut self, pid_file: Option<PathBuf>, port: Option<u16>) {
        if let Some(pid_file) = pid_file {
            self.pid_file = pid_file;
        }
        if let Some(port) = port {
            self.session.server_port = port;
        }
    }

    /// The configured PID file followed by the fallback locations.
    pub fn pid_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = vec![self.pid_file.clone()];
        for fallback in FALLBACK_PID_FILES {
            let path = expand_tilde(fallback);
            if !candidates.contains(&path) {
                candidates.push(path);
            }
        }
        candidates
    }
}

fn required(table: &ParameterTable, key: &str, conf_file: &Path) -> Result<String, ConfigError> {
    match table.get(key) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => {
            error!(
                "Failed to read {} from configuration file {}.",
                key,
                conf_file.display()
            );
            error!("You must supply at least a username and password.");
            Err(ConfigError::MissingCredential(key.to_string()))
        }
    }
}

/// Replaces a leading `~` with the home directory. Other paths are returned unchanged.
pub fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

fn is_file_available(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}

/// Picks the configuration file to use: the requested one if it exists, otherwise the first
/// readable file among [`CONF_FILE_CANDIDATES`].
pub fn locate(requested: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let mut found = None;

    if let Some(file) = requested {
        if is_file_available(file) {
            found = Some(file.to_path_buf());
        } else {
            error!("Requested CONF file: \"{}\" does not exist.", file.display());
        }
    }

    if found.is_none() {
        found = CONF_FILE_CANDIDATES
            .iter()
            .map(|candidate| expand_tilde(candidate))
            .inspect(|path| debug!("Looking for CONF file: {}", path.display()))
            .find(|path| is_file_available(path));
    }

    let Some(path) = found else {
        error!("Cannot find any config file, please create one.");
        return Err(ConfigError::NotFound(
            requested
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| CONF_FILE_CANDIDATES.join(", ")),
        ));
    };

    let name = path.to_string_lossy();
    if name.contains("qadsl") {
        warn!(
            "Old conf file: {}, rename it to {}.",
            name,
            name.replacen("qadsl", PACKAGE_NAME, 1)
        );
    } else {
        debug!("Using {} for configuration data.", name);
    }

    Ok(path)
}
