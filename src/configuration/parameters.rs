//! # Parameter table
//!
//! Keyed parameter store backing the configuration file. Every parameter has an ordered list of
//! names: the first is canonical, the others are aliases accepted from older configuration
//! files. Lookups are case-insensitive over all names.
//!
//! Two file formats are understood:
//!
//! ```text
//! # legacy line format
//! USER="bob";
//! PASS = hunter2
//! DAEMON_DELAY 10
//! ```
//!
//! and, for files ending in `.toml`, a flat TOML table with string, integer or boolean values.

use crate::configuration::types::{DEFAULT_LOG_FILE, DEFAULT_PID_FILE};
use crate::error_handling::types::ConfigError;
use log::{debug, warn};
use std::collections::BTreeMap;

/// A single configuration parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    names: Vec<String>,
    value: Option<String>,
    default: Option<String>,
}

impl Parameter {
    pub fn canonical(&self) -> &str {
        &self.names[0]
    }

    pub fn answers_to(&self, key: &str) -> bool {
        self.names.iter().any(|name| name.eq_ignore_ascii_case(key))
    }

    /// The configured value, or the declared default when none was read.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().or(self.default.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    params: BTreeMap<String, Parameter>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The parameters understood by alive, with their historical aliases and defaults.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.declare(&["username", "user"], None);
        table.declare(&["password", "pass"], None);
        table.declare(&["login_server", "serv", "server"], Some("10.0.0.6"));
        table.declare(&["server_port", "port"], Some("80"));

        table.declare(&["login_string_header", "login_data_header"], None);
        table.declare(&["username_key"], Some("username"));
        table.declare(&["password_key"], Some("password"));
        table.declare(
            &["login_string_footer", "login_data_footer"],
            Some("submitForm=Login"),
        );

        table.declare(&["logged_in_string"], Some("/sd/create_session_window"));
        table.declare(&["logged_out_string"], Some("Login again"));

        table.declare(&["init_page", "init"], Some("/sd/init"));
        table.declare(&["login_page", "login"], Some("/sd/login"));
        table.declare(&["logout_page", "logout"], Some("/sd/logout"));

        table.declare(&["pid_file"], Some(DEFAULT_PID_FILE));
        table.declare(&["log_file"], Some(DEFAULT_LOG_FILE));

        table.declare(
            &[
                "daemon_start",
                "deamon_s",
                "deamon_start",
                "start_deamon",
                "start_daemon",
            ],
            Some("true"),
        );
        table.declare(&["daemon_type", "deamon_t", "deamon_type"], Some("login"));
        table.declare(
            &["daemon_delay", "deamon_d", "deamon_delay", "interval"],
            Some("5"),
        );
        table
    }

    /// Adds a parameter. `names[0]` becomes the canonical key.
    pub fn declare(&mut self, names: &[&str], default: Option<&str>) {
        let Some(first) = names.first() else {
            return;
        };
        let canonical = first.to_ascii_lowercase();
        self.params.insert(
            canonical,
            Parameter {
                names: names.iter().map(|n| n.to_ascii_lowercase()).collect(),
                value: None,
                default: default.map(str::to_string),
            },
        );
    }

    pub fn find(&self, key: &str) -> Option<&Parameter> {
        if let Some(param) = self.params.get(&key.to_ascii_lowercase()) {
            return Some(param);
        }
        self.params.values().find(|p| p.answers_to(key))
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Parameter> {
        let canonical = self.find(key)?.canonical().to_string();
        self.params.get_mut(&canonical)
    }

    /// Stores a raw value read from a file. Quotes and a trailing `;` are stripped.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let value = clean_value(raw);
        match self.find_mut(key) {
            Some(param) => {
                debug!("{} = {}", param.canonical(), value);
                param.value = Some(value);
                Ok(())
            }
            None => Err(ConfigError::UnknownKey(key.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.find(key).and_then(Parameter::value)
    }

    /// `true`, `yes` and `on` (any case) are true; anything else, or a missing key, is false.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(value) => ["true", "yes", "on"]
                .iter()
                .any(|t| value.eq_ignore_ascii_case(t)),
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }

    /// Reads the legacy `KEY=value` line format. Returns the number of values stored.
    pub fn read_legacy(&mut self, text: &str) -> usize {
        let mut stored = 0;
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // The key ends at the first '=' or blank, whichever comes first.
            let key_end = line
                .find(|c: char| c == '=' || c.is_whitespace())
                .unwrap_or(line.len());
            let (key, rest) = line.split_at(key_end);
            let rest = rest.trim_start();
            if rest.is_empty() {
                warn!("Ignoring malformed configuration line {}: {}", idx + 1, line);
                continue;
            }
            let value = rest.strip_prefix('=').unwrap_or(rest).trim();

            match self.set(key, value) {
                Ok(()) => stored += 1,
                Err(e) => warn!("Line {}: {}", idx + 1, e),
            }
        }
        stored
    }

    /// Reads a flat TOML table. Returns the number of values stored.
    pub fn read_toml(&mut self, text: &str) -> Result<usize, ConfigError> {
        let table: toml::Table =
            toml::from_str(text).map_err(|e| ConfigError::TomlError(e.to_string()))?;

        let mut stored = 0;
        for (key, value) in table {
            let raw = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(ConfigError::BadValue(format!(
                        "{} has unsupported type {}",
                        key,
                        other.type_str()
                    )))
                }
            };
            match self.set(&key, &raw) {
                Ok(()) => stored += 1,
                Err(e) => warn!("{}", e),
            }
        }
        Ok(stored)
    }
}

fn clean_value(raw: &str) -> String {
    let value = raw.trim();
    let value = value.strip_suffix(';').unwrap_or(value);
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve_to_the_same_parameter() {
        let mut table = ParameterTable::with_defaults();
        table.set("SERV", "192.168.1.1").unwrap();

        assert_eq!(table.get("login_server"), Some("192.168.1.1"));
        assert_eq!(table.get("SERVER"), Some("192.168.1.1"));
        assert_eq!(table.find("Serv").unwrap().canonical(), "login_server");
    }

    #[test]
    fn test_defaults_apply_until_a_value_is_set() {
        let mut table = ParameterTable::with_defaults();
        assert_eq!(table.get("init_page"), Some("/sd/init"));
        assert_eq!(table.get("username"), None);

        table.set("INIT", "/portal/init").unwrap();
        assert_eq!(table.get("init_page"), Some("/portal/init"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut table = ParameterTable::with_defaults();
        assert!(matches!(
            table.set("colour", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_boolean_interpretation() {
        let mut table = ParameterTable::new();
        table.declare(&["flag"], None);
        assert!(!table.get_bool("flag"));

        for truthy in ["true", "YES", "On"] {
            table.set("flag", truthy).unwrap();
            assert!(table.get_bool("flag"), "{} should be true", truthy);
        }
        for falsy in ["false", "no", "off", "1"] {
            table.set("flag", falsy).unwrap();
            assert!(!table.get_bool("flag"), "{} should be false", falsy);
        }
        assert!(!table.get_bool("missing"));
    }

    #[test]
    fn test_legacy_values_are_cleaned() {
        let mut table = ParameterTable::with_defaults();
        let text = r#"
# account
USER="bob";
PASS = hunter2;
LOGIN_STRING_HEADER "lang=en"
DEAMON_D 10
this line is fine because it has a key
garbage
"#;
        let stored = table.read_legacy(text);

        assert_eq!(stored, 4);
        assert_eq!(table.get("username"), Some("bob"));
        assert_eq!(table.get("password"), Some("hunter2"));
        assert_eq!(table.get("login_string_header"), Some("lang=en"));
        assert_eq!(table.get("daemon_delay"), Some("10"));
    }

    #[test]
    fn test_toml_values_are_stored_as_strings() {
        let mut table = ParameterTable::with_defaults();
        let text = r#"
username = "bob"
password = "hunter2"
port = 8080
daemon_start = false
"#;
        assert_eq!(table.read_toml(text).unwrap(), 4);
        assert_eq!(table.get("server_port"), Some("8080"));
        assert!(!table.get_bool("daemon_start"));
    }

    #[test]
    fn test_toml_rejects_nested_values() {
        let mut table = ParameterTable::with_defaults();
        let err = table.read_toml("username = [\"a\", \"b\"]").unwrap_err();
        assert!(matches!(err, ConfigError::BadValue(_)));
    }
}
