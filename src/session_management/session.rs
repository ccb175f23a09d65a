use crate::configuration::types::{DaemonPolicy, DEFAULT_PORT};
use std::fmt;

/// Everything the login state machine needs to talk to one login server, plus the believed
/// login state.
///
/// `logged_in` is only changed by the state machine after a classified server reply.
/// `last_reply` holds the raw bytes of the most recent reply and is overwritten by every
/// exchange.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub login_server: String,
    pub server_port: u16,

    pub init_page: String,
    pub login_page: String,
    pub logout_page: String,

    pub username_key: String,
    pub password_key: String,
    pub login_header: Option<String>,
    pub login_footer: Option<String>,

    pub username: String,
    pub password: String,

    pub logged_in_marker: String,
    pub logged_out_marker: String,

    pub logged_in: bool,
    pub last_reply: Vec<u8>,

    pub daemon: DaemonPolicy,
}

impl Session {
    /// A session against `login_server` with the stock Orbyte paths and markers.
    pub fn new(login_server: &str, username: &str, password: &str) -> Self {
        Self {
            login_server: login_server.to_string(),
            server_port: DEFAULT_PORT,
            init_page: "/sd/init".to_string(),
            login_page: "/sd/login".to_string(),
            logout_page: "/sd/logout".to_string(),
            username_key: "username".to_string(),
            password_key: "password".to_string(),
            login_header: None,
            login_footer: Some("submitForm=Login".to_string()),
            username: username.to_string(),
            password: password.to_string(),
            logged_in_marker: "/sd/create_session_window".to_string(),
            logged_out_marker: "Login again".to_string(),
            logged_in: false,
            last_reply: Vec::new(),
            daemon: DaemonPolicy::default(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("login_server", &self.login_server)
            .field("server_port", &self.server_port)
            .field("init_page", &self.init_page)
            .field("login_page", &self.login_page)
            .field("logout_page", &self.logout_page)
            .field("username_key", &self.username_key)
            .field("password_key", &self.password_key)
            .field("login_header", &self.login_header)
            .field("login_footer", &self.login_footer)
            .field("username", &self.username)
            .field("password", &"********")
            .field("logged_in_marker", &self.logged_in_marker)
            .field("logged_out_marker", &self.logged_out_marker)
            .field("logged_in", &self.logged_in)
            .field("last_reply_len", &self.last_reply.len())
            .field("daemon", &self.daemon)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_hides_password() {
        let session = Session::new("10.0.0.6", "bob", "hunter2");
        let printed = format!("{:?}", session);
        assert!(printed.contains("bob"));
        assert!(!printed.contains("hunter2"));
    }
}
