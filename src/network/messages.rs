//! # Protocol messages
//!
//! Builds the three requests understood by the login gateway and classifies its replies.
//!
//! The gateway speaks a legacy HTTP-like dialect: every line ends with a bare `\n`, the version
//! token is `HTTP/0.9` and header names are spelled exactly as below. The servers in the field
//! depend on this shape, so the templates are reproduced byte for byte.
//!
//! ```text
//! GET /sd/init HTTP/0.9
//! Referer: http://10.0.0.6
//! Host: 10.0.0.6
//! Accept: */*
//!
//! ```

use crate::configuration::types::PACKAGE_VERSION;
use crate::session_management::session::Session;

/// What a reply to the pre-login page says about the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    LoggedIn,
    LoggedOut,
    /// Neither marker was found.
    Unrecognised,
}

impl ReplyState {
    pub fn of(reply: &[u8], session: &Session) -> Self {
        if classify_reply(reply, &session.logged_in_marker) {
            ReplyState::LoggedIn
        } else if classify_reply(reply, &session.logged_out_marker) {
            ReplyState::LoggedOut
        } else {
            ReplyState::Unrecognised
        }
    }
}

pub fn build_pre_login(session: &Session) -> Vec<u8> {
    format!(
        "GET {} HTTP/0.9\nReferer: http://{}\nHost: {}\nAccept: */*\n\n",
        session.init_page, session.login_server, session.login_server
    )
    .into_bytes()
}

/// Assembles the form body of the login request.
///
/// Only spaces are encoded (as `+`). Other reserved characters go out as they are, which is what
/// the gateways expect.
pub fn encode_login_body(session: &Session) -> String {
    let mut body = String::new();

    if let Some(header) = session.login_header.as_deref().filter(|h| !h.is_empty()) {
        body.push_str(header);
        body.push('&');
    }

    body.push_str(&format!(
        "{}={}&{}={}",
        session.username_key, session.username, session.password_key, session.password
    ));

    if let Some(footer) = session.login_footer.as_deref().filter(|f| !f.is_empty()) {
        body.push('&');
        body.push_str(footer);
    }

    body.replace(' ', "+")
}

pub fn build_login(session: &Session) -> Vec<u8> {
    let body = encode_login_body(session);
    format!(
        "POST {} HTTP/0.9\n\
         Host: {}\n\
         User-Agent: alive v{}\n\
         Accept: */*\n\
         Referer: http://{}{}\n\
         Content-type: application/x-www-form-urlencoded\n\
         Content-length: {}\n\
         \n\
         {}",
        session.login_page,
        session.login_server,
        PACKAGE_VERSION,
        session.login_server,
        session.init_page,
        body.len(),
        body
    )
    .into_bytes()
}

pub fn build_logout(session: &Session) -> Vec<u8> {
    format!(
        "GET {} HTTP/0.9\nReferer: http://{}{}\nHost: {}\nAccept: */*\n\n",
        session.logout_page, session.login_server, session.init_page, session.login_server
    )
    .into_bytes()
}

/// True iff `marker` occurs literally in `reply`. Case-sensitive.
///
/// An empty reply never matches, and neither does an empty marker.
pub fn classify_reply(reply: &[u8], marker: &str) -> bool {
    let marker = marker.as_bytes();
    if reply.is_empty() || marker.is_empty() || marker.len() > reply.len() {
        return false;
    }
    reply.windows(marker.len()).any(|window| window == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("10.0.0.6", "bob", "hunter2")
    }

    #[test]
    fn test_pre_login_request() {
        let request = build_pre_login(&session());
        assert_eq!(
            request,
            b"GET /sd/init HTTP/0.9\nReferer: http://10.0.0.6\nHost: 10.0.0.6\nAccept: */*\n\n"
        );
    }

    #[test]
    fn test_logout_request() {
        let request = build_logout(&session());
        assert_eq!(
            request,
            b"GET /sd/logout HTTP/0.9\nReferer: http://10.0.0.6/sd/init\nHost: 10.0.0.6\nAccept: */*\n\n"
        );
    }

    #[test]
    fn test_login_request() {
        let request = String::from_utf8(build_login(&session())).unwrap();
        let expected = format!(
            "POST /sd/login HTTP/0.9\n\
             Host: 10.0.0.6\n\
             User-Agent: alive v{}\n\
             Accept: */*\n\
             Referer: http://10.0.0.6/sd/init\n\
             Content-type: application/x-www-form-urlencoded\n\
             Content-length: 46\n\
             \n\
             username=bob&password=hunter2&submitForm=Login",
            PACKAGE_VERSION
        );
        assert_eq!(request, expected);
    }

    #[test]
    fn test_login_body_header_and_footer() {
        let mut session = session();
        assert_eq!(
            encode_login_body(&session),
            "username=bob&password=hunter2&submitForm=Login"
        );

        session.login_header = Some("lang=en".to_string());
        session.login_footer = None;
        assert_eq!(
            encode_login_body(&session),
            "lang=en&username=bob&password=hunter2"
        );

        session.login_header = Some(String::new());
        session.login_footer = Some(String::new());
        assert_eq!(encode_login_body(&session), "username=bob&password=hunter2");
    }

    #[test]
    fn test_login_body_only_spaces_are_encoded() {
        let mut session = session();
        session.username = "bob smith".to_string();
        session.password = "a&b=c d%".to_string();
        session.login_footer = Some("submit Form=Log in".to_string());

        assert_eq!(
            encode_login_body(&session),
            "username=bob+smith&password=a&b=c+d%&submit+Form=Log+in"
        );
    }

    #[test]
    fn test_content_length_matches_body() {
        let mut session = session();
        for (user, pass, header) in [
            ("bob", "hunter2", None),
            ("a b c", "", Some("x=1")),
            ("ünï", "çødé pass", Some("h e a d")),
        ] {
            session.username = user.to_string();
            session.password = pass.to_string();
            session.login_header = header.map(str::to_string);

            let request = String::from_utf8(build_login(&session)).unwrap();
            let (head, body) = request.split_once("\n\n").unwrap();
            let length: usize = head
                .lines()
                .find_map(|l| l.strip_prefix("Content-length: "))
                .unwrap()
                .parse()
                .unwrap();
            assert_eq!(length, body.len());
        }
    }

    #[test]
    fn test_classify_reply() {
        let marker = "/sd/create_session_window";
        assert!(classify_reply(
            b"<html><a href=\"/sd/create_session_window\">",
            marker
        ));
        assert!(classify_reply(marker.as_bytes(), marker));
        assert!(!classify_reply(b"", marker));
        assert!(!classify_reply(b"/SD/CREATE_SESSION_WINDOW", marker));
        assert!(!classify_reply(b"/sd/create_session", marker));
        assert!(!classify_reply(b"anything", ""));
    }

    #[test]
    fn test_reply_state() {
        let session = session();
        assert_eq!(
            ReplyState::of(b"... /sd/create_session_window ...", &session),
            ReplyState::LoggedIn
        );
        assert_eq!(
            ReplyState::of(b"Please Login again", &session),
            ReplyState::LoggedOut
        );
        assert_eq!(
            ReplyState::of(b"HTTP/1.0 500 oops", &session),
            ReplyState::Unrecognised
        );
    }
}
