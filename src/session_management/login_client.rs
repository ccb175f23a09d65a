//! # Login state machine
//!
//! Drives the three exchanges with the gateway (pre-login ping, login, logout) against a
//! [`Session`], and the bounded retry policy around logging in.
//!
//! ```text
//!  UNKNOWN ──pre_login──▶ LOGGED_IN | LOGGED_OUT | UNKNOWN (network error)
//!  LOGGED_OUT ──do_login──▶ LOGGED_IN | LOGGED_OUT
//!  LOGGED_IN ──logout──▶ LOGGED_OUT | LOGGED_IN (not confirmed)
//! ```
//!
//! Every exchange opens its own connection. The pre-login page is always requested before a
//! login is submitted; the gateways misbehave otherwise.

use crate::error_handling::types::{NetworkError, SessionError};
use crate::network::messages::{self, ReplyState};
use crate::network::transport::{read_reply, send_request, Connector};
use crate::session_management::session::Session;
use log::{debug, error, info};
use std::time::Duration;
use tokio::time::sleep;

/// Login submissions made by [`LoginClient::ensure_logged_in`] before giving up.
pub const MAX_RETRIES: u32 = 3;

/// Retry `n` waits `n * RETRY_BASE_DELAY` first.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(5);

pub struct LoginClient<C: Connector> {
    connector: C,
}

impl<C: Connector> LoginClient<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// One request/reply round trip on a fresh connection. The reply is kept in
    /// `session.last_reply`.
    async fn exchange(&self, session: &mut Session, request: &[u8]) -> Result<(), NetworkError> {
        let mut stream = self
            .connector
            .connect(&session.login_server, session.server_port)
            .await?;
        send_request(&mut stream, request).await?;
        session.last_reply = read_reply(&mut stream).await?;
        Ok(())
    }

    /// Loads the init page and updates `logged_in` from the reply.
    ///
    /// A reply carrying the logged-in marker sets `logged_in`, one carrying the logged-out marker
    /// clears it, anything else leaves it alone. On a network error `logged_in` is not touched:
    /// a missing answer says nothing about the session.
    pub async fn pre_login(&self, session: &mut Session) -> Result<ReplyState, SessionError> {
        debug!("Pre-login: GET {}", session.init_page);
        let request = messages::build_pre_login(session);

        if let Err(e) = self.exchange(session, &request).await {
            error!("Pre-login failed: {}", e);
            return Err(e.into());
        }

        let state = ReplyState::of(&session.last_reply, session);
        match state {
            ReplyState::LoggedIn => session.logged_in = true,
            ReplyState::LoggedOut => session.logged_in = false,
            ReplyState::Unrecognised => {
                debug!("Pre-login reply matched neither marker, keeping current state")
            }
        }
        debug!("Pre-login: {:?}, logged_in = {}", state, session.logged_in);
        Ok(state)
    }

    /// Submits the credentials.
    ///
    /// `logged_in` is cleared first and only set again when the reply carries the logged-in
    /// marker. A reply without the marker is not an error, check `session.logged_in`.
    pub async fn do_login(&self, session: &mut Session) -> Result<(), SessionError> {
        session.logged_in = false;
        debug!("Login: POST {} as {}", session.login_page, session.username);
        let request = messages::build_login(session);

        if let Err(e) = self.exchange(session, &request).await {
            error!("Login failed: {}", e);
            return Err(e.into());
        }

        session.logged_in = messages::classify_reply(&session.last_reply, &session.logged_in_marker);
        if session.logged_in {
            info!("Logged in as {}.", session.username);
        } else {
            debug!("Login reply did not contain the logged-in marker");
        }
        Ok(())
    }

    /// Logs out of an existing session.
    ///
    /// The pre-login page is checked first. When it does not show a live session there is
    /// nothing to do and no logout request is sent.
    ///
    /// # Errors
    ///
    /// * the pre-login error, if the session could not be checked
    /// * `SessionError::Network` if the logout exchange fails
    /// * `SessionError::LogoutNotConfirmed` if the reply lacks the logged-out marker
    pub async fn logout(&self, session: &mut Session) -> Result<(), SessionError> {
        if self.pre_login(session).await? != ReplyState::LoggedIn {
            info!("Not logged in, nothing to log out from.");
            return Ok(());
        }

        debug!("Logout: GET {}", session.logout_page);
        let request = messages::build_logout(session);
        if let Err(e) = self.exchange(session, &request).await {
            error!("Logout failed: {}", e);
            return Err(e.into());
        }

        if messages::classify_reply(&session.last_reply, &session.logged_out_marker) {
            session.logged_in = false;
            info!("Logged out.");
            Ok(())
        } else {
            error!("Logout failed: the server did not confirm the logout.");
            Err(SessionError::LogoutNotConfirmed)
        }
    }

    /// Makes sure the session is logged in, retrying up to [`MAX_RETRIES`] times.
    ///
    /// Every attempt starts with a pre-login. If that already shows a live session no login is
    /// submitted. Attempt `n` (counting from 0) first waits `n * RETRY_BASE_DELAY`.
    ///
    /// Returns the final value of `session.logged_in`.
    pub async fn ensure_logged_in(&self, session: &mut Session) -> bool {
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = RETRY_BASE_DELAY * attempt;
                debug!("Retry {} in {}s", attempt, delay.as_secs());
                sleep(delay).await;
            }

            match self.pre_login(session).await {
                Ok(ReplyState::LoggedIn) => break,
                Ok(_) => {}
                Err(_) => continue,
            }

            match self.do_login(session).await {
                Ok(()) if session.logged_in => break,
                Ok(()) => debug!("Login attempt {} rejected", attempt + 1),
                Err(_) => {}
            }
        }

        if !session.logged_in {
            error!("login failed after {} retries - aborting!", MAX_RETRIES);
        }
        session.logged_in
    }
}
