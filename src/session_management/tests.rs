use crate::error_handling::types::{NetworkError, SessionError};
use crate::network::messages::{build_login, build_logout, build_pre_login, ReplyState};
use crate::network::transport::Connector;
use crate::session_management::login_client::{LoginClient, MAX_RETRIES};
use crate::session_management::session::Session;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::io::{Builder, Mock};

pub(crate) const LOGGED_IN_PAGE: &[u8] =
    b"HTTP/1.0 200 OK\n\n<a href=\"/sd/create_session_window\">Session</a>";
pub(crate) const LOGGED_OUT_PAGE: &[u8] = b"HTTP/1.0 200 OK\n\nPlease Login again";
pub(crate) const UNKNOWN_PAGE: &[u8] = b"HTTP/1.0 503 Service Unavailable\n\n";

/// One scripted connection attempt.
pub(crate) enum Step {
    Connect(Mock),
    Refuse,
}

/// A connector that plays back a fixed list of connections.
///
/// Each mock asserts the exact request bytes it receives. Once the script runs out every
/// further connection is refused.
#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    steps: Arc<Mutex<VecDeque<Step>>>,
    connects: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.steps.lock().unwrap().len()
    }
}

impl Connector for ScriptedConnector {
    type Stream = Mock;

    async fn connect(&self, host: &str, _port: u16) -> Result<Mock, NetworkError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.steps.lock().unwrap().pop_front() {
            Some(Step::Connect(mock)) => Ok(mock),
            Some(Step::Refuse) | None => Err(NetworkError::ConnectFailure {
                host: host.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            }),
        }
    }
}

pub(crate) fn reply(request: Vec<u8>, reply: &[u8]) -> Step {
    Step::Connect(Builder::new().write(&request).read(reply).build())
}

/// The server takes the request and never answers.
pub(crate) fn silent(request: Vec<u8>) -> Step {
    Step::Connect(
        Builder::new()
            .write(&request)
            .wait(Duration::from_secs(60))
            .build(),
    )
}

pub(crate) fn refuse() -> Step {
    Step::Refuse
}

pub(crate) fn session() -> Session {
    Session::new("10.0.0.6", "bob", "hunter2")
}

#[tokio::test]
async fn test_pre_login_marker_skips_login() {
    let mut session = session();
    let connector = ScriptedConnector::new(vec![reply(build_pre_login(&session), LOGGED_IN_PAGE)]);
    let client = LoginClient::new(connector.clone());

    assert!(client.ensure_logged_in(&mut session).await);
    assert!(session.logged_in);
    assert_eq!(connector.connects(), 1);
    assert_eq!(session.last_reply, LOGGED_IN_PAGE);
}

#[tokio::test]
async fn test_login_after_logged_out_ping() {
    let mut session = session();
    let connector = ScriptedConnector::new(vec![
        reply(build_pre_login(&session), LOGGED_OUT_PAGE),
        reply(build_login(&session), LOGGED_IN_PAGE),
    ]);
    let client = LoginClient::new(connector.clone());

    assert!(client.ensure_logged_in(&mut session).await);
    assert_eq!(connector.connects(), 2);
    assert_eq!(connector.remaining(), 0);
}

#[tokio::test]
async fn test_do_login_without_marker_is_not_an_error() {
    let mut session = session();
    session.logged_in = true;
    let connector = ScriptedConnector::new(vec![reply(build_login(&session), LOGGED_OUT_PAGE)]);
    let client = LoginClient::new(connector);

    client.do_login(&mut session).await.unwrap();
    assert!(!session.logged_in);
}

#[tokio::test]
async fn test_do_login_network_failure_clears_state() {
    let mut session = session();
    session.logged_in = true;
    let client = LoginClient::new(ScriptedConnector::new(vec![refuse()]));

    let err = client.do_login(&mut session).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Network(NetworkError::ConnectFailure { .. })
    ));
    assert!(!session.logged_in);
}

#[tokio::test]
async fn test_pre_login_failure_keeps_state() {
    let mut session = session();
    let client = LoginClient::new(ScriptedConnector::new(vec![refuse(), refuse()]));

    session.logged_in = true;
    assert!(client.pre_login(&mut session).await.is_err());
    assert!(session.logged_in);

    session.logged_in = false;
    assert!(client.pre_login(&mut session).await.is_err());
    assert!(!session.logged_in);
}

#[tokio::test]
async fn test_unrecognised_ping_keeps_state() {
    let mut session = session();
    let request = build_pre_login(&session);
    let client = LoginClient::new(ScriptedConnector::new(vec![
        reply(request.clone(), UNKNOWN_PAGE),
        reply(request.clone(), LOGGED_OUT_PAGE),
    ]));

    session.logged_in = true;
    assert_eq!(
        client.pre_login(&mut session).await.unwrap(),
        ReplyState::Unrecognised
    );
    assert!(session.logged_in);

    assert_eq!(
        client.pre_login(&mut session).await.unwrap(),
        ReplyState::LoggedOut
    );
    assert!(!session.logged_in);
}

#[tokio::test(start_paused = true)]
async fn test_refused_logins_give_up_after_max_retries() {
    let mut session = session();
    let ping = build_pre_login(&session);
    let connector = ScriptedConnector::new(vec![
        reply(ping.clone(), LOGGED_OUT_PAGE),
        refuse(),
        reply(ping.clone(), LOGGED_OUT_PAGE),
        refuse(),
        reply(ping.clone(), LOGGED_OUT_PAGE),
        refuse(),
    ]);
    let client = LoginClient::new(connector.clone());

    let start = Instant::now();
    assert!(!client.ensure_logged_in(&mut session).await);

    // waits of 0s, 5s and 10s before the three attempts
    assert_eq!(start.elapsed(), Duration::from_secs(15));
    assert_eq!(connector.connects(), 2 * MAX_RETRIES as usize);
    assert_eq!(connector.remaining(), 0);
    assert!(!session.logged_in);
}

#[tokio::test(start_paused = true)]
async fn test_every_login_is_preceded_by_a_ping() {
    let mut session = session();
    let ping = build_pre_login(&session);
    let login = build_login(&session);
    // Mocks panic on any write other than the scripted one, so the order is enforced here.
    let connector = ScriptedConnector::new(vec![
        reply(ping.clone(), LOGGED_OUT_PAGE),
        reply(login.clone(), UNKNOWN_PAGE),
        reply(ping.clone(), LOGGED_OUT_PAGE),
        refuse(),
        reply(ping.clone(), LOGGED_OUT_PAGE),
        reply(login.clone(), LOGGED_IN_PAGE),
    ]);
    let client = LoginClient::new(connector.clone());

    assert!(client.ensure_logged_in(&mut session).await);
    assert_eq!(connector.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_finds_session_already_live() {
    let mut session = session();
    let ping = build_pre_login(&session);
    let connector = ScriptedConnector::new(vec![
        refuse(),
        reply(ping.clone(), LOGGED_IN_PAGE),
    ]);
    let client = LoginClient::new(connector.clone());

    let start = Instant::now();
    assert!(client.ensure_logged_in(&mut session).await);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(connector.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_times_out() {
    let mut session = session();
    let client = LoginClient::new(ScriptedConnector::new(vec![silent(build_pre_login(
        &session,
    ))]));

    let err = client.pre_login(&mut session).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Network(NetworkError::ReadTimeout)
    ));
}

#[tokio::test]
async fn test_logout_when_logged_out_sends_nothing() {
    let mut session = session();
    let connector = ScriptedConnector::new(vec![reply(build_pre_login(&session), LOGGED_OUT_PAGE)]);
    let client = LoginClient::new(connector.clone());

    client.logout(&mut session).await.unwrap();
    assert!(!session.logged_in);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_logout_confirmed() {
    let mut session = session();
    let connector = ScriptedConnector::new(vec![
        reply(build_pre_login(&session), LOGGED_IN_PAGE),
        reply(build_logout(&session), LOGGED_OUT_PAGE),
    ]);
    let client = LoginClient::new(connector.clone());

    client.logout(&mut session).await.unwrap();
    assert!(!session.logged_in);
    assert_eq!(connector.remaining(), 0);
}

#[tokio::test]
async fn test_logout_not_confirmed() {
    let mut session = session();
    let connector = ScriptedConnector::new(vec![
        reply(build_pre_login(&session), LOGGED_IN_PAGE),
        reply(build_logout(&session), UNKNOWN_PAGE),
    ]);
    let client = LoginClient::new(connector);

    let err = client.logout(&mut session).await.unwrap_err();
    assert!(matches!(err, SessionError::LogoutNotConfirmed));
    assert!(session.logged_in);
}

#[tokio::test]
async fn test_logout_propagates_ping_failure() {
    let mut session = session();
    let connector = ScriptedConnector::new(vec![refuse()]);
    let client = LoginClient::new(connector.clone());

    assert!(matches!(
        client.logout(&mut session).await,
        Err(SessionError::Network(_))
    ));
    assert_eq!(connector.connects(), 1);
}
