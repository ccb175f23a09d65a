//! Session management core module.
//!
//! [`session::Session`] holds the gateway settings, the credentials and the believed login
//! state. [`login_client::LoginClient`] runs the pre-login / login / logout exchanges against it.

/// Login, logout and the retry policy.
pub mod login_client;
/// Session data.
pub mod session;
#[cfg(test)]
pub(crate) mod tests;

pub use login_client::LoginClient;
pub use session::Session;
