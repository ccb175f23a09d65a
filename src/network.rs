pub mod messages;
pub mod transport;
