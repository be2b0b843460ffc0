pub mod auth;
pub mod discovery;
pub mod enhance;
pub mod status_log;
