#![deny(clippy::expect_used)]
#![deny(clippy::unwrap_used)]

pub mod api;
pub mod auth;
pub mod claims;
pub mod config;
pub mod console;
pub mod credential;
pub mod error;
pub mod liveness;
pub mod modal;
pub mod motion;
pub mod presets;
pub mod protocol;
pub mod reboot;
pub mod registry;
pub mod server;
pub mod session;
pub mod transport;
pub(crate) mod web_server;

pub use error::{OurError, OurResult};
