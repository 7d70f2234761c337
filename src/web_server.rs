//! Handlers for the browser bridge.

pub(crate) mod middleware;
pub(crate) mod prelude;
pub(crate) mod session;
