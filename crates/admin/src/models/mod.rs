//! Types kept in the browser session.

pub mod session;

pub use session::{CurrentIdentity, Flash, keys as session_keys};
