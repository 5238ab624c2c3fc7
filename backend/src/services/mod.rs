//! Process-wide services

pub mod session;

pub use session::SessionStore;
