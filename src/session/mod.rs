//! Session management - player slot allocation and connection tracking

pub mod manager;

pub use manager::{Session, SessionError, SessionManager};
