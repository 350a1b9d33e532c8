//! Data models for Punch

mod client;
mod session;

pub use client::Client;
pub use session::{Session, SessionId};

pub(crate) use session::format_delta;
