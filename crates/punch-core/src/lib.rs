//! punch-core - Core library for Punch
//!
//! Session models, the SQLite store, the start/end state machine, and the
//! pull/merge/push reconciliation against remote mirrors. The `punch` CLI
//! is a thin layer over this crate.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod merge;
pub mod models;
pub mod query;
pub mod remote;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Client, Session, SessionId};
