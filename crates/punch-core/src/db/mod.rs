//! Database layer for Punch

mod client_repository;
mod connection;
mod migrations;
mod session_store;

pub use client_repository::{ClientRepository, SqliteClientRepository};
pub use connection::Database;
pub use session_store::{SessionStore, SqliteSessionStore};
