//! Client repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::Client;

/// Trait for client storage operations
pub trait ClientRepository {
    /// Create a new client
    fn create(&self, client: &Client) -> Result<Client>;

    /// Look up a client by case-insensitive name
    fn get(&self, name: &str) -> Result<Option<Client>>;

    /// List all clients ordered by name
    fn list(&self) -> Result<Vec<Client>>;

    /// Update rate and currency of an existing client
    fn update(&self, client: &Client) -> Result<()>;

    /// Delete a client together with its sessions
    fn delete(&self, name: &str) -> Result<()>;
}

/// `SQLite` implementation of `ClientRepository`
pub struct SqliteClientRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteClientRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_client(row: &rusqlite::Row<'_>) -> rusqlite::Result<Client> {
        Ok(Client::new(
            row.get::<_, String>(0)?,
            row.get::<_, u32>(1)?,
            row.get::<_, String>(2)?,
        ))
    }
}

impl ClientRepository for SqliteClientRepository<'_> {
    fn create(&self, client: &Client) -> Result<Client> {
        let name = client.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("client name cannot be empty".into()));
        }
        if self.get(name)?.is_some() {
            return Err(Error::Conflict(format!("client '{name}' already exists")));
        }

        let created = Client::new(name, client.rate, client.currency.trim().to_uppercase());
        self.conn.execute(
            "INSERT INTO clients (name, rate, currency) VALUES (?, ?, ?)",
            params![created.name, created.rate, created.currency],
        )?;
        tracing::info!("Created client {}", created.name);
        Ok(created)
    }

    fn get(&self, name: &str) -> Result<Option<Client>> {
        Ok(self
            .conn
            .query_row(
                "SELECT name, rate, currency FROM clients WHERE name = ?",
                params![name.trim()],
                Self::parse_client,
            )
            .optional()?)
    }

    fn list(&self) -> Result<Vec<Client>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, rate, currency FROM clients ORDER BY name")?;
        let clients = stmt
            .query_map([], Self::parse_client)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(clients)
    }

    fn update(&self, client: &Client) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE clients SET rate = ?, currency = ? WHERE name = ?",
            params![
                client.rate,
                client.currency.trim().to_uppercase(),
                client.name.trim()
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("client '{}'", client.name)));
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM clients WHERE name = ?", params![name.trim()])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("client '{name}'")));
        }
        tracing::info!("Deleted client {}", name);
        Ok(())
    }
}
