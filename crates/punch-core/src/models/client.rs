//! Client model

use serde::{Deserialize, Serialize};
use std::fmt;

/// A billing party sessions are recorded against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Display name; identity for matching is the case-insensitive name
    pub name: String,
    /// Hourly rate
    pub rate: u32,
    /// ISO currency code used for earnings
    pub currency: String,
}

impl Client {
    /// Create a new client
    pub fn new(name: impl Into<String>, rate: u32, currency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate,
            currency: currency.into(),
        }
    }

    /// A client known only by name, as read from a remote mirror or merge document
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, 0, String::new())
    }

    /// Case-insensitive name comparison
    #[must_use]
    pub fn same_name(&self, other: &str) -> bool {
        self.name.to_lowercase() == other.to_lowercase()
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{} {}", self.name, self.rate, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_ignores_case() {
        let client = Client::new("Acme", 100, "USD");
        assert!(client.same_name("acme"));
        assert!(client.same_name("ACME"));
        assert!(!client.same_name("Acme Corp"));
    }

    #[test]
    fn test_display() {
        let client = Client::new("Acme", 120, "EUR");
        assert_eq!(client.to_string(), "Acme\t120 EUR");
    }
}
