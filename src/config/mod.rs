/// Database configuration and connection management
pub mod database;

/// Application settings loading from retainer.toml
pub mod settings;
