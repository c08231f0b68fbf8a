//! Push Gateway Storage Layer
//!
//! Canonical registration ID store backed by Diesel/SQLite, plus an
//! in-memory implementation.

mod memory;
mod models;
mod schema;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use models::*;
pub use sqlite::SqliteStorage;
pub use traits::*;

use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
