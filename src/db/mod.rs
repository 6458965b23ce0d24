//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization, pragmas and ordered schema migrations
//! - The `PrescriptionStore` CRUD layer

pub mod migrations;
pub mod store;

pub use migrations::{init_db, MigrationError};
pub use store::PrescriptionStore;
