//! Storage backends for the table aggregate.
//!
//! Both backends satisfy the same [`domain::TableRepository`] contract and
//! can be swapped behind it; the menu catalog comes in matching flavours.

mod error;
pub mod memory;
pub mod postgres;

pub use memory::{InMemoryMenuCatalog, InMemoryTableRepository};
pub use postgres::{PostgresMenuCatalog, PostgresTableRepository};
