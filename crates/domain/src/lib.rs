//! Domain layer for the table service.
//!
//! This crate provides:
//! - The Table → Order → Preparation aggregate and its invariants
//! - `TableRepository`, the storage contract every backend implements
//! - `MenuCatalog`, the lookup side of the externally owned menu
//! - `TableService`, the state machine driver

pub mod error;
pub mod menu;
pub mod repository;
pub mod table;

pub use error::{DomainError, ErrorKind, Result};
pub use menu::{MenuCatalog, MenuItem};
pub use repository::TableRepository;
pub use table::{
    Order, OrderStatus, Preparation, PreparationStatus, Table, TableError, TableService,
    TableStatus, ValidationError,
};
