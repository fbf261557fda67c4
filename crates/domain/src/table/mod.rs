//! Table aggregate and related types.

mod aggregate;
mod order;
mod preparation;
mod service;
mod state;
mod validation;

pub use aggregate::Table;
pub use order::Order;
pub use preparation::Preparation;
pub use service::TableService;
pub use state::{OrderStatus, PreparationStatus, TableStatus};
pub use validation::ValidationError;

use common::Id;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised by table transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Orders can only be taken on an opened table.
    #[error("table {table_id} is not open (status is {status})")]
    NotOpened { table_id: Id, status: TableStatus },

    #[error("table {table_id} is already closed")]
    AlreadyClosed { table_id: Id },

    /// Closing requires every order to be done or aborted.
    #[error("table {table_id} still has order {order_id} in progress")]
    OrdersInProgress { table_id: Id, order_id: Id },

    #[error("no menu items provided")]
    NoMenuItems,

    #[error("invalid menu item: {0}")]
    InvalidMenuItem(ValidationError),

    #[error("preparation {preparation_id} not found")]
    PreparationNotFound { preparation_id: Id },

    #[error("order {order_id} not found")]
    OrderNotFound { order_id: Id },

    #[error("cannot {action} preparation {preparation_id}: status is {current}")]
    InvalidPreparationTransition {
        preparation_id: Id,
        current: PreparationStatus,
        action: &'static str,
    },

    #[error("cannot {action} order {order_id}: status is {current}")]
    InvalidOrderTransition {
        order_id: Id,
        current: OrderStatus,
        action: &'static str,
    },
}

impl TableError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TableError::PreparationNotFound { .. } | TableError::OrderNotFound { .. } => {
                ErrorKind::NotFound
            }
            _ => ErrorKind::Invalid,
        }
    }
}
