use common::Id;
use thiserror::Error;

/// An aggregate invariant that does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{entity} id is nil")]
    NilId { entity: &'static str },

    #[error("menu item {item_id} has an empty name")]
    EmptyMenuItemName { item_id: Id },

    #[error("menu item {item_id} has a negative price ({price})")]
    NegativePrice { item_id: Id, price: i64 },

    #[error("order {order_id} has no preparations")]
    EmptyOrder { order_id: Id },

    #[error("table {table_id} is closed but order {order_id} is still taken")]
    TakenOrderOnClosedTable { table_id: Id, order_id: Id },

    #[error("order {order_id} is done but preparation {preparation_id} is not served")]
    UnservedPreparationInDoneOrder { order_id: Id, preparation_id: Id },

    #[error("order {order_id} is aborted but preparation {preparation_id} is not aborted")]
    LivePreparationInAbortedOrder { order_id: Id, preparation_id: Id },

    #[error("{entity} id {id} appears more than once")]
    DuplicateId { entity: &'static str, id: Id },

    /// Menu items never change once created, so one id maps to one value.
    #[error("menu item {item_id} does not match the item already stored under that id")]
    ConflictingMenuItem { item_id: Id },

    #[error("unknown {entity} status {value:?}")]
    UnknownStatus { entity: &'static str, value: String },
}
