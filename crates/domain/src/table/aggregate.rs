//! Table aggregate root.

use std::collections::{HashMap, HashSet};

use common::Id;
use serde::{Deserialize, Serialize};

use super::{
    Order, OrderStatus, Preparation, PreparationStatus, TableError, TableStatus, ValidationError,
};

/// Table aggregate root.
///
/// Owns its orders, which own their preparations. The whole tree is loaded,
/// validated and saved as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: Id,
    pub status: TableStatus,
    pub orders: Vec<Order>,
}

// Query methods
impl Table {
    /// A newly opened table with no orders.
    pub fn open(id: Id) -> Self {
        Self {
            id,
            status: TableStatus::Opened,
            orders: Vec::new(),
        }
    }

    /// Checks every invariant of the aggregate, children included.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId { entity: "table" });
        }

        let mut order_ids = HashSet::new();
        let mut preparation_ids = HashSet::new();
        let mut menu_items = HashMap::new();

        for order in &self.orders {
            order.validate()?;

            if !order_ids.insert(order.id) {
                return Err(ValidationError::DuplicateId {
                    entity: "order",
                    id: order.id,
                });
            }
            for preparation in &order.preparations {
                if !preparation_ids.insert(preparation.id) {
                    return Err(ValidationError::DuplicateId {
                        entity: "preparation",
                        id: preparation.id,
                    });
                }
                let item = &preparation.menu_item;
                if *menu_items.entry(item.id).or_insert(item) != item {
                    return Err(ValidationError::ConflictingMenuItem { item_id: item.id });
                }
            }

            if self.status == TableStatus::Closed && order.status == OrderStatus::Taken {
                return Err(ValidationError::TakenOrderOnClosedTable {
                    table_id: self.id,
                    order_id: order.id,
                });
            }
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn order(&self, order_id: Id) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    pub fn preparation(&self, preparation_id: Id) -> Option<&Preparation> {
        self.orders
            .iter()
            .find_map(|order| order.preparation(preparation_id))
    }

    pub fn owns_preparation(&self, preparation_id: Id) -> bool {
        self.preparation(preparation_id).is_some()
    }

    pub fn owns_order(&self, order_id: Id) -> bool {
        self.order(order_id).is_some()
    }

    /// First order that still has kitchen work outstanding.
    pub fn first_taken_order(&self) -> Option<&Order> {
        self.orders.iter().find(|o| o.status == OrderStatus::Taken)
    }

    pub fn preparations(&self) -> impl Iterator<Item = &Preparation> {
        self.orders.iter().flat_map(|o| o.preparations.iter())
    }
}

// Transition methods
impl Table {
    /// Closes the table. Re-closing is rejected rather than ignored.
    pub fn close(&mut self) -> Result<(), TableError> {
        if self.status == TableStatus::Closed {
            return Err(TableError::AlreadyClosed { table_id: self.id });
        }
        if let Some(order) = self.first_taken_order() {
            return Err(TableError::OrdersInProgress {
                table_id: self.id,
                order_id: order.id,
            });
        }

        self.status = TableStatus::Closed;
        Ok(())
    }

    /// Appends a freshly taken order.
    pub fn take_order(&mut self, order: Order) -> Result<(), TableError> {
        if !self.status.can_take_orders() {
            return Err(TableError::NotOpened {
                table_id: self.id,
                status: self.status,
            });
        }

        self.orders.push(order);
        Ok(())
    }

    pub fn start_preparation(&mut self, preparation_id: Id) -> Result<(), TableError> {
        self.advance_preparation(
            preparation_id,
            PreparationStatus::can_start,
            PreparationStatus::InProgress,
            "start",
        )?;
        Ok(())
    }

    pub fn finish_preparation(&mut self, preparation_id: Id) -> Result<(), TableError> {
        self.advance_preparation(
            preparation_id,
            PreparationStatus::can_finish,
            PreparationStatus::Ready,
            "finish",
        )?;
        Ok(())
    }

    /// Serves a ready preparation and returns the resulting order status.
    ///
    /// The order becomes done when this was its last unserved preparation.
    pub fn serve_preparation(&mut self, preparation_id: Id) -> Result<OrderStatus, TableError> {
        let order = self.advance_preparation(
            preparation_id,
            PreparationStatus::can_serve,
            PreparationStatus::Served,
            "serve",
        )?;

        if order.all_served() {
            order.status = OrderStatus::Done;
        }
        Ok(order.status)
    }

    /// Aborts a pending or in-progress preparation and returns the resulting
    /// order status.
    ///
    /// The order becomes aborted when every preparation in it is aborted.
    pub fn abort_preparation(&mut self, preparation_id: Id) -> Result<OrderStatus, TableError> {
        let order = self.advance_preparation(
            preparation_id,
            PreparationStatus::can_abort,
            PreparationStatus::Aborted,
            "abort",
        )?;

        if order.all_aborted() {
            order.status = OrderStatus::Aborted;
        }
        Ok(order.status)
    }

    /// Aborts a taken order together with all of its preparations and
    /// returns how many preparations this call aborted.
    ///
    /// Rejected once any preparation is ready or served.
    pub fn abort_order(&mut self, order_id: Id) -> Result<usize, TableError> {
        if self.status != TableStatus::Opened {
            return Err(TableError::OrderNotFound { order_id });
        }
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(TableError::OrderNotFound { order_id })?;

        if order.status != OrderStatus::Taken {
            return Err(TableError::InvalidOrderTransition {
                order_id,
                current: order.status,
                action: "abort",
            });
        }
        if let Some(p) = order
            .preparations
            .iter()
            .find(|p| p.status != PreparationStatus::Aborted && !p.status.can_abort())
        {
            return Err(TableError::InvalidPreparationTransition {
                preparation_id: p.id,
                current: p.status,
                action: "abort",
            });
        }

        let mut aborted = 0;
        for preparation in &mut order.preparations {
            if preparation.status != PreparationStatus::Aborted {
                preparation.status = PreparationStatus::Aborted;
                aborted += 1;
            }
        }
        order.status = OrderStatus::Aborted;
        Ok(aborted)
    }

    fn advance_preparation(
        &mut self,
        preparation_id: Id,
        allowed: fn(&PreparationStatus) -> bool,
        next: PreparationStatus,
        action: &'static str,
    ) -> Result<&mut Order, TableError> {
        let (order, index) = self.locate_preparation_mut(preparation_id)?;
        let preparation = &mut order.preparations[index];

        if !allowed(&preparation.status) {
            return Err(TableError::InvalidPreparationTransition {
                preparation_id,
                current: preparation.status,
                action,
            });
        }

        preparation.status = next;
        Ok(order)
    }

    /// Preparations on a table that is no longer opened are not reachable.
    fn locate_preparation_mut(
        &mut self,
        preparation_id: Id,
    ) -> Result<(&mut Order, usize), TableError> {
        if self.status != TableStatus::Opened {
            return Err(TableError::PreparationNotFound { preparation_id });
        }

        for order in &mut self.orders {
            if let Some(index) = order
                .preparations
                .iter()
                .position(|p| p.id == preparation_id)
            {
                return Ok((order, index));
            }
        }

        Err(TableError::PreparationNotFound { preparation_id })
    }
}
