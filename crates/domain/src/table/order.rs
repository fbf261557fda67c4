use common::Id;
use serde::{Deserialize, Serialize};

use super::{OrderStatus, Preparation, PreparationStatus, ValidationError};

/// A batch of preparations taken together for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Id,
    pub status: OrderStatus,
    pub preparations: Vec<Preparation>,
}

impl Order {
    /// A freshly taken order.
    pub fn taken(id: Id, preparations: Vec<Preparation>) -> Self {
        Self {
            id,
            status: OrderStatus::Taken,
            preparations,
        }
    }

    /// Checks the order and every preparation in it.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId { entity: "order" });
        }
        if self.preparations.is_empty() {
            return Err(ValidationError::EmptyOrder { order_id: self.id });
        }

        for preparation in &self.preparations {
            preparation.validate()?;

            match self.status {
                OrderStatus::Done if preparation.status != PreparationStatus::Served => {
                    return Err(ValidationError::UnservedPreparationInDoneOrder {
                        order_id: self.id,
                        preparation_id: preparation.id,
                    });
                }
                OrderStatus::Aborted if preparation.status != PreparationStatus::Aborted => {
                    return Err(ValidationError::LivePreparationInAbortedOrder {
                        order_id: self.id,
                        preparation_id: preparation.id,
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn preparation(&self, preparation_id: Id) -> Option<&Preparation> {
        self.preparations.iter().find(|p| p.id == preparation_id)
    }

    pub fn all_served(&self) -> bool {
        self.all_in(PreparationStatus::Served)
    }

    pub fn all_aborted(&self) -> bool {
        self.all_in(PreparationStatus::Aborted)
    }

    fn all_in(&self, status: PreparationStatus) -> bool {
        !self.preparations.is_empty() && self.preparations.iter().all(|p| p.status == status)
    }
}
