use common::Id;
use serde::{Deserialize, Serialize};

use super::{PreparationStatus, ValidationError};
use crate::menu::MenuItem;

/// Kitchen work for one ordered menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preparation {
    pub id: Id,
    pub menu_item: MenuItem,
    pub status: PreparationStatus,
}

impl Preparation {
    /// A freshly taken preparation, waiting for the kitchen.
    pub fn pending(id: Id, menu_item: MenuItem) -> Self {
        Self {
            id,
            menu_item,
            status: PreparationStatus::Pending,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId {
                entity: "preparation",
            });
        }
        self.menu_item.validate()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
