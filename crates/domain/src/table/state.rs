//! Status machines for tables, orders and preparations.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::validation::ValidationError;

/// Status of a table.
///
/// ```text
/// Opened ──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Guests are seated, orders can be taken.
    #[default]
    Opened,

    /// Service is complete (terminal state).
    Closed,
}

impl TableStatus {
    pub fn can_take_orders(&self) -> bool {
        matches!(self, TableStatus::Opened)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TableStatus::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Opened => "opened",
            TableStatus::Closed => "closed",
        }
    }
}

/// Status of an order.
///
/// ```text
/// Taken ──┬──► Done
///         └──► Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Kitchen work is still outstanding.
    #[default]
    Taken,

    /// Every preparation was served (terminal state).
    Done,

    /// Every preparation was aborted (terminal state).
    Aborted,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Done | OrderStatus::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Taken => "taken",
            OrderStatus::Done => "done",
            OrderStatus::Aborted => "aborted",
        }
    }
}

/// Status of a single preparation.
///
/// ```text
/// Pending ──► InProgress ──► Ready ──► Served
///    │            │
///    └────────────┴──► Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PreparationStatus {
    /// Waiting for the kitchen.
    #[default]
    Pending,

    /// Being cooked.
    InProgress,

    /// Cooked, waiting to be brought to the table.
    Ready,

    /// Delivered to the table (terminal state).
    Served,

    /// Dropped before it was ready (terminal state).
    Aborted,
}

impl PreparationStatus {
    pub fn can_start(&self) -> bool {
        matches!(self, PreparationStatus::Pending)
    }

    pub fn can_finish(&self) -> bool {
        matches!(self, PreparationStatus::InProgress)
    }

    pub fn can_serve(&self) -> bool {
        matches!(self, PreparationStatus::Ready)
    }

    pub fn can_abort(&self) -> bool {
        matches!(
            self,
            PreparationStatus::Pending | PreparationStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PreparationStatus::Served | PreparationStatus::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PreparationStatus::Pending => "pending",
            PreparationStatus::InProgress => "in_progress",
            PreparationStatus::Ready => "ready",
            PreparationStatus::Served => "served",
            PreparationStatus::Aborted => "aborted",
        }
    }
}

macro_rules! impl_status_text {
    ($status:ty, $entity:literal, [$($variant:path),+ $(,)?]) => {
        impl std::fmt::Display for $status {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $status {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|status| status.as_str() == s)
                    .ok_or_else(|| ValidationError::UnknownStatus {
                        entity: $entity,
                        value: s.to_string(),
                    })
            }
        }
    };
}

impl_status_text!(TableStatus, "table", [TableStatus::Opened, TableStatus::Closed]);
impl_status_text!(
    OrderStatus,
    "order",
    [OrderStatus::Taken, OrderStatus::Done, OrderStatus::Aborted]
);
impl_status_text!(
    PreparationStatus,
    "preparation",
    [
        PreparationStatus::Pending,
        PreparationStatus::InProgress,
        PreparationStatus::Ready,
        PreparationStatus::Served,
        PreparationStatus::Aborted,
    ]
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(TableStatus::default(), TableStatus::Opened);
        assert_eq!(OrderStatus::default(), OrderStatus::Taken);
        assert_eq!(PreparationStatus::default(), PreparationStatus::Pending);
    }

    #[test]
    fn test_preparation_transitions() {
        use PreparationStatus::*;

        assert!(Pending.can_start());
        assert!(!InProgress.can_start());
        assert!(!Ready.can_start());

        assert!(InProgress.can_finish());
        assert!(!Pending.can_finish());

        assert!(Ready.can_serve());
        assert!(!InProgress.can_serve());
        assert!(!Served.can_serve());
    }

    #[test]
    fn test_abort_only_before_ready() {
        use PreparationStatus::*;

        assert!(Pending.can_abort());
        assert!(InProgress.can_abort());
        assert!(!Ready.can_abort());
        assert!(!Served.can_abort());
        assert!(!Aborted.can_abort());
    }

    #[test]
    fn test_terminal_states() {
        assert!(TableStatus::Closed.is_terminal());
        assert!(!TableStatus::Opened.is_terminal());
        assert!(OrderStatus::Done.is_terminal());
        assert!(OrderStatus::Aborted.is_terminal());
        assert!(!OrderStatus::Taken.is_terminal());
        assert!(PreparationStatus::Served.is_terminal());
        assert!(PreparationStatus::Aborted.is_terminal());
        assert!(!PreparationStatus::Ready.is_terminal());
    }

    #[test]
    fn test_parse_round_trips_storage_text() {
        for status in [
            PreparationStatus::Pending,
            PreparationStatus::InProgress,
            PreparationStatus::Ready,
            PreparationStatus::Served,
            PreparationStatus::Aborted,
        ] {
            assert_eq!(status.as_str().parse::<PreparationStatus>().unwrap(), status);
        }
        assert_eq!("closed".parse::<TableStatus>().unwrap(), TableStatus::Closed);
        assert_eq!("done".parse::<OrderStatus>().unwrap(), OrderStatus::Done);
    }

    #[test]
    fn test_parse_rejects_free_form_text() {
        let err = "in progress".parse::<PreparationStatus>().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnknownStatus {
                entity: "preparation",
                ..
            }
        ));
        assert!("OPENED".parse::<TableStatus>().is_err());
    }

    #[test]
    fn test_serialization_matches_storage_text() {
        let json = serde_json::to_string(&PreparationStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let deserialized: PreparationStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, PreparationStatus::InProgress);
    }
}
