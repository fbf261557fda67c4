//! Shared building blocks for the table service crates.
//!
//! - [`Id`] and the [`IdGenerator`] capability used to mint entity ids
//! - [`Context`], the cancellation signal every storage call accepts

pub mod context;
pub mod id;

pub use context::{Canceled, Context};
pub use id::{Id, IdGenerator, SequentialIdGenerator, UuidGenerator};
