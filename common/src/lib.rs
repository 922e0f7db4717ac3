//! Pocketbook Common Types
//!
//! Shared types used across the Pocketbook crates: the closed currency set,
//! money amounts, entity identifiers and the top-level error type.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
