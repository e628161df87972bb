//! FxWallet Common Types
//!
//! Shared types used across the wallet crates: the supported currency set,
//! money and presentation rounding, identifiers and the error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
