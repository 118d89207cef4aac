//! Utility module for the Nxt2 wallet.
//!
//! Amount formatting for display and serde helpers for the node's loosely typed JSON numbers.
/// Conversion between minor units and decimal strings
pub mod amount;
/// Deserializers for numbers the node sends either as JSON numbers or decimal strings
pub mod json;

pub use amount::{AmountError, format_amount, parse_amount};
