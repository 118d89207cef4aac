//! Keeps a local view of an Nxt2 account in step with a trusted node.
//!
//! The node is queried over its HTTP/JSON API and followed through its long-poll event
//! subscription. Transactions the node builds for the account are decoded, checked and signed
//! locally before they are broadcast.

pub mod config;
pub mod crypto;
pub mod node;
pub mod transaction;
pub mod utils;
pub mod wallet;
