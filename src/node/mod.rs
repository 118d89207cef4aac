//! Node API integration module
//!
//! This module provides the client and types for talking to an Nxt2 node over its HTTP/JSON API.
//! The node serves account data, builds unsigned transactions, accepts signed ones for broadcast
//! and pushes block and transaction events through a long-poll subscription.

/// HTTP client for the node API
mod client;
/// Request parameters, responses and error types
mod types;

pub use client::{EVENT_WAIT_MARGIN, NodeClient, TRANSACTION_PAGE_SIZE};
pub use types::*;
