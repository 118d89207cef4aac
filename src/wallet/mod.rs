//! Account state: addresses, sessions, per-chain ledgers, the view model and the sync engine.

/// Reed-Solomon account addresses
pub mod address;
/// Per-chain transaction ledger
pub mod ledger;
/// The account a session runs for
pub mod session;
pub mod sync;
pub mod types;
/// Read model handed to observers
pub mod view;

pub use address::{AccountAddress, AddressError};
pub use ledger::{AccountLedger, LedgerChange};
pub use session::Session;
pub use types::*;
pub use view::{AccountSnapshot, ChainSnapshot, Notification, ViewUpdate, WalletView};

use rand::Rng;

/// Generate a random secret phrase: 32 random bytes, hex encoded.
pub fn generate_secret_phrase() -> String {
	let mut seed = [0u8; 32];
	rand::rng().fill(&mut seed);
	hex::encode(seed)
}
