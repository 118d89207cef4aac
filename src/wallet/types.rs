use crate::crypto::SigningError;
use crate::node::NodeError;
use crate::transaction::CodecError;
use crate::wallet::AddressError;

/// Errors raised while loading or synchronizing an account.
///
/// Node errors end the session; everything else is local to one event or one transaction and is
/// logged before the loop moves on. See [`WalletSyncError::is_fatal`].
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	#[error("Node error: {0}")]
	NodeError(#[from] NodeError),

	#[error("Transaction codec error: {0}")]
	CodecError(#[from] CodecError),

	#[error("Signing error: {0}")]
	SigningError(#[from] SigningError),

	#[error("Invalid identifier: {0}")]
	IdentifierError(String),

	#[error("Address error: {0}")]
	AddressError(#[from] AddressError),

	#[error("Malformed event payload '{0}'")]
	MalformedEvent(String),

	#[error("Session error: {0}")]
	SessionError(String),

	#[error("View consumer is no longer running")]
	HandoffClosed,
}

impl WalletSyncError {
	/// Whether the error ends the current sync session.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			WalletSyncError::NodeError(_)
				| WalletSyncError::SessionError(_)
				| WalletSyncError::HandoffClosed
		)
	}
}
