//! The account a sync session runs for.

use std::fmt;
use std::sync::Arc;

use crate::config::{AccountConfig, ConfigError};
use crate::crypto::{self, SigningError};
use crate::transaction::NodeConstants;
use crate::wallet::AccountAddress;

/// One activated account together with the protocol tables it is interpreted against.
///
/// A session built from a secret phrase can sign; a watch-only session cannot.
#[derive(Clone)]
pub struct Session {
	account: AccountAddress,
	public_key: Option<[u8; 32]>,
	secret_phrase: Option<String>,
	constants: Arc<NodeConstants>,
}

impl Session {
	/// Watch-only session for an account id.
	pub fn watch(account: AccountAddress, constants: Arc<NodeConstants>) -> Self {
		Self {
			account,
			public_key: None,
			secret_phrase: None,
			constants,
		}
	}

	/// Signing session; the account is derived from the phrase's public key.
	pub fn from_secret_phrase(
		secret_phrase: &str,
		constants: Arc<NodeConstants>,
	) -> Result<Self, SigningError> {
		let public_key = crypto::public_key(secret_phrase)?;
		Ok(Self {
			account: AccountAddress::from_public_key(&public_key),
			public_key: Some(public_key),
			secret_phrase: Some(secret_phrase.to_string()),
			constants,
		})
	}

	pub fn from_config(
		config: &AccountConfig,
		constants: Arc<NodeConstants>,
	) -> Result<Self, ConfigError> {
		match &config.secret_phrase {
			Some(phrase) => Ok(Self::from_secret_phrase(phrase, constants)?),
			None => Ok(Self::watch(config.resolve()?, constants)),
		}
	}

	pub fn account(&self) -> AccountAddress {
		self.account
	}

	pub fn account_id(&self) -> u64 {
		self.account.id()
	}

	/// Reed-Solomon form of the account, as used in event topics.
	pub fn display_address(&self) -> String {
		self.account.encode()
	}

	pub fn public_key(&self) -> Option<&[u8; 32]> {
		self.public_key.as_ref()
	}

	pub fn secret_phrase(&self) -> Option<&str> {
		self.secret_phrase.as_deref()
	}

	pub fn can_sign(&self) -> bool {
		self.secret_phrase.is_some()
	}

	pub fn constants(&self) -> &Arc<NodeConstants> {
		&self.constants
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("account", &self.account.encode())
			.field("public_key", &self.public_key.map(hex::encode))
			.field("can_sign", &self.can_sign())
			.finish()
	}
}
