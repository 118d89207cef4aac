//! Wallet configuration.
//!
//! Settings come from an optional TOML file and can be overridden from the environment:
//!
//! - `NXT_CONNECT`: node host name
//! - `NXT_API_PORT`: node API port (default 27876)
//! - `NXT_USE_SSL`: `true`/`false` (default `true`, ignored for `localhost`)
//! - `NXT_ACCOUNT`: watch-only account, RS address or numeric id
//! - `NXT_SECRET_PHRASE`: secret phrase of an account that can sign
//!
//! ```toml
//! event_wait_timeout_secs = 60
//!
//! [node]
//! host = "localhost"
//! api_port = 27876
//!
//! [[accounts]]
//! address = "NXT-MRCC-2YLS-8M54-3CMAJ"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::crypto::{self, SigningError};
use crate::wallet::{AccountAddress, AddressError};

pub const DEFAULT_API_PORT: u16 = 27876;
pub const API_PATH: &str = "/nxt";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Unable to read configuration file: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Invalid configuration file: {0}")]
	ParseError(#[from] toml::de::Error),

	#[error("Invalid configuration value for {key}: {value}")]
	InvalidValue { key: String, value: String },

	#[error("Account identifier is not valid: {0}")]
	AddressError(#[from] AddressError),

	#[error("Unable to derive account from secret phrase: {0}")]
	SigningError(#[from] SigningError),

	#[error("No account configured")]
	NoAccount,
}

/// Connection settings for the node API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
	pub host: String,
	pub api_port: u16,
	pub use_ssl: bool,
	/// Trust any server certificate.
	pub accept_any_certificate: bool,
	/// Accept a certificate issued for a different host name.
	pub allow_name_mismatch: bool,
	pub connect_timeout_secs: u64,
	pub read_timeout_secs: u64,
}

impl Default for NodeConfig {
	fn default() -> Self {
		Self {
			host: "localhost".to_string(),
			api_port: DEFAULT_API_PORT,
			use_ssl: true,
			accept_any_certificate: false,
			allow_name_mismatch: false,
			connect_timeout_secs: 5,
			read_timeout_secs: 30,
		}
	}
}

impl NodeConfig {
	/// API endpoint. Connections to `localhost` never use TLS.
	pub fn api_url(&self) -> String {
		let scheme = if self.use_ssl && self.host != "localhost" {
			"https"
		} else {
			"http"
		};
		format!("{}://{}:{}{}", scheme, self.host, self.api_port, API_PATH)
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}

	pub fn read_timeout(&self) -> Duration {
		Duration::from_secs(self.read_timeout_secs)
	}
}

/// One configured account: either a watch-only address or a secret phrase.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub secret_phrase: Option<String>,
}

impl fmt::Debug for AccountConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AccountConfig")
			.field("address", &self.address)
			.field("secret_phrase", &self.secret_phrase.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

impl AccountConfig {
	/// Resolve the account identifier, deriving it from the secret phrase when one is set.
	pub fn resolve(&self) -> Result<AccountAddress, ConfigError> {
		match (&self.secret_phrase, &self.address) {
			(Some(phrase), _) => {
				let public_key = crypto::public_key(phrase)?;
				Ok(AccountAddress::from_public_key(&public_key))
			}
			(None, Some(address)) => Ok(AccountAddress::parse(address)?),
			(None, None) => Err(ConfigError::NoAccount),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
	pub node: NodeConfig,
	/// Server-side hold time of each `eventWait` long poll.
	pub event_wait_timeout_secs: u32,
	/// Capacity of the channel between the sync worker and the view consumer.
	pub update_queue_capacity: usize,
	pub accounts: Vec<AccountConfig>,
}

impl Default for WalletConfig {
	fn default() -> Self {
		Self {
			node: NodeConfig::default(),
			event_wait_timeout_secs: 60,
			update_queue_capacity: 64,
			accounts: Vec::new(),
		}
	}
}

impl WalletConfig {
	pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(contents)?)
	}

	/// Load a configuration file and apply environment overrides.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let config = match path {
			Some(path) => {
				info!("Loading configuration from {}", path.display());
				Self::from_toml_str(&std::fs::read_to_string(path)?)?
			}
			None => Self::default(),
		};
		config.with_overrides(|key| std::env::var(key).ok())
	}

	/// Apply overrides from a key lookup, normally the process environment.
	pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(host) = lookup("NXT_CONNECT") {
			self.node.host = host.to_lowercase();
		}
		if let Some(port) = lookup("NXT_API_PORT") {
			self.node.api_port = port.parse().map_err(|_| ConfigError::InvalidValue {
				key: "NXT_API_PORT".to_string(),
				value: port.clone(),
			})?;
		}
		if let Some(use_ssl) = lookup("NXT_USE_SSL") {
			self.node.use_ssl = match use_ssl.to_lowercase().as_str() {
				"true" | "1" | "yes" => true,
				"false" | "0" | "no" => false,
				_ => {
					warn!("Ignoring unrecognized NXT_USE_SSL value '{}'", use_ssl);
					self.node.use_ssl
				}
			};
		}
		if let Some(phrase) = lookup("NXT_SECRET_PHRASE") {
			self.accounts.insert(
				0,
				AccountConfig {
					address: None,
					secret_phrase: Some(phrase),
				},
			);
		} else if let Some(address) = lookup("NXT_ACCOUNT") {
			self.accounts.insert(
				0,
				AccountConfig {
					address: Some(address),
					secret_phrase: None,
				},
			);
		}
		Ok(self)
	}
}
