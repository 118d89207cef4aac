//! Type-specific transaction attachments.

use serde::{Deserialize, Serialize};

use super::chain::NodeConstants;
use super::codec::{ByteReader, CodecError};

pub const TYPE_PAYMENT: i8 = 0;
pub const SUBTYPE_ORDINARY_PAYMENT: i8 = 0;
/// Coin exchange on a child chain.
pub const TYPE_COIN_EXCHANGE: i8 = 11;
/// Coin exchange on the parent chain.
pub const TYPE_FXT_COIN_EXCHANGE: i8 = -4;
pub const SUBTYPE_ORDER_ISSUE: i8 = 0;

/// Decoded attachment of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attachment {
	/// Ordinary payments carry no attachment bytes.
	OrdinaryPayment,
	ExchangeOrderIssue(OrderIssueAttachment),
	/// Attachment of a type the wallet does not interpret, kept byte for byte.
	Opaque(Vec<u8>),
}

impl Attachment {
	/// Decode the attachment for `(tx_type, subtype)` from the reader.
	///
	/// Opaque attachments consume everything that is left in the buffer.
	pub(crate) fn read(
		reader: &mut ByteReader<'_>,
		tx_type: i8,
		subtype: i8,
		constants: &NodeConstants,
	) -> Result<Self, CodecError> {
		match (tx_type, subtype) {
			(TYPE_PAYMENT, SUBTYPE_ORDINARY_PAYMENT) => Ok(Attachment::OrdinaryPayment),
			(TYPE_COIN_EXCHANGE | TYPE_FXT_COIN_EXCHANGE, SUBTYPE_ORDER_ISSUE) => Ok(
				Attachment::ExchangeOrderIssue(OrderIssueAttachment::read(reader, constants)?),
			),
			_ => Ok(Attachment::Opaque(reader.remaining().to_vec())),
		}
	}

	pub(crate) fn write(&self, out: &mut Vec<u8>) {
		match self {
			Attachment::OrdinaryPayment => {}
			Attachment::ExchangeOrderIssue(order) => order.write(out),
			Attachment::Opaque(bytes) => out.extend_from_slice(bytes),
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Attachment::OrdinaryPayment => 0,
			Attachment::ExchangeOrderIssue(_) => OrderIssueAttachment::LENGTH,
			Attachment::Opaque(bytes) => bytes.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Order to exchange coins of `chain_id` for coins of `exchange_chain_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIssueAttachment {
	pub chain_id: u32,
	pub exchange_chain_id: u32,
	/// Amount of `exchange_chain_id` coins to buy, in its minor units.
	pub quantity: i64,
	/// Price per whole `exchange_chain_id` coin, in `chain_id` minor units.
	pub price: i64,
}

impl OrderIssueAttachment {
	pub const VERSION: u8 = 1;
	pub const LENGTH: usize = 1 + 4 + 4 + 8 + 8;

	fn read(reader: &mut ByteReader<'_>, constants: &NodeConstants) -> Result<Self, CodecError> {
		let version = reader.read_u8()?;
		if version != Self::VERSION {
			return Err(CodecError::UnsupportedAttachmentVersion(version));
		}
		let chain_id = constants.require_chain(reader.read_i32()? as i64)?.id;
		let exchange_chain_id = constants.require_chain(reader.read_i32()? as i64)?.id;
		Ok(Self {
			chain_id,
			exchange_chain_id,
			quantity: reader.read_i64()?,
			price: reader.read_i64()?,
		})
	}

	fn write(&self, out: &mut Vec<u8>) {
		out.push(Self::VERSION);
		out.extend_from_slice(&(self.chain_id as i32).to_le_bytes());
		out.extend_from_slice(&(self.exchange_chain_id as i32).to_le_bytes());
		out.extend_from_slice(&self.quantity.to_le_bytes());
		out.extend_from_slice(&self.price.to_le_bytes());
	}
}
