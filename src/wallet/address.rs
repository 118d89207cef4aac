use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::crypto;

/// Prefix of the Reed-Solomon display form.
pub const ADDRESS_PREFIX: &str = "NXT-";

const ALPHABET: &[u8; 32] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const CODEWORD_MAP: [usize; 17] = [3, 2, 1, 0, 7, 6, 5, 4, 13, 14, 15, 16, 12, 8, 9, 10, 11];
const GEXP: [u8; 32] = [
	1, 2, 4, 8, 16, 5, 10, 20, 13, 26, 17, 7, 14, 28, 29, 31, 27, 19, 3, 6, 12, 24, 21, 15, 30, 25,
	23, 11, 22, 9, 18, 1,
];
const GLOG: [u8; 32] = [
	0, 0, 1, 18, 2, 5, 19, 11, 3, 29, 6, 27, 20, 8, 12, 23, 4, 10, 30, 17, 7, 22, 28, 26, 21, 25, 9,
	16, 13, 14, 24, 15,
];
const CODEWORD_LENGTH: usize = 17;
const BASE_32_LENGTH: usize = 13;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
	#[error("account address has too many characters")]
	TooLong,
	#[error("account address is incomplete")]
	TooShort,
	#[error("account address checksum is invalid")]
	InvalidChecksum,
	#[error("account address does not fit in 64 bits")]
	Overflow,
	#[error("invalid account identifier '{0}'")]
	InvalidIdentifier(String),
}

/// An account identifier together with its Reed-Solomon display form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountAddress {
	id: u64,
}

impl AccountAddress {
	pub fn new(id: u64) -> Self {
		Self { id }
	}

	pub fn from_public_key(public_key: &[u8; 32]) -> Self {
		Self::new(crypto::account_id(public_key))
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	/// Decode a Reed-Solomon address, with or without the `NXT-` prefix.
	pub fn decode(encoded: &str) -> Result<Self, AddressError> {
		let upper = encoded.trim().to_ascii_uppercase();
		let body = upper.strip_prefix(ADDRESS_PREFIX).unwrap_or(&upper);

		let mut codeword = [0u8; CODEWORD_LENGTH];
		codeword[0] = 1;
		let mut length = 0;
		for symbol in body.bytes() {
			let Some(position) = ALPHABET.iter().position(|c| *c == symbol) else {
				continue;
			};
			if length >= CODEWORD_LENGTH {
				return Err(AddressError::TooLong);
			}
			codeword[CODEWORD_MAP[length]] = position as u8;
			length += 1;
		}
		if length != CODEWORD_LENGTH {
			return Err(AddressError::TooShort);
		}
		if !is_codeword_valid(&codeword) {
			return Err(AddressError::InvalidChecksum);
		}

		let mut digits: Vec<u32> = codeword[..BASE_32_LENGTH]
			.iter()
			.rev()
			.map(|d| *d as u32)
			.collect();
		let mut decimal = Vec::new();
		loop {
			let (quotient, remainder) = divide(&digits, 32, 10);
			decimal.push(b'0' + remainder as u8);
			if quotient.is_empty() {
				break;
			}
			digits = quotient;
		}
		decimal.reverse();
		let text = String::from_utf8_lossy(&decimal);
		text.parse::<u64>()
			.map(Self::new)
			.map_err(|_| AddressError::Overflow)
	}

	/// Parse either the Reed-Solomon form (`NXT-...`) or an unsigned decimal identifier.
	pub fn parse(value: &str) -> Result<Self, AddressError> {
		let value = value.trim();
		if value.to_ascii_uppercase().starts_with(ADDRESS_PREFIX) {
			return Self::decode(value);
		}
		value
			.parse::<u64>()
			.map(Self::new)
			.map_err(|_| AddressError::InvalidIdentifier(value.to_string()))
	}

	/// Reed-Solomon form including the prefix, e.g. `NXT-MRCC-2YLS-8M54-3CMAJ`.
	pub fn encode(&self) -> String {
		let decimal: Vec<u32> = self
			.id
			.to_string()
			.bytes()
			.map(|b| (b - b'0') as u32)
			.collect();

		let mut codeword = [0u8; CODEWORD_LENGTH];
		let mut digits = decimal;
		let mut position = 0;
		loop {
			let (quotient, remainder) = divide(&digits, 10, 32);
			codeword[position] = remainder as u8;
			position += 1;
			if quotient.is_empty() {
				break;
			}
			digits = quotient;
		}

		let mut parity = [0u8; 4];
		for i in (0..BASE_32_LENGTH).rev() {
			let feedback = codeword[i] ^ parity[3];
			parity[3] = parity[2] ^ gmult(30, feedback);
			parity[2] = parity[1] ^ gmult(6, feedback);
			parity[1] = parity[0] ^ gmult(9, feedback);
			parity[0] = gmult(17, feedback);
		}
		codeword[BASE_32_LENGTH..].copy_from_slice(&parity);

		let mut encoded = String::with_capacity(ADDRESS_PREFIX.len() + 20);
		encoded.push_str(ADDRESS_PREFIX);
		for (i, index) in CODEWORD_MAP.iter().enumerate() {
			encoded.push(ALPHABET[codeword[*index] as usize] as char);
			if i & 3 == 3 && i < BASE_32_LENGTH {
				encoded.push('-');
			}
		}
		encoded
	}
}

impl fmt::Display for AccountAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.encode())
	}
}

impl FromStr for AccountAddress {
	type Err = AddressError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

/// Long division of a big-endian digit string, returning the quotient digits and remainder.
fn divide(digits: &[u32], from_base: u32, divisor: u32) -> (Vec<u32>, u32) {
	let mut quotient = Vec::with_capacity(digits.len());
	let mut remainder = 0;
	for digit in digits {
		remainder = remainder * from_base + digit;
		if remainder >= divisor {
			quotient.push(remainder / divisor);
			remainder %= divisor;
		} else if !quotient.is_empty() {
			quotient.push(0);
		}
	}
	(quotient, remainder)
}

fn gmult(a: u8, b: u8) -> u8 {
	if a == 0 || b == 0 {
		return 0;
	}
	let index = (GLOG[a as usize] as usize + GLOG[b as usize] as usize) % 31;
	GEXP[index]
}

fn is_codeword_valid(codeword: &[u8; CODEWORD_LENGTH]) -> bool {
	(1..5).all(|i| {
		let mut syndrome = 0;
		for j in 0..31usize {
			if j > 12 && j < 27 {
				continue;
			}
			let position = if j > 26 { j - 14 } else { j };
			syndrome ^= gmult(codeword[position], GEXP[(i * j) % 31]);
		}
		syndrome == 0
	})
}
