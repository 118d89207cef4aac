use thiserror::Error;

/// Number of decimal places always kept when formatting, unless the chain has fewer.
const MIN_DISPLAY_DECIMALS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
	#[error("'{0}' is not a valid decimal amount")]
	Invalid(String),
	#[error("'{value}' has more than {decimals} decimal places")]
	TooPrecise { value: String, decimals: u32 },
	#[error("'{0}' is out of range")]
	Overflow(String),
	#[error("{0} decimal places cannot be represented")]
	UnsupportedDecimals(u32),
}

fn scale(decimals: u32) -> Result<u128, AmountError> {
	10u128
		.checked_pow(decimals)
		.ok_or(AmountError::UnsupportedDecimals(decimals))
}

/// Format an amount in minor units as a decimal string.
///
/// Trailing zeros beyond four decimal places are dropped and the whole part is grouped with
/// commas, e.g. `123456789000` with 8 decimals becomes `1,234.56789`.
pub fn format_amount(amount: i64, decimals: u32) -> Result<String, AmountError> {
	let scale = scale(decimals)?;
	let magnitude = amount.unsigned_abs() as u128;
	let whole = group_thousands(&(magnitude / scale).to_string());
	let sign = if amount < 0 { "-" } else { "" };
	if decimals == 0 {
		return Ok(format!("{sign}{whole}"));
	}

	let mut fraction = format!("{:0width$}", magnitude % scale, width = decimals as usize);
	while fraction.len() > MIN_DISPLAY_DECIMALS && fraction.ends_with('0') {
		fraction.pop();
	}
	Ok(format!("{sign}{whole}.{fraction}"))
}

/// Parse a decimal string into minor units.
///
/// An empty string is zero. More fractional digits than the chain supports is an error rather
/// than a silent truncation.
pub fn parse_amount(value: &str, decimals: u32) -> Result<i64, AmountError> {
	scale(decimals)?;
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return Ok(0);
	}
	let invalid = || AmountError::Invalid(value.to_string());
	let overflow = || AmountError::Overflow(value.to_string());

	let (negative, unsigned) = match trimmed.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, trimmed),
	};
	let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
	if whole.is_empty() && fraction.is_empty() {
		return Err(invalid());
	}
	let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
	if !all_digits(whole) || !all_digits(fraction) {
		return Err(invalid());
	}
	if fraction.len() > decimals as usize {
		return Err(AmountError::TooPrecise {
			value: value.to_string(),
			decimals,
		});
	}

	let digits = format!("{whole}{fraction:0<width$}", width = decimals as usize);
	let magnitude = digits.parse::<i128>().map_err(|_| overflow())?;
	let signed = if negative { -magnitude } else { magnitude };
	i64::try_from(signed).map_err(|_| overflow())
}

fn group_thousands(digits: &str) -> String {
	let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
	for (i, c) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			grouped.push(',');
		}
		grouped.push(c);
	}
	grouped
}
