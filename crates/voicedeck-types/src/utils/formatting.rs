//! String formatting utilities for log output.

/// Truncates a hex identifier for display.
///
/// Keeps the first 10 characters (the `0x` prefix plus 8 hex digits) followed
/// by "..".
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Formats a raw token amount with decimal places for display.
///
/// `amount` is the integer amount as a decimal string (as stored on-chain).
/// Trailing zeros of the fractional part are dropped, so `1500000` with 6
/// decimals renders as `1.5`.
pub fn format_token_amount(amount: &str, decimals: u8) -> String {
	if decimals == 0 {
		return amount.to_string();
	}

	let places = decimals as usize;
	let (integer_part, fractional_part) = if amount.len() <= places {
		("0".to_string(), format!("{:0>width$}", amount, width = places))
	} else {
		let split = amount.len() - places;
		(amount[..split].to_string(), amount[split..].to_string())
	};

	let fractional_part = fractional_part.trim_end_matches('0');
	if fractional_part.is_empty() {
		integer_part
	} else {
		format!("{}.{}", integer_part, fractional_part)
	}
}
