use std::fmt;

use crate::variant::{Result, VariantError};

/// Sign bit of the native `DECIMAL.sign` byte.
pub const DECIMAL_NEG: u8 = 0x80;
/// Largest scale a `DECIMAL` may carry.
pub const MAX_DECIMAL_SCALE: u8 = 28;

/// Exact 8-byte fixed-point currency value scaled by 10,000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Currency(i64);

impl Currency {
	/// Fixed-point scale factor.
	pub const SCALE: i64 = 10_000;

	/// Wrap a raw scaled value.
	pub fn from_raw(raw: i64) -> Self {
		Self(raw)
	}

	/// Return the raw scaled value.
	pub fn raw(self) -> i64 {
		self.0
	}

	/// Lossy conversion to `f64`.
	pub fn to_f64(self) -> f64 {
		self.0 as f64 / Self::SCALE as f64
	}

	/// Convert to a four-digit-scale decimal without rounding.
	pub fn to_decimal(self) -> Decimal {
		let magnitude = self.0.unsigned_abs();
		Decimal {
			negative: self.0 < 0,
			scale: 4,
			hi: 0,
			lo: magnitude,
		}
	}
}

impl fmt::Display for Currency {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let magnitude = self.0.unsigned_abs();
		let whole = magnitude / Self::SCALE as u64;
		let frac = magnitude % Self::SCALE as u64;
		if self.0 < 0 {
			f.write_str("-")?;
		}
		if frac == 0 {
			return write!(f, "{whole}");
		}
		let digits = format!("{frac:04}");
		write!(f, "{whole}.{}", digits.trim_end_matches('0'))
	}
}

/// 96-bit packed decimal with sign and power-of-ten scale.
///
/// Equality compares sign, scale and mantissa exactly, so `1.0` and `1.00`
/// are different values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
	negative: bool,
	scale: u8,
	hi: u32,
	lo: u64,
}

impl Decimal {
	/// Build a decimal from its native fields.
	pub fn from_parts(negative: bool, scale: u8, hi: u32, lo: u64) -> Result<Self> {
		if scale > MAX_DECIMAL_SCALE {
			return Err(VariantError::InvalidDecimal { scale });
		}
		Ok(Self { negative, scale, hi, lo })
	}

	/// Decode the 16-byte native layout (`wReserved`, `scale`, `sign`, `Hi32`, `Lo64`).
	pub fn from_native(bytes: &[u8; 16]) -> Result<Self> {
		let scale = bytes[2];
		let sign = bytes[3];
		let hi = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
		let mut lo = [0_u8; 8];
		lo.copy_from_slice(&bytes[8..16]);
		Self::from_parts(sign & DECIMAL_NEG != 0, scale, hi, u64::from_le_bytes(lo))
	}

	/// Encode the native layout, keeping `reserved` in the first two bytes.
	pub fn to_native(self, reserved: u16) -> [u8; 16] {
		let mut out = [0_u8; 16];
		out[0..2].copy_from_slice(&reserved.to_le_bytes());
		out[2] = self.scale;
		out[3] = if self.negative { DECIMAL_NEG } else { 0 };
		out[4..8].copy_from_slice(&self.hi.to_le_bytes());
		out[8..16].copy_from_slice(&self.lo.to_le_bytes());
		out
	}

	/// Return whether the sign bit is set.
	pub fn is_negative(self) -> bool {
		self.negative
	}

	/// Return the power-of-ten scale.
	pub fn scale(self) -> u8 {
		self.scale
	}

	/// Return the high 32 mantissa bits.
	pub fn hi32(self) -> u32 {
		self.hi
	}

	/// Return the low 64 mantissa bits.
	pub fn lo64(self) -> u64 {
		self.lo
	}

	/// Return the full 96-bit mantissa.
	pub fn mantissa(self) -> u128 {
		(u128::from(self.hi) << 64) | u128::from(self.lo)
	}
}

impl fmt::Display for Decimal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let scale = usize::from(self.scale);
		let mut digits = self.mantissa().to_string();
		if digits.len() <= scale {
			digits = format!("{}{digits}", "0".repeat(scale + 1 - digits.len()));
		}
		if self.negative && self.mantissa() != 0 {
			f.write_str("-")?;
		}
		if scale == 0 {
			return f.write_str(&digits);
		}
		let (whole, frac) = digits.split_at(digits.len() - scale);
		write!(f, "{whole}.{frac}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn currency_renders_exact_fixed_point() {
		assert_eq!(Currency::from_raw(123_456).to_string(), "12.3456");
		assert_eq!(Currency::from_raw(-15_000).to_string(), "-1.5");
		assert_eq!(Currency::from_raw(20_000).to_string(), "2");
		assert_eq!(Currency::from_raw(1).to_string(), "0.0001");
		assert_eq!(Currency::from_raw(i64::MIN).to_string(), "-922337203685477.5808");
		assert_eq!(Currency::from_raw(123_456).to_decimal().to_string(), "12.3456");
	}

	#[test]
	fn decimal_native_layout_round_trips() {
		let value = Decimal::from_parts(true, 3, 0x1, 0x2).expect("valid");
		let native = value.to_native(0x000e);
		assert_eq!(&native[0..4], &[0x0e, 0x00, 3, DECIMAL_NEG]);
		assert_eq!(Decimal::from_native(&native).expect("decodes"), value);
		assert_eq!(value.mantissa(), (1_u128 << 64) | 2);
	}

	#[test]
	fn decimal_display_keeps_scale() {
		assert_eq!(Decimal::from_parts(false, 2, 0, 150).expect("valid").to_string(), "1.50");
		assert_eq!(Decimal::from_parts(true, 4, 0, 5).expect("valid").to_string(), "-0.0005");
		assert_eq!(Decimal::from_parts(false, 0, 0, 42).expect("valid").to_string(), "42");
	}

	#[test]
	fn decimal_rejects_large_scale() {
		let err = Decimal::from_parts(false, 29, 0, 1).expect_err("scale too large");
		assert!(matches!(err, VariantError::InvalidDecimal { scale: 29 }));
	}
}
