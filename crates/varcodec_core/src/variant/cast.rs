use crate::variant::bytes::Cursor;
use crate::variant::convert::{from_variant_bool, to_variant_bool};
use crate::variant::{ComRef, Currency, Decimal, PointerWidth, Result, TaggedVariant, VarTag, VarType, VariantError};

/// Exact-tag accessors and small constructors over the raw buffer.
///
/// Accessors only accept the by-value tag they name and fail with
/// [`VariantError::InvalidCast`] otherwise. Nothing is followed through
/// memory and no conversion between types is attempted.
impl TaggedVariant {
	/// `VT_BOOL` holding `VARIANT_TRUE`.
	pub fn variant_true(width: PointerWidth) -> Self {
		Self::from_bool(width, true)
	}

	/// `VT_BOOL` holding `VARIANT_FALSE`.
	pub fn variant_false(width: PointerWidth) -> Self {
		Self::from_bool(width, false)
	}

	/// `VT_BOOL` for `value`.
	pub fn from_bool(width: PointerWidth, value: bool) -> Self {
		let mut variant = Self::new(width);
		variant.set_tag(VarType::Bool);
		variant.set_payload_u64(u64::from(to_variant_bool(value) as u16));
		variant
	}

	/// `VT_EMPTY` with a zero payload.
	///
	/// A `VT_EMPTY` tag over leftover payload bits is not empty.
	pub fn is_empty(&self) -> bool {
		self.tag() == VarTag::from(VarType::Empty) && self.payload_u64() == 0
	}

	/// `VT_BOOL` as `bool`; any nonzero word is true.
	pub fn as_bool(&self) -> Result<bool> {
		self.expect(&[VarType::Bool])?;
		Ok(from_variant_bool(self.cursor().read_u16_le()? as i16))
	}

	/// `VT_I2`.
	pub fn as_i16(&self) -> Result<i16> {
		self.expect(&[VarType::I2])?;
		Ok(self.cursor().read_u16_le()? as i16)
	}

	/// `VT_I4` or `VT_INT`.
	pub fn as_i32(&self) -> Result<i32> {
		self.expect(&[VarType::I4, VarType::Int])?;
		self.cursor().read_i32_le()
	}

	/// `VT_UI4` or `VT_UINT`.
	pub fn as_u32(&self) -> Result<u32> {
		self.expect(&[VarType::Ui4, VarType::Uint])?;
		self.cursor().read_u32_le()
	}

	/// `VT_R8`.
	pub fn as_f64(&self) -> Result<f64> {
		self.expect(&[VarType::R8])?;
		Ok(f64::from_bits(self.payload_u64()))
	}

	/// `VT_CY`.
	pub fn as_currency(&self) -> Result<Currency> {
		self.expect(&[VarType::Cy])?;
		Ok(Currency::from_raw(self.payload_u64() as i64))
	}

	/// `VT_DECIMAL`, or `VT_CY` widened exactly.
	pub fn as_decimal(&self) -> Result<Decimal> {
		if self.tag() == VarTag::from(VarType::Cy) {
			return Ok(self.as_currency()?.to_decimal());
		}
		self.expect(&[VarType::Decimal])?;
		self.decimal()
	}

	/// `VT_BSTR` text pointer, which may be null.
	pub fn as_bstr_ptr(&self) -> Result<u64> {
		self.expect(&[VarType::Bstr])?;
		Ok(self.ptr())
	}

	/// `VT_UNKNOWN` interface pointer, observed without add-ref.
	pub fn as_unknown(&self) -> Result<Option<ComRef>> {
		self.expect(&[VarType::Unknown])?;
		Ok(match self.ptr() {
			0 => None,
			ptr => Some(ComRef::new(ptr)),
		})
	}

	fn expect(&self, accepted: &[VarType]) -> Result<()> {
		let tag = self.tag();
		if accepted.iter().any(|ty| tag == VarTag::from(*ty)) {
			Ok(())
		} else {
			Err(VariantError::InvalidCast { tag })
		}
	}

	fn cursor(&self) -> Cursor<'_> {
		Cursor::new(self.payload())
	}
}
