use uuid::Uuid;

use crate::variant::convert::{datetime_to_oa_date, filetime_to_datetime, guid_to_native, to_utf16le, to_variant_bool};
use crate::variant::{AddressSpace, PointerWidth, Result, TaggedVariant, Value, VarFlags, VarType, VariantError};

/// Build a by-value variant for a scalar value.
///
/// `I32` is tagged `VT_I4` and `U32` `VT_UI4`; date-times become `VT_DATE`.
/// Strings, references, vectors and arrays need allocated storage and are
/// rejected here.
pub fn encode_scalar(width: PointerWidth, value: &Value) -> Result<TaggedVariant> {
	let mut variant = TaggedVariant::new(width);
	let (ty, raw): (VarType, [u8; 8]) = match value {
		Value::Empty => (VarType::Empty, [0; 8]),
		Value::Null => (VarType::Null, [0; 8]),
		Value::Bool(value) => (VarType::Bool, widen(&to_variant_bool(*value).to_le_bytes())),
		Value::I8(value) => (VarType::I1, widen(&value.to_le_bytes())),
		Value::U8(value) => (VarType::Ui1, widen(&value.to_le_bytes())),
		Value::I16(value) => (VarType::I2, widen(&value.to_le_bytes())),
		Value::U16(value) => (VarType::Ui2, widen(&value.to_le_bytes())),
		Value::I32(value) => (VarType::I4, widen(&value.to_le_bytes())),
		Value::U32(value) => (VarType::Ui4, widen(&value.to_le_bytes())),
		Value::I64(value) => (VarType::I8, value.to_le_bytes()),
		Value::U64(value) => (VarType::Ui8, value.to_le_bytes()),
		Value::F32(value) => (VarType::R4, widen(&value.to_le_bytes())),
		Value::F64(value) => (VarType::R8, value.to_le_bytes()),
		Value::Currency(value) => (VarType::Cy, value.raw().to_le_bytes()),
		Value::DateTime(value) => (VarType::Date, datetime_to_oa_date(*value)?.to_le_bytes()),
		Value::Decimal(value) => {
			variant.set_decimal(*value);
			return Ok(variant);
		}
		other => return Err(VariantError::NotEncodable { kind: other.kind() }),
	};

	variant.set_tag(ty);
	variant.set_payload_u64(u64::from_le_bytes(raw));
	Ok(variant)
}

/// Build a `VT_CLSID` variant pointing at a freshly allocated GUID.
pub fn init_clsid(memory: &mut AddressSpace, guid: Uuid) -> Result<TaggedVariant> {
	let ptr = memory.alloc_bytes(guid_to_native(guid).to_vec())?;
	let mut variant = TaggedVariant::new(memory.width());
	variant.set_tag(VarType::Clsid);
	variant.set_ptr(ptr)?;
	Ok(variant)
}

/// Build a `VT_FILETIME` variant holding `ticks` inline.
pub fn init_filetime(width: PointerWidth, ticks: u64) -> TaggedVariant {
	let mut variant = TaggedVariant::new(width);
	variant.set_tag(VarType::FileTime);
	variant.set_payload_u64(ticks);
	variant
}

/// Build a `VT_DATE` variant from `FILETIME` ticks.
pub fn init_date_from_filetime(width: PointerWidth, ticks: u64) -> Result<TaggedVariant> {
	let date = filetime_to_datetime(ticks)?;
	encode_scalar(width, &Value::DateTime(date))
}

/// Build a `VT_BSTR` variant over a freshly allocated length-prefixed string.
///
/// The allocation holds the byte length, the UTF-16 text, and a terminator; the
/// variant points just past the length.
pub fn init_bstr(memory: &mut AddressSpace, text: &str) -> Result<TaggedVariant> {
	let units = to_utf16le(text);
	let len = u32::try_from(units.len()).map_err(|_| VariantError::InvalidElementCount { count: units.len() })?;
	let mut block = Vec::with_capacity(units.len() + 6);
	block.extend_from_slice(&len.to_le_bytes());
	block.extend_from_slice(&units);
	block.extend_from_slice(&[0, 0]);

	let base = memory.alloc_bytes(block)?;
	let mut variant = TaggedVariant::new(memory.width());
	variant.set_tag(VarType::Bstr);
	variant.set_ptr(base + 4)?;
	Ok(variant)
}

/// Build a `VT_VECTOR | VT_UI1` variant.
pub fn init_buffer(memory: &mut AddressSpace, values: &[u8]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::Ui1, values.len(), values.to_vec())
}

/// Build a `VT_VECTOR | VT_I2` variant.
pub fn init_i16_vector(memory: &mut AddressSpace, values: &[i16]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::I2, values.len(), values.iter().flat_map(|value| value.to_le_bytes()).collect())
}

/// Build a `VT_VECTOR | VT_UI2` variant.
pub fn init_u16_vector(memory: &mut AddressSpace, values: &[u16]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::Ui2, values.len(), values.iter().flat_map(|value| value.to_le_bytes()).collect())
}

/// Build a `VT_VECTOR | VT_BOOL` variant.
pub fn init_bool_vector(memory: &mut AddressSpace, values: &[bool]) -> Result<TaggedVariant> {
	let raw = values.iter().flat_map(|value| to_variant_bool(*value).to_le_bytes()).collect();
	init_vector(memory, VarType::Bool, values.len(), raw)
}

/// Build a `VT_VECTOR | VT_I4` variant.
pub fn init_i32_vector(memory: &mut AddressSpace, values: &[i32]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::I4, values.len(), values.iter().flat_map(|value| value.to_le_bytes()).collect())
}

/// Build a `VT_VECTOR | VT_UI4` variant.
pub fn init_u32_vector(memory: &mut AddressSpace, values: &[u32]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::Ui4, values.len(), values.iter().flat_map(|value| value.to_le_bytes()).collect())
}

/// Build a `VT_VECTOR | VT_I8` variant.
pub fn init_i64_vector(memory: &mut AddressSpace, values: &[i64]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::I8, values.len(), values.iter().flat_map(|value| value.to_le_bytes()).collect())
}

/// Build a `VT_VECTOR | VT_UI8` variant.
pub fn init_u64_vector(memory: &mut AddressSpace, values: &[u64]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::Ui8, values.len(), values.iter().flat_map(|value| value.to_le_bytes()).collect())
}

/// Build a `VT_VECTOR | VT_R8` variant.
pub fn init_f64_vector(memory: &mut AddressSpace, values: &[f64]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::R8, values.len(), values.iter().flat_map(|value| value.to_le_bytes()).collect())
}

/// Build a `VT_VECTOR | VT_FILETIME` variant from tick counts.
pub fn init_filetime_vector(memory: &mut AddressSpace, ticks: &[u64]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::FileTime, ticks.len(), ticks.iter().flat_map(|value| value.to_le_bytes()).collect())
}

/// Build a `VT_VECTOR | VT_CLSID` variant with GUIDs stored inline.
pub fn init_clsid_vector(memory: &mut AddressSpace, guids: &[Uuid]) -> Result<TaggedVariant> {
	init_vector(memory, VarType::Clsid, guids.len(), guids.iter().flat_map(|guid| guid_to_native(*guid)).collect())
}

fn init_vector(memory: &mut AddressSpace, base: VarType, count: usize, raw: Vec<u8>) -> Result<TaggedVariant> {
	let count = u32::try_from(count).map_err(|_| VariantError::InvalidElementCount { count })?;
	let elems = if count == 0 { 0 } else { memory.alloc_bytes(raw)? };

	let mut variant = TaggedVariant::new(memory.width());
	variant.set_tag(base.with(VarFlags::VECTOR));
	variant.set_vector(count, elems)?;
	Ok(variant)
}

fn widen(raw: &[u8]) -> [u8; 8] {
	let mut out = [0_u8; 8];
	out[..raw.len()].copy_from_slice(raw);
	out
}
