use std::collections::BTreeMap;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::variant::bytes::Cursor;
use crate::variant::convert::{filetime_to_datetime, from_variant_bool, guid_from_native, oa_date_to_datetime, utf16le_lossy};
use crate::variant::safearray::{ArrayFeatures, SafeArrayView, element_count, row_major_slots};
use crate::variant::{
	AddressSpace, Base, ComRef, Currency, Decimal, RecordTable, RecordTypeProvider, Result, TaggedVariant, Value, VarTag, VarType, VariantArray, VariantError,
	element_size,
};

/// Element types a `VT_VECTOR` may carry.
const VECTOR_ELEMENT_TYPES: &[VarType] = &[
	VarType::I1,
	VarType::Ui1,
	VarType::I2,
	VarType::Ui2,
	VarType::I4,
	VarType::Int,
	VarType::Ui4,
	VarType::Uint,
	VarType::Error,
	VarType::I8,
	VarType::Ui8,
	VarType::R4,
	VarType::R8,
	VarType::Bool,
	VarType::Cy,
	VarType::Date,
	VarType::FileTime,
	VarType::Clsid,
	VarType::Bstr,
	VarType::Lpwstr,
	VarType::Lpstr,
	VarType::Variant,
];

/// Element types a `VT_ARRAY` may carry, records aside.
const ARRAY_ELEMENT_TYPES: &[VarType] = &[
	VarType::I1,
	VarType::Ui1,
	VarType::I2,
	VarType::Ui2,
	VarType::I4,
	VarType::Int,
	VarType::Ui4,
	VarType::Uint,
	VarType::Error,
	VarType::I8,
	VarType::Ui8,
	VarType::R4,
	VarType::R8,
	VarType::Bool,
	VarType::Decimal,
	VarType::Cy,
	VarType::Date,
	VarType::Bstr,
	VarType::Unknown,
	VarType::Dispatch,
	VarType::Variant,
];

/// Conversion contract followed by a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
	/// Full conversion: HRESULTs as integers, C strings, vectors, file times, GUIDs and mapped records.
	#[default]
	Extended,
	/// Legacy-compatible conversion that rejects what the system converter rejects.
	Strict,
}

impl DecodeMode {
	/// Render mode as a stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Extended => "extended",
			Self::Strict => "strict",
		}
	}
}

/// Runtime limits and behavior switches for variant decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
	/// Conversion contract.
	pub mode: DecodeMode,
	/// Maximum nesting of variants inside variants.
	pub max_depth: u32,
	/// Maximum element count of one array or vector.
	pub max_array_elems: usize,
	/// Record identities that decode as a primitive value type.
	pub record_primitives: BTreeMap<Uuid, VarType>,
}

impl Default for DecodeOptions {
	fn default() -> Self {
		Self {
			mode: DecodeMode::Extended,
			max_depth: 16,
			max_array_elems: 16 * 1024 * 1024,
			record_primitives: BTreeMap::new(),
		}
	}
}

impl DecodeOptions {
	/// Preset for the legacy-compatible conversion.
	pub fn strict() -> Self {
		Self {
			mode: DecodeMode::Strict,
			..Self::default()
		}
	}

	/// Map a record identity onto a primitive value type.
	pub fn with_record_primitive(mut self, guid: Uuid, ty: VarType) -> Self {
		self.record_primitives.insert(guid, ty);
		self
	}
}

/// Decode with the extended conversion and default limits.
pub fn decode_extended(variant: &TaggedVariant, memory: &AddressSpace, records: &RecordTable) -> Result<Value> {
	decode_with(variant, memory, records, &DecodeOptions::default())
}

/// Decode with the legacy-compatible conversion and default limits.
pub fn decode_strict(variant: &TaggedVariant, memory: &AddressSpace, records: &RecordTable) -> Result<Value> {
	decode_with(variant, memory, records, &DecodeOptions::strict())
}

/// Decode `variant`, following pointers through `memory`.
///
/// Nothing is released or reference counted: strings are copied out and
/// interfaces are observed through [`ComRef`]. On error no partial value is
/// returned.
///
/// A null pointer behind a string, interface, `CLSID`, record, or array tag
/// decodes to [`Value::Absent`]; [`Value::Empty`] is reserved for the empty tag.
pub fn decode_with(variant: &TaggedVariant, memory: &AddressSpace, records: &RecordTable, opt: &DecodeOptions) -> Result<Value> {
	if variant.width() != memory.width() {
		return Err(VariantError::BadVariantSize {
			expected: memory.width().variant_size(),
			got: variant.as_bytes().len(),
		});
	}

	debug!(tag = %variant.tag(), mode = opt.mode.as_str(), "decode variant");
	let decoder = Decoder { memory, records, opt };
	decoder.variant(variant, 0)
}

struct Decoder<'a> {
	memory: &'a AddressSpace,
	records: &'a RecordTable,
	opt: &'a DecodeOptions,
}

impl<'a> Decoder<'a> {
	fn variant(&self, variant: &TaggedVariant, depth: u32) -> Result<Value> {
		if depth > self.opt.max_depth {
			return Err(VariantError::DepthExceeded { max: self.opt.max_depth });
		}

		let tag = variant.tag();
		// The DECIMAL overlay reuses the tag word, so only the bare tag reaches here.
		if tag == VarTag::from(VarType::Decimal) {
			return Ok(Value::Decimal(variant.decimal()?));
		}
		if let Base::Reserved(_) = tag.base() {
			return Err(VariantError::InvalidVariantType { tag });
		}
		if tag.is_array() && tag.is_vector() {
			return Err(VariantError::UnsupportedType { tag });
		}
		if tag.is_byref() && variant.ptr() == 0 && !matches!(tag.known(), Some(VarType::Empty | VarType::Null)) {
			return Err(VariantError::MissingData { tag });
		}

		if tag.is_vector() {
			return self.vector(variant, tag, depth);
		}
		if tag.is_array() {
			let descriptor = if tag.is_byref() { self.memory.read_ptr(variant.ptr())? } else { variant.ptr() };
			return self.array(tag, descriptor, depth);
		}

		let Base::Known(ty) = tag.base() else {
			return Err(VariantError::UnsupportedType { tag });
		};
		if tag.is_byref() {
			self.byref(tag, ty, variant.ptr(), depth)
		} else {
			trace!(%tag, "scalar");
			self.scalar(tag, ty, variant.payload())
		}
	}

	fn byref(&self, tag: VarTag, ty: VarType, ptr: u64, depth: u32) -> Result<Value> {
		trace!(%tag, ptr, "by reference");
		self.reject_in_strict(tag, ty)?;
		let width = self.memory.width();
		match ty {
			VarType::Empty if ptr == 0 => Ok(Value::Empty),
			VarType::Empty => Ok(Value::Address(ptr)),
			VarType::Null => Ok(Value::Null),
			VarType::Void => Ok(Value::Empty),
			VarType::Variant => self.nested(ptr, depth),
			VarType::Record => self.record(tag, self.memory.read(ptr, 2 * width.bytes())?),
			VarType::Clsid | VarType::FileTime => Err(VariantError::UnsupportedType { tag }),
			_ if has_scalar_form(ty) => {
				let size = element_size(ty, width).ok_or(VariantError::UnsupportedType { tag })?;
				self.scalar(tag, ty, self.memory.read(ptr, size)?)
			}
			_ => Err(VariantError::UnsupportedType { tag }),
		}
	}

	fn nested(&self, ptr: u64, depth: u32) -> Result<Value> {
		let nested = TaggedVariant::read_from(self.memory, ptr)?;
		let inner = nested.tag();
		if inner.is_byref() || inner.known() == Some(VarType::Empty) {
			return Err(VariantError::InvalidNestedVariant { tag: inner });
		}
		self.variant(&nested, depth + 1)
	}

	fn scalar(&self, tag: VarTag, ty: VarType, raw: &[u8]) -> Result<Value> {
		self.reject_in_strict(tag, ty)?;
		let width = self.memory.width();
		let mut cursor = Cursor::new(raw);
		let value = match ty {
			VarType::Empty | VarType::Void => Value::Empty,
			VarType::Null => Value::Null,
			VarType::I1 => Value::I8(cursor.read_u8()? as i8),
			VarType::Ui1 => Value::U8(cursor.read_u8()?),
			VarType::I2 => Value::I16(cursor.read_u16_le()? as i16),
			VarType::Ui2 => Value::U16(cursor.read_u16_le()?),
			VarType::I4 | VarType::Int | VarType::Error | VarType::Hresult => Value::I32(cursor.read_i32_le()?),
			VarType::Ui4 | VarType::Uint => Value::U32(cursor.read_u32_le()?),
			VarType::I8 => Value::I64(cursor.read_i64_le()?),
			VarType::Ui8 => Value::U64(cursor.read_u64_le()?),
			VarType::R4 => Value::F32(f32::from_bits(cursor.read_u32_le()?)),
			VarType::R8 => Value::F64(f64::from_bits(cursor.read_u64_le()?)),
			VarType::Cy => Value::Currency(Currency::from_raw(cursor.read_i64_le()?)),
			VarType::Date => Value::DateTime(oa_date_to_datetime(f64::from_bits(cursor.read_u64_le()?))?),
			VarType::FileTime => Value::DateTime(filetime_to_datetime(cursor.read_u64_le()?)?),
			VarType::Bool => Value::Bool(from_variant_bool(cursor.read_u16_le()? as i16)),
			VarType::Decimal => Value::Decimal(Decimal::from_native(&cursor.read_array::<16>()?)?),
			VarType::Bstr => self.bstr(cursor.read_ptr(width)?)?,
			VarType::Lpwstr => self.wide_string(cursor.read_ptr(width)?)?,
			VarType::Lpstr => self.narrow_string(cursor.read_ptr(width)?)?,
			VarType::Unknown => interface(cursor.read_ptr(width)?, Value::Unknown),
			VarType::Dispatch => interface(cursor.read_ptr(width)?, Value::Dispatch),
			VarType::Clsid => match cursor.read_ptr(width)? {
				0 => Value::Absent,
				ptr => Value::Guid(guid_from_native(&self.memory.read_array::<16>(ptr)?)),
			},
			VarType::Record => return self.record(tag, raw),
			_ => return Err(VariantError::UnsupportedType { tag }),
		};
		Ok(value)
	}

	/// Decode one vector or array element stored inline in `raw`.
	fn element(&self, tag: VarTag, ty: VarType, raw: &[u8], depth: u32) -> Result<Value> {
		match ty {
			VarType::Error => Ok(Value::U32(Cursor::new(raw).read_u32_le()?)),
			VarType::Clsid => Ok(Value::Guid(guid_from_native(&Cursor::new(raw).read_array::<16>()?))),
			VarType::Variant => self.variant(&TaggedVariant::from_bytes(self.memory.width(), raw)?, depth + 1),
			_ => self.scalar(tag, ty, raw),
		}
	}

	fn vector(&self, variant: &TaggedVariant, tag: VarTag, depth: u32) -> Result<Value> {
		if self.opt.mode == DecodeMode::Strict {
			return Err(VariantError::InvalidVariantType { tag });
		}
		let ty = match tag.known() {
			Some(ty) if VECTOR_ELEMENT_TYPES.contains(&ty) => ty,
			_ => return Err(VariantError::UnsupportedType { tag }),
		};

		let (count, elems) = variant.vector();
		trace!(%tag, count, elems, "vector");
		if count == 0 || elems == 0 {
			return Ok(Value::Vector(Vec::new()));
		}
		let count = count as usize;
		if count > self.opt.max_array_elems {
			return Err(VariantError::ArrayTooLarge {
				count: count as u64,
				max: self.opt.max_array_elems,
			});
		}

		let size = element_size(ty, self.memory.width()).ok_or(VariantError::UnsupportedType { tag })?;
		let len = count.checked_mul(size).ok_or(VariantError::ArrayTooLarge {
			count: count as u64,
			max: self.opt.max_array_elems,
		})?;
		let raw = self.memory.read(elems, len)?;
		let values = raw.chunks_exact(size).map(|element| self.element(tag, ty, element, depth)).collect::<Result<Vec<_>>>()?;
		Ok(Value::Vector(values))
	}

	fn array(&self, tag: VarTag, descriptor: u64, depth: u32) -> Result<Value> {
		trace!(%tag, descriptor, "array");
		if descriptor == 0 {
			return Ok(Value::Absent);
		}
		let ty = match tag.base() {
			Base::Known(VarType::Empty) => return Err(VariantError::InvalidVariantType { tag }),
			Base::Known(VarType::Record) => return self.record_array(tag, descriptor),
			Base::Known(ty) if ARRAY_ELEMENT_TYPES.contains(&ty) => ty,
			_ => return Err(VariantError::UnsupportedType { tag }),
		};

		let view = SafeArrayView::read(self.memory, descriptor)?;
		let size = element_size(ty, self.memory.width()).ok_or(VariantError::UnsupportedType { tag })?;
		match view.element_type() {
			None | Some(VarTag::EMPTY) => {
				if view.element_size() as usize != size {
					return Err(VariantError::ArrayElementSizeMismatch {
						declared: tag,
						expected: size as u32,
						actual: view.element_size(),
					});
				}
			}
			Some(actual) if !array_types_agree(ty, actual) => {
				return Err(VariantError::ArrayTypeMismatch { declared: tag, actual });
			}
			Some(_) => {}
		}

		let bounds = view.bounds(self.memory)?;
		let count = element_count(&bounds);
		if count > self.opt.max_array_elems as u64 {
			return Err(VariantError::ArrayTooLarge {
				count,
				max: self.opt.max_array_elems,
			});
		}

		let count = count as usize;
		let len = count.checked_mul(size).ok_or(VariantError::ArrayTooLarge {
			count: count as u64,
			max: self.opt.max_array_elems,
		})?;
		let raw = if count == 0 { &[][..] } else { self.memory.read(view.data(), len)? };
		let elements = row_major_slots(&bounds)?
			.into_iter()
			.map(|slot| self.element(tag, ty, &raw[slot * size..(slot + 1) * size], depth))
			.collect::<Result<Vec<_>>>()?;
		trace!(%tag, rank = bounds.len(), count, "array decoded");
		Ok(Value::Array(VariantArray::new(ty, bounds, elements)))
	}

	fn record(&self, tag: VarTag, raw: &[u8]) -> Result<Value> {
		if self.opt.mode == DecodeMode::Strict {
			return Err(VariantError::UnsupportedType { tag });
		}

		let width = self.memory.width();
		let mut cursor = Cursor::new(raw);
		let data = cursor.read_ptr(width)?;
		let record_info = cursor.read_ptr(width)?;
		if record_info == 0 {
			return Err(VariantError::RecordInfoMissing);
		}
		if data == 0 {
			return Ok(Value::Absent);
		}

		let (provider, guid, primitive) = self.record_primitive(tag, record_info)?;
		let size = provider.size().map_err(|status| VariantError::from_record_status(status, tag))?;
		let expected = element_size(primitive, width).ok_or(VariantError::RecordNotMappable { guid })?;
		if size as usize != expected {
			return Err(VariantError::RecordSizeMismatch {
				guid,
				size,
				expected: expected as u32,
			});
		}

		trace!(%guid, %primitive, data, "record as primitive");
		self.scalar(primitive.into(), primitive, self.memory.read(data, expected)?)
	}

	fn record_array(&self, tag: VarTag, descriptor: u64) -> Result<Value> {
		let view = SafeArrayView::read(self.memory, descriptor)?;
		if !view.features().contains(ArrayFeatures::RECORD) {
			return Err(VariantError::UnsupportedType { tag });
		}
		if view.record_info() == 0 {
			return Err(VariantError::RecordInfoMissing);
		}

		let (_, guid, _) = self.record_primitive(tag, view.record_info())?;
		debug!(%guid, descriptor, "record array passed validation");
		Err(VariantError::RecordArrayUnsupported)
	}

	fn record_primitive(&self, tag: VarTag, record_info: u64) -> Result<(&'a dyn RecordTypeProvider, Uuid, VarType)> {
		let provider = self.records.get(record_info).ok_or(VariantError::RecordProviderMissing { ptr: record_info })?;
		let guid = provider.guid().map_err(|status| VariantError::from_record_status(status, tag))?;
		let primitive = self.opt.record_primitives.get(&guid).copied().ok_or(VariantError::RecordNotMappable { guid })?;
		Ok((provider, guid, primitive))
	}

	fn bstr(&self, ptr: u64) -> Result<Value> {
		if ptr == 0 {
			return Ok(Value::Absent);
		}
		// Byte length sits just before the text; embedded nulls are kept.
		let len_at = ptr.checked_sub(4).ok_or(VariantError::UnmappedPointer { ptr })?;
		let len = self.memory.read_u32(len_at)? as usize;
		Ok(Value::String(utf16le_lossy(self.memory.read(ptr, len)?)))
	}

	fn wide_string(&self, ptr: u64) -> Result<Value> {
		if ptr == 0 {
			return Ok(Value::Absent);
		}
		Ok(Value::String(String::from_utf16_lossy(&self.memory.read_wstr(ptr)?)))
	}

	fn narrow_string(&self, ptr: u64) -> Result<Value> {
		if ptr == 0 {
			return Ok(Value::Absent);
		}
		Ok(Value::String(String::from_utf8_lossy(self.memory.read_cstr(ptr)?).into_owned()))
	}

	fn reject_in_strict(&self, tag: VarTag, ty: VarType) -> Result<()> {
		let legacy_unsupported = matches!(ty, VarType::Hresult | VarType::Lpstr | VarType::Lpwstr | VarType::FileTime | VarType::Clsid);
		if self.opt.mode == DecodeMode::Strict && legacy_unsupported {
			return Err(VariantError::UnsupportedType { tag });
		}
		Ok(())
	}
}

fn interface(ptr: u64, wrap: fn(ComRef) -> Value) -> Value {
	if ptr == 0 { Value::Absent } else { wrap(ComRef::new(ptr)) }
}

fn has_scalar_form(ty: VarType) -> bool {
	matches!(
		ty,
		VarType::I1
			| VarType::Ui1
			| VarType::I2
			| VarType::Ui2
			| VarType::I4
			| VarType::Int
			| VarType::Error
			| VarType::Hresult
			| VarType::Ui4
			| VarType::Uint
			| VarType::I8
			| VarType::Ui8
			| VarType::R4
			| VarType::R8
			| VarType::Cy
			| VarType::Date
			| VarType::Bool
			| VarType::Decimal
			| VarType::Bstr
			| VarType::Lpwstr
			| VarType::Lpstr
			| VarType::Unknown
			| VarType::Dispatch
	)
}

/// Return whether a descriptor holding `actual` may be read as `outer` elements.
fn array_types_agree(outer: VarType, actual: VarTag) -> bool {
	let Some(actual) = VarType::from_code(actual.raw()) else {
		return false;
	};
	outer == actual
		|| matches!(
			(outer, actual),
			(VarType::Int, VarType::I4) | (VarType::I4, VarType::Int) | (VarType::Uint, VarType::Ui4) | (VarType::Ui4, VarType::Uint) | (VarType::Unknown, VarType::Dispatch)
		)
}
