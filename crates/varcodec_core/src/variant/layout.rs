use crate::variant::bytes::{Cursor, ptr_bytes};
use crate::variant::{AddressSpace, Decimal, PointerWidth, Result, VarTag, VarType, VariantError};

/// Offset of the 2-byte tag.
pub const TAG_OFFSET: usize = 0;
/// Offset of the payload union.
pub const PAYLOAD_OFFSET: usize = 8;

const MAX_VARIANT_SIZE: usize = 24;

/// Raw variant buffer with its field offsets.
///
/// This is the only type that knows where fields live inside the 16 or 24 byte
/// native layout. The `DECIMAL` member overlays the whole buffer, so its
/// `wReserved` word shares storage with the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedVariant {
	width: PointerWidth,
	bytes: [u8; MAX_VARIANT_SIZE],
}

impl TaggedVariant {
	/// Create a zeroed (`VT_EMPTY`) variant.
	pub fn new(width: PointerWidth) -> Self {
		Self {
			width,
			bytes: [0; MAX_VARIANT_SIZE],
		}
	}

	/// Copy a raw buffer whose length must equal the width's variant size.
	pub fn from_bytes(width: PointerWidth, bytes: &[u8]) -> Result<Self> {
		let expected = width.variant_size();
		if bytes.len() != expected {
			return Err(VariantError::BadVariantSize { expected, got: bytes.len() });
		}
		let mut out = Self::new(width);
		out.bytes[..expected].copy_from_slice(bytes);
		Ok(out)
	}

	/// Read a variant stored in modelled memory.
	pub fn read_from(memory: &AddressSpace, ptr: u64) -> Result<Self> {
		let width = memory.width();
		Self::from_bytes(width, memory.read(ptr, width.variant_size())?)
	}

	/// Store this variant into modelled memory.
	pub fn write_to(&self, memory: &mut AddressSpace, ptr: u64) -> Result<()> {
		memory.write(ptr, self.as_bytes())
	}

	/// Pointer width this buffer was laid out for.
	pub fn width(&self) -> PointerWidth {
		self.width
	}

	/// Raw bytes of the native layout.
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes[..self.width.variant_size()]
	}

	/// Read the tag.
	pub fn tag(&self) -> VarTag {
		VarTag(u16::from_le_bytes([self.bytes[TAG_OFFSET], self.bytes[TAG_OFFSET + 1]]))
	}

	/// Overwrite the tag, leaving the payload untouched.
	pub fn set_tag(&mut self, tag: impl Into<VarTag>) {
		self.bytes[TAG_OFFSET..TAG_OFFSET + 2].copy_from_slice(&tag.into().raw().to_le_bytes());
	}

	/// Payload bytes from offset 8 to the end of the buffer.
	pub fn payload(&self) -> &[u8] {
		&self.as_bytes()[PAYLOAD_OFFSET..]
	}

	/// Read the first 8 payload bytes as `u64`.
	pub fn payload_u64(&self) -> u64 {
		let mut raw = [0_u8; 8];
		raw.copy_from_slice(&self.bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + 8]);
		u64::from_le_bytes(raw)
	}

	/// Overwrite the first payload bytes.
	pub fn set_payload(&mut self, raw: &[u8]) -> Result<()> {
		let size = self.width.variant_size();
		let end = PAYLOAD_OFFSET + raw.len();
		if end > size {
			return Err(VariantError::BadVariantSize {
				expected: size - PAYLOAD_OFFSET,
				got: raw.len(),
			});
		}
		self.bytes[PAYLOAD_OFFSET..end].copy_from_slice(raw);
		Ok(())
	}

	/// Overwrite the first 8 payload bytes.
	pub fn set_payload_u64(&mut self, value: u64) {
		self.bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + 8].copy_from_slice(&value.to_le_bytes());
	}

	/// Read the pointer-sized payload field.
	pub fn ptr(&self) -> u64 {
		self.ptr_at(PAYLOAD_OFFSET)
	}

	/// Overwrite the pointer-sized payload field.
	pub fn set_ptr(&mut self, ptr: u64) -> Result<()> {
		self.set_ptr_at(PAYLOAD_OFFSET, ptr)
	}

	/// Read the record pair `(pvRecord, pRecInfo)`.
	pub fn record(&self) -> (u64, u64) {
		(self.ptr_at(PAYLOAD_OFFSET), self.ptr_at(PAYLOAD_OFFSET + self.width.bytes()))
	}

	/// Overwrite the record pair.
	pub fn set_record(&mut self, data: u64, record_info: u64) -> Result<()> {
		self.set_ptr_at(PAYLOAD_OFFSET, data)?;
		self.set_ptr_at(PAYLOAD_OFFSET + self.width.bytes(), record_info)
	}

	/// Read the counted vector pair `(cElems, pElems)`.
	pub fn vector(&self) -> (u32, u64) {
		let count = u32::from_le_bytes([
			self.bytes[PAYLOAD_OFFSET],
			self.bytes[PAYLOAD_OFFSET + 1],
			self.bytes[PAYLOAD_OFFSET + 2],
			self.bytes[PAYLOAD_OFFSET + 3],
		]);
		(count, self.ptr_at(PAYLOAD_OFFSET + self.width.bytes()))
	}

	/// Overwrite the counted vector pair.
	pub fn set_vector(&mut self, count: u32, elems: u64) -> Result<()> {
		self.bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + self.width.bytes()].fill(0);
		self.bytes[PAYLOAD_OFFSET..PAYLOAD_OFFSET + 4].copy_from_slice(&count.to_le_bytes());
		self.set_ptr_at(PAYLOAD_OFFSET + self.width.bytes(), elems)
	}

	/// Read the inline `FILETIME` (`dwLowDateTime`, `dwHighDateTime`) as one tick count.
	pub fn filetime(&self) -> u64 {
		self.payload_u64()
	}

	/// Read the `DECIMAL` overlay.
	pub fn decimal(&self) -> Result<Decimal> {
		let mut raw = [0_u8; 16];
		raw.copy_from_slice(&self.bytes[..16]);
		Decimal::from_native(&raw)
	}

	/// Write the `DECIMAL` overlay and re-stamp the tag as `VT_DECIMAL`.
	pub fn set_decimal(&mut self, value: Decimal) {
		let raw = value.to_native(0);
		self.bytes[..16].copy_from_slice(&raw);
		self.set_tag(VarType::Decimal);
	}

	/// Zero the whole buffer, leaving `VT_EMPTY`.
	pub fn zero(&mut self) {
		self.bytes = [0; MAX_VARIANT_SIZE];
	}

	fn ptr_at(&self, offset: usize) -> u64 {
		let mut cursor = Cursor::at(self.as_bytes(), offset);
		cursor.read_ptr(self.width).unwrap_or_default()
	}

	fn set_ptr_at(&mut self, offset: usize, ptr: u64) -> Result<()> {
		let raw = ptr_bytes(self.width, ptr)?;
		self.bytes[offset..offset + raw.len()].copy_from_slice(&raw);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::variant::{VarFlags, VarType};

	#[test]
	fn sizes_match_native_layout() {
		assert_eq!(TaggedVariant::new(PointerWidth::P32).as_bytes().len(), 16);
		assert_eq!(TaggedVariant::new(PointerWidth::P64).as_bytes().len(), 24);
		let err = TaggedVariant::from_bytes(PointerWidth::P64, &[0; 16]).expect_err("wrong size");
		assert!(matches!(err, VariantError::BadVariantSize { expected: 24, got: 16 }));
	}

	#[test]
	fn record_and_vector_pairs_follow_pointer_width() {
		let mut narrow = TaggedVariant::new(PointerWidth::P32);
		narrow.set_record(0x1111, 0x2222).expect("fits");
		assert_eq!(&narrow.as_bytes()[8..16], &[0x11, 0x11, 0, 0, 0x22, 0x22, 0, 0]);
		assert_eq!(narrow.record(), (0x1111, 0x2222));

		let mut wide = TaggedVariant::new(PointerWidth::P64);
		wide.set_vector(3, 0x4000).expect("fits");
		assert_eq!(wide.vector(), (3, 0x4000));
		assert_eq!(&wide.as_bytes()[16..18], &[0x00, 0x40]);
	}

	#[test]
	fn decimal_overlay_shares_tag_storage() {
		let mut variant = TaggedVariant::new(PointerWidth::P64);
		variant.set_tag(VarType::I4.with(VarFlags::BYREF));
		let value = Decimal::from_parts(true, 2, 7, 12345).expect("valid");
		variant.set_decimal(value);

		assert_eq!(variant.tag(), VarTag::from(VarType::Decimal));
		assert_eq!(variant.as_bytes()[2], 2);
		assert_eq!(variant.decimal().expect("decodes"), value);
	}

	#[test]
	fn read_and_write_through_memory() {
		let mut memory = AddressSpace::new(PointerWidth::P32);
		let ptr = memory.alloc(16).expect("alloc");
		let mut variant = TaggedVariant::new(PointerWidth::P32);
		variant.set_tag(VarType::I4);
		variant.set_payload(&(-10_i32).to_le_bytes()).expect("payload fits");
		variant.write_to(&mut memory, ptr).expect("write");

		let back = TaggedVariant::read_from(&memory, ptr).expect("read");
		assert_eq!(back, variant);
		assert!(variant.set_payload(&[0; 9]).is_err());
	}
}
