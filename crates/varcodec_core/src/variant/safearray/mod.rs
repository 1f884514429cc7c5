use bitflags::bitflags;
use uuid::Uuid;

use crate::variant::bytes::{Cursor, ptr_bytes};
use crate::variant::clear::{ClearReport, Releaser};
use crate::variant::convert::guid_to_native;
use crate::variant::{AddressSpace, ArrayBound, ObjectRuntime, PointerWidth, Result, VarFlags, VarTag, VarType, VariantError, element_size};

/// Highest array rank the decoder materializes.
pub const MAX_ARRAY_RANK: usize = 32;

/// Bytes reserved in front of allocated descriptors for the vartype, IID, or record info.
const PREFIX_LEN: usize = 16;
const BOUND_LEN: usize = 8;

/// `IID_IUnknown`.
pub const IID_IUNKNOWN: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_c000_0000_0000_0046);
/// `IID_IDispatch`.
pub const IID_IDISPATCH: Uuid = Uuid::from_u128(0x0002_0400_0000_0000_c000_0000_0000_0046);

bitflags! {
	/// Descriptor `fFeatures` bits.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct ArrayFeatures: u16 {
		/// Allocated on the stack.
		const AUTO = 0x0001;
		/// Statically allocated.
		const STATIC = 0x0002;
		/// Embedded in a structure.
		const EMBEDDED = 0x0004;
		/// May not be resized.
		const FIXEDSIZE = 0x0010;
		/// Elements are records; record info sits before the descriptor.
		const RECORD = 0x0020;
		/// An IID sits before the descriptor.
		const HAVEIID = 0x0040;
		/// A vartype sits before the descriptor.
		const HAVEVARTYPE = 0x0080;
		/// Elements are `BSTR`s.
		const BSTR = 0x0100;
		/// Elements are `IUnknown` pointers.
		const UNKNOWN = 0x0200;
		/// Elements are `IDispatch` pointers.
		const DISPATCH = 0x0400;
		/// Elements are variants.
		const VARIANT = 0x0800;
	}
}

/// Read-only view of a native array descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeArrayView {
	ptr: u64,
	width: PointerWidth,
	dims: u16,
	features: ArrayFeatures,
	element_size: u32,
	locks: u32,
	data: u64,
	stored_vartype: Option<VarTag>,
	record_info: u64,
}

impl SafeArrayView {
	/// Read the descriptor header at `ptr`, plus the vartype or record info stored before it.
	///
	/// Bounds are read separately by [`SafeArrayView::bounds`] so rank limits can be
	/// enforced before touching them.
	pub fn read(memory: &AddressSpace, ptr: u64) -> Result<Self> {
		let width = memory.width();
		let header = memory.read(ptr, header_len(width))?;
		let mut cursor = Cursor::new(header);
		let dims = cursor.read_u16_le()?;
		let features = ArrayFeatures::from_bits_retain(cursor.read_u16_le()?);
		let element_size = cursor.read_u32_le()?;
		let locks = cursor.read_u32_le()?;
		if width == PointerWidth::P64 {
			cursor.skip(4)?;
		}
		let data = cursor.read_ptr(width)?;

		let stored_vartype = if features.contains(ArrayFeatures::HAVEVARTYPE) {
			Some(VarTag(memory.read_u32(ptr.wrapping_sub(4))? as u16))
		} else {
			None
		};
		let record_info = if features.contains(ArrayFeatures::RECORD) {
			memory.read_ptr(ptr.wrapping_sub(width.bytes() as u64))?
		} else {
			0
		};

		Ok(Self {
			ptr,
			width,
			dims,
			features,
			element_size,
			locks,
			data,
			stored_vartype,
			record_info,
		})
	}

	/// Descriptor address.
	pub fn ptr(&self) -> u64 {
		self.ptr
	}

	/// Declared rank (`cDims`).
	pub fn dims(&self) -> u16 {
		self.dims
	}

	/// Feature flags (`fFeatures`).
	pub fn features(&self) -> ArrayFeatures {
		self.features
	}

	/// Element size (`cbElements`).
	pub fn element_size(&self) -> u32 {
		self.element_size
	}

	/// Lock count (`cLocks`).
	pub fn locks(&self) -> u32 {
		self.locks
	}

	/// Data pointer (`pvData`).
	pub fn data(&self) -> u64 {
		self.data
	}

	/// Record-info pointer stored before the descriptor, or zero.
	pub fn record_info(&self) -> u64 {
		self.record_info
	}

	/// Element type recorded by the descriptor.
	///
	/// `None` means the descriptor records no type and callers must fall back
	/// to comparing `cbElements`.
	pub fn element_type(&self) -> Option<VarTag> {
		if self.features.contains(ArrayFeatures::RECORD) {
			return Some(VarType::Record.into());
		}
		if self.features.contains(ArrayFeatures::HAVEIID) {
			let ty = if self.features.contains(ArrayFeatures::DISPATCH) { VarType::Dispatch } else { VarType::Unknown };
			return Some(ty.into());
		}
		self.stored_vartype
	}

	/// Check the rank and read the bounds, leftmost dimension first.
	pub fn bounds(&self, memory: &AddressSpace) -> Result<Vec<ArrayBound>> {
		let rank = usize::from(self.dims);
		if rank == 0 {
			return Err(VariantError::ZeroRankArray);
		}
		if rank > MAX_ARRAY_RANK {
			return Err(VariantError::RankTooLarge {
				rank: self.dims,
				max: MAX_ARRAY_RANK,
			});
		}

		let raw = memory.read(self.ptr + header_len(self.width) as u64, rank * BOUND_LEN)?;
		let mut cursor = Cursor::new(raw);
		let mut stored = Vec::with_capacity(rank);
		for _ in 0..rank {
			let count = cursor.read_u32_le()?;
			let lower = cursor.read_i32_le()?;
			stored.push(ArrayBound::new(lower, count));
		}

		// Stored rightmost dimension first.
		stored.reverse();
		Ok(stored)
	}

	/// Raw element bytes in storage order.
	pub fn data_bytes<'m>(&self, memory: &'m AddressSpace, count: usize) -> Result<&'m [u8]> {
		if count == 0 {
			return Ok(&[]);
		}
		let len = count.checked_mul(self.element_size as usize).ok_or(VariantError::ArrayTooLarge {
			count: count as u64,
			max: usize::MAX,
		})?;
		memory.read(self.data, len)
	}
}

/// Total element count across all dimensions.
pub fn element_count(bounds: &[ArrayBound]) -> u64 {
	bounds.iter().fold(1_u64, |acc, bound| acc.saturating_mul(u64::from(bound.count)))
}

/// Storage positions of all elements, visited in row-major order.
///
/// Native storage is column-major (leftmost index fastest); decoded arrays are
/// row-major, so element `n` of the result lives at storage slot `out[n]`.
/// Any zero-length dimension yields no slots.
pub fn row_major_slots(bounds: &[ArrayBound]) -> Result<Vec<usize>> {
	if bounds.iter().any(|bound| bound.count == 0) {
		return Ok(Vec::new());
	}

	let counts: Vec<usize> = bounds.iter().map(|bound| bound.count as usize).collect();
	let strides = strides(bounds)?;
	let total = counts.iter().try_fold(1_usize, |acc, count| acc.checked_mul(*count)).ok_or_else(|| too_large(bounds))?;

	let mut out = Vec::with_capacity(total);
	for linear in 0..total {
		let mut rem = linear;
		let mut slot = 0;
		for (count, stride) in counts.iter().zip(&strides).rev() {
			slot += (rem % count) * stride;
			rem /= count;
		}
		out.push(slot);
	}
	Ok(out)
}

/// Storage slot of one element addressed by native indices.
pub fn storage_slot(bounds: &[ArrayBound], indices: &[i64]) -> Result<usize> {
	if indices.len() != bounds.len() {
		return Err(VariantError::IndexRankMismatch {
			expected: bounds.len(),
			got: indices.len(),
		});
	}

	let strides = strides(bounds)?;
	let mut slot = 0_usize;
	for (dim, ((bound, index), stride)) in bounds.iter().zip(indices).zip(&strides).enumerate() {
		let pos = bound.offset_of(*index).ok_or(VariantError::IndexOutOfBounds { dim, index: *index })?;
		slot = pos.checked_mul(*stride).and_then(|offset| slot.checked_add(offset)).ok_or_else(|| too_large(bounds))?;
	}
	Ok(slot)
}

/// Column-major strides, leftmost dimension first.
fn strides(bounds: &[ArrayBound]) -> Result<Vec<usize>> {
	let mut out = Vec::with_capacity(bounds.len());
	let mut stride = 1_usize;
	for (dim, bound) in bounds.iter().enumerate() {
		out.push(stride);
		if dim + 1 < bounds.len() {
			stride = stride.checked_mul(bound.count as usize).ok_or_else(|| too_large(bounds))?;
		}
	}
	Ok(out)
}

fn too_large(bounds: &[ArrayBound]) -> VariantError {
	VariantError::ArrayTooLarge {
		count: element_count(bounds),
		max: usize::MAX,
	}
}

/// Allocate a descriptor and zeroed data for elements of `vt`.
///
/// `bounds` are given leftmost dimension first.
pub fn create(memory: &mut AddressSpace, vt: VarType, bounds: &[ArrayBound]) -> Result<u64> {
	let unsupported = VariantError::UnsupportedType {
		tag: vt.with(VarFlags::ARRAY),
	};
	if matches!(vt, VarType::Empty | VarType::Null | VarType::Record) {
		return Err(unsupported);
	}
	let size = element_size(vt, memory.width()).ok_or(unsupported)?;

	let mut features = match vt {
		VarType::Bstr => ArrayFeatures::BSTR,
		VarType::Unknown => ArrayFeatures::UNKNOWN,
		VarType::Dispatch => ArrayFeatures::DISPATCH,
		VarType::Variant => ArrayFeatures::VARIANT,
		_ => ArrayFeatures::empty(),
	};
	let mut prefix = [0_u8; PREFIX_LEN];
	match vt {
		VarType::Unknown | VarType::Dispatch => {
			features |= ArrayFeatures::HAVEIID;
			let iid = if vt == VarType::Dispatch { IID_IDISPATCH } else { IID_IUNKNOWN };
			prefix.copy_from_slice(&guid_to_native(iid));
		}
		_ => {
			features |= ArrayFeatures::HAVEVARTYPE;
			prefix[PREFIX_LEN - 4..].copy_from_slice(&u32::from(vt.code()).to_le_bytes());
		}
	}

	allocate(memory, bounds, features, size, prefix)
}

/// Allocate a descriptor for record elements described by `record_info`.
pub fn create_record(memory: &mut AddressSpace, bounds: &[ArrayBound], record_info: u64, size: u32) -> Result<u64> {
	let width = memory.width();
	let mut prefix = [0_u8; PREFIX_LEN];
	let raw = ptr_bytes(width, record_info)?;
	prefix[PREFIX_LEN - raw.len()..].copy_from_slice(&raw);
	allocate(memory, bounds, ArrayFeatures::RECORD, size as usize, prefix)
}

/// Read the bounds of the descriptor at `ptr`, leftmost dimension first.
pub fn bounds(memory: &AddressSpace, ptr: u64) -> Result<Vec<ArrayBound>> {
	SafeArrayView::read(memory, ptr)?.bounds(memory)
}

/// Copy out the element at native `indices`.
pub fn get_element(memory: &AddressSpace, ptr: u64, indices: &[i64]) -> Result<Vec<u8>> {
	let (view, addr) = element_addr(memory, ptr, indices)?;
	Ok(memory.read(addr, view.element_size as usize)?.to_vec())
}

/// Overwrite the element at native `indices`.
pub fn put_element(memory: &mut AddressSpace, ptr: u64, indices: &[i64], bytes: &[u8]) -> Result<()> {
	let (view, addr) = element_addr(memory, ptr, indices)?;
	if bytes.len() != view.element_size as usize {
		return Err(VariantError::ElementSizeMismatch {
			expected: view.element_size as usize,
			got: bytes.len(),
		});
	}
	memory.write(addr, bytes)
}

/// Destroy the descriptor at `ptr` and release every element resource.
///
/// Strings are freed, interfaces released once, nested variants cleared, and
/// the record info released once for record arrays.
pub fn destroy(memory: &mut AddressSpace, ptr: u64, objects: &mut dyn ObjectRuntime) -> Result<ClearReport> {
	let mut releaser = Releaser::new(memory, objects);
	releaser.destroy_array(ptr)?;
	Ok(releaser.finish())
}

fn header_len(width: PointerWidth) -> usize {
	width.safearray_size() - BOUND_LEN
}

fn element_addr(memory: &AddressSpace, ptr: u64, indices: &[i64]) -> Result<(SafeArrayView, u64)> {
	let view = SafeArrayView::read(memory, ptr)?;
	let bounds = view.bounds(memory)?;
	let slot = storage_slot(&bounds, indices)?;
	let addr = (slot as u64)
		.checked_mul(u64::from(view.element_size))
		.and_then(|offset| view.data.checked_add(offset))
		.ok_or_else(|| too_large(&bounds))?;
	Ok((view, addr))
}

fn allocate(memory: &mut AddressSpace, bounds: &[ArrayBound], features: ArrayFeatures, size: usize, prefix: [u8; PREFIX_LEN]) -> Result<u64> {
	let rank = bounds.len();
	if rank == 0 {
		return Err(VariantError::ZeroRankArray);
	}
	if rank > MAX_ARRAY_RANK {
		return Err(VariantError::RankTooLarge {
			rank: rank as u16,
			max: MAX_ARRAY_RANK,
		});
	}

	let count = element_count(bounds);
	let data_len = count
		.checked_mul(size as u64)
		.filter(|len| *len <= u64::from(u32::MAX))
		.ok_or(VariantError::ArrayTooLarge {
			count,
			max: u32::MAX as usize / size.max(1),
		})?;
	let data = if data_len == 0 { 0 } else { memory.alloc(data_len as usize)? };

	let width = memory.width();
	let mut block = Vec::with_capacity(PREFIX_LEN + header_len(width) + rank * BOUND_LEN);
	block.extend_from_slice(&prefix);
	block.extend_from_slice(&(rank as u16).to_le_bytes());
	block.extend_from_slice(&features.bits().to_le_bytes());
	block.extend_from_slice(&(size as u32).to_le_bytes());
	block.extend_from_slice(&0_u32.to_le_bytes());
	if width == PointerWidth::P64 {
		block.extend_from_slice(&[0; 4]);
	}
	block.extend_from_slice(&ptr_bytes(width, data)?);
	for bound in bounds.iter().rev() {
		block.extend_from_slice(&bound.count.to_le_bytes());
		block.extend_from_slice(&bound.lower.to_le_bytes());
	}

	let base = memory.alloc_bytes(block)?;
	Ok(base + PREFIX_LEN as u64)
}

#[cfg(test)]
mod tests;
