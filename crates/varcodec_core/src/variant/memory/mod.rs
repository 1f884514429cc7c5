use crate::variant::bytes::ptr_bytes;
use crate::variant::{Result, VariantError};

const ALLOC_ALIGN: u64 = 16;
const ALLOC_FLOOR: u64 = 0x1_0000;
const ALLOC_CEILING: u64 = 0x1_0000_0000;

/// Pointer width of the native layout being modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerWidth {
	/// 4-byte pointers (x86).
	P32,
	/// 8-byte pointers (x64).
	P64,
}

impl PointerWidth {
	/// Width of the host this crate was built for.
	pub fn host() -> Self {
		if cfg!(target_pointer_width = "64") { Self::P64 } else { Self::P32 }
	}

	/// Parse a pointer size in bytes.
	pub fn from_bytes(bytes: usize) -> Option<Self> {
		match bytes {
			4 => Some(Self::P32),
			8 => Some(Self::P64),
			_ => None,
		}
	}

	/// Pointer size in bytes.
	pub fn bytes(self) -> usize {
		match self {
			Self::P32 => 4,
			Self::P64 => 8,
		}
	}

	/// Pointer size in bits.
	pub fn bits(self) -> u32 {
		self.bytes() as u32 * 8
	}

	/// Total size of one variant buffer.
	pub fn variant_size(self) -> usize {
		match self {
			Self::P32 => 16,
			Self::P64 => 24,
		}
	}

	/// Size of a one-dimensional array descriptor, header plus one bound.
	pub fn safearray_size(self) -> usize {
		match self {
			Self::P32 => 24,
			Self::P64 => 32,
		}
	}
}

/// One mapped region of the modelled address space.
#[derive(Debug, Clone)]
pub struct Region {
	/// First address of the region.
	pub base: u64,
	/// Region contents.
	pub bytes: Vec<u8>,
}

impl Region {
	/// Exclusive end address.
	pub fn end(&self) -> u64 {
		self.base.saturating_add(self.bytes.len() as u64)
	}
}

/// Result of mapping a pointer to a region.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPtr<'a> {
	/// Matched region.
	pub region: &'a Region,
	/// Byte offset of pointer inside the region.
	pub byte_offset: usize,
}

impl<'a> ResolvedPtr<'a> {
	/// Return a bounded slice starting at `byte_offset`.
	pub fn slice_from(&self, len: usize) -> Option<&'a [u8]> {
		let start = self.byte_offset;
		let end = start.checked_add(len)?;
		self.region.bytes.get(start..end)
	}

	/// Bytes from `byte_offset` to the region end.
	pub fn tail(&self) -> &'a [u8] {
		&self.region.bytes[self.byte_offset..]
	}
}

/// Sparse little-endian memory standing in for the native heap.
///
/// Regions never overlap. Pointer `0` never resolves. Fresh allocations are
/// 16-byte aligned and stay below 4 GiB so they fit either pointer width.
#[derive(Debug, Clone)]
pub struct AddressSpace {
	width: PointerWidth,
	starts: Vec<u64>,
	regions: Vec<Region>,
	next: u64,
}

impl AddressSpace {
	/// Create an empty address space.
	pub fn new(width: PointerWidth) -> Self {
		Self {
			width,
			starts: Vec::new(),
			regions: Vec::new(),
			next: ALLOC_FLOOR,
		}
	}

	/// Pointer width of this address space.
	pub fn width(&self) -> PointerWidth {
		self.width
	}

	/// Map caller-provided bytes at `base`.
	pub fn map(&mut self, base: u64, bytes: Vec<u8>) -> Result<()> {
		let len = bytes.len();
		let end = base.checked_add(len as u64).ok_or(VariantError::RegionOverlap { base, len })?;
		if base == 0 || self.overlaps(base, end) {
			return Err(VariantError::RegionOverlap { base, len });
		}
		if self.width == PointerWidth::P32 && end > ALLOC_CEILING {
			return Err(VariantError::PointerTooWide { ptr: base, bits: 32 });
		}

		self.insert(Region { base, bytes });
		Ok(())
	}

	/// Allocate a zeroed region of `len` bytes.
	pub fn alloc(&mut self, len: usize) -> Result<u64> {
		self.alloc_bytes(vec![0; len])
	}

	/// Allocate a region initialised with `bytes`.
	pub fn alloc_bytes(&mut self, bytes: Vec<u8>) -> Result<u64> {
		let len = bytes.len();
		let span = (len.max(1) as u64).next_multiple_of(ALLOC_ALIGN);
		let mut base = self.next.next_multiple_of(ALLOC_ALIGN);

		loop {
			let end = base.checked_add(span).ok_or(VariantError::AddressSpaceExhausted { len })?;
			if end > ALLOC_CEILING {
				return Err(VariantError::AddressSpaceExhausted { len });
			}

			match self.regions.iter().find(|region| region.base < end && base < region.end()) {
				Some(region) => base = region.end().next_multiple_of(ALLOC_ALIGN) + ALLOC_ALIGN,
				None => break,
			}
		}

		// A guard gap keeps neighbouring allocations from looking contiguous.
		self.next = base + span + ALLOC_ALIGN;
		self.insert(Region { base, bytes });
		Ok(base)
	}

	/// Release the region starting exactly at `base`.
	pub fn free(&mut self, base: u64) -> bool {
		let Ok(idx) = self.starts.binary_search(&base) else {
			return false;
		};
		self.starts.remove(idx);
		self.regions.remove(idx);
		true
	}

	/// Release the region containing `ptr`, returning its base.
	pub fn free_containing(&mut self, ptr: u64) -> Option<u64> {
		let base = self.resolve(ptr)?.region.base;
		self.free(base).then_some(base)
	}

	/// Resolve a pointer to the containing region.
	pub fn resolve(&self, ptr: u64) -> Option<ResolvedPtr<'_>> {
		if ptr == 0 {
			return None;
		}

		let idx = self.starts.partition_point(|start| *start <= ptr);
		if idx == 0 {
			return None;
		}

		let region = &self.regions[idx - 1];
		if ptr >= region.end() {
			return None;
		}

		Some(ResolvedPtr {
			region,
			byte_offset: (ptr - region.base) as usize,
		})
	}

	/// Read `len` bytes at `ptr`.
	pub fn read(&self, ptr: u64, len: usize) -> Result<&[u8]> {
		let resolved = self.resolve(ptr).ok_or(VariantError::UnmappedPointer { ptr })?;
		resolved.slice_from(len).ok_or(VariantError::OutOfBounds {
			ptr,
			need: len,
			have: resolved.tail().len(),
		})
	}

	/// Overwrite bytes at `ptr`.
	pub fn write(&mut self, ptr: u64, bytes: &[u8]) -> Result<()> {
		let (idx, offset, have) = {
			let resolved = self.resolve(ptr).ok_or(VariantError::UnmappedPointer { ptr })?;
			let idx = self.starts.partition_point(|start| *start <= ptr) - 1;
			(idx, resolved.byte_offset, resolved.tail().len())
		};
		if bytes.len() > have {
			return Err(VariantError::OutOfBounds { ptr, need: bytes.len(), have });
		}

		self.regions[idx].bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
		Ok(())
	}

	/// Read exactly `N` bytes at `ptr`.
	pub fn read_array<const N: usize>(&self, ptr: u64) -> Result<[u8; N]> {
		let raw = self.read(ptr, N)?;
		let mut out = [0_u8; N];
		out.copy_from_slice(raw);
		Ok(out)
	}

	/// Read a little-endian `u16`.
	pub fn read_u16(&self, ptr: u64) -> Result<u16> {
		Ok(u16::from_le_bytes(self.read_array(ptr)?))
	}

	/// Read a little-endian `u32`.
	pub fn read_u32(&self, ptr: u64) -> Result<u32> {
		Ok(u32::from_le_bytes(self.read_array(ptr)?))
	}

	/// Read a little-endian `i32`.
	pub fn read_i32(&self, ptr: u64) -> Result<i32> {
		Ok(i32::from_le_bytes(self.read_array(ptr)?))
	}

	/// Read a little-endian `u64`.
	pub fn read_u64(&self, ptr: u64) -> Result<u64> {
		Ok(u64::from_le_bytes(self.read_array(ptr)?))
	}

	/// Read a pointer of this space's width.
	pub fn read_ptr(&self, ptr: u64) -> Result<u64> {
		match self.width {
			PointerWidth::P32 => Ok(u64::from(self.read_u32(ptr)?)),
			PointerWidth::P64 => self.read_u64(ptr),
		}
	}

	/// Write a little-endian `u32`.
	pub fn write_u32(&mut self, ptr: u64, value: u32) -> Result<()> {
		self.write(ptr, &value.to_le_bytes())
	}

	/// Write a pointer of this space's width.
	pub fn write_ptr(&mut self, ptr: u64, value: u64) -> Result<()> {
		let raw = ptr_bytes(self.width, value)?;
		self.write(ptr, &raw)
	}

	/// Read a zero-terminated narrow string without the terminator.
	pub fn read_cstr(&self, ptr: u64) -> Result<&[u8]> {
		let resolved = self.resolve(ptr).ok_or(VariantError::UnmappedPointer { ptr })?;
		let tail = resolved.tail();
		let Some(end) = tail.iter().position(|byte| *byte == 0) else {
			return Err(VariantError::OutOfBounds {
				ptr,
				need: tail.len() + 1,
				have: tail.len(),
			});
		};
		Ok(&tail[..end])
	}

	/// Read a zero-terminated wide string without the terminator.
	pub fn read_wstr(&self, ptr: u64) -> Result<Vec<u16>> {
		let resolved = self.resolve(ptr).ok_or(VariantError::UnmappedPointer { ptr })?;
		let tail = resolved.tail();
		let mut units = Vec::new();
		for pair in tail.chunks_exact(2) {
			let unit = u16::from_le_bytes([pair[0], pair[1]]);
			if unit == 0 {
				return Ok(units);
			}
			units.push(unit);
		}

		Err(VariantError::OutOfBounds {
			ptr,
			need: tail.len() + 2,
			have: tail.len(),
		})
	}

	/// Return all regions in address order.
	pub fn regions(&self) -> &[Region] {
		&self.regions
	}

	/// Return number of mapped regions.
	pub fn len(&self) -> usize {
		self.regions.len()
	}

	/// Return whether nothing is mapped.
	pub fn is_empty(&self) -> bool {
		self.regions.is_empty()
	}

	fn overlaps(&self, base: u64, end: u64) -> bool {
		self.regions.iter().any(|region| region.base < end.max(base + 1) && base < region.end().max(region.base + 1))
	}

	fn insert(&mut self, region: Region) {
		let idx = self.starts.partition_point(|start| *start < region.base);
		self.starts.insert(idx, region.base);
		self.regions.insert(idx, region);
	}
}

#[cfg(test)]
mod tests;
