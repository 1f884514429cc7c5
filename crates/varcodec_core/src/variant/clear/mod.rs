use tracing::{debug, trace, warn};

use crate::variant::safearray::{ArrayFeatures, SafeArrayView, element_count};
use crate::variant::{AddressSpace, ObjectRuntime, Result, TaggedVariant, VarType, VariantError, element_size};

/// Resources released by one clear or destroy call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
	/// Object addresses released once each, in release order.
	pub released: Vec<u64>,
	/// Base addresses of freed regions, in free order.
	pub freed: Vec<u64>,
	/// Resources that could not be freed or released.
	pub failures: usize,
}

/// Reset `variant` to `VT_EMPTY` and release what its payload owns.
///
/// By-reference payloads are never released. The whole buffer is zeroed even
/// when a resource cannot be freed, so clearing twice is a no-op.
pub fn clear(variant: &mut TaggedVariant, memory: &mut AddressSpace, objects: &mut dyn ObjectRuntime) -> ClearReport {
	debug!(tag = %variant.tag(), "clear variant");
	if variant.is_empty() {
		variant.zero();
		return ClearReport::default();
	}
	let mut releaser = Releaser::new(memory, objects);
	releaser.clear_variant(variant);
	releaser.finish()
}

/// Clear the variant stored at `ptr` in modelled memory and write it back.
pub fn clear_at(memory: &mut AddressSpace, ptr: u64, objects: &mut dyn ObjectRuntime) -> Result<ClearReport> {
	let mut variant = TaggedVariant::read_from(memory, ptr)?;
	let report = clear(&mut variant, memory, objects);
	variant.write_to(memory, ptr)?;
	Ok(report)
}

pub(crate) struct Releaser<'a> {
	memory: &'a mut AddressSpace,
	objects: &'a mut dyn ObjectRuntime,
	report: ClearReport,
}

impl<'a> Releaser<'a> {
	pub(crate) fn new(memory: &'a mut AddressSpace, objects: &'a mut dyn ObjectRuntime) -> Self {
		Self {
			memory,
			objects,
			report: ClearReport::default(),
		}
	}

	pub(crate) fn finish(self) -> ClearReport {
		self.report
	}

	pub(crate) fn clear_variant(&mut self, variant: &mut TaggedVariant) {
		self.release_payload(variant);
		variant.zero();
	}

	pub(crate) fn destroy_array(&mut self, ptr: u64) -> Result<()> {
		let view = SafeArrayView::read(self.memory, ptr)?;
		if view.locks() > 0 {
			return Err(VariantError::ArrayLocked { ptr, locks: view.locks() });
		}

		let bounds = view.bounds(self.memory)?;
		let count = element_count(&bounds) as usize;
		let data = view.data_bytes(self.memory, count)?.to_vec();
		let size = view.element_size() as usize;
		let features = view.features();
		trace!(ptr, count, ?features, "destroy array");

		if size > 0 {
			for element in data.chunks_exact(size) {
				if features.contains(ArrayFeatures::BSTR) {
					self.free_bstr(read_ptr_le(element));
				} else if features.intersects(ArrayFeatures::UNKNOWN | ArrayFeatures::DISPATCH) {
					self.release(read_ptr_le(element));
				} else if features.contains(ArrayFeatures::VARIANT) {
					match TaggedVariant::from_bytes(self.memory.width(), element) {
						Ok(nested) => self.release_payload(&nested),
						Err(err) => self.fail("array variant element", err),
					}
				}
			}
		}

		let descriptor_base = self.memory.resolve(ptr).map(|resolved| resolved.region.base);
		let data_base = self.memory.resolve(view.data()).map(|resolved| resolved.region.base);
		if data_base.is_some() && data_base != descriptor_base {
			self.free(view.data(), "array data");
		}
		if features.contains(ArrayFeatures::RECORD) {
			self.release(view.record_info());
		}
		self.free(ptr, "array descriptor");
		Ok(())
	}

	fn release_payload(&mut self, variant: &TaggedVariant) {
		let tag = variant.tag();
		if tag.is_byref() {
			return;
		}

		if tag.is_array() {
			let ptr = variant.ptr();
			if ptr != 0
				&& let Err(err) = self.destroy_array(ptr)
			{
				self.fail("array", err);
			}
			return;
		}

		let Some(base) = tag.known() else {
			return;
		};

		if tag.is_vector() {
			self.release_vector(variant, base);
			return;
		}

		match base {
			VarType::Bstr => self.free_bstr(variant.ptr()),
			VarType::Lpstr | VarType::Lpwstr | VarType::Clsid => self.free(variant.ptr(), base.name()),
			VarType::Unknown | VarType::Dispatch => self.release(variant.ptr()),
			VarType::Record => {
				let (data, record_info) = variant.record();
				self.free(data, "record data");
				self.release(record_info);
			}
			_ => {}
		}
	}

	fn release_vector(&mut self, variant: &TaggedVariant, base: VarType) {
		let (count, elems) = variant.vector();
		if elems == 0 {
			return;
		}

		let width = self.memory.width();
		let owns_elements = matches!(base, VarType::Bstr | VarType::Lpstr | VarType::Lpwstr | VarType::Variant);
		if owns_elements && let Some(size) = element_size(base, width) {
			let data = match self.memory.read(elems, count as usize * size) {
				Ok(data) => data.to_vec(),
				Err(err) => {
					self.fail("vector elements", err);
					Vec::new()
				}
			};
			for element in data.chunks_exact(size) {
				match base {
					VarType::Bstr => self.free_bstr(read_ptr_le(element)),
					VarType::Lpstr | VarType::Lpwstr => self.free(read_ptr_le(element), base.name()),
					_ => match TaggedVariant::from_bytes(width, element) {
						Ok(nested) => self.release_payload(&nested),
						Err(err) => self.fail("vector variant element", err),
					},
				}
			}
		}

		self.free(elems, "vector elements");
	}

	fn free_bstr(&mut self, ptr: u64) {
		if ptr != 0 {
			self.free(ptr.saturating_sub(4), "BSTR");
		}
	}

	fn free(&mut self, ptr: u64, what: &str) {
		if ptr == 0 {
			return;
		}
		match self.memory.free_containing(ptr) {
			Some(base) => {
				trace!(ptr, base, what, "freed");
				self.report.freed.push(base);
			}
			None => {
				warn!(ptr, what, "cannot free unmapped pointer");
				self.report.failures += 1;
			}
		}
	}

	fn release(&mut self, addr: u64) {
		if addr == 0 {
			return;
		}
		match self.objects.release(addr) {
			Some(left) => {
				trace!(addr, left, "released");
				self.report.released.push(addr);
			}
			None => {
				warn!(addr, "cannot release unknown object");
				self.report.failures += 1;
			}
		}
	}

	fn fail(&mut self, what: &str, err: VariantError) {
		warn!(what, error = %err, "cannot release");
		self.report.failures += 1;
	}
}

fn read_ptr_le(element: &[u8]) -> u64 {
	let mut raw = [0_u8; 8];
	let take = element.len().min(8);
	raw[..take].copy_from_slice(&element[..take]);
	u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests;
