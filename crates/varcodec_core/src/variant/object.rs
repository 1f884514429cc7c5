use std::collections::BTreeMap;

/// Reference-count collaborator behind `VT_UNKNOWN`, `VT_DISPATCH` and record-info pointers.
pub trait ObjectRuntime {
	/// Increment the count of the object at `addr`, returning the new count.
	///
	/// Returns `None` when `addr` is not a live object.
	fn add_ref(&mut self, addr: u64) -> Option<u32>;

	/// Decrement the count of the object at `addr`, returning the new count.
	///
	/// Returns `None` when `addr` is not a live object.
	fn release(&mut self, addr: u64) -> Option<u32>;
}

/// In-memory reference counts.
///
/// An object whose count reaches zero is forgotten, so a further release
/// reports it as not live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefCounts {
	counts: BTreeMap<u64, u32>,
}

impl RefCounts {
	/// Create an empty runtime.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an object with an initial count.
	pub fn register(&mut self, addr: u64, count: u32) {
		if count == 0 {
			self.counts.remove(&addr);
		} else {
			self.counts.insert(addr, count);
		}
	}

	/// Current count, or zero for unknown objects.
	pub fn count(&self, addr: u64) -> u32 {
		self.counts.get(&addr).copied().unwrap_or(0)
	}

	/// Live objects and their counts in address order.
	pub fn iter(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
		self.counts.iter().map(|(addr, count)| (*addr, *count))
	}
}

impl ObjectRuntime for RefCounts {
	fn add_ref(&mut self, addr: u64) -> Option<u32> {
		let count = self.counts.get_mut(&addr)?;
		*count = count.saturating_add(1);
		Some(*count)
	}

	fn release(&mut self, addr: u64) -> Option<u32> {
		let count = self.counts.get_mut(&addr)?;
		*count -= 1;
		let left = *count;
		if left == 0 {
			self.counts.remove(&addr);
		}
		Some(left)
	}
}
