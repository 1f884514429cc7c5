use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

/// 32-bit COM status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hresult(pub u32);

impl Hresult {
	/// Success.
	pub const S_OK: Self = Self(0x0000_0000);
	/// Not implemented.
	pub const E_NOTIMPL: Self = Self(0x8000_4001);
	/// Invalid argument.
	pub const E_INVALIDARG: Self = Self(0x8007_0057);
	/// Out of memory.
	pub const E_OUTOFMEMORY: Self = Self(0x8007_000E);
	/// Type mismatch.
	pub const DISP_E_TYPEMISMATCH: Self = Self(0x8002_0005);
	/// Bad variable type.
	pub const DISP_E_BADVARTYPE: Self = Self(0x8002_0008);
	/// Value out of range.
	pub const DISP_E_OVERFLOW: Self = Self(0x8002_000A);
	/// Array is locked.
	pub const DISP_E_ARRAYISLOCKED: Self = Self(0x8002_000D);
	/// Division by zero.
	pub const DISP_E_DIVBYZERO: Self = Self(0x8002_0012);

	const KNOWN: [(Self, &'static str); 9] = [
		(Self::S_OK, "S_OK"),
		(Self::E_NOTIMPL, "E_NOTIMPL"),
		(Self::E_INVALIDARG, "E_INVALIDARG"),
		(Self::E_OUTOFMEMORY, "E_OUTOFMEMORY"),
		(Self::DISP_E_TYPEMISMATCH, "DISP_E_TYPEMISMATCH"),
		(Self::DISP_E_BADVARTYPE, "DISP_E_BADVARTYPE"),
		(Self::DISP_E_OVERFLOW, "DISP_E_OVERFLOW"),
		(Self::DISP_E_ARRAYISLOCKED, "DISP_E_ARRAYISLOCKED"),
		(Self::DISP_E_DIVBYZERO, "DISP_E_DIVBYZERO"),
	];

	/// Return whether the severity bit is clear.
	pub fn is_success(self) -> bool {
		self.0 & 0x8000_0000 == 0
	}

	/// Symbolic name for well-known codes.
	pub fn name(self) -> Option<&'static str> {
		Self::KNOWN.iter().find(|(code, _)| *code == self).map(|(_, name)| *name)
	}

	/// Look up a well-known code by name.
	pub fn from_name(name: &str) -> Option<Self> {
		Self::KNOWN.iter().find(|(_, known)| known.eq_ignore_ascii_case(name)).map(|(code, _)| *code)
	}
}

impl fmt::Display for Hresult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.name() {
			Some(name) => write!(f, "{name} (0x{:08X})", self.0),
			None => write!(f, "0x{:08X}", self.0),
		}
	}
}

/// Record type description collaborator (`IRecordInfo`).
///
/// The codec trusts only the identity and the byte size reported here.
pub trait RecordTypeProvider {
	/// Record identity.
	fn guid(&self) -> Result<Uuid, Hresult>;

	/// Native byte size of one record.
	fn size(&self) -> Result<u32, Hresult>;
}

/// Provider answering with fixed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRecordInfo {
	/// Identity returned on success.
	pub guid: Uuid,
	/// Size returned on success.
	pub size: u32,
	/// Status of the identity query.
	pub guid_status: Hresult,
	/// Status of the size query.
	pub size_status: Hresult,
}

impl StaticRecordInfo {
	/// Provider that always succeeds.
	pub fn new(guid: Uuid, size: u32) -> Self {
		Self {
			guid,
			size,
			guid_status: Hresult::S_OK,
			size_status: Hresult::S_OK,
		}
	}

	/// Provider whose identity query fails with `status`.
	pub fn failing(status: Hresult) -> Self {
		Self {
			guid_status: status,
			..Self::new(Uuid::nil(), 0)
		}
	}
}

impl RecordTypeProvider for StaticRecordInfo {
	fn guid(&self) -> Result<Uuid, Hresult> {
		if self.guid_status.is_success() { Ok(self.guid) } else { Err(self.guid_status) }
	}

	fn size(&self) -> Result<u32, Hresult> {
		if self.size_status.is_success() { Ok(self.size) } else { Err(self.size_status) }
	}
}

/// Record-info providers keyed by the address stored in variants and descriptors.
#[derive(Default)]
pub struct RecordTable {
	providers: BTreeMap<u64, Box<dyn RecordTypeProvider>>,
}

impl RecordTable {
	/// Create an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a provider at `addr`, replacing any previous one.
	pub fn insert(&mut self, addr: u64, provider: impl RecordTypeProvider + 'static) {
		self.providers.insert(addr, Box::new(provider));
	}

	/// Look up the provider at `addr`.
	pub fn get(&self, addr: u64) -> Option<&dyn RecordTypeProvider> {
		self.providers.get(&addr).map(|provider| provider.as_ref())
	}

	/// Registered addresses in ascending order.
	pub fn addresses(&self) -> impl Iterator<Item = u64> + '_ {
		self.providers.keys().copied()
	}

	/// Number of registered providers.
	pub fn len(&self) -> usize {
		self.providers.len()
	}

	/// Return whether no providers are registered.
	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}

impl fmt::Debug for RecordTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RecordTable").field("addresses", &self.providers.keys().collect::<Vec<_>>()).finish()
	}
}
