use std::fmt;

use bitflags::bitflags;

use crate::variant::PointerWidth;

/// Assigned base type codes below `0x80`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum VarType {
	/// No value.
	Empty = 0,
	/// SQL-style null.
	Null = 1,
	/// 2-byte signed integer.
	I2 = 2,
	/// 4-byte signed integer.
	I4 = 3,
	/// 4-byte float.
	R4 = 4,
	/// 8-byte float.
	R8 = 5,
	/// Currency, fixed point scaled by 10,000.
	Cy = 6,
	/// OLE Automation date.
	Date = 7,
	/// Length-prefixed wide string.
	Bstr = 8,
	/// `IDispatch` reference.
	Dispatch = 9,
	/// SCODE error value.
	Error = 10,
	/// `VARIANT_BOOL`.
	Bool = 11,
	/// Nested variant.
	Variant = 12,
	/// `IUnknown` reference.
	Unknown = 13,
	/// 96-bit packed decimal.
	Decimal = 14,
	/// 1-byte signed integer.
	I1 = 16,
	/// 1-byte unsigned integer.
	Ui1 = 17,
	/// 2-byte unsigned integer.
	Ui2 = 18,
	/// 4-byte unsigned integer.
	Ui4 = 19,
	/// 8-byte signed integer.
	I8 = 20,
	/// 8-byte unsigned integer.
	Ui8 = 21,
	/// Machine `int`, fixed at 4 bytes.
	Int = 22,
	/// Machine `unsigned int`, fixed at 4 bytes.
	Uint = 23,
	/// C `void`.
	Void = 24,
	/// HRESULT status code.
	Hresult = 25,
	/// Raw pointer.
	Ptr = 26,
	/// Safe-array handle in a type description.
	SafeArray = 27,
	/// C-style array.
	CArray = 28,
	/// User-defined type.
	UserDefined = 29,
	/// Null-terminated narrow string.
	Lpstr = 30,
	/// Null-terminated wide string.
	Lpwstr = 31,
	/// User-defined record described by record info.
	Record = 36,
	/// Pointer-sized signed integer.
	IntPtr = 37,
	/// Pointer-sized unsigned integer.
	UintPtr = 38,
	/// 100 ns ticks since 1601.
	FileTime = 64,
	/// Length-prefixed bytes.
	Blob = 65,
	/// Stream name.
	Stream = 66,
	/// Storage name.
	Storage = 67,
	/// Stream containing an object.
	StreamedObject = 68,
	/// Storage containing an object.
	StoredObject = 69,
	/// Blob containing an object.
	BlobObject = 70,
	/// Clipboard format.
	Cf = 71,
	/// Class identifier.
	Clsid = 72,
	/// Stream with a GUID version.
	VersionedStream = 73,
}

const ALL_TYPES: [VarType; 44] = [
	VarType::Empty,
	VarType::Null,
	VarType::I2,
	VarType::I4,
	VarType::R4,
	VarType::R8,
	VarType::Cy,
	VarType::Date,
	VarType::Bstr,
	VarType::Dispatch,
	VarType::Error,
	VarType::Bool,
	VarType::Variant,
	VarType::Unknown,
	VarType::Decimal,
	VarType::I1,
	VarType::Ui1,
	VarType::Ui2,
	VarType::Ui4,
	VarType::I8,
	VarType::Ui8,
	VarType::Int,
	VarType::Uint,
	VarType::Void,
	VarType::Hresult,
	VarType::Ptr,
	VarType::SafeArray,
	VarType::CArray,
	VarType::UserDefined,
	VarType::Lpstr,
	VarType::Lpwstr,
	VarType::Record,
	VarType::IntPtr,
	VarType::UintPtr,
	VarType::FileTime,
	VarType::Blob,
	VarType::Stream,
	VarType::Storage,
	VarType::StreamedObject,
	VarType::StoredObject,
	VarType::BlobObject,
	VarType::Cf,
	VarType::Clsid,
	VarType::VersionedStream,
];

impl VarType {
	/// Look up an assigned base code.
	pub fn from_code(code: u16) -> Option<Self> {
		ALL_TYPES.iter().copied().find(|ty| ty.code() == code)
	}

	/// Return the numeric base code.
	pub fn code(self) -> u16 {
		self as u16
	}

	/// Return the conventional `VT_*` name.
	pub fn name(self) -> &'static str {
		match self {
			Self::Empty => "VT_EMPTY",
			Self::Null => "VT_NULL",
			Self::I2 => "VT_I2",
			Self::I4 => "VT_I4",
			Self::R4 => "VT_R4",
			Self::R8 => "VT_R8",
			Self::Cy => "VT_CY",
			Self::Date => "VT_DATE",
			Self::Bstr => "VT_BSTR",
			Self::Dispatch => "VT_DISPATCH",
			Self::Error => "VT_ERROR",
			Self::Bool => "VT_BOOL",
			Self::Variant => "VT_VARIANT",
			Self::Unknown => "VT_UNKNOWN",
			Self::Decimal => "VT_DECIMAL",
			Self::I1 => "VT_I1",
			Self::Ui1 => "VT_UI1",
			Self::Ui2 => "VT_UI2",
			Self::Ui4 => "VT_UI4",
			Self::I8 => "VT_I8",
			Self::Ui8 => "VT_UI8",
			Self::Int => "VT_INT",
			Self::Uint => "VT_UINT",
			Self::Void => "VT_VOID",
			Self::Hresult => "VT_HRESULT",
			Self::Ptr => "VT_PTR",
			Self::SafeArray => "VT_SAFEARRAY",
			Self::CArray => "VT_CARRAY",
			Self::UserDefined => "VT_USERDEFINED",
			Self::Lpstr => "VT_LPSTR",
			Self::Lpwstr => "VT_LPWSTR",
			Self::Record => "VT_RECORD",
			Self::IntPtr => "VT_INT_PTR",
			Self::UintPtr => "VT_UINT_PTR",
			Self::FileTime => "VT_FILETIME",
			Self::Blob => "VT_BLOB",
			Self::Stream => "VT_STREAM",
			Self::Storage => "VT_STORAGE",
			Self::StreamedObject => "VT_STREAMED_OBJECT",
			Self::StoredObject => "VT_STORED_OBJECT",
			Self::BlobObject => "VT_BLOB_OBJECT",
			Self::Cf => "VT_CF",
			Self::Clsid => "VT_CLSID",
			Self::VersionedStream => "VT_VERSIONED_STREAM",
		}
	}

	/// Look up a type by its `VT_*` name, with or without the prefix.
	pub fn from_name(name: &str) -> Option<Self> {
		let upper = name.to_ascii_uppercase();
		let wanted = upper.strip_prefix("VT_").unwrap_or(&upper);
		ALL_TYPES.iter().copied().find(|ty| &ty.name()[3..] == wanted)
	}

	/// Build a tag with this base and the given flags.
	pub fn with(self, flags: VarFlags) -> VarTag {
		VarTag(self.code() | flags.bits())
	}
}

impl fmt::Display for VarType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

bitflags! {
	/// Modifier bits carried above the base code.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct VarFlags: u16 {
		/// Payload is a counted vector.
		const VECTOR = 0x1000;
		/// Payload is an array descriptor handle.
		const ARRAY = 0x2000;
		/// Payload is a pointer to the value.
		const BYREF = 0x4000;
		/// Reserved bit.
		const RESERVED = 0x8000;
	}
}

/// Largest base code treated as assigned or unassigned rather than reserved.
pub const MAX_ASSIGNED_CODE: u16 = 0x7F;
/// Reserved `VT_BSTR_BLOB` code.
pub const VT_BSTR_BLOB: u16 = 0x0FFF;
/// `VT_ILLEGAL` sentinel.
pub const VT_ILLEGAL: u16 = 0xFFFF;

/// Classified base code of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
	/// Assigned type.
	Known(VarType),
	/// Below `0x80` but not assigned to any type.
	Unassigned(u16),
	/// `0x80` and above, including `VT_BSTR_BLOB` and `VT_ILLEGAL`.
	Reserved(u16),
}

/// Raw 16-bit variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VarTag(pub u16);

impl VarTag {
	/// `VT_EMPTY` with no flags.
	pub const EMPTY: Self = Self(0);

	/// Return the raw value.
	pub fn raw(self) -> u16 {
		self.0
	}

	/// Return the modifier flags present in the tag.
	pub fn flags(self) -> VarFlags {
		VarFlags::from_bits_truncate(self.0 & (VarFlags::VECTOR | VarFlags::ARRAY | VarFlags::BYREF).bits())
	}

	/// Return the tag with `VECTOR`, `ARRAY` and `BYREF` masked off.
	pub fn base_code(self) -> u16 {
		self.0 & !(VarFlags::VECTOR | VarFlags::ARRAY | VarFlags::BYREF).bits()
	}

	/// Classify the base code.
	pub fn base(self) -> Base {
		let code = self.base_code();
		if code > MAX_ASSIGNED_CODE {
			return Base::Reserved(code);
		}
		match VarType::from_code(code) {
			Some(ty) => Base::Known(ty),
			None => Base::Unassigned(code),
		}
	}

	/// Return the assigned base type, if any.
	pub fn known(self) -> Option<VarType> {
		match self.base() {
			Base::Known(ty) => Some(ty),
			_ => None,
		}
	}

	/// Return whether `BYREF` is set.
	pub fn is_byref(self) -> bool {
		self.flags().contains(VarFlags::BYREF)
	}

	/// Return whether `ARRAY` is set.
	pub fn is_array(self) -> bool {
		self.flags().contains(VarFlags::ARRAY)
	}

	/// Return whether `VECTOR` is set.
	pub fn is_vector(self) -> bool {
		self.flags().contains(VarFlags::VECTOR)
	}
}

impl From<VarType> for VarTag {
	fn from(ty: VarType) -> Self {
		Self(ty.code())
	}
}

impl fmt::Display for VarTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.0 == VT_ILLEGAL {
			return write!(f, "VT_ILLEGAL (0x{:04x})", self.0);
		}
		let flags = self.flags();
		let mut parts = Vec::new();
		if flags.contains(VarFlags::BYREF) {
			parts.push("VT_BYREF".to_owned());
		}
		if flags.contains(VarFlags::ARRAY) {
			parts.push("VT_ARRAY".to_owned());
		}
		if flags.contains(VarFlags::VECTOR) {
			parts.push("VT_VECTOR".to_owned());
		}
		parts.push(match self.base() {
			Base::Known(ty) => ty.name().to_owned(),
			Base::Unassigned(code) | Base::Reserved(code) if code == VT_BSTR_BLOB => "VT_BSTR_BLOB".to_owned(),
			Base::Unassigned(code) | Base::Reserved(code) => format!("0x{code:x}"),
		});
		write!(f, "{} (0x{:04x})", parts.join("|"), self.0)
	}
}

/// Natural element size used for by-reference reads, vectors, and arrays without a recorded element type.
///
/// Returns `None` for types that have no fixed-size element representation.
pub fn element_size(ty: VarType, width: PointerWidth) -> Option<usize> {
	match ty {
		VarType::I1 | VarType::Ui1 => Some(1),
		VarType::I2 | VarType::Ui2 | VarType::Bool => Some(2),
		VarType::I4 | VarType::Ui4 | VarType::Int | VarType::Uint | VarType::R4 | VarType::Error | VarType::Hresult => Some(4),
		VarType::I8 | VarType::Ui8 | VarType::R8 | VarType::Cy | VarType::Date | VarType::FileTime => Some(8),
		VarType::Decimal | VarType::Clsid => Some(16),
		VarType::Variant => Some(width.variant_size()),
		VarType::Bstr
		| VarType::Lpstr
		| VarType::Lpwstr
		| VarType::Unknown
		| VarType::Dispatch
		| VarType::Ptr
		| VarType::SafeArray
		| VarType::CArray
		| VarType::UserDefined
		| VarType::IntPtr
		| VarType::UintPtr => Some(width.bytes()),
		_ => None,
	}
}
