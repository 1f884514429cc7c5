use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::variant::{Currency, Decimal, VarType};

/// Decoded variant value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// `VT_EMPTY` or `VT_VOID`.
	Empty,
	/// Null string, interface, `CLSID`, record, or array pointer.
	Absent,
	/// `VT_NULL`.
	Null,
	/// Raw address carried by `VT_EMPTY | VT_BYREF`.
	Address(u64),
	/// `VT_BOOL`.
	Bool(bool),
	/// `VT_I1`.
	I8(i8),
	/// `VT_UI1`.
	U8(u8),
	/// `VT_I2`.
	I16(i16),
	/// `VT_UI2`.
	U16(u16),
	/// `VT_I4`, `VT_INT`, `VT_ERROR`, `VT_HRESULT`.
	I32(i32),
	/// `VT_UI4`, `VT_UINT`.
	U32(u32),
	/// `VT_I8`.
	I64(i64),
	/// `VT_UI8`.
	U64(u64),
	/// `VT_R4`.
	F32(f32),
	/// `VT_R8`.
	F64(f64),
	/// `VT_CY`.
	Currency(Currency),
	/// `VT_DECIMAL`.
	Decimal(Decimal),
	/// `VT_DATE` or `VT_FILETIME`.
	DateTime(NaiveDateTime),
	/// `VT_BSTR`, `VT_LPWSTR`, `VT_LPSTR`.
	String(String),
	/// `VT_CLSID`.
	Guid(Uuid),
	/// `VT_UNKNOWN`.
	Unknown(ComRef),
	/// `VT_DISPATCH`.
	Dispatch(ComRef),
	/// `VT_VECTOR` payload.
	Vector(Vec<Value>),
	/// `VT_ARRAY` payload.
	Array(VariantArray),
}

impl Value {
	/// Short lowercase name of the value kind.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Empty => "empty",
			Self::Absent => "absent",
			Self::Null => "null",
			Self::Address(_) => "address",
			Self::Bool(_) => "bool",
			Self::I8(_) => "i8",
			Self::U8(_) => "u8",
			Self::I16(_) => "i16",
			Self::U16(_) => "u16",
			Self::I32(_) => "i32",
			Self::U32(_) => "u32",
			Self::I64(_) => "i64",
			Self::U64(_) => "u64",
			Self::F32(_) => "f32",
			Self::F64(_) => "f64",
			Self::Currency(_) => "currency",
			Self::Decimal(_) => "decimal",
			Self::DateTime(_) => "datetime",
			Self::String(_) => "string",
			Self::Guid(_) => "guid",
			Self::Unknown(_) => "unknown",
			Self::Dispatch(_) => "dispatch",
			Self::Vector(_) => "vector",
			Self::Array(_) => "array",
		}
	}
}

/// Non-owning observation of an interface pointer.
///
/// Decoding never calls `AddRef`: the reference stays owned by whoever owns
/// the source variant, and clearing that variant performs the single matching
/// `Release`. Holding a `ComRef` past that point observes a dangling address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComRef {
	addr: u64,
}

impl ComRef {
	/// Observe the interface at `addr`.
	pub fn new(addr: u64) -> Self {
		Self { addr }
	}

	/// Interface pointer value.
	pub fn addr(self) -> u64 {
		self.addr
	}
}

/// One dimension of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayBound {
	/// First valid index.
	pub lower: i32,
	/// Number of elements.
	pub count: u32,
}

impl ArrayBound {
	/// Build a bound.
	pub fn new(lower: i32, count: u32) -> Self {
		Self { lower, count }
	}

	/// Position of `index` inside this dimension.
	pub fn offset_of(self, index: i64) -> Option<usize> {
		let offset = index.checked_sub(i64::from(self.lower))?;
		if offset < 0 || offset >= i64::from(self.count) {
			return None;
		}
		usize::try_from(offset).ok()
	}
}

/// Decoded rectangular array with its native lower bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantArray {
	element_type: VarType,
	bounds: Vec<ArrayBound>,
	elements: Vec<Value>,
}

impl VariantArray {
	/// Build an array from logical bounds and row-major elements.
	pub(crate) fn new(element_type: VarType, bounds: Vec<ArrayBound>, elements: Vec<Value>) -> Self {
		Self {
			element_type,
			bounds,
			elements,
		}
	}

	/// Element type named by the outer tag.
	pub fn element_type(&self) -> VarType {
		self.element_type
	}

	/// Number of dimensions.
	pub fn rank(&self) -> usize {
		self.bounds.len()
	}

	/// Per-dimension bounds, leftmost dimension first.
	pub fn bounds(&self) -> &[ArrayBound] {
		&self.bounds
	}

	/// Elements in row-major order (rightmost index fastest).
	pub fn elements(&self) -> &[Value] {
		&self.elements
	}

	/// Total element count.
	pub fn len(&self) -> usize {
		self.elements.len()
	}

	/// Return whether the array holds no elements.
	pub fn is_empty(&self) -> bool {
		self.elements.is_empty()
	}

	/// Look up an element by native indices.
	pub fn get(&self, indices: &[i64]) -> Option<&Value> {
		if indices.len() != self.bounds.len() {
			return None;
		}

		let mut offset = 0_usize;
		for (bound, index) in self.bounds.iter().zip(indices) {
			let pos = bound.offset_of(*index)?;
			offset = offset.checked_mul(bound.count as usize)?.checked_add(pos)?;
		}
		self.elements.get(offset)
	}
}
