use thiserror::Error;

use crate::variant::{Hresult, VarTag};

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, VariantError>;

/// Coarse classification of a [`VariantError`].
///
/// The first five categories are the decode failure classes callers are
/// expected to branch on; the rest describe the environment the codec ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
	/// Tag names a type or tag combination this codec does not marshal.
	Unsupported,
	/// Tag value is reserved, illegal, or an invalid nested representation.
	InvalidType,
	/// By-reference tag whose pointer is null.
	MissingData,
	/// Array descriptor disagrees with the outer tag about its element type.
	ArrayTypeMismatch,
	/// Input is structurally larger than this implementation materializes.
	LimitExceeded,
	/// Pointer does not resolve, or a read runs past a mapped region.
	Memory,
	/// Payload bits do not describe a representable value.
	Value,
	/// Image, IO, or caller argument problem.
	Input,
}

impl ErrorCategory {
	/// Render category as a stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Unsupported => "unsupported",
			Self::InvalidType => "invalid_type",
			Self::MissingData => "missing_data",
			Self::ArrayTypeMismatch => "array_type_mismatch",
			Self::LimitExceeded => "limit_exceeded",
			Self::Memory => "memory",
			Self::Value => "value",
			Self::Input => "input",
		}
	}
}

/// Errors produced while decoding, encoding, and clearing variants.
#[derive(Debug, Error)]
pub enum VariantError {
	/// Tag denotes a type this codec does not marshal.
	#[error("unsupported variant type {tag}")]
	UnsupportedType {
		/// Offending raw tag.
		tag: VarTag,
	},
	/// Tag value is outside the assigned range.
	#[error("invalid variant type {tag}")]
	InvalidVariantType {
		/// Offending raw tag.
		tag: VarTag,
	},
	/// `VT_VARIANT | VT_BYREF` pointed at a by-reference or empty variant.
	#[error("invalid nested variant {tag}")]
	InvalidNestedVariant {
		/// Tag of the nested variant.
		tag: VarTag,
	},
	/// Exact-tag accessor called on a variant of another type.
	#[error("variant of type {tag} cannot be read as the requested type")]
	InvalidCast {
		/// Actual raw tag.
		tag: VarTag,
	},
	/// By-reference tag with a null pointer.
	#[error("missing data for by-reference variant {tag}")]
	MissingData {
		/// Offending raw tag.
		tag: VarTag,
	},
	/// Descriptor element type conflicts with the outer array tag.
	#[error("array type mismatch: variant declares {declared}, descriptor holds {actual}")]
	ArrayTypeMismatch {
		/// Outer tag (with `VT_ARRAY`).
		declared: VarTag,
		/// Element type recorded by the descriptor.
		actual: VarTag,
	},
	/// Descriptor carries no element type and its element size does not fit the outer tag.
	#[error("array element size mismatch for {declared}: expected {expected}, descriptor has {actual}")]
	ArrayElementSizeMismatch {
		/// Outer tag (with `VT_ARRAY`).
		declared: VarTag,
		/// Natural element size of the outer base type.
		expected: u32,
		/// `cbElements` from the descriptor.
		actual: u32,
	},
	/// Array rank above the supported ceiling.
	#[error("array rank {rank} exceeds maximum {max}")]
	RankTooLarge {
		/// Rank read from the descriptor.
		rank: u16,
		/// Maximum supported rank.
		max: usize,
	},
	/// Array descriptor declares zero dimensions.
	#[error("array descriptor has no dimensions")]
	ZeroRankArray,
	/// Total element count above the configured limit.
	#[error("array too large: count={count}, max={max}")]
	ArrayTooLarge {
		/// Requested element count.
		count: u64,
		/// Maximum permitted element count.
		max: usize,
	},
	/// Nested variants go deeper than the configured limit.
	#[error("variant nesting exceeds max depth {max}")]
	DepthExceeded {
		/// Maximum permitted nesting depth.
		max: u32,
	},
	/// Array index outside the descriptor bounds.
	#[error("array index out of bounds in dimension {dim}: index={index}")]
	IndexOutOfBounds {
		/// Logical dimension.
		dim: usize,
		/// Offending index.
		index: i64,
	},
	/// Index list length does not match the array rank.
	#[error("array rank mismatch: expected {expected} indices, got {got}")]
	IndexRankMismatch {
		/// Rank of the array.
		expected: usize,
		/// Number of indices supplied.
		got: usize,
	},
	/// Record variant without a record-info reference.
	#[error("record variant has no record info")]
	RecordInfoMissing,
	/// Array descriptor still holds locks and cannot be destroyed.
	#[error("array at 0x{ptr:x} is locked ({locks} locks)")]
	ArrayLocked {
		/// Descriptor pointer.
		ptr: u64,
		/// Lock count read from the descriptor.
		locks: u32,
	},
	/// Record-info pointer is not backed by a registered provider.
	#[error("no record provider registered at 0x{ptr:x}")]
	RecordProviderMissing {
		/// Record-info pointer.
		ptr: u64,
	},
	/// Record provider query failed with a well-known status.
	#[error("record query failed: {hresult}")]
	RecordQueryFailed {
		/// Status reported by the provider.
		hresult: Hresult,
	},
	/// Record identity cannot be mapped to a known primitive.
	#[error("record {guid} cannot be mapped to a known value type")]
	RecordNotMappable {
		/// Record identity.
		guid: uuid::Uuid,
	},
	/// Record identity is known but the provider reports a different size.
	#[error("record {guid} has size {size}, expected {expected}")]
	RecordSizeMismatch {
		/// Record identity.
		guid: uuid::Uuid,
		/// Size reported by the provider.
		size: u32,
		/// Size of the mapped primitive.
		expected: u32,
	},
	/// Record arrays pass validation but are never materialized.
	#[error("record arrays are not supported")]
	RecordArrayUnsupported,
	/// Pointer does not resolve to a mapped region.
	#[error("unmapped pointer 0x{ptr:x}")]
	UnmappedPointer {
		/// Pointer value.
		ptr: u64,
	},
	/// Cursor ran out of bytes.
	#[error("unexpected end of data at offset {at}: need {need} bytes, remaining {rem}")]
	UnexpectedEof {
		/// Cursor offset where the read started.
		at: usize,
		/// Requested bytes.
		need: usize,
		/// Remaining bytes.
		rem: usize,
	},
	/// Element bytes passed to an array write have the wrong size.
	#[error("array element must be {expected} bytes, got {got}")]
	ElementSizeMismatch {
		/// Element size recorded by the descriptor.
		expected: usize,
		/// Supplied size.
		got: usize,
	},
	/// Read or write crosses the end of a mapped region.
	#[error("access at 0x{ptr:x} needs {need} bytes, region has {have}")]
	OutOfBounds {
		/// Pointer value.
		ptr: u64,
		/// Requested bytes.
		need: usize,
		/// Bytes available from `ptr` to the region end.
		have: usize,
	},
	/// Mapping would overlap an existing region.
	#[error("region 0x{base:x}+{len} overlaps an existing mapping")]
	RegionOverlap {
		/// Requested base address.
		base: u64,
		/// Requested length.
		len: usize,
	},
	/// Address space ran out of room below the pointer-width limit.
	#[error("address space exhausted allocating {len} bytes")]
	AddressSpaceExhausted {
		/// Requested length.
		len: usize,
	},
	/// Pointer value does not fit the configured pointer width.
	#[error("pointer 0x{ptr:x} does not fit a {bits}-bit pointer")]
	PointerTooWide {
		/// Pointer value.
		ptr: u64,
		/// Pointer width in bits.
		bits: u32,
	},
	/// Raw buffer has the wrong size for the configured pointer width.
	#[error("variant buffer must be {expected} bytes, got {got}")]
	BadVariantSize {
		/// Required size.
		expected: usize,
		/// Supplied size.
		got: usize,
	},
	/// OLE Automation date outside the representable range, or NaN.
	#[error("invalid OLE Automation date {value}")]
	InvalidDate {
		/// Raw date value.
		value: f64,
	},
	/// FILETIME tick count outside the representable range.
	#[error("invalid FILETIME {ticks}")]
	InvalidFileTime {
		/// Raw tick count reinterpreted as signed.
		ticks: i64,
	},
	/// DECIMAL with a scale above 28.
	#[error("invalid decimal scale {scale}")]
	InvalidDecimal {
		/// Raw scale byte.
		scale: u8,
	},
	/// Element count does not fit the 32-bit counter of a vector.
	#[error("element count {count} does not fit a vector")]
	InvalidElementCount {
		/// Requested element count.
		count: usize,
	},
	/// Value kind has no scalar encoding.
	#[error("cannot encode {kind} as a scalar variant")]
	NotEncodable {
		/// Logical value kind.
		kind: &'static str,
	},
	/// Filesystem or stream IO failure.
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// Image document is malformed.
	#[error("invalid image: {reason}")]
	InvalidImage {
		/// Human-readable reason.
		reason: String,
	},
	/// Image JSON failed to parse.
	#[error("image json: {0}")]
	ImageJson(#[from] serde_json::Error),
	/// Decompression output exceeded configured safety limit.
	#[error("decompressed output exceeded limit {limit} bytes")]
	DecompressedTooLarge {
		/// Maximum allowed output bytes.
		limit: usize,
	},
}

impl VariantError {
	/// Classify this error.
	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::UnsupportedType { .. }
			| Self::RecordInfoMissing
			| Self::RecordProviderMissing { .. }
			| Self::RecordQueryFailed { .. }
			| Self::RecordNotMappable { .. }
			| Self::RecordSizeMismatch { .. }
			| Self::RecordArrayUnsupported
			| Self::NotEncodable { .. } => ErrorCategory::Unsupported,
			Self::InvalidVariantType { .. } | Self::InvalidNestedVariant { .. } => ErrorCategory::InvalidType,
			Self::MissingData { .. } => ErrorCategory::MissingData,
			Self::ArrayTypeMismatch { .. } | Self::ArrayElementSizeMismatch { .. } => ErrorCategory::ArrayTypeMismatch,
			Self::RankTooLarge { .. }
			| Self::ZeroRankArray
			| Self::ArrayTooLarge { .. }
			| Self::DepthExceeded { .. }
			| Self::InvalidElementCount { .. } => ErrorCategory::LimitExceeded,
			Self::UnmappedPointer { .. }
			| Self::OutOfBounds { .. }
			| Self::UnexpectedEof { .. }
			| Self::RegionOverlap { .. }
			| Self::AddressSpaceExhausted { .. }
			| Self::PointerTooWide { .. }
			| Self::IndexOutOfBounds { .. }
			| Self::IndexRankMismatch { .. }
			| Self::ArrayLocked { .. } => ErrorCategory::Memory,
			Self::InvalidDate { .. } | Self::InvalidFileTime { .. } | Self::InvalidDecimal { .. } => ErrorCategory::Value,
			Self::BadVariantSize { .. } | Self::ElementSizeMismatch { .. } | Self::InvalidCast { .. } | Self::Io(_) | Self::InvalidImage { .. } | Self::ImageJson(_) | Self::DecompressedTooLarge { .. } => {
				ErrorCategory::Input
			}
		}
	}

	/// Return the raw tag responsible for this error, when there is one.
	pub fn raw_tag(&self) -> Option<VarTag> {
		match self {
			Self::UnsupportedType { tag }
			| Self::InvalidVariantType { tag }
			| Self::InvalidNestedVariant { tag }
			| Self::MissingData { tag }
			| Self::InvalidCast { tag } => Some(*tag),
			Self::ArrayTypeMismatch { declared, .. } | Self::ArrayElementSizeMismatch { declared, .. } => Some(*declared),
			_ => None,
		}
	}

	/// Map a failed record-provider status onto the error surfaced to callers.
	///
	/// Well-known codes keep their identity; anything else becomes a plain
	/// unsupported-type failure for `tag`.
	pub fn from_record_status(hresult: Hresult, tag: VarTag) -> Self {
		if hresult.name().is_some() {
			Self::RecordQueryFailed { hresult }
		} else {
			Self::UnsupportedType { tag }
		}
	}

	/// Build an image error from any displayable reason.
	pub fn invalid_image(reason: impl Into<String>) -> Self {
		Self::InvalidImage { reason: reason.into() }
	}
}
