mod bytes;
mod cast;
pub mod clear;
mod compression;
pub mod convert;
mod decode;
pub mod encode;
mod error;
mod image;
mod layout;
mod memory;
mod numeric;
mod object;
mod record;
pub mod safearray;
mod value;
mod vartype;

/// Variant clearing entry points.
pub use clear::{ClearReport, clear, clear_at};
/// Compression detection result.
pub use compression::Compression;
/// Decoding entry points and options.
pub use decode::{DecodeMode, DecodeOptions, decode_extended, decode_strict, decode_with};
/// Error and result aliases.
pub use error::{ErrorCategory, Result, VariantError};
/// Memory image loading.
pub use image::{LoadedImage, VariantImage};
/// Raw variant buffer.
pub use layout::TaggedVariant;
/// Modelled native memory.
pub use memory::{AddressSpace, PointerWidth, Region, ResolvedPtr};
/// Exact fixed-point and decimal types.
pub use numeric::{Currency, Decimal};
/// Reference-count collaborator and in-memory implementation.
pub use object::{ObjectRuntime, RefCounts};
/// Record-info collaborator types.
pub use record::{Hresult, RecordTable, RecordTypeProvider, StaticRecordInfo};
/// Array descriptor view and feature flags.
pub use safearray::{ArrayFeatures, MAX_ARRAY_RANK, SafeArrayView};
/// Decoded value types.
pub use value::{ArrayBound, ComRef, Value, VariantArray};
/// Tag types and natural element sizes.
pub use vartype::{Base, VarFlags, VarTag, VarType, element_size};
