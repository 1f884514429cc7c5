//! JSON memory images: a variant plus the native memory it points into.
//!
//! An image is a JSON object, optionally zstd-compressed:
//!
//! ```json
//! {
//!   "pointer_width": 8,
//!   "variant": { "address": "0x10000" },
//!   "regions": [{ "base": "0x10000", "hex": "0300 0000 0000 0000 2a00 0000 0000 0000 0000 0000 0000 0000" }],
//!   "records": [{ "address": "0x7000", "guid": "…", "size": 4 }],
//!   "record_primitives": [{ "guid": "…", "vt": "VT_I4" }],
//!   "objects": [{ "address": "0x4000", "refs": 1 }]
//! }
//! ```
//!
//! `variant` is either inline hex or the address of a mapped variant.
//! Addresses are JSON integers or `0x` strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::variant::compression::decode_bytes;
use crate::variant::{AddressSpace, Compression, DecodeOptions, Hresult, PointerWidth, RecordTable, RefCounts, Result, StaticRecordInfo, TaggedVariant, VarType, VariantError};

/// Parsed, not yet materialised, memory image.
#[derive(Debug, Clone)]
pub struct VariantImage {
	/// Compression detected on the source bytes.
	pub compression: Compression,
	/// Pointer width declared by the image.
	pub pointer_width: PointerWidth,
	doc: ImageDoc,
}

/// Memory image materialised into codec collaborators.
#[derive(Debug)]
pub struct LoadedImage {
	/// Mapped regions.
	pub memory: AddressSpace,
	/// Record-info providers keyed by address.
	pub records: RecordTable,
	/// Initial reference counts.
	pub objects: RefCounts,
	/// The variant under inspection.
	pub variant: TaggedVariant,
	/// Where the variant lives, when it was read from mapped memory.
	pub variant_addr: Option<u64>,
	/// Record identities known to map onto primitive types.
	pub record_primitives: BTreeMap<Uuid, VarType>,
}

impl LoadedImage {
	/// Default options extended with the image's record identities.
	pub fn decode_options(&self) -> DecodeOptions {
		DecodeOptions {
			record_primitives: self.record_primitives.clone(),
			..DecodeOptions::default()
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageDoc {
	pointer_width: usize,
	variant: VariantDoc,
	#[serde(default)]
	regions: Vec<RegionDoc>,
	#[serde(default)]
	records: Vec<RecordDoc>,
	#[serde(default)]
	record_primitives: Vec<PrimitiveDoc>,
	#[serde(default)]
	objects: Vec<ObjectDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum VariantDoc {
	Inline(String),
	At { address: AddrDoc },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum AddrDoc {
	Number(u64),
	Text(HexAddr),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(try_from = "String")]
struct HexAddr(u64);

impl TryFrom<String> for HexAddr {
	type Error = String;

	fn try_from(text: String) -> std::result::Result<Self, Self::Error> {
		let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(&text);
		u64::from_str_radix(digits, 16).map(Self).map_err(|_| format!("invalid address {text:?}"))
	}
}

impl AddrDoc {
	fn get(self) -> u64 {
		match self {
			Self::Number(addr) => addr,
			Self::Text(HexAddr(addr)) => addr,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegionDoc {
	base: AddrDoc,
	hex: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordDoc {
	address: AddrDoc,
	#[serde(default)]
	guid: Option<Uuid>,
	#[serde(default)]
	size: u32,
	#[serde(default)]
	status: Option<String>,
	#[serde(default)]
	size_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PrimitiveDoc {
	guid: Uuid,
	vt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectDoc {
	address: AddrDoc,
	refs: u32,
}

impl VariantImage {
	/// Read and parse an image file.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		debug!(path = %path.display(), "opening image");
		Self::from_bytes(fs::read(path)?)
	}

	/// Parse an image from raw (possibly compressed) bytes.
	pub fn from_bytes(raw: Vec<u8>) -> Result<Self> {
		let (compression, bytes) = decode_bytes(raw)?;
		let doc: ImageDoc = serde_json::from_slice(&bytes)?;
		let pointer_width = PointerWidth::from_bytes(doc.pointer_width).ok_or_else(|| VariantError::invalid_image(format!("pointer_width must be 4 or 8, got {}", doc.pointer_width)))?;
		Ok(Self { compression, pointer_width, doc })
	}

	/// Number of regions the image maps.
	pub fn region_count(&self) -> usize {
		self.doc.regions.len()
	}

	/// Build the address space, collaborators and variant.
	pub fn load(&self) -> Result<LoadedImage> {
		let mut memory = AddressSpace::new(self.pointer_width);
		for region in &self.doc.regions {
			memory.map(region.base.get(), parse_hex(&region.hex)?)?;
		}

		let mut records = RecordTable::new();
		for record in &self.doc.records {
			let mut info = StaticRecordInfo::new(record.guid.unwrap_or_default(), record.size);
			if let Some(status) = &record.status {
				info.guid_status = parse_hresult(status)?;
			}
			if let Some(status) = &record.size_status {
				info.size_status = parse_hresult(status)?;
			}
			records.insert(record.address.get(), info);
		}

		let mut objects = RefCounts::new();
		for object in &self.doc.objects {
			objects.register(object.address.get(), object.refs);
		}

		let mut record_primitives = BTreeMap::new();
		for primitive in &self.doc.record_primitives {
			let ty = VarType::from_name(&primitive.vt).ok_or_else(|| VariantError::invalid_image(format!("unknown variant type {:?}", primitive.vt)))?;
			record_primitives.insert(primitive.guid, ty);
		}

		let (variant, variant_addr) = match &self.doc.variant {
			VariantDoc::Inline(hex) => (TaggedVariant::from_bytes(self.pointer_width, &parse_hex(hex)?)?, None),
			VariantDoc::At { address } => {
				let addr = address.get();
				(TaggedVariant::read_from(&memory, addr)?, Some(addr))
			}
		};

		debug!(regions = memory.len(), records = records.len(), tag = %variant.tag(), "image loaded");
		Ok(LoadedImage {
			memory,
			records,
			objects,
			variant,
			variant_addr,
			record_primitives,
		})
	}
}

/// Parse hex digits, ignoring ASCII whitespace.
fn parse_hex(text: &str) -> Result<Vec<u8>> {
	let digits: Vec<u8> = text.bytes().filter(|byte| !byte.is_ascii_whitespace()).collect();
	if digits.len() % 2 != 0 {
		return Err(VariantError::invalid_image("hex string has an odd number of digits"));
	}

	digits
		.chunks_exact(2)
		.map(|pair| match (hex_digit(pair[0]), hex_digit(pair[1])) {
			(Some(hi), Some(lo)) => Ok((hi << 4) | lo),
			_ => Err(VariantError::invalid_image(format!("invalid hex digits {:?}", String::from_utf8_lossy(pair)))),
		})
		.collect()
}

fn hex_digit(byte: u8) -> Option<u8> {
	(byte as char).to_digit(16).map(|digit| digit as u8)
}

fn parse_hresult(text: &str) -> Result<Hresult> {
	if let Some(code) = Hresult::from_name(text) {
		return Ok(code);
	}
	let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
	u32::from_str_radix(digits, 16).map(Hresult).map_err(|_| VariantError::invalid_image(format!("invalid status {text:?}")))
}

#[cfg(test)]
mod tests;
