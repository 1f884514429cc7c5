use super::*;
use crate::variant::{ErrorCategory, Value, VarTag, decode_with};

const I4_INLINE: &str = r#"{
	"pointer_width": 8,
	"variant": "0300 0000 0000 0000 2a00 0000 0000 0000 0000 0000 0000 0000"
}"#;

#[test]
fn inline_variant_loads_and_decodes() {
	let image = VariantImage::from_bytes(I4_INLINE.as_bytes().to_vec()).expect("image");
	assert_eq!(image.compression, Compression::None);
	assert_eq!(image.pointer_width, PointerWidth::P64);
	assert_eq!(image.region_count(), 0);

	let loaded = image.load().expect("load");
	assert_eq!(loaded.variant.tag(), VarTag::from(VarType::I4));
	assert_eq!(loaded.variant_addr, None);
	let value = decode_with(&loaded.variant, &loaded.memory, &loaded.records, &loaded.decode_options()).expect("decode");
	assert_eq!(value, Value::I32(42));
}

#[test]
fn variant_at_address_reads_from_mapped_region() {
	let json = r#"{
		"pointer_width": 4,
		"variant": { "address": "0x20000" },
		"regions": [
			{ "base": "0x20000", "hex": "0840 0000 0000 0000 1000 0300 0000 0000" },
			{ "base": 196624, "hex": "2400 0300" },
			{ "base": "0x30020", "hex": "0400 0000 6800 6900 0000" }
		]
	}"#;
	let loaded = VariantImage::from_bytes(json.as_bytes().to_vec()).expect("image").load().expect("load");
	assert_eq!(loaded.variant_addr, Some(0x2_0000));
	assert_eq!(loaded.memory.len(), 3);
	assert_eq!(loaded.variant.tag().raw(), 0x4008);
	assert_eq!(loaded.variant.ptr(), 0x3_0010);
	let value = decode_with(&loaded.variant, &loaded.memory, &loaded.records, &loaded.decode_options()).expect("decode");
	assert_eq!(value, Value::String("hi".into()));
}

#[test]
fn records_objects_and_primitives_are_registered() {
	let json = r#"{
		"pointer_width": 8,
		"variant": "2400 0000 0000 0000 0000 0100 0000 0000 0070 0000 0000 0000",
		"regions": [{ "base": "0x10000", "hex": "07000000" }],
		"records": [
			{ "address": "0x7000", "guid": "6b29fc40-ca47-1067-b31d-00dd010662da", "size": 4 },
			{ "address": "0x7100", "status": "E_NOTIMPL" },
			{ "address": "0x7200", "status": "0x80001234" }
		],
		"record_primitives": [{ "guid": "6b29fc40-ca47-1067-b31d-00dd010662da", "vt": "VT_I4" }],
		"objects": [{ "address": "0x7000", "refs": 3 }]
	}"#;
	let loaded = VariantImage::from_bytes(json.as_bytes().to_vec()).expect("image").load().expect("load");
	assert_eq!(loaded.records.len(), 3);
	assert_eq!(loaded.objects.count(0x7000), 3);
	assert_eq!(loaded.records.get(0x7100).expect("provider").guid(), Err(Hresult::E_NOTIMPL));
	assert_eq!(loaded.records.get(0x7200).expect("provider").guid(), Err(Hresult(0x8000_1234)));

	let value = decode_with(&loaded.variant, &loaded.memory, &loaded.records, &loaded.decode_options()).expect("decode");
	assert_eq!(value, Value::I32(7));
}

#[test]
fn zstd_images_are_accepted() {
	let packed = zstd::encode_all(I4_INLINE.as_bytes(), 3).expect("compress");
	let image = VariantImage::from_bytes(packed).expect("image");
	assert_eq!(image.compression, Compression::Zstd);
	assert_eq!(image.load().expect("load").variant.tag(), VarTag::from(VarType::I4));
}

#[test]
fn malformed_images_are_input_errors() {
	let cases = [
		r#"{ "pointer_width": 2, "variant": "" }"#,
		r#"{ "pointer_width": 8, "variant": "030" }"#,
		r#"{ "pointer_width": 8, "variant": "zz" }"#,
		r#"{ "pointer_width": 8, "variant": "0300" }"#,
		r#"{ "pointer_width": 8, "variant": "", "extra": 1 }"#,
		r#"{ "pointer_width": 8 }"#,
	];
	for json in cases {
		let err = VariantImage::from_bytes(json.as_bytes().to_vec()).and_then(|image| image.load()).expect_err(json);
		assert_eq!(err.category(), ErrorCategory::Input, "{json}: {err}");
	}

	let unknown_vt = r#"{ "pointer_width": 8, "variant": "", "record_primitives": [{ "guid": "6b29fc40-ca47-1067-b31d-00dd010662da", "vt": "VT_NOPE" }] }"#;
	let err = VariantImage::from_bytes(unknown_vt.as_bytes().to_vec()).expect("parse").load().expect_err("vt");
	assert!(matches!(err, VariantError::InvalidImage { .. }));
}

#[test]
fn overlapping_regions_fail_to_load() {
	let json = r#"{
		"pointer_width": 8,
		"variant": { "address": "0x10000" },
		"regions": [{ "base": "0x10000", "hex": "00000000" }, { "base": "0x10002", "hex": "0000" }]
	}"#;
	let err = VariantImage::from_bytes(json.as_bytes().to_vec()).expect("image").load().expect_err("overlap");
	assert!(matches!(err, VariantError::RegionOverlap { base: 0x1_0002, .. }));
}
