use super::*;
use crate::variant::{ArrayBound, PointerWidth, RefCounts, VarFlags, VarTag, encode, safearray};

fn setup() -> (AddressSpace, RefCounts) {
	(AddressSpace::new(PointerWidth::P64), RefCounts::new())
}

#[test]
fn clear_frees_bstr_from_its_length_prefix() {
	let (mut memory, mut objects) = setup();
	let mut variant = encode::init_bstr(&mut memory, "text").expect("bstr");
	let ptr = variant.ptr();

	let report = clear(&mut variant, &mut memory, &mut objects);
	assert_eq!(report.freed, vec![ptr - 4]);
	assert_eq!(variant.tag(), VarTag::EMPTY);
	assert_eq!(variant.ptr(), 0);
	assert!(memory.is_empty());
}

#[test]
fn clear_releases_interfaces_once() {
	let (mut memory, mut objects) = setup();
	objects.register(0x4000, 2);

	for ty in [VarType::Unknown, VarType::Dispatch] {
		let mut variant = TaggedVariant::new(PointerWidth::P64);
		variant.set_tag(ty);
		variant.set_ptr(0x4000).expect("ptr");
		let report = clear(&mut variant, &mut memory, &mut objects);
		assert_eq!(report.released, vec![0x4000]);
	}
	assert_eq!(objects.count(0x4000), 0);
}

#[test]
fn clear_never_frees_through_byref() {
	let (mut memory, mut objects) = setup();
	let bstr = encode::init_bstr(&mut memory, "kept").expect("bstr");
	let cell = memory.alloc_bytes(bstr.ptr().to_le_bytes().to_vec()).expect("cell");
	objects.register(0x4000, 1);

	for (ty, ptr) in [(VarType::Bstr, cell), (VarType::Unknown, 0x4000), (VarType::I4, cell)] {
		let mut variant = TaggedVariant::new(PointerWidth::P64);
		variant.set_tag(ty.with(VarFlags::BYREF));
		variant.set_ptr(ptr).expect("ptr");
		let report = clear(&mut variant, &mut memory, &mut objects);
		assert_eq!(report, ClearReport::default());
		assert_eq!(variant.tag(), VarTag::EMPTY);
		assert_eq!(variant.ptr(), 0);
	}
	assert_eq!(memory.len(), 2);
	assert_eq!(objects.count(0x4000), 1);
}

#[test]
fn clear_is_idempotent() {
	let (mut memory, mut objects) = setup();
	let mut variant = encode::init_i32_vector(&mut memory, &[1, 2, 3]).expect("vector");

	let first = clear(&mut variant, &mut memory, &mut objects);
	assert_eq!(first.freed.len(), 1);
	let second = clear(&mut variant, &mut memory, &mut objects);
	assert_eq!(second, ClearReport::default());
	assert_eq!(variant.as_bytes(), &[0; 24]);
}

#[test]
fn clear_resets_scalars_and_decimal_overlay() {
	let (mut memory, mut objects) = setup();
	let mut variant = encode::encode_scalar(PointerWidth::P64, &crate::variant::Value::I64(-1)).expect("i8");
	clear(&mut variant, &mut memory, &mut objects);
	assert_eq!(variant.as_bytes(), &[0; 24]);

	let decimal = crate::variant::Decimal::from_parts(true, 2, 1, 1).expect("decimal");
	variant.set_decimal(decimal);
	clear(&mut variant, &mut memory, &mut objects);
	assert_eq!(variant.as_bytes(), &[0; 24]);
}

#[test]
fn clear_destroys_arrays_and_vector_elements() {
	let (mut memory, mut objects) = setup();
	let array = safearray::create(&mut memory, VarType::Bstr, &[ArrayBound::new(0, 1)]).expect("array");
	let item = encode::init_bstr(&mut memory, "item").expect("bstr");
	safearray::put_element(&mut memory, array, &[0], &item.ptr().to_le_bytes()).expect("put");

	let mut variant = TaggedVariant::new(PointerWidth::P64);
	variant.set_tag(VarType::Bstr.with(VarFlags::ARRAY));
	variant.set_ptr(array).expect("ptr");
	let report = clear(&mut variant, &mut memory, &mut objects);
	assert_eq!(report.freed.len(), 3);
	assert!(memory.is_empty());

	let first = encode::init_bstr(&mut memory, "a").expect("a");
	let second = encode::init_bstr(&mut memory, "b").expect("b");
	let mut elems = first.ptr().to_le_bytes().to_vec();
	elems.extend_from_slice(&second.ptr().to_le_bytes());
	let buffer = memory.alloc_bytes(elems).expect("elements");
	let mut vector = TaggedVariant::new(PointerWidth::P64);
	vector.set_tag(VarType::Bstr.with(VarFlags::VECTOR));
	vector.set_vector(2, buffer).expect("vector");

	let report = clear(&mut vector, &mut memory, &mut objects);
	assert_eq!(report.freed.len(), 3);
	assert!(memory.is_empty());
}

#[test]
fn clear_releases_record_info_and_data() {
	let (mut memory, mut objects) = setup();
	objects.register(0x7000, 1);
	let data = memory.alloc(4).expect("record data");

	let mut variant = TaggedVariant::new(PointerWidth::P64);
	variant.set_tag(VarType::Record);
	variant.set_record(data, 0x7000).expect("record");
	let report = clear(&mut variant, &mut memory, &mut objects);
	assert_eq!(report.freed, vec![data]);
	assert_eq!(report.released, vec![0x7000]);
}

#[test]
fn clear_reports_failures_but_still_resets() {
	let (mut memory, mut objects) = setup();
	let mut variant = TaggedVariant::new(PointerWidth::P64);
	variant.set_tag(VarType::Unknown);
	variant.set_ptr(0xdead_0000).expect("ptr");

	let report = clear(&mut variant, &mut memory, &mut objects);
	assert_eq!(report.failures, 1);
	assert_eq!(variant.tag(), VarTag::EMPTY);

	variant.set_tag(VarType::Lpwstr);
	variant.set_ptr(0xdead_0000).expect("ptr");
	let report = clear(&mut variant, &mut memory, &mut objects);
	assert_eq!(report.failures, 1);
	assert_eq!(variant.ptr(), 0);
}

#[test]
fn clear_at_writes_back_the_empty_variant() {
	let (mut memory, mut objects) = setup();
	let bstr = encode::init_bstr(&mut memory, "x").expect("bstr");
	let slot = memory.alloc(24).expect("slot");
	bstr.write_to(&mut memory, slot).expect("store");

	let report = clear_at(&mut memory, slot, &mut objects).expect("clear");
	assert_eq!(report.freed.len(), 1);
	assert_eq!(TaggedVariant::read_from(&memory, slot).expect("read").tag(), VarTag::EMPTY);
}
