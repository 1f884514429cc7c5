use super::*;
use crate::variant::{RefCounts, encode};

fn i4(value: i32) -> Vec<u8> {
	value.to_le_bytes().to_vec()
}

#[test]
fn descriptor_layout_matches_native_offsets() {
	for width in [PointerWidth::P32, PointerWidth::P64] {
		let mut memory = AddressSpace::new(width);
		let ptr = create(&mut memory, VarType::I4, &[ArrayBound::new(1, 2), ArrayBound::new(2, 3)]).expect("create");

		assert_eq!(memory.read_u16(ptr).expect("cDims"), 2);
		let features = ArrayFeatures::from_bits_retain(memory.read_u16(ptr + 2).expect("fFeatures"));
		assert_eq!(features, ArrayFeatures::HAVEVARTYPE);
		assert_eq!(memory.read_u32(ptr + 4).expect("cbElements"), 4);
		assert_eq!(memory.read_u32(ptr + 8).expect("cLocks"), 0);
		assert_eq!(memory.read_u32(ptr - 4).expect("vartype"), 3);

		let data_at = if width == PointerWidth::P32 { 12 } else { 16 };
		let bounds_at = width.safearray_size() as u64 - 8;
		assert_ne!(memory.read_ptr(ptr + data_at).expect("pvData"), 0);

		// Rightmost dimension is stored first.
		assert_eq!(memory.read_u32(ptr + bounds_at).expect("cElements[0]"), 3);
		assert_eq!(memory.read_i32(ptr + bounds_at + 4).expect("lLbound[0]"), 2);
		assert_eq!(memory.read_u32(ptr + bounds_at + 8).expect("cElements[1]"), 2);
		assert_eq!(memory.read_i32(ptr + bounds_at + 12).expect("lLbound[1]"), 1);

		assert_eq!(bounds(&memory, ptr).expect("bounds"), vec![ArrayBound::new(1, 2), ArrayBound::new(2, 3)]);
	}
}

#[test]
fn elements_are_stored_column_major() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	let dims = [ArrayBound::new(1, 2), ArrayBound::new(2, 3)];
	let ptr = create(&mut memory, VarType::I4, &dims).expect("create");

	let mut next = 1;
	for row in 1..=2 {
		for col in 2..=4 {
			put_element(&mut memory, ptr, &[row, col], &i4(next)).expect("put");
			next += 1;
		}
	}

	let view = SafeArrayView::read(&memory, ptr).expect("view");
	let raw = view.data_bytes(&memory, 6).expect("data");
	let stored: Vec<i32> = raw.chunks_exact(4).map(|chunk| i32::from_le_bytes(chunk.try_into().expect("4 bytes"))).collect();
	assert_eq!(stored, vec![1, 4, 2, 5, 3, 6]);

	assert_eq!(get_element(&memory, ptr, &[2, 4]).expect("get"), i4(6));
	assert_eq!(row_major_slots(&dims).expect("slots"), vec![0, 2, 4, 1, 3, 5]);
}

#[test]
fn element_access_checks_indices() {
	let mut memory = AddressSpace::new(PointerWidth::P32);
	let ptr = create(&mut memory, VarType::I2, &[ArrayBound::new(-5, 10)]).expect("create");

	put_element(&mut memory, ptr, &[-5], &7_i16.to_le_bytes()).expect("lowest index");
	put_element(&mut memory, ptr, &[4], &9_i16.to_le_bytes()).expect("highest index");
	assert_eq!(get_element(&memory, ptr, &[-5]).expect("get"), 7_i16.to_le_bytes().to_vec());

	assert!(matches!(get_element(&memory, ptr, &[5]), Err(VariantError::IndexOutOfBounds { dim: 0, index: 5 })));
	assert!(matches!(get_element(&memory, ptr, &[0, 0]), Err(VariantError::IndexRankMismatch { expected: 1, got: 2 })));
	assert!(matches!(
		put_element(&mut memory, ptr, &[0], &[0; 4]),
		Err(VariantError::ElementSizeMismatch { expected: 2, got: 4 })
	));
}

#[test]
fn huge_bounds_report_overflow_instead_of_wrapping() {
	let huge = [ArrayBound::new(0, u32::MAX); 3];
	let last = i64::from(u32::MAX) - 1;
	assert!(matches!(storage_slot(&huge, &[last, last, last]), Err(VariantError::ArrayTooLarge { .. })));
	assert!(matches!(row_major_slots(&huge), Err(VariantError::ArrayTooLarge { .. })));

	let mut with_empty = huge.to_vec();
	with_empty.push(ArrayBound::new(0, 0));
	assert_eq!(row_major_slots(&with_empty).expect("empty"), Vec::<usize>::new());
}

#[test]
fn element_type_follows_feature_flags() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	let dims = [ArrayBound::new(0, 1)];

	let unknown = create(&mut memory, VarType::Unknown, &dims).expect("unknown");
	let dispatch = create(&mut memory, VarType::Dispatch, &dims).expect("dispatch");
	let bstr = create(&mut memory, VarType::Bstr, &dims).expect("bstr");
	let record = create_record(&mut memory, &dims, 0x7000, 4).expect("record");

	let view = |ptr| SafeArrayView::read(&memory, ptr).expect("view");
	assert_eq!(view(unknown).element_type(), Some(VarType::Unknown.into()));
	assert_eq!(view(dispatch).element_type(), Some(VarType::Dispatch.into()));
	assert_eq!(view(bstr).element_type(), Some(VarType::Bstr.into()));
	assert_eq!(view(record).element_type(), Some(VarType::Record.into()));
	assert_eq!(view(record).record_info(), 0x7000);
	assert!(view(dispatch).features().contains(ArrayFeatures::HAVEIID | ArrayFeatures::DISPATCH));

	memory.write(unknown + 2, &0_u16.to_le_bytes()).expect("clear features");
	assert_eq!(SafeArrayView::read(&memory, unknown).expect("view").element_type(), None);
}

#[test]
fn rank_limits_apply_before_bounds_are_read() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	let ptr = create(&mut memory, VarType::I4, &[ArrayBound::new(0, 1)]).expect("create");

	memory.write(ptr, &33_u16.to_le_bytes()).expect("set rank");
	let view = SafeArrayView::read(&memory, ptr).expect("header still reads");
	assert!(matches!(view.bounds(&memory), Err(VariantError::RankTooLarge { rank: 33, max: 32 })));

	memory.write(ptr, &0_u16.to_le_bytes()).expect("zero rank");
	assert!(matches!(bounds(&memory, ptr), Err(VariantError::ZeroRankArray)));

	let too_many = vec![ArrayBound::new(0, 1); MAX_ARRAY_RANK + 1];
	assert!(matches!(create(&mut memory, VarType::I4, &too_many), Err(VariantError::RankTooLarge { .. })));
}

#[test]
fn create_rejects_types_without_elements() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	for vt in [VarType::Empty, VarType::Null, VarType::Record, VarType::Void] {
		let err = create(&mut memory, vt, &[ArrayBound::new(0, 1)]).expect_err("no element type");
		assert!(matches!(err, VariantError::UnsupportedType { .. }));
	}
}

#[test]
fn empty_arrays_have_no_data() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	let ptr = create(&mut memory, VarType::R8, &[ArrayBound::new(3, 0)]).expect("create");
	let view = SafeArrayView::read(&memory, ptr).expect("view");
	assert_eq!(view.data(), 0);
	assert_eq!(view.data_bytes(&memory, 0).expect("no data"), &[] as &[u8]);
}

#[test]
fn destroy_releases_element_resources() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	let mut objects = RefCounts::new();
	objects.register(0x9000, 2);

	let dims = [ArrayBound::new(0, 2)];
	let strings = create(&mut memory, VarType::Bstr, &dims).expect("bstr array");
	let hello = encode::init_bstr(&mut memory, "hello").expect("bstr");
	let hello_ptr = hello.ptr();
	put_element(&mut memory, strings, &[0], &hello_ptr.to_le_bytes()).expect("put");

	let report = destroy(&mut memory, strings, &mut objects).expect("destroy");
	assert_eq!(report.freed.len(), 3, "string, data and descriptor are freed");
	assert!(memory.resolve(hello_ptr).is_none());
	assert!(memory.resolve(strings).is_none());

	let unknowns = create(&mut memory, VarType::Unknown, &dims).expect("unknown array");
	put_element(&mut memory, unknowns, &[1], &0x9000_u64.to_le_bytes()).expect("put");
	let report = destroy(&mut memory, unknowns, &mut objects).expect("destroy");
	assert_eq!(report.released, vec![0x9000]);
	assert_eq!(objects.count(0x9000), 1);

	let variants = create(&mut memory, VarType::Variant, &dims).expect("variant array");
	let text = encode::init_bstr(&mut memory, "nested").expect("bstr");
	let text_ptr = text.ptr();
	put_element(&mut memory, variants, &[0], text.as_bytes()).expect("put");
	destroy(&mut memory, variants, &mut objects).expect("destroy");
	assert!(memory.resolve(text_ptr).is_none());
	assert!(memory.is_empty());
}

#[test]
fn destroy_refuses_locked_arrays() {
	let mut memory = AddressSpace::new(PointerWidth::P32);
	let mut objects = RefCounts::new();
	let ptr = create(&mut memory, VarType::I4, &[ArrayBound::new(0, 1)]).expect("create");
	memory.write_u32(ptr + 8, 1).expect("lock");

	let err = destroy(&mut memory, ptr, &mut objects).expect_err("locked");
	assert!(matches!(err, VariantError::ArrayLocked { locks: 1, .. }));
	assert!(memory.resolve(ptr).is_some());
}
