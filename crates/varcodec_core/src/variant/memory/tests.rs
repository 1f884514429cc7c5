use crate::variant::{AddressSpace, PointerWidth, VariantError};

#[test]
fn resolve_maps_pointers_inside_regions() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	memory.map(0x1000, vec![1, 2, 3, 4]).expect("map first");
	memory.map(0x2000, vec![5, 6]).expect("map second");

	let base = memory.resolve(0x1000).expect("base resolves");
	assert_eq!(base.byte_offset, 0);

	let inside = memory.resolve(0x1003).expect("inside resolves");
	assert_eq!(inside.byte_offset, 3);
	assert_eq!(inside.slice_from(1), Some(&[4_u8][..]));
	assert_eq!(inside.slice_from(2), None);

	assert!(memory.resolve(0).is_none());
	assert!(memory.resolve(0x0fff).is_none());
	assert!(memory.resolve(0x1004).is_none());
	assert_eq!(memory.resolve(0x2001).expect("second").region.base, 0x2000);
}

#[test]
fn map_rejects_overlap() {
	let mut memory = AddressSpace::new(PointerWidth::P32);
	memory.map(0x1000, vec![0; 16]).expect("map");
	let err = memory.map(0x100f, vec![0; 4]).expect_err("overlap must fail");
	assert!(matches!(err, VariantError::RegionOverlap { base: 0x100f, len: 4 }));
	memory.map(0x1010, vec![0; 4]).expect("adjacent region maps");
}

#[test]
fn alloc_is_aligned_nonzero_and_skips_mapped_regions() {
	let mut memory = AddressSpace::new(PointerWidth::P32);
	memory.map(0x1_0000, vec![0; 64]).expect("map at allocator floor");

	let first = memory.alloc(3).expect("alloc");
	let second = memory.alloc_bytes(vec![9; 40]).expect("alloc bytes");

	assert_ne!(first, 0);
	assert_eq!(first % 16, 0);
	assert_eq!(second % 16, 0);
	assert!(first >= 0x1_0040, "allocation must not overlap the mapped region");
	assert!(second >= first + 16);
	assert!(second < 0x1_0000_0000);
	assert_eq!(memory.read(first, 3).expect("zeroed"), &[0, 0, 0]);
	assert_eq!(memory.read(second + 39, 1).expect("initialised"), &[9]);
}

#[test]
fn read_and_write_report_shortfall() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	let ptr = memory.alloc(8).expect("alloc");

	memory.write(ptr + 4, &0xdead_beef_u32.to_le_bytes()).expect("write fits");
	assert_eq!(memory.read_u32(ptr + 4).expect("read back"), 0xdead_beef);

	let err = memory.write(ptr + 6, &[0; 4]).expect_err("write overruns");
	assert!(matches!(err, VariantError::OutOfBounds { need: 4, have: 2, .. }));

	let err = memory.read(0x10, 1).expect_err("unmapped");
	assert!(matches!(err, VariantError::UnmappedPointer { ptr: 0x10 }));
}

#[test]
fn pointers_follow_width() {
	let mut memory = AddressSpace::new(PointerWidth::P32);
	let ptr = memory.alloc(8).expect("alloc");
	memory.write_ptr(ptr, 0x1234_5678).expect("write ptr");
	assert_eq!(memory.read_ptr(ptr).expect("read ptr"), 0x1234_5678);
	assert_eq!(memory.read_u32(ptr + 4).expect("untouched"), 0);

	let err = memory.write_ptr(ptr, 0x1_0000_0000).expect_err("too wide");
	assert!(matches!(err, VariantError::PointerTooWide { bits: 32, .. }));
}

#[test]
fn c_string_scans_stop_at_terminator() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	let narrow = memory.alloc_bytes(b"abc\0def".to_vec()).expect("narrow");
	assert_eq!(memory.read_cstr(narrow).expect("narrow"), b"abc");

	let wide = memory.alloc_bytes(vec![b'h', 0, b'i', 0, 0, 0]).expect("wide");
	assert_eq!(memory.read_wstr(wide).expect("wide"), vec![u16::from(b'h'), u16::from(b'i')]);

	let unterminated = memory.alloc_bytes(vec![b'x', 0]).expect("unterminated");
	assert!(matches!(memory.read_wstr(unterminated), Err(VariantError::OutOfBounds { .. })));
}

#[test]
fn free_releases_exact_bases_and_containing_regions() {
	let mut memory = AddressSpace::new(PointerWidth::P64);
	let a = memory.alloc(32).expect("a");
	let b = memory.alloc(32).expect("b");

	assert!(!memory.free(a + 4));
	assert!(memory.free(a));
	assert!(!memory.free(a));
	assert_eq!(memory.free_containing(b + 8), Some(b));
	assert!(memory.is_empty());
}
