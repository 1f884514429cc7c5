use std::path::PathBuf;

use varcodec::variant::{Result, VariantImage};

use crate::cmd::util::{base_label, flag_names, ptr_hex, tag_hex};

#[derive(clap::Args)]
pub struct Args {
	pub path: PathBuf,
}

/// Print image layout and the raw tag breakdown.
pub fn run(args: Args) -> Result<()> {
	let Args { path } = args;

	let image = VariantImage::open(&path)?;
	let loaded = image.load()?;
	let width = image.pointer_width;
	let tag = loaded.variant.tag();
	let (base, class) = base_label(tag);
	let flags = flag_names(tag);

	println!("path: {}", path.display());
	println!("compression: {}", image.compression.as_str());
	println!("pointer_size: {}", width.bytes());
	println!("variant_size: {}", width.variant_size());
	match loaded.variant_addr {
		Some(addr) => println!("variant_at: {}", ptr_hex(addr)),
		None => println!("variant_at: inline"),
	}
	println!("raw_tag: {}", tag_hex(tag));
	println!("tag: {tag}");
	println!("base: {base} ({class})");
	println!("flags: {}", if flags.is_empty() { "none".to_owned() } else { flags.join("|") });
	println!("empty: {}", loaded.variant.is_empty());
	println!("regions: {}", loaded.memory.len());
	println!("records: {}", loaded.records.len());
	println!("objects: {}", loaded.objects.iter().count());

	Ok(())
}
