use varcodec::variant::{Base, PointerWidth, Result, element_size};

use crate::cmd::util::{base_label, flag_names, parse_tag, tag_hex};

#[derive(clap::Args)]
pub struct Args {
	/// Raw tag, decimal or `0x` hex.
	pub value: String,
}

/// Explain a raw tag value.
pub fn run(args: Args) -> Result<()> {
	let tag = parse_tag(&args.value)?;
	let (base, class) = base_label(tag);
	let flags = flag_names(tag);

	println!("raw_tag: {}", tag_hex(tag));
	println!("tag: {tag}");
	println!("base_code: 0x{:04x}", tag.base_code());
	println!("base: {base} ({class})");
	println!("flags: {}", if flags.is_empty() { "none".to_owned() } else { flags.join("|") });
	if let Base::Known(ty) = tag.base() {
		for width in [PointerWidth::P32, PointerWidth::P64] {
			let size = element_size(ty, width).map_or_else(|| "none".to_owned(), |size| size.to_string());
			println!("element_size_{}: {size}", width.bits());
		}
	}

	Ok(())
}
