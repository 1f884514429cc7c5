use std::path::PathBuf;

use varcodec::variant::{Result, VariantImage, clear, clear_at};

use crate::cmd::util::{emit_json, ptr_hex, tag_hex};

#[derive(clap::Args)]
pub struct Args {
	pub path: PathBuf,
	/// Print JSON instead of text.
	#[arg(long)]
	pub json: bool,
}

/// Clear the image variant and report what was released.
pub fn run(args: Args) -> Result<()> {
	let image = VariantImage::open(&args.path)?;
	let mut loaded = image.load()?;
	let tag = loaded.variant.tag();

	// A variant living in mapped memory is cleared in place.
	let report = match loaded.variant_addr {
		Some(addr) => clear_at(&mut loaded.memory, addr, &mut loaded.objects)?,
		None => clear(&mut loaded.variant, &mut loaded.memory, &mut loaded.objects),
	};

	let released: Vec<String> = report.released.iter().copied().map(ptr_hex).collect();
	let freed: Vec<String> = report.freed.iter().copied().map(ptr_hex).collect();
	let live: Vec<ObjectJson> = loaded.objects.iter().map(|(addr, refs)| ObjectJson { address: ptr_hex(addr), refs }).collect();

	if args.json {
		emit_json(&ClearJson {
			path: args.path.display().to_string(),
			raw_tag: tag_hex(tag),
			released,
			freed,
			failures: report.failures,
			regions_left: loaded.memory.len(),
			objects: live,
		});
		return Ok(());
	}

	println!("path: {}", args.path.display());
	println!("tag: {tag}");
	println!("released: {}", list_or_none(&released));
	println!("freed: {}", list_or_none(&freed));
	println!("failures: {}", report.failures);
	println!("regions_left: {}", loaded.memory.len());
	for object in &live {
		println!("  {}: {}", object.address, object.refs);
	}
	Ok(())
}

fn list_or_none(items: &[String]) -> String {
	if items.is_empty() { "none".to_owned() } else { items.join(", ") }
}

#[derive(serde::Serialize)]
struct ClearJson {
	path: String,
	raw_tag: String,
	released: Vec<String>,
	freed: Vec<String>,
	failures: usize,
	regions_left: usize,
	objects: Vec<ObjectJson>,
}

#[derive(serde::Serialize)]
struct ObjectJson {
	address: String,
	refs: u32,
}
