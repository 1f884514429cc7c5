use std::path::PathBuf;

use varcodec::variant::{DecodeMode, Result, VariantImage, decode_with};

use crate::cmd::util::{emit_json, tag_hex, value_text, value_to_json};

#[derive(clap::Args)]
pub struct Args {
	pub path: PathBuf,
	/// Use the legacy-compatible conversion.
	#[arg(long)]
	pub strict: bool,
	/// Print JSON instead of text.
	#[arg(long)]
	pub json: bool,
	/// Maximum total array elements materialized.
	#[arg(long)]
	pub max_array_elems: Option<usize>,
	/// Maximum nesting depth of variants inside variants.
	#[arg(long)]
	pub max_depth: Option<u32>,
}

/// Decode the image variant and print the resulting value.
pub fn run(args: Args) -> Result<()> {
	let image = VariantImage::open(&args.path)?;
	let loaded = image.load()?;

	let mut options = loaded.decode_options();
	if args.strict {
		options.mode = DecodeMode::Strict;
	}
	if let Some(max) = args.max_array_elems {
		options.max_array_elems = max;
	}
	if let Some(max) = args.max_depth {
		options.max_depth = max;
	}

	let tag = loaded.variant.tag();
	let value = match decode_with(&loaded.variant, &loaded.memory, &loaded.records, &options) {
		Ok(value) => value,
		Err(err) => {
			if args.json {
				emit_json(&DecodeFailureJson {
					path: args.path.display().to_string(),
					mode: options.mode.as_str(),
					raw_tag: tag_hex(tag),
					category: err.category().as_str(),
					error_tag: err.raw_tag().map(tag_hex),
					message: err.to_string(),
				});
			}
			return Err(err);
		}
	};

	if args.json {
		emit_json(&DecodeJson {
			path: args.path.display().to_string(),
			mode: options.mode.as_str(),
			raw_tag: tag_hex(tag),
			tag: tag.to_string(),
			value: value_to_json(&value),
		});
		return Ok(());
	}

	println!("path: {}", args.path.display());
	println!("mode: {}", options.mode.as_str());
	println!("tag: {tag}");
	println!("kind: {}", value.kind());
	println!("value: {}", value_text(&value));
	Ok(())
}

#[derive(serde::Serialize)]
struct DecodeJson {
	path: String,
	mode: &'static str,
	raw_tag: String,
	tag: String,
	value: serde_json::Value,
}

#[derive(serde::Serialize)]
struct DecodeFailureJson {
	path: String,
	mode: &'static str,
	raw_tag: String,
	category: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	error_tag: Option<String>,
	message: String,
}
