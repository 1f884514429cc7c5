use serde_json::{Map, Value as JsonValue, json};
use varcodec::variant::{Base, Result, Value, VarFlags, VarTag, VariantError};

/// Parse a decimal or `0x`-prefixed hex tag literal.
pub(crate) fn parse_tag(value: &str) -> Result<VarTag> {
	let parsed = if let Some(stripped) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		u16::from_str_radix(stripped, 16)
	} else {
		value.parse::<u16>()
	};

	parsed.map(VarTag).map_err(|_| VariantError::invalid_image(format!("invalid tag literal {value:?}")))
}

/// Render a pointer as `0x`-prefixed hex.
pub(crate) fn ptr_hex(ptr: u64) -> String {
	format!("0x{ptr:x}")
}

/// Render a raw tag as four hex digits.
pub(crate) fn tag_hex(tag: VarTag) -> String {
	format!("0x{:04x}", tag.raw())
}

/// Names of the modifier flags set in `tag`.
pub(crate) fn flag_names(tag: VarTag) -> Vec<&'static str> {
	let flags = tag.flags();
	let mut names = Vec::new();
	if flags.contains(VarFlags::BYREF) {
		names.push("VT_BYREF");
	}
	if flags.contains(VarFlags::ARRAY) {
		names.push("VT_ARRAY");
	}
	if flags.contains(VarFlags::VECTOR) {
		names.push("VT_VECTOR");
	}
	names
}

/// Base name and classification of a tag's base code.
pub(crate) fn base_label(tag: VarTag) -> (String, &'static str) {
	match tag.base() {
		Base::Known(ty) => (ty.name().to_owned(), "assigned"),
		Base::Unassigned(code) => (format!("0x{code:x}"), "unassigned"),
		Base::Reserved(code) => (format!("0x{code:x}"), "reserved"),
	}
}

/// Print a JSON payload on stdout.
pub(crate) fn emit_json<T: serde::Serialize>(payload: &T) {
	match serde_json::to_string_pretty(payload) {
		Ok(text) => println!("{text}"),
		Err(err) => eprintln!("error: failed to render json: {err}"),
	}
}

/// Convert a decoded value to a tagged JSON object.
pub(crate) fn value_to_json(value: &Value) -> JsonValue {
	let data = match value {
		Value::Empty | Value::Absent | Value::Null => JsonValue::Null,
		Value::Address(v) => json!(ptr_hex(*v)),
		Value::Bool(v) => json!(v),
		Value::I8(v) => json!(v),
		Value::U8(v) => json!(v),
		Value::I16(v) => json!(v),
		Value::U16(v) => json!(v),
		Value::I32(v) => json!(v),
		Value::U32(v) => json!(v),
		Value::I64(v) => json!(v),
		Value::U64(v) => json!(v),
		Value::F32(v) => json!(v),
		Value::F64(v) => json!(v),
		Value::Currency(v) => json!(v.to_string()),
		Value::Decimal(v) => json!(v.to_string()),
		Value::DateTime(v) => json!(v.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()),
		Value::String(v) => json!(v),
		Value::Guid(v) => json!(v.to_string()),
		Value::Unknown(v) | Value::Dispatch(v) => json!(ptr_hex(v.addr())),
		Value::Vector(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
		Value::Array(array) => {
			let mut out = Map::new();
			out.insert("element_type".to_owned(), json!(array.element_type().name()));
			out.insert("bounds".to_owned(), array.bounds().iter().map(|bound| json!({ "lower": bound.lower, "count": bound.count })).collect());
			out.insert("elements".to_owned(), array.elements().iter().map(value_to_json).collect());
			JsonValue::Object(out)
		}
	};

	json!({ "kind": value.kind(), "value": data })
}

/// Render a decoded value as one line of text.
pub(crate) fn value_text(value: &Value) -> String {
	match value {
		Value::Empty => "empty".to_owned(),
		Value::Absent => "absent".to_owned(),
		Value::Null => "null".to_owned(),
		Value::Address(v) => ptr_hex(*v),
		Value::String(v) => format!("{v:?}"),
		Value::Unknown(v) => format!("unknown@{}", ptr_hex(v.addr())),
		Value::Dispatch(v) => format!("dispatch@{}", ptr_hex(v.addr())),
		Value::Vector(items) => format!("[{}]", items.iter().map(value_text).collect::<Vec<_>>().join(", ")),
		Value::Array(array) => {
			let dims: Vec<String> = array.bounds().iter().map(|bound| format!("{}..{}", bound.lower, i64::from(bound.lower) + i64::from(bound.count))).collect();
			format!("{}[{}] [{}]", array.element_type().name(), dims.join(", "), array.elements().iter().map(value_text).collect::<Vec<_>>().join(", "))
		}
		Value::Bool(v) => v.to_string(),
		Value::I8(v) => v.to_string(),
		Value::U8(v) => v.to_string(),
		Value::I16(v) => v.to_string(),
		Value::U16(v) => v.to_string(),
		Value::I32(v) => v.to_string(),
		Value::U32(v) => v.to_string(),
		Value::I64(v) => v.to_string(),
		Value::U64(v) => v.to_string(),
		Value::F32(v) => v.to_string(),
		Value::F64(v) => v.to_string(),
		Value::Currency(v) => v.to_string(),
		Value::Decimal(v) => v.to_string(),
		Value::DateTime(v) => v.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
		Value::Guid(v) => v.to_string(),
	}
}
