use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use uuid::Uuid;

use crate::variant::{Result, VariantError};

const MILLIS_PER_DAY: i64 = 86_400_000;
const TICKS_PER_SECOND: i64 = 10_000_000;
/// Exclusive lower limit of valid OLE Automation dates (0100-01-01).
pub const OA_DATE_MIN: f64 = -657_435.0;
/// Exclusive upper limit of valid OLE Automation dates (10000-01-01).
pub const OA_DATE_MAX: f64 = 2_958_466.0;

/// `VARIANT_TRUE`.
pub const VARIANT_TRUE: i16 = -1;
/// `VARIANT_FALSE`.
pub const VARIANT_FALSE: i16 = 0;

/// Day zero of the OLE Automation calendar, 1899-12-30 00:00.
pub fn oa_epoch() -> NaiveDateTime {
	NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default().and_hms_opt(0, 0, 0).unwrap_or_default()
}

/// Origin of `FILETIME` ticks, 1601-01-01 00:00 UTC.
pub fn filetime_epoch() -> NaiveDateTime {
	NaiveDate::from_ymd_opt(1601, 1, 1).unwrap_or_default().and_hms_opt(0, 0, 0).unwrap_or_default()
}

/// Convert an OLE Automation date to a calendar date-time.
///
/// The integral part counts days from [`oa_epoch`]; the fractional part is the
/// time of day and stays positive for dates before the epoch, so `-1.25`
/// means 1899-12-29 06:00. Values are rounded to the nearest millisecond.
pub fn oa_date_to_datetime(value: f64) -> Result<NaiveDateTime> {
	if !(value > OA_DATE_MIN && value < OA_DATE_MAX) {
		return Err(VariantError::InvalidDate { value });
	}

	let adjust = if value >= 0.0 { 0.5 } else { -0.5 };
	let mut millis = (value * MILLIS_PER_DAY as f64 + adjust) as i64;
	if millis < 0 {
		millis -= (millis % MILLIS_PER_DAY) * 2;
	}

	oa_epoch()
		.checked_add_signed(TimeDelta::milliseconds(millis))
		.ok_or(VariantError::InvalidDate { value })
}

/// Convert a calendar date-time to an OLE Automation date.
pub fn datetime_to_oa_date(value: NaiveDateTime) -> Result<f64> {
	let mut millis = value.signed_duration_since(oa_epoch()).num_milliseconds();
	if millis < 0 {
		let frac = millis % MILLIS_PER_DAY;
		if frac != 0 {
			millis -= (MILLIS_PER_DAY + frac) * 2;
		}
	}

	let out = millis as f64 / MILLIS_PER_DAY as f64;
	if !(out > OA_DATE_MIN && out < OA_DATE_MAX) {
		return Err(VariantError::InvalidDate { value: out });
	}
	Ok(out)
}

/// Convert `FILETIME` ticks to a calendar date-time.
pub fn filetime_to_datetime(ticks: u64) -> Result<NaiveDateTime> {
	let signed = ticks as i64;
	if signed < 0 {
		return Err(VariantError::InvalidFileTime { ticks: signed });
	}

	let seconds = signed / TICKS_PER_SECOND;
	let nanos = (signed % TICKS_PER_SECOND) * 100;
	filetime_epoch()
		.checked_add_signed(TimeDelta::seconds(seconds) + TimeDelta::nanoseconds(nanos))
		.ok_or(VariantError::InvalidFileTime { ticks: signed })
}

/// Convert a calendar date-time to `FILETIME` ticks.
pub fn datetime_to_filetime(value: NaiveDateTime) -> Result<u64> {
	let delta = value.signed_duration_since(filetime_epoch());
	let seconds = delta.num_seconds();
	let sub_ticks = i64::from(delta.subsec_nanos()) / 100;
	let ticks = seconds
		.checked_mul(TICKS_PER_SECOND)
		.and_then(|ticks| ticks.checked_add(sub_ticks))
		.ok_or(VariantError::InvalidFileTime { ticks: i64::MIN })?;
	u64::try_from(ticks).map_err(|_| VariantError::InvalidFileTime { ticks })
}

/// Interpret a `VARIANT_BOOL`: zero is false, anything else is true.
pub fn from_variant_bool(raw: i16) -> bool {
	raw != VARIANT_FALSE
}

/// Encode a `VARIANT_BOOL`.
pub fn to_variant_bool(value: bool) -> i16 {
	if value { VARIANT_TRUE } else { VARIANT_FALSE }
}

/// Read a GUID from its native mixed-endian 16-byte layout.
pub fn guid_from_native(bytes: &[u8; 16]) -> Uuid {
	Uuid::from_bytes_le(*bytes)
}

/// Encode a GUID in its native mixed-endian 16-byte layout.
pub fn guid_to_native(guid: Uuid) -> [u8; 16] {
	guid.to_bytes_le()
}

/// Decode UTF-16LE bytes, replacing unpaired surrogates. A trailing odd byte is ignored.
pub fn utf16le_lossy(bytes: &[u8]) -> String {
	let units: Vec<u16> = bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
	String::from_utf16_lossy(&units)
}

/// Encode a string as UTF-16LE bytes.
pub fn to_utf16le(text: &str) -> Vec<u8> {
	text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}
