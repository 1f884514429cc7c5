/// Variant clear command.
pub mod clear;
/// Variant decode command.
pub mod decode;
/// Image-level information command.
pub mod info;
/// Raw tag explanation command.
pub mod tag;

mod util;
