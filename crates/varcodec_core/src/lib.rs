//! Decoder and encoder for OLE Automation `VARIANT` and `SAFEARRAY` memory layouts.

/// Variant tags, buffers, array descriptors, and the decode/encode/clear entry points.
pub mod variant;
