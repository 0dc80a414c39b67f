//! Wire parsing for conversion responses.
//!
//! A successful response body carries `{ "results": [ … ] }` where each
//! entry declares a format, a bit depth, a base64 payload, a mime type and
//! a size.  Entries are decoded independently: a descriptor that cannot be
//! decoded (bad base64, unknown format, unsupported depth) is skipped with
//! a logged reason and never sinks its siblings.  A body with no `results`
//! array at all is a protocol violation handled by the caller.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use super::store::VariantStore;
use super::types::{BitDepth, ResultVariant, VariantFormat};

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// Top-level response body.  `results` is optional on purpose: its absence
/// is meaningful and distinguishes "no results" from "not even a result
/// list".
#[derive(Debug, Deserialize)]
pub struct ConvertResponse {
    #[serde(default)]
    pub results: Option<Vec<WireVariant>>,
}

/// One result descriptor as found on the wire.  Every field is optional so
/// a single malformed entry deserialises instead of failing the whole body.
#[derive(Debug, Default, Deserialize)]
pub struct WireVariant {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub bit_depth: Option<i64>,
    /// Base64 payload.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size as declared by the service.  Parsed for wire compatibility; the
    /// decoded payload length is what gets published.
    #[serde(default)]
    pub size: Option<u64>,
}

// ---------------------------------------------------------------------------
// Per-entry decoding
// ---------------------------------------------------------------------------

/// Outcome of decoding one wire entry.
#[derive(Debug)]
pub enum DecodedEntry {
    Ok(DecodedVariant),
    Skip { reason: String },
}

/// A fully decoded entry, not yet published to a store.
#[derive(Debug)]
pub struct DecodedVariant {
    pub format: VariantFormat,
    pub bit_depth: BitDepth,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

fn skip(reason: impl Into<String>) -> DecodedEntry {
    DecodedEntry::Skip {
        reason: reason.into(),
    }
}

/// Decode one wire entry, tagging it `Ok` or `Skip` with the reason.
pub fn decode_entry(wire: &WireVariant) -> DecodedEntry {
    let Some(format_str) = wire.format.as_deref() else {
        return skip("missing format");
    };
    let format = match format_str.parse::<VariantFormat>() {
        Ok(format) => format,
        Err(err) => return skip(err.to_string()),
    };

    let Some(depth_raw) = wire.bit_depth else {
        return skip("missing bit depth");
    };
    let bit_depth = match BitDepth::try_from(depth_raw) {
        Ok(depth) => depth,
        Err(err) => return skip(err.to_string()),
    };

    let Some(content) = wire.content.as_deref() else {
        return skip("missing content");
    };
    let bytes = match BASE64.decode(content) {
        Ok(bytes) => bytes,
        Err(err) => return skip(format!("undecodable content: {err}")),
    };

    let mime_type = wire
        .mime_type
        .clone()
        .unwrap_or_else(|| format.mime_type().to_string());

    DecodedEntry::Ok(DecodedVariant {
        format,
        bit_depth,
        mime_type,
        bytes,
    })
}

/// Decode a whole result list, publishing the survivors into `store`.
///
/// Skipped entries are logged and excluded; the returned list preserves
/// wire order.  May be empty when every entry was skipped — the caller
/// decides what an empty set means.
pub fn decode_results(wire: Vec<WireVariant>, store: &mut VariantStore) -> Vec<ResultVariant> {
    let mut variants = Vec::with_capacity(wire.len());
    for (index, entry) in wire.iter().enumerate() {
        match decode_entry(entry) {
            DecodedEntry::Ok(decoded) => {
                let size_bytes = decoded.bytes.len();
                let handle = store.publish(decoded.bytes);
                variants.push(ResultVariant {
                    format: decoded.format,
                    bit_depth: decoded.bit_depth,
                    mime_type: decoded.mime_type,
                    size_bytes,
                    handle,
                });
            }
            DecodedEntry::Skip { reason } => {
                log::warn!("convert: skipping result {index}: {reason}");
            }
        }
    }
    variants
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
