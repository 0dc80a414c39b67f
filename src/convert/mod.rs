//! Conversion-service client module for Audio Digitizer.
//!
//! This module provides:
//! * [`ConversionService`] — async trait implemented by conversion backends.
//! * [`HttpConversionClient`] — multipart HTTP client for the real service.
//! * [`SubmitRequest`] / [`SubmissionError`] — one round trip and its failures.
//! * [`ConvertResponse`] / [`WireVariant`] — wire shapes of the JSON response.
//! * [`decode_results`] — tagged per-entry decoding into published variants.
//! * [`VariantStore`] / [`VariantHandle`] — epoch-scoped payload storage with
//!   revocable handles.
//! * [`BitDepth`] / [`VariantFormat`] / [`ResultVariant`] — the result model.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audio_digitizer::audio::SampleBuffer;
//! use audio_digitizer::config::AppConfig;
//! use audio_digitizer::convert::{
//!     new_shared_store, BitDepth, ConversionService, HttpConversionClient, SubmitRequest,
//! };
//! use audio_digitizer::wav::encode;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let store = new_shared_store();
//!     let client = HttpConversionClient::from_config(&config.api, store.clone());
//!
//!     // One second of silence stands in for a real recording here.
//!     let buffer = SampleBuffer::new(44_100, vec![vec![0.0; 44_100]]).unwrap();
//!     let request = SubmitRequest {
//!         wav: encode(&buffer).unwrap(),
//!         bit_depth: BitDepth::Sixteen,
//!         use_selection: false,
//!         format: None,
//!     };
//!
//!     for variant in client.submit(request).await.unwrap() {
//!         println!(
//!             "{} {} bits ({:.2} KB)",
//!             variant.format,
//!             variant.bit_depth,
//!             variant.size_kb()
//!         );
//!     }
//! }
//! ```

pub mod client;
pub mod response;
pub mod store;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ConversionService, HttpConversionClient, SubmissionError, SubmitRequest};
pub use response::{decode_entry, decode_results, ConvertResponse, DecodedEntry, WireVariant};
pub use store::{new_shared_store, SharedVariantStore, StoreError, VariantHandle, VariantStore};
pub use types::{BitDepth, ResultVariant, VariantFormat};
