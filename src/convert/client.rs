//! Core `ConversionService` trait and `HttpConversionClient` implementation.
//!
//! `HttpConversionClient` posts an encoded WAV container to the conversion
//! endpoint as a multipart form and decodes the JSON response into
//! [`ResultVariant`]s, publishing each payload into the shared
//! [`VariantStore`](super::store::VariantStore).  All connection details come
//! from [`ApiConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::convert::response::{decode_results, ConvertResponse};
use crate::convert::store::SharedVariantStore;
use crate::convert::types::{BitDepth, ResultVariant, VariantFormat};
use crate::wav::EncodedWav;

// ---------------------------------------------------------------------------
// SubmissionError
// ---------------------------------------------------------------------------

/// Errors that can occur while submitting a recording for conversion.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Transport failure: refused connection, DNS, timeout, dropped body.
    #[error("conversion request failed: {0}")]
    NetworkFailure(String),

    /// The service could not decode the submitted audio (HTTP 400/415/422).
    #[error("service rejected the audio: {0}")]
    DecodeFailure(String),

    /// The service answered without a usable result list.
    #[error("service returned no results")]
    EmptyResultSet,

    /// Any other non-success HTTP status.
    #[error("service responded with HTTP {0}")]
    ServerError(u16),
}

impl From<reqwest::Error> for SubmissionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SubmissionError::NetworkFailure("request timed out".into())
        } else {
            SubmissionError::NetworkFailure(e.to_string())
        }
    }
}

/// Map a non-success status to a `SubmissionError`, pulling the service's
/// `detail` message out of the body when it offers one.
fn classify_status(status: reqwest::StatusCode, body: &str) -> SubmissionError {
    match status.as_u16() {
        // Statuses the service uses when it cannot decode our container.
        400 | 415 | 422 => {
            let detail = extract_detail(body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("rejected by service")
                    .to_string()
            });
            SubmissionError::DecodeFailure(detail)
        }
        code => SubmissionError::ServerError(code),
    }
}

/// Best-effort extraction of `{"detail": "…"}` from an error body.
fn extract_detail(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("detail")?.as_str().map(str::to_string)
}

/// Turn a parsed 2xx body into published variants.
///
/// A body with no `results` array, an empty array, or an array whose every
/// entry had to be skipped all surface as
/// [`SubmissionError::EmptyResultSet`].
fn publish_response(
    body: ConvertResponse,
    store: &SharedVariantStore,
) -> Result<Vec<ResultVariant>, SubmissionError> {
    let results = match body.results {
        Some(results) if !results.is_empty() => results,
        _ => return Err(SubmissionError::EmptyResultSet),
    };

    let variants = {
        let mut store = match store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        decode_results(results, &mut store)
    };

    if variants.is_empty() {
        return Err(SubmissionError::EmptyResultSet);
    }

    Ok(variants)
}

// ---------------------------------------------------------------------------
// ConversionService trait
// ---------------------------------------------------------------------------

/// One conversion round trip.  The request owns the container bytes for the
/// duration of the call.
#[derive(Debug)]
pub struct SubmitRequest {
    /// Encoded WAV container to convert.
    pub wav: EncodedWav,
    /// Bit depth requested from the service.
    pub bit_depth: BitDepth,
    /// Whether the container holds a user-selected slice of the recording.
    pub use_selection: bool,
    /// Restricts the response to one output format when set.
    pub format: Option<VariantFormat>,
}

/// Async trait for the conversion backend.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn ConversionService>`).
#[async_trait]
pub trait ConversionService: Send + Sync {
    async fn submit(&self, request: SubmitRequest) -> Result<Vec<ResultVariant>, SubmissionError>;
}

// ---------------------------------------------------------------------------
// HttpConversionClient
// ---------------------------------------------------------------------------

/// Posts recordings to the HTTP conversion endpoint.
///
/// Decoded payloads land in the shared [`VariantStore`]; the returned
/// [`ResultVariant`]s carry handles into it.
///
/// [`VariantStore`]: super::store::VariantStore
pub struct HttpConversionClient {
    client: reqwest::Client,
    url: String,
    store: SharedVariantStore,
}

impl HttpConversionClient {
    /// Build a client from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &ApiConfig, store: SharedVariantStore) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: config.convert_url(),
            store,
        }
    }
}

/// Assemble the multipart form: `file` (the container, named `audio.wav`),
/// `bit_depth`, `use_selection` and the optional `format` restriction.
fn build_form(request: SubmitRequest) -> Result<reqwest::multipart::Form, SubmissionError> {
    let file = reqwest::multipart::Part::bytes(request.wav.into_bytes())
        .file_name("audio.wav")
        .mime_str("audio/wav")?;

    let mut form = reqwest::multipart::Form::new()
        .part("file", file)
        .text("bit_depth", request.bit_depth.as_u8().to_string())
        .text(
            "use_selection",
            if request.use_selection { "true" } else { "false" },
        );

    if let Some(format) = request.format {
        form = form.text("format", format.as_str());
    }

    Ok(form)
}

#[async_trait]
impl ConversionService for HttpConversionClient {
    /// Submit `request` and decode the response into published variants.
    ///
    /// A well-formed body with no `results` array, an empty array, or an
    /// array whose every entry had to be skipped all surface as
    /// [`SubmissionError::EmptyResultSet`].
    async fn submit(&self, request: SubmitRequest) -> Result<Vec<ResultVariant>, SubmissionError> {
        let form = build_form(request)?;

        let response = self.client.post(&self.url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body: ConvertResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                // A 2xx with an unreadable body is treated the same as a
                // body with no results.
                SubmissionError::EmptyResultSet
            } else {
                SubmissionError::NetworkFailure(e.to_string())
            }
        })?;

        publish_response(body, &self.store)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleBuffer;
    use crate::convert::store::new_shared_store;
    use crate::wav::encode;

    fn make_config() -> ApiConfig {
        ApiConfig {
            base_url: "http://localhost:8002".into(),
            timeout_secs: 5,
        }
    }

    fn make_request(format: Option<VariantFormat>) -> SubmitRequest {
        let buffer = SampleBuffer::new(8_000, vec![vec![0.0; 32]]).unwrap();
        SubmitRequest {
            wav: encode(&buffer).unwrap(),
            bit_depth: BitDepth::Sixteen,
            use_selection: false,
            format,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _client = HttpConversionClient::from_config(&make_config(), new_shared_store());
    }

    /// Verify that `HttpConversionClient` is object-safe (usable as
    /// `dyn ConversionService`).
    #[test]
    fn service_is_object_safe() {
        let client = HttpConversionClient::from_config(&make_config(), new_shared_store());
        let service: Box<dyn ConversionService> = Box::new(client);
        drop(service);
    }

    #[test]
    fn form_assembles_with_and_without_format() {
        assert!(build_form(make_request(None)).is_ok());
        assert!(build_form(make_request(Some(VariantFormat::Mp3))).is_ok());
    }

    // ---- Status classification ----

    #[test]
    fn decode_statuses_pull_the_detail_message() {
        let err = classify_status(
            reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":"not a RIFF stream"}"#,
        );
        match err {
            SubmissionError::DecodeFailure(detail) => assert_eq!(detail, "not a RIFF stream"),
            other => panic!("expected DecodeFailure, got {other:?}"),
        }
    }

    #[test]
    fn decode_statuses_fall_back_to_canonical_reason() {
        let err = classify_status(reqwest::StatusCode::BAD_REQUEST, "<html>nope</html>");
        match err {
            SubmissionError::DecodeFailure(detail) => assert_eq!(detail, "Bad Request"),
            other => panic!("expected DecodeFailure, got {other:?}"),
        }
    }

    #[test]
    fn other_statuses_become_server_errors() {
        assert!(matches!(
            classify_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, ""),
            SubmissionError::ServerError(500)
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::NOT_FOUND, ""),
            SubmissionError::ServerError(404)
        ));
    }

    // ---- Response publication ----

    fn parse_body(json: &str) -> ConvertResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn body_without_results_is_empty_result_set() {
        let store = new_shared_store();
        let err = publish_response(parse_body(r#"{"status":"done"}"#), &store).unwrap_err();
        assert!(matches!(err, SubmissionError::EmptyResultSet));
    }

    #[test]
    fn empty_result_list_is_empty_result_set() {
        let store = new_shared_store();
        let err = publish_response(parse_body(r#"{"results":[]}"#), &store).unwrap_err();
        assert!(matches!(err, SubmissionError::EmptyResultSet));
    }

    #[test]
    fn all_skipped_entries_are_empty_result_set() {
        let store = new_shared_store();
        let body =
            parse_body(r#"{"results":[{"format":"ogg","bit_depth":16,"content":"AA=="}]}"#);
        let err = publish_response(body, &store).unwrap_err();
        assert!(matches!(err, SubmissionError::EmptyResultSet));
        assert!(store.lock().unwrap().is_empty());
    }

    #[test]
    fn good_entries_are_published_in_wire_order() {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine as _;

        let store = new_shared_store();
        let body = parse_body(&format!(
            r#"{{"results":[
                {{"format":"wav","bit_depth":16,"content":"{}"}},
                {{"format":"mp3","bit_depth":24,"content":"{}"}}
            ]}}"#,
            BASE64.encode(b"converted wav"),
            BASE64.encode(b"converted mp3"),
        ));

        let variants = publish_response(body, &store).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].format, VariantFormat::Wav);
        assert_eq!(variants[1].format, VariantFormat::Mp3);

        let store = store.lock().unwrap();
        assert_eq!(
            store.resolve(variants[0].handle).unwrap().as_slice(),
            b"converted wav"
        );
        assert_eq!(
            store.resolve(variants[1].handle).unwrap().as_slice(),
            b"converted mp3"
        );
    }

    #[test]
    fn error_messages_are_distinct() {
        let messages = [
            SubmissionError::NetworkFailure("refused".into()).to_string(),
            SubmissionError::DecodeFailure("bad header".into()).to_string(),
            SubmissionError::EmptyResultSet.to_string(),
            SubmissionError::ServerError(502).to_string(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
