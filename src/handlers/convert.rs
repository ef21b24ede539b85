//! # Conversion Endpoint
//!
//! `POST /convert` takes a multipart upload of a WAV file and answers with the
//! same audio at every configured format/bit depth combination.
//!
//! ## Request (multipart/form-data):
//! - `file`: the WAV file (required)
//! - `bit_depth`: integer, default 16. Logged only, the matrix always runs in full.
//! - `use_selection`: string, default "false". Logged only.
//!
//! ## Response:
//! ```json
//! {
//!   "results": [
//!     { "format": "wav", "bit_depth": 8, "content": "UklGR...", "size": 52, "mime_type": "audio/wav" }
//!   ]
//! }
//! ```
//! A combination that fails to encode is left out of `results`. The request
//! still succeeds, even with an empty list.

use crate::audio::{AudioSegment, CombinationOutcome, ConversionResult, MatrixTranscoder};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Smallest plausible WAV file: the canonical RIFF + fmt + data header.
pub const MIN_WAV_HEADER_BYTES: usize = 44;

const DEFAULT_BIT_DEPTH: i64 = 16;

/// Everything read from the multipart body.
#[derive(Debug)]
pub struct UploadRequest {
    pub file: Vec<u8>,
    pub filename: Option<String>,
    pub bit_depth: i64,
    pub use_selection: String,
}

impl Default for UploadRequest {
    fn default() -> Self {
        Self {
            file: Vec::new(),
            filename: None,
            bit_depth: DEFAULT_BIT_DEPTH,
            use_selection: "false".to_string(),
        }
    }
}

/// Successful response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub results: Vec<ConversionResult>,
}

pub async fn convert(
    state: web::Data<AppState>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let start_time = Instant::now();
    let conversion = &state.config().conversion;

    let upload = read_upload(payload, conversion.max_upload_bytes).await?;
    info!(
        filename = upload.filename.as_deref().unwrap_or("unknown"),
        size_bytes = upload.file.len(),
        bit_depth = upload.bit_depth,
        use_selection = %upload.use_selection,
        "Conversion requested"
    );

    validate_upload(&upload.file)?;

    let transcoder = MatrixTranscoder::new(
        conversion.formats.clone(),
        conversion.bit_depths.clone(),
        conversion.mp3_bitrate_kbps,
    );
    let file = upload.file;

    // Decoding and encoding are CPU-bound, keep them off the async worker
    let outcomes = web::block(move || -> AppResult<Vec<CombinationOutcome>> {
        let segment = AudioSegment::from_wav_bytes(&file)?;
        Ok(transcoder.run(&segment))
    })
    .await??;

    state.record_conversions(&outcomes);
    let results = assemble_results(outcomes);

    info!(
        results = results.len(),
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Conversion finished"
    );

    Ok(HttpResponse::Ok().json(ConvertResponse { results }))
}

/// Reject uploads that cannot even hold a WAV header.
pub fn validate_upload(file: &[u8]) -> AppResult<()> {
    if file.len() < MIN_WAV_HEADER_BYTES {
        return Err(AppError::InputTooSmall(file.len()));
    }
    Ok(())
}

/// Turn outcomes into the response list, logging every dropped combination.
pub fn assemble_results(outcomes: Vec<CombinationOutcome>) -> Vec<ConversionResult> {
    outcomes
        .into_iter()
        .filter_map(|CombinationOutcome { combination, outcome }| match outcome {
            Ok(bytes) => Some(ConversionResult::from_encoded(combination, &bytes)),
            Err(err) => {
                warn!(
                    format = %combination.format,
                    bit_depth = %combination.depth,
                    error = %err,
                    "Conversion failed, omitting from results"
                );
                None
            }
        })
        .collect()
}

/// Read the multipart stream into an `UploadRequest`.
///
/// A missing `file` field leaves `file` empty, which validation then reports
/// as too small. Unknown fields are drained and ignored.
async fn read_upload(mut payload: Multipart, max_upload_bytes: usize) -> AppResult<UploadRequest> {
    let mut upload = UploadRequest::default();

    while let Some(item) = payload.next().await {
        let mut field: Field = item?;

        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Missing field name".to_string()))?;

        match name.as_str() {
            "file" => {
                upload.filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string);
                upload.file = read_field(&mut field, max_upload_bytes).await?;
            }
            "bit_depth" => {
                let text = read_text_field(&mut field).await?;
                upload.bit_depth = text.trim().parse().map_err(|_| {
                    AppError::BadRequest(format!("bit_depth must be an integer, got '{}'", text.trim()))
                })?;
            }
            "use_selection" => {
                upload.use_selection = read_text_field(&mut field).await?;
            }
            _ => {
                read_field(&mut field, max_upload_bytes).await?;
            }
        }
    }

    Ok(upload)
}

/// Collect a field's chunks, failing as soon as the size cap is passed.
async fn read_field(field: &mut Field, limit: usize) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk?;
        if bytes.len() + chunk.len() > limit {
            return Err(AppError::UploadTooLarge {
                size: bytes.len() + chunk.len(),
                limit,
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Form values are short; 1KB is plenty.
async fn read_text_field(field: &mut Field) -> AppResult<String> {
    let bytes = read_field(field, 1024).await?;
    String::from_utf8(bytes).map_err(|_| AppError::BadRequest("Form field is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use base64::Engine as _;
    use serde_json::Value;
    use std::io::Cursor;

    const BOUNDARY: &str = "----converter-test-boundary";

    struct Part<'a> {
        name: &'a str,
        filename: Option<&'a str>,
        data: &'a [u8],
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part.filename {
                Some(filename) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: audio/wav\r\n\r\n",
                            part.name, filename
                        )
                        .as_bytes(),
                    );
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
                    );
                }
            }
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_parts(file: &[u8]) -> Vec<u8> {
        multipart_body(&[
            Part { name: "file", filename: Some("audio.wav"), data: file },
            Part { name: "bit_depth", filename: None, data: b"16" },
            Part { name: "use_selection", filename: None, data: b"false" },
        ])
    }

    fn wav_fixture(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buffer = Vec::new();
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        buffer
    }

    fn tone(frames: usize) -> Vec<i16> {
        (0..frames)
            .map(|i| ((i as f32 * 0.0627).sin() * 10000.0) as i16)
            .collect()
    }

    async fn post_convert(config: AppConfig, body: Vec<u8>) -> (StatusCode, Value) {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(config)))
                .configure(crate::handlers::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/convert")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
            .to_request();

        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let json: Value = test::read_body_json(resp).await;
        (status, json)
    }

    fn decode_content(entry: &Value) -> Vec<u8> {
        base64::engine::general_purpose::STANDARD
            .decode(entry["content"].as_str().unwrap())
            .unwrap()
    }

    #[actix_web::test]
    async fn test_validate_upload_threshold() {
        assert!(matches!(validate_upload(&[]), Err(AppError::InputTooSmall(0))));
        assert!(matches!(validate_upload(&[0; 43]), Err(AppError::InputTooSmall(43))));
        assert!(validate_upload(&[0; 44]).is_ok());
    }

    #[actix_web::test]
    async fn test_empty_upload_is_rejected() {
        let (status, json) = post_convert(AppConfig::default(), upload_parts(&[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
        assert!(json.get("results").is_none());
    }

    #[actix_web::test]
    async fn test_missing_file_field_is_rejected() {
        let body = multipart_body(&[Part { name: "bit_depth", filename: None, data: b"16" }]);
        let (status, json) = post_convert(AppConfig::default(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("too small"));
    }

    #[actix_web::test]
    async fn test_ten_byte_upload_is_too_small() {
        let (status, json) = post_convert(AppConfig::default(), upload_parts(b"0123456789")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("too small"));
    }

    #[actix_web::test]
    async fn test_non_wav_upload_fails_to_decode() {
        let mut text = b"hello, this is plain text and not audio".to_vec();
        text.resize(100, b'.');

        let (status, json) = post_convert(AppConfig::default(), upload_parts(&text)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("decode"));
        assert!(json.get("results").is_none());
    }

    #[actix_web::test]
    async fn test_non_integer_bit_depth_is_rejected() {
        let wav = wav_fixture(8000, &[0]);
        let body = multipart_body(&[
            Part { name: "file", filename: Some("audio.wav"), data: &wav },
            Part { name: "bit_depth", filename: None, data: b"sixteen" },
        ]);
        let (status, json) = post_convert(AppConfig::default(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("bit_depth"));
    }

    #[actix_web::test]
    async fn test_oversized_upload_is_rejected() {
        let mut config = AppConfig::default();
        config.conversion.max_upload_bytes = 64;
        let wav = wav_fixture(8000, &tone(100));

        let (status, json) = post_convert(config, upload_parts(&wav)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("too large"));
    }

    #[actix_web::test]
    async fn test_minimal_wav_converts() {
        let wav = wav_fixture(8000, &[1234]);
        let (status, json) = post_convert(AppConfig::default(), upload_parts(&wav)).await;
        assert_eq!(status, StatusCode::OK);

        let results = json["results"].as_array().unwrap();
        assert!(results.len() <= 6);

        let wav_depths: Vec<u64> = results
            .iter()
            .filter(|r| r["format"] == "wav")
            .map(|r| r["bit_depth"].as_u64().unwrap())
            .collect();
        assert_eq!(wav_depths, vec![8, 16, 24]);

        for entry in results {
            let format = entry["format"].as_str().unwrap();
            assert_eq!(entry["mime_type"], format!("audio/{}", format));
            assert_eq!(decode_content(entry).len() as u64, entry["size"].as_u64().unwrap());
        }
    }

    #[actix_web::test]
    async fn test_full_matrix_for_cd_quality_input() {
        let wav = wav_fixture(44100, &tone(4410));
        let (status, json) = post_convert(AppConfig::default(), upload_parts(&wav)).await;
        assert_eq!(status, StatusCode::OK);

        let results = json["results"].as_array().unwrap();
        let cells: Vec<(String, u64)> = results
            .iter()
            .map(|r| (r["format"].as_str().unwrap().to_string(), r["bit_depth"].as_u64().unwrap()))
            .collect();
        assert_eq!(
            cells,
            vec![
                ("wav".to_string(), 8),
                ("wav".to_string(), 16),
                ("wav".to_string(), 24),
                ("mp3".to_string(), 8),
                ("mp3".to_string(), 16),
                ("mp3".to_string(), 24),
            ]
        );

        for entry in results.iter().filter(|r| r["format"] == "wav") {
            let bytes = decode_content(entry);
            let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
            assert_eq!(u64::from(reader.spec().bits_per_sample), entry["bit_depth"].as_u64().unwrap());
            assert_eq!(reader.spec().sample_rate, 44100);
        }
    }

    #[actix_web::test]
    async fn test_conversion_is_idempotent() {
        let wav = wav_fixture(44100, &tone(2205));
        let (_, first) = post_convert(AppConfig::default(), upload_parts(&wav)).await;
        let (_, second) = post_convert(AppConfig::default(), upload_parts(&wav)).await;
        assert_eq!(first["results"], second["results"]);
    }

    #[actix_web::test]
    async fn test_failed_combinations_are_omitted_not_fatal() {
        let mut config = AppConfig::default();
        // Valid at the HTTP layer, but LAME rejects it at encode time
        config.conversion.mp3_bitrate_kbps = 193;
        let wav = wav_fixture(44100, &tone(441));

        let (status, json) = post_convert(config, upload_parts(&wav)).await;
        assert_eq!(status, StatusCode::OK);
        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r["format"] == "wav"));
    }

    #[actix_web::test]
    async fn test_zero_successes_still_returns_ok() {
        let mut config = AppConfig::default();
        config.conversion.formats = vec![crate::audio::TargetFormat::Mp3];
        config.conversion.mp3_bitrate_kbps = 193;
        let wav = wav_fixture(44100, &tone(441));

        let (status, json) = post_convert(config, upload_parts(&wav)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["results"], serde_json::json!([]));
    }
}
