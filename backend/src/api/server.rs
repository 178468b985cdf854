//! HTTP Server for the pricelist API.
//!
//! Uploads arrive as multipart form fields; each part's file name declares
//! its format (`.csv` / `.tsv` / `.txt` are delimited, anything else is a
//! spreadsheet).
//!
//! # API Endpoints
//!
//! | Method | Path                  | Fields                            | Returns          |
//! |--------|-----------------------|-----------------------------------|------------------|
//! | GET    | `/health`             |                                   | JSON             |
//! | POST   | `/api/check`          | `base`, `factors`, [`rm_mapping`] | JSON preview     |
//! | POST   | `/api/generate`       | `base`, `factors`                 | zip              |
//! | POST   | `/api/generate-by-rm` | `base`, `factors`, `rm_mapping`   | zip              |
//! | GET    | `/api/logs`           |                                   | SSE log stream   |

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    http::{header, HeaderName, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{collections::HashMap, convert::Infallible, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::CheckResponse;
use crate::archive::PricelistArchive;
use crate::config::{ServerConfig, MAX_UPLOAD_SIZE};
use crate::error::{PipelineResult, ServerError};
use crate::transform::pipeline::{
    check_uploads, generate_pricelists, generate_pricelists_by_rm, UploadedFile,
};

/// Multipart field names.
pub const FIELD_BASE: &str = "base";
pub const FIELD_FACTORS: &str = "factors";
pub const FIELD_RM_MAPPING: &str = "rm_mapping";

const FILE_COUNT_HEADER: HeaderName = HeaderName::from_static("x-file-count");

/// Build the application router.
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION, FILE_COUNT_HEADER]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/check", post(check))
        .route("/api/generate", post(generate))
        .route("/api/generate-by-rm", post(generate_by_rm))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.socket_addr();
    println!("🚀 Pricelist server running on http://{}", addr);
    println!("   POST /api/check          - Validate uploads");
    println!("   POST /api/generate       - One file per pricelist (zip)");
    println!("   POST /api/generate-by-rm - One folder per RM (zip)");
    println!("   GET  /api/logs           - SSE log stream");
    println!("   GET  /health             - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "pricelist",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "check": "POST /api/check",
            "generate": "POST /api/generate",
            "generateByRm": "POST /api/generate-by-rm",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Validate uploads and return a preview
async fn check(multipart: Multipart) -> Result<Json<CheckResponse>, ServerError> {
    let mut uploads = read_uploads(multipart).await?;
    let base = take_field(&mut uploads, FIELD_BASE)?;
    let factors = take_field(&mut uploads, FIELD_FACTORS)?;
    let rm_mapping = uploads.remove(FIELD_RM_MAPPING);

    let inputs = run_blocking(move || check_uploads(&base, &factors, rm_mapping.as_ref())).await?;
    Ok(Json(CheckResponse::from(inputs)))
}

/// One file per pricelist
async fn generate(multipart: Multipart) -> Result<Response, ServerError> {
    let mut uploads = read_uploads(multipart).await?;
    let base = take_field(&mut uploads, FIELD_BASE)?;
    let factors = take_field(&mut uploads, FIELD_FACTORS)?;

    let archive = run_blocking(move || generate_pricelists(&base, &factors)).await?;
    Ok(archive_response(archive))
}

/// One folder per relationship manager
async fn generate_by_rm(multipart: Multipart) -> Result<Response, ServerError> {
    let mut uploads = read_uploads(multipart).await?;
    let base = take_field(&mut uploads, FIELD_BASE)?;
    let factors = take_field(&mut uploads, FIELD_FACTORS)?;
    let rm_mapping = take_field(&mut uploads, FIELD_RM_MAPPING)?;

    let archive =
        run_blocking(move || generate_pricelists_by_rm(&base, &factors, &rm_mapping)).await?;
    Ok(archive_response(archive))
}

/// Collect every file part of the form, keyed by field name.
async fn read_uploads(
    mut multipart: Multipart,
) -> Result<HashMap<String, UploadedFile>, ServerError> {
    let mut uploads = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("{}.csv", name));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;

        println!("📄 Upload '{}': {} ({} bytes)", name, file_name, bytes.len());
        uploads.insert(name, UploadedFile::new(file_name, bytes.to_vec()));
    }

    Ok(uploads)
}

fn take_field(
    uploads: &mut HashMap<String, UploadedFile>,
    field: &str,
) -> Result<UploadedFile, ServerError> {
    uploads
        .remove(field)
        .ok_or_else(|| ServerError::BadRequest(format!("No '{}' file provided", field)))
}

/// Run a synchronous pipeline call off the async workers.
async fn run_blocking<T, F>(job: F) -> Result<T, ServerError>
where
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ServerError::Internal(format!("Pipeline task failed: {}", e)))?;

    result.map_err(|e| {
        log_error(e.to_string());
        ServerError::Pipeline(e)
    })
}

fn archive_response(archive: PricelistArchive) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", archive.file_name);
    (
        [
            (header::CONTENT_TYPE, archive.content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (FILE_COUNT_HEADER, archive.file_count.to_string()),
        ],
        archive.bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_take_field_missing_is_bad_request() {
        let mut uploads = HashMap::new();
        uploads.insert(
            FIELD_BASE.to_string(),
            UploadedFile::new("base.csv", b"SKU,BasePrice\nA,1\n".to_vec()),
        );

        assert!(take_field(&mut uploads, FIELD_BASE).is_ok());
        let err = take_field(&mut uploads, FIELD_FACTORS).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("factors"));
    }

    #[test]
    fn test_archive_response_headers() {
        let archive = PricelistArchive {
            bytes: vec![1, 2, 3],
            file_name: "generated_pricelists.zip".into(),
            content_type: "application/zip".into(),
            file_count: 2,
            overwritten: vec![],
        };

        let response = archive_response(archive);
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"generated_pricelists.zip\""
        );
        assert_eq!(headers["x-file-count"], "2");
    }

    #[tokio::test]
    async fn test_run_blocking_maps_pipeline_errors() {
        let base = UploadedFile::new("base.csv", b"SKU,BasePrice\n".to_vec());
        let factors = UploadedFile::new("factors.csv", b"PricelistName,Factor\nP1,1\n".to_vec());

        let err = run_blocking(move || generate_pricelists(&base, &factors))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
