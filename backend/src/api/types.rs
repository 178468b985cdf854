//! REST API types.
//!
//! Successful generation returns the zip itself; everything else is JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PREVIEW_ROWS;
use crate::error::{PipelineError, ServerError};
use crate::models::{BasePriceRow, FactorRow, RmMappingRow, SampleRow};
use crate::validation::ValidatedInputs;

/// JSON body returned for any failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Always "error"
    pub status: String,

    /// "parse", "schema", "dataQuality", "referential", "request" or "internal"
    pub kind: String,

    /// Human-readable description of what to fix
    pub error: String,

    /// Offending rows, for data quality failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<SampleTable>,
}

/// Offending rows with the headers of their table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleTable {
    pub headers: Vec<String>,
    pub rows: Vec<SampleRow>,
}

/// Response of `/api/check`: uploads are valid, here is what was read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub job_id: String,

    /// Always "ready"
    pub status: String,

    pub base_rows: usize,
    pub pricelists: usize,
    pub rm_mappings: usize,

    /// First rows of each table
    pub preview: Preview,
}

/// Head of each validated table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub base: Vec<BasePriceRow>,
    pub factors: Vec<FactorRow>,
    pub rm_mapping: Vec<RmMappingRow>,
}

impl From<ValidatedInputs> for CheckResponse {
    fn from(inputs: ValidatedInputs) -> Self {
        let base_rows = inputs.base.len();
        let pricelists = inputs.factors.len();
        let rm_mappings = inputs.rm_mapping.len();

        CheckResponse {
            job_id: Uuid::new_v4().to_string(),
            status: "ready".to_string(),
            base_rows,
            pricelists,
            rm_mappings,
            preview: Preview {
                base: inputs.base.into_iter().take(PREVIEW_ROWS).collect(),
                factors: inputs.factors.into_iter().take(PREVIEW_ROWS).collect(),
                rm_mapping: inputs.rm_mapping.into_iter().take(PREVIEW_ROWS).collect(),
            },
        }
    }
}

impl ServerError {
    /// HTTP status for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Pipeline(PipelineError::Parse { .. }) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(PipelineError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Pipeline(PipelineError::Archive(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Create an error response
pub fn error_response(err: &ServerError) -> ErrorResponse {
    let (kind, error, sample) = match err {
        ServerError::Pipeline(PipelineError::Validation(e)) => (
            e.kind(),
            e.to_string(),
            e.sample().map(|(headers, rows)| SampleTable {
                headers: headers.to_vec(),
                rows: rows.to_vec(),
            }),
        ),
        ServerError::Pipeline(e @ PipelineError::Parse { .. }) => ("parse", e.to_string(), None),
        ServerError::Pipeline(e @ PipelineError::Archive(_)) => ("internal", e.to_string(), None),
        ServerError::BadRequest(msg) => ("request", msg.clone(), None),
        ServerError::Internal(msg) => ("internal", msg.clone(), None),
    };

    ErrorResponse {
        job_id: Uuid::new_v4().to_string(),
        status: "error".to_string(),
        kind: kind.to_string(),
        error,
        sample,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(error_response(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DataQualityError, DataQualityKind, ParseError, ReferentialError};
    use crate::models::TableKind;

    #[test]
    fn test_validation_error_is_unprocessable_with_sample() {
        let dq = DataQualityError {
            table: TableKind::BasePrice,
            column: "BasePrice".into(),
            kind: DataQualityKind::NotNumeric,
            headers: vec!["SKU".into(), "BasePrice".into()],
            sample: vec![SampleRow { line: 2, values: vec!["A".into(), "ten".into()] }],
            total: 1,
        };
        let err = ServerError::Pipeline(dq.into());

        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = serde_json::to_value(error_response(&err)).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "dataQuality");
        assert_eq!(body["sample"]["rows"][0]["line"], 2);
        assert_eq!(body["sample"]["rows"][0]["values"][1], "ten");
    }

    #[test]
    fn test_referential_error_has_no_sample() {
        let err = ServerError::Pipeline(ReferentialError { missing: vec!["P9".into()] }.into());
        let body = serde_json::to_value(error_response(&err)).unwrap();
        assert_eq!(body["kind"], "referential");
        assert!(body.get("sample").is_none());
        assert!(body["error"].as_str().unwrap().contains("P9"));
    }

    #[test]
    fn test_parse_error_is_bad_request() {
        let err = ServerError::Pipeline(PipelineError::Parse {
            table: TableKind::RmMapping,
            source: ParseError::NoSheets,
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error_response(&err).kind, "parse");
    }

    #[test]
    fn test_check_response_preview_is_bounded() {
        let inputs = ValidatedInputs {
            base: (0..12)
                .map(|i| BasePriceRow {
                    sku: format!("S{}", i),
                    base_price: rust_decimal::Decimal::from(i),
                    line: i as usize + 2,
                })
                .collect(),
            factors: vec![FactorRow {
                pricelist_name: "P1".into(),
                factor: rust_decimal::Decimal::ONE,
            }],
            rm_mapping: vec![],
        };

        let response = CheckResponse::from(inputs);
        assert_eq!(response.status, "ready");
        assert_eq!(response.base_rows, 12);
        assert_eq!(response.preview.base.len(), PREVIEW_ROWS);
        assert_eq!(response.preview.factors.len(), 1);
    }
}
