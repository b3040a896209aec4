use crate::geometry::{Bound, BoundViolation, RectError};
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CropError {
    #[error("Invalid image: {0}")]
    Decode(String),

    #[error("Region {index} is missing required field '{field}'")]
    MissingField { index: usize, field: Bound },

    #[error("Invalid rectangle at index {index}: {source}")]
    InvalidRectangle {
        index: usize,
        #[source]
        source: RectError,
    },

    #[error("Failed to encode region {index}: {message}")]
    Encode { index: usize, message: String },

    #[error("Upload to '{path}' failed: {source}")]
    Upload {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CropError {
    /// Stable machine-readable code used in error responses
    pub fn code(&self) -> &'static str {
        match self {
            CropError::Decode(_) => "INVALID_IMAGE",
            CropError::MissingField { .. } => "MISSING_FIELD",
            CropError::InvalidRectangle { .. } => "INVALID_RECTANGLE",
            CropError::Encode { .. } => "ENCODE_ERROR",
            CropError::Upload { .. } => "UPLOAD_ERROR",
            CropError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            CropError::MissingFile => "MISSING_FILE",
            CropError::InvalidRequest(_) => "INVALID_REQUEST",
            CropError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CropError::Decode(_)
            | CropError::MissingField { .. }
            | CropError::InvalidRectangle { .. }
            | CropError::MissingFile
            | CropError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CropError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CropError::Upload { .. } => StatusCode::BAD_GATEWAY,
            CropError::Encode { .. } | CropError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<Bound>,
    /// Every canvas edge a rectangle crossed, furthest first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<BoundViolation>,
    /// Destination that the blob store refused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<&CropError> for ErrorResponse {
    fn from(err: &CropError) -> Self {
        let (index, field) = match err {
            CropError::MissingField { index, field } => (Some(*index), Some(*field)),
            CropError::InvalidRectangle { index, source } => (Some(*index), Some(source.bound())),
            CropError::Encode { index, .. } => (Some(*index), None),
            _ => (None, None),
        };

        let violations = match err {
            CropError::InvalidRectangle { source, .. } => source.violations(),
            _ => Vec::new(),
        };
        let path = match err {
            CropError::Upload { path, .. } => Some(path.clone()),
            _ => None,
        };

        ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
            index,
            field,
            violations,
            path,
        }
    }
}

impl IntoResponse for CropError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }

        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn test_invalid_rectangle_response_names_index_and_bound() {
        let err = CropError::InvalidRectangle {
            index: 1,
            source: Rect::new(130, 200, 230, 300)
                .validate(200, 200)
                .unwrap_err(),
        };
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_RECTANGLE");
        assert_eq!(body["index"], 1);
        assert_eq!(body["field"], "bottom");
        assert_eq!(body["violations"][0]["bound"], "bottom");
        assert_eq!(body["violations"][0]["limit"], 200);
        assert_eq!(body["violations"][1]["bound"], "right");
        assert_eq!(body["violations"][1]["value"], 230);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid rectangle at index 1: bottom (300) exceeds canvas height (200)"));
    }

    #[test]
    fn test_decode_error_has_no_index() {
        let body = serde_json::to_value(ErrorResponse::from(&CropError::Decode(
            "empty image buffer".to_string(),
        )))
        .unwrap();
        assert_eq!(body["code"], "INVALID_IMAGE");
        assert!(body.get("index").is_none());
        assert!(body.get("field").is_none());
        assert!(body.get("violations").is_none());
    }

    #[test]
    fn test_upload_error_is_bad_gateway() {
        let err = CropError::Upload {
            path: "Logo_scan.png".to_string(),
            source: StoreError::Rejected("bucket not found".to_string()),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("Logo_scan.png"));
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(body["code"], "UPLOAD_ERROR");
        assert_eq!(body["path"], "Logo_scan.png");
    }
}
