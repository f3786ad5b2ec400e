use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::render::escape_html;

/// Errors surfaced while handling a request.
///
/// There are no structured error codes and no recovery flow: every variant
/// renders as a plain failure page with a status line and the error text.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored blob failed to parse back into the model, e.g. the `data`
    /// column no longer holds an array of row objects. Fatal for the
    /// request that hit it.
    #[error("invalid stored {field}: {source}")]
    InvalidSheet {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing form data: {0}")]
    MissingField(&'static str),

    /// A mutation targeted an id with no stored record. Page loads never
    /// hit this (they create the sheet instead); only a hand-built POST
    /// can.
    #[error("no sheet stored under {0}")]
    NoSuchSheet(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) => StatusCode::BAD_REQUEST,
            AppError::NoSuchSheet(_) => StatusCode::NOT_FOUND,
            AppError::Sqlite(_) | AppError::InvalidSheet { .. } | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        log::error!("request failed ({status}): {self}");

        let page = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{status}</title></head>\n\
             <body>\n<h1>{status}</h1>\n<p>{}</p>\n</body>\n</html>\n",
            escape_html(&self.to_string())
        );
        (status, Html(page)).into_response()
    }
}
