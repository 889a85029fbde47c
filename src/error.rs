//! Crate-wide error kinds, mirroring §7 of the design: `FetchError`,
//! `ParseError`, `RetryExhausted`, `RecordNotFoundInBatchGet`. `BadRequest`
//! is deliberately not a variant here — a route match with a missing
//! required parameter simply falls through to the dispatcher's 404, it
//! never constructs an error value.

use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, Response};
use serde::Serialize;
use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

/// Errors raised by the archive crawler (C1).
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("parsing {url}: {reason}")]
    Parse { url: String, reason: String },
}

/// Errors raised by the storage writer (C3) and query layer (C5).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("dynamodb request failed: {0}")]
    Db(#[from] Box<dyn std::error::Error + Send + Sync>),
    #[error("retry budget exhausted; still unprocessed: {unprocessed:?}")]
    RetryExhausted {
        unprocessed: HashMap<String, Vec<HashMap<String, AttributeValue>>>,
    },
    #[error("record not found in batch get: list={list:?} month_id={month_id:?}")]
    RecordNotFoundInBatchGet { list: String, month_id: String },
}

/// Errors surfaced to an HTTP caller. `NotFound` is the dispatcher's
/// fallback for every unmatched route or missing required parameter; its
/// body is the literal string `Not Found`, matching the read API's 404
/// contract (§6) rather than the JSON error body used for `Internal`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("internal error: {0}")]
    Internal(String),
    #[error("not found")]
    NotFound,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        if let ApiError::NotFound = self {
            return Response::build().status(Status::NotFound).sized_body(9, std::io::Cursor::new("Not Found")).ok();
        }
        let (status, message) = match &self {
            ApiError::Internal(msg) => (Status::InternalServerError, msg.clone()),
            ApiError::NotFound => unreachable!(),
        };
        log::error!("api error: {message}");
        Response::build_from(Json(ErrorBody { error: message }).respond_to(request)?)
            .status(status)
            .ok()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
