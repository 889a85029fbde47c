//! Query Handler (C5): a "dynamic" dispatcher over the read API, ported from
//! `original_source/src/server.py`'s `lambda_handler`. Rocket's usual
//! `#[get]` attribute routing can't express "match this URI suffix only if
//! this query parameter is present, in this exact order" — so the whole
//! read side is one catch-all route that walks a fixed chain of
//! `(predicate, handler)` pairs, stopping at the first match.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use regex::Regex;
use rocket::State;
use rocket::serde::json::Json;
use rocket::{Request, Route};
use serde::Serialize;

use crate::config::Config;
use crate::error::ApiError;
use crate::indexer::{IndexParams, Indexer};
use crate::store::{CommonParams, Page, RecordItem, Store, record_from_item};

/// Query-path token-length cap, far above anything a real query would use —
/// the n-gram limits still apply, only the per-token length ceiling is
/// relaxed so a long search phrase isn't silently truncated (§4.5).
const QUERY_MAX_TOKEN_LENGTH: usize = 10_000;

#[derive(Debug, Serialize)]
pub struct MailResponse {
    pub items: Vec<RecordItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub last_check: Option<String>,
    pub last_update: Option<String>,
}

/// First-occurrence value of a repeated query parameter, or `None` if absent
/// or empty — mirrors `server.py`'s `extract_param`.
fn param<'q>(pairs: &[(&'q str, &'q str)], name: &str) -> Option<&'q str> {
    pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| *v).filter(|v| !v.is_empty())
}

fn parse_query(query: &str) -> Vec<(&str, &str)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        })
        .collect()
}

/// `order`/`limit`/`cursor`/`from`+`to`, shared by every access path (§4.5).
fn common_params(pairs: &[(&str, &str)]) -> CommonParams {
    let forward = param(pairs, "order") == Some("asc");
    let limit = param(pairs, "limit")
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(10)
        .clamp(1, 100);
    let start_key = param(pairs, "cursor").and_then(crate::store::av::decode_cursor);
    let date_range = match (param(pairs, "from"), param(pairs, "to")) {
        (Some(from), Some(to)) => Some((from.to_string(), to.to_string())),
        _ => None,
    };
    CommonParams { forward, limit, start_key, date_range }
}

/// Build the single term a `q` query resolves to, using a raised
/// token-length cap for the query path (see `QUERY_MAX_TOKEN_LENGTH`).
fn query_term(q: &str, params: &IndexParams) -> String {
    let mut query_params = params.clone();
    query_params.max_token_length = QUERY_MAX_TOKEN_LENGTH;
    Indexer::new(&query_params).query_term(q)
}

fn mail_response(page: Page<HashMap<String, AttributeValue>>) -> Result<MailResponse, ApiError> {
    let items = page
        .items
        .iter()
        .map(record_from_item)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(MailResponse { items, cursor: page.cursor })
}

/// Resolve a page of Term-row search hits to full Record rows, preserving
/// the Term query's order (§4.5 "Search→Record join").
async fn resolve_search(store: &Store, page: Page<HashMap<String, AttributeValue>>) -> Result<MailResponse, ApiError> {
    let records = store.get_mail(&page.items).await.map_err(|e| ApiError::Internal(e.to_string()))?;
    let items = records
        .iter()
        .map(record_from_item)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(MailResponse { items, cursor: page.cursor })
}

/// Walk the access-pattern chain in the exact order of the §4.5 table;
/// the first matching URI-suffix-plus-required-params rule wins. A route
/// that matches but is missing its required parameter falls through to the
/// next rule rather than erroring — eventually the 404 fallback.
async fn dispatch(path: &str, query: &str, store: &Store, cfg: &Config) -> Result<Json<serde_json::Value>, ApiError> {
    let pairs = parse_query(query);
    let list_search = Regex::new(r"^/lists/([^/]+)/mail/search$").expect("static regex");
    let list_mail = Regex::new(r"^/lists/([^/]+)/mail$").expect("static regex");
    let list_byauthor = Regex::new(r"^/lists/([^/]+)/mail/byauthor$").expect("static regex");
    let list_byemail = Regex::new(r"^/lists/([^/]+)/mail/byemail$").expect("static regex");

    if let (Some(caps), Some(q)) = (list_search.captures(path), param(&pairs, "q")) {
        let list = &caps[1];
        let term = query_term(q, &cfg.index_params);
        let cp = common_params(&pairs);
        let page = store.search_mail(list, &term, &cp).await.map_err(|e| ApiError::Internal(e.to_string()))?;
        let resp = resolve_search(store, page).await?;
        return Ok(Json(serde_json::to_value(resp).expect("serializable")));
    }
    if path.ends_with("/mail/search") {
        if let Some(q) = param(&pairs, "q") {
            let term = query_term(q, &cfg.index_params);
            let cp = common_params(&pairs);
            let page = store.search_mail_global(&term, &cp).await.map_err(|e| ApiError::Internal(e.to_string()))?;
            let resp = resolve_search(store, page).await?;
            return Ok(Json(serde_json::to_value(resp).expect("serializable")));
        }
    }
    if let Some(caps) = list_mail.captures(path) {
        let list = &caps[1];
        let cp = common_params(&pairs);
        let page = store.latest_mail(list, &cp).await.map_err(|e| ApiError::Internal(e.to_string()))?;
        return Ok(Json(serde_json::to_value(mail_response(page)?).expect("serializable")));
    }
    if path.ends_with("/mail") {
        let cp = common_params(&pairs);
        let page = store.latest_mail_global(&cp).await.map_err(|e| ApiError::Internal(e.to_string()))?;
        return Ok(Json(serde_json::to_value(mail_response(page)?).expect("serializable")));
    }
    if let Some(caps) = list_byauthor.captures(path) {
        if let Some(author) = param(&pairs, "author") {
            let list = &caps[1];
            let authorkey = crate::indexer::normalize(author);
            let cp = common_params(&pairs);
            let page = store.mail_by_author(list, &authorkey, &cp).await.map_err(|e| ApiError::Internal(e.to_string()))?;
            return Ok(Json(serde_json::to_value(mail_response(page)?).expect("serializable")));
        }
    }
    if let Some(caps) = list_byemail.captures(path) {
        if let Some(email) = param(&pairs, "email") {
            let list = &caps[1];
            let emailkey = crate::indexer::normalize(email);
            let cp = common_params(&pairs);
            let page = store.mail_by_email(list, &emailkey, &cp).await.map_err(|e| ApiError::Internal(e.to_string()))?;
            return Ok(Json(serde_json::to_value(mail_response(page)?).expect("serializable")));
        }
    }
    if path.ends_with("/mail/byauthor") {
        if let Some(author) = param(&pairs, "author") {
            let authorkey = crate::indexer::normalize(author);
            let cp = common_params(&pairs);
            let page = store.mail_by_author_global(&authorkey, &cp).await.map_err(|e| ApiError::Internal(e.to_string()))?;
            return Ok(Json(serde_json::to_value(mail_response(page)?).expect("serializable")));
        }
    }
    if path.ends_with("/mail/byemail") {
        if let Some(email) = param(&pairs, "email") {
            let emailkey = crate::indexer::normalize(email);
            let cp = common_params(&pairs);
            let page = store.mail_by_email_global(&emailkey, &cp).await.map_err(|e| ApiError::Internal(e.to_string()))?;
            return Ok(Json(serde_json::to_value(mail_response(page)?).expect("serializable")));
        }
    }
    if path.ends_with("/mail/status") {
        let (last_check, last_update) = store.get_status().await.map_err(|e| ApiError::Internal(e.to_string()))?;
        let resp = StatusResponse { last_check, last_update };
        return Ok(Json(serde_json::to_value(resp).expect("serializable")));
    }

    Err(ApiError::NotFound)
}

#[get("/<path..>")]
async fn read(path: std::path::PathBuf, req: &Request<'_>, store: &State<Store>, cfg: &State<Config>) -> Result<Json<serde_json::Value>, ApiError> {
    let uri_path = format!("/{}", path.display());
    let query = req.uri().query().map(|q| q.as_str()).unwrap_or("");
    dispatch(&uri_path, query, store, cfg).await
}

pub fn routes() -> Vec<Route> {
    routes![read]
}
