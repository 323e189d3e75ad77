//! Resource request handling
//!
//! Every resource request goes through the same steps: CORS headers are
//! prepared from the request, the path is split into its triple, the
//! authorizer is consulted, and only then is the storage backend called.
//! Errors at any step become a response that still carries CORS headers.

pub mod authenticate;
pub mod cors;
pub mod resource_path;
pub mod storage_service;

use actix_web::body::BoxBody;
use actix_web::http::{header, Method};
use actix_web::{web, Error, HttpRequest, HttpResponse, ResponseError};
use bytes::BytesMut;
use futures::StreamExt;
use log::{debug, error, info, warn};
use serde_json::{json, Map, Value};

use crate::app_state::AppState;
use crate::auth::bearer_token;
use crate::error::CabinetError;
use crate::service::cors::Cors;
use crate::service::resource_path::ResourcePath;
use crate::storage::{DeleteOutcome, ObjectSummary};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn finish(cors: &Cors, result: Result<HttpResponse, CabinetError>) -> HttpResponse {
    let mut response = match result {
        Ok(response) => response,
        Err(e) => {
            if e.is_auth_failure() {
                info!("Request denied: {}", e);
            } else if matches!(e, CabinetError::BackendUnavailable(_)) {
                error!("Request failed: {}", e);
            } else {
                debug!("Request failed: {}", e);
            }
            e.error_response()
        }
    };
    cors.apply(&mut response);
    log_mdc::clear();
    response
}

/// Parse the path and run the authorizer; nothing touches storage before this
fn authorize(req: &HttpRequest, raw_path: &str, app_state: &AppState) -> Result<ResourcePath, CabinetError> {
    let path = ResourcePath::parse(raw_path)?;
    log_mdc::insert("user", &path.user);
    log_mdc::insert("category", &path.category);

    let token = bearer_token(req);
    app_state
        .authorizer
        .authorize(&path.user, &path.category, &token, req.method())?
        .into_result()?;
    Ok(path)
}

fn if_none_match(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
}

pub async fn get_service(req: HttpRequest, tail: web::Path<String>, app_state: web::Data<AppState>) -> HttpResponse {
    let cors = Cors::from_request(&req);
    let result = get_resource(&req, &tail, &app_state).await;
    finish(&cors, result)
}

/// Same headers as GET, empty body
pub async fn head_service(req: HttpRequest, tail: web::Path<String>, app_state: web::Data<AppState>) -> HttpResponse {
    let cors = Cors::from_request(&req);
    let result = get_resource(&req, &tail, &app_state)
        .await
        .map(|response| response.map_body(|_, _| BoxBody::new(())));
    finish(&cors, result)
}

async fn get_resource(req: &HttpRequest, raw_path: &str, app_state: &AppState) -> Result<HttpResponse, CabinetError> {
    let path = authorize(req, raw_path, app_state)?;
    if path.is_folder() {
        return list_folder(&path, app_state).await;
    }

    let object = app_state
        .storage_service
        .get(&path)
        .await?
        .ok_or_else(|| CabinetError::NotFound(format!("no such resource: {}", path)))?;

    let etag = object.version.etag();
    if let Some(tags) = if_none_match(req) {
        if tags.split(',').any(|tag| tag.trim() == "*" || object.version.matches_etag(tag)) {
            debug!("Not modified: {}", path);
            return Ok(HttpResponse::NotModified().insert_header((header::ETAG, etag)).finish());
        }
    }

    debug!("Serving {} ({} bytes)", path, object.data.len());
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, object.content_type))
        .insert_header((header::ETAG, etag))
        .insert_header((header::LAST_MODIFIED, object.last_modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string()))
        .body(object.data))
}

/// Direct children of a folder: documents by name, sub-folders with a trailing `/`
fn folder_items(folder_key: &str, summaries: &[ObjectSummary]) -> Map<String, Value> {
    let mut items = Map::new();
    for summary in summaries {
        let rest = &summary.key[folder_key.len()..];
        match rest.find('/') {
            Some(slash) => {
                items.entry(format!("{}/", &rest[..slash])).or_insert_with(|| json!({}));
            }
            None => {
                items.insert(
                    rest.to_string(),
                    json!({
                        "ETag": summary.version.to_string(),
                        "Content-Type": summary.content_type,
                        "Content-Length": summary.size,
                    }),
                );
            }
        }
    }
    items
}

async fn list_folder(path: &ResourcePath, app_state: &AppState) -> Result<HttpResponse, CabinetError> {
    let summaries = app_state.storage_service.list(path).await?;
    debug!("Listing {} ({} resources below)", path, summaries.len());
    Ok(HttpResponse::Ok().json(json!({ "items": folder_items(&path.key, &summaries) })))
}

pub async fn put_service(
    req: HttpRequest,
    tail: web::Path<String>,
    payload: web::Payload,
    app_state: web::Data<AppState>,
) -> HttpResponse {
    let cors = Cors::from_request(&req);
    let result = put_resource(&req, &tail, payload, &app_state).await;
    finish(&cors, result)
}

async fn read_body(mut payload: web::Payload, limit: usize) -> Result<Vec<u8>, CabinetError> {
    let mut bytes = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| CabinetError::MalformedRequest(format!("error reading body: {}", e)))?;
        if bytes.len() + chunk.len() > limit {
            return Err(CabinetError::PayloadTooLarge(format!("body exceeds {} bytes", limit)));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes.to_vec())
}

async fn put_resource(
    req: &HttpRequest,
    raw_path: &str,
    payload: web::Payload,
    app_state: &AppState,
) -> Result<HttpResponse, CabinetError> {
    let path = authorize(req, raw_path, app_state)?;
    if path.is_folder() {
        return Err(CabinetError::MalformedRequest("cannot store a document at a folder path".to_string()));
    }

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let data = read_body(payload, app_state.max_payload_size).await?;
    info!("Storing {} bytes at {} as {}", data.len(), path, content_type);

    let version = app_state.storage_service.put(&path, data, content_type).await?;
    Ok(HttpResponse::Ok().insert_header((header::ETAG, version.etag())).finish())
}

pub async fn delete_service(req: HttpRequest, tail: web::Path<String>, app_state: web::Data<AppState>) -> HttpResponse {
    let cors = Cors::from_request(&req);
    let result = delete_resource(&req, &tail, &app_state).await;
    finish(&cors, result)
}

async fn delete_resource(req: &HttpRequest, raw_path: &str, app_state: &AppState) -> Result<HttpResponse, CabinetError> {
    let path = authorize(req, raw_path, app_state)?;
    if path.is_folder() {
        return Err(CabinetError::MalformedRequest("cannot delete a folder".to_string()));
    }

    match app_state.storage_service.delete(&path).await? {
        DeleteOutcome::Deleted => {
            info!("Deleted {}", path);
            Ok(HttpResponse::Ok().finish())
        }
        DeleteOutcome::NotFound => {
            warn!("Delete of missing resource {}", path);
            Err(CabinetError::NotFound(format!("no such resource: {}", path)))
        }
    }
}

/// CORS preflight; succeeds for any well-formed path without looking at tokens
pub async fn options_service(req: HttpRequest, tail: web::Path<String>) -> HttpResponse {
    let cors = Cors::from_request(&req);
    let result = ResourcePath::parse(&tail).map(|_| HttpResponse::Ok().finish());
    finish(&cors, result)
}

/// Liveness probe
pub async fn ohai() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().content_type("text/plain; charset=utf-8").body("Ohai."))
}

/// Route table shared by the binary and the integration tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ohai", web::get().to(ohai))
        .route("/authenticate/{user}", web::get().to(authenticate::authenticate_form))
        .route("/authenticate/{user}", web::post().to(authenticate::authenticate_submit))
        .route("/authenticate/{user}", web::delete().to(authenticate::revoke_token))
        .route("/{tail:.*}", web::get().to(get_service))
        .route("/{tail:.*}", web::head().to(head_service))
        .route("/{tail:.*}", web::put().to(put_service))
        .route("/{tail:.*}", web::delete().to(delete_service))
        .route("/{tail:.*}", web::route().method(Method::OPTIONS).to(options_service));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Version;

    fn summary(key: &str) -> ObjectSummary {
        ObjectSummary {
            key: key.to_string(),
            content_type: "text/plain".to_string(),
            size: 3,
            version: Version::new(1, b"abc", "text/plain"),
        }
    }

    #[test]
    fn test_folder_items_direct_children() {
        let summaries = vec![summary("work/monday"), summary("work/archive/old"), summary("work/archive/older")];
        let items = folder_items("work/", &summaries);

        assert_eq!(items.len(), 2);
        assert_eq!(items["monday"]["Content-Length"], 3);
        assert_eq!(items["monday"]["Content-Type"], "text/plain");
        assert!(items.contains_key("archive/"));
    }

    #[test]
    fn test_folder_items_root() {
        let items = folder_items("", &[summary("todo"), summary("work/monday")]);
        assert!(items.contains_key("todo"));
        assert!(items.contains_key("work/"));
    }
}
