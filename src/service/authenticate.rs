//! Token issuance endpoints under `/authenticate/{user}`

use actix_web::error::ErrorInternalServerError;
use actix_web::http::header;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use askama::Template;
use log::{info, warn};
use serde::Deserialize;
use url::Url;

use crate::app_state::AppState;
use crate::auth::bearer_token;
use crate::error::CabinetError;
use crate::token::Permission;

#[derive(Template)]
#[template(path = "authenticate.html")]
struct AuthenticateTemplate<'a> {
    user: &'a str,
    redirect_uri: &'a str,
    scope: &'a str,
    permission: &'a str,
    error: Option<&'a str>,
}

/// Query of the form page
#[derive(Debug, Deserialize)]
pub struct AuthenticateQuery {
    pub redirect_uri: String,
    pub scope: String,
    #[serde(default)]
    pub permission: Option<String>,
}

/// Fields posted by the form
#[derive(Debug, Deserialize)]
pub struct AuthenticateForm {
    pub password: String,
    pub redirect_uri: String,
    pub scope: String,
    #[serde(default)]
    pub permission: Option<String>,
}

fn parse_permission(raw: Option<&str>) -> Result<Permission, CabinetError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Permission::default()),
        Some(value) => value.parse(),
    }
}

/// Append `token=<token>` to the caller's redirect URI
pub fn build_redirect_uri(redirect_uri: &str, token: &str) -> Result<String, CabinetError> {
    let mut url = Url::parse(redirect_uri)
        .map_err(|e| CabinetError::MalformedRequest(format!("invalid redirect_uri: {}", e)))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.into())
}

fn render_form(
    user: &str,
    redirect_uri: &str,
    scope: &str,
    permission: Permission,
    error: Option<&str>,
) -> Result<HttpResponse, Error> {
    let page = AuthenticateTemplate {
        user,
        redirect_uri,
        scope,
        permission: permission.as_str(),
        error,
    };
    let body = page.render().map_err(ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(body))
}

pub async fn authenticate_form(user: web::Path<String>, query: web::Query<AuthenticateQuery>) -> Result<HttpResponse, Error> {
    let permission = parse_permission(query.permission.as_deref())?;
    render_form(&user, &query.redirect_uri, &query.scope, permission, None)
}

pub async fn authenticate_submit(
    user: web::Path<String>,
    form: web::Form<AuthenticateForm>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let user = user.into_inner();
    let permission = parse_permission(form.permission.as_deref())?;
    // Reject a bad redirect target before spending a token on it
    Url::parse(&form.redirect_uri)
        .map_err(|e| CabinetError::MalformedRequest(format!("invalid redirect_uri: {}", e)))?;

    match app_state.token_issuer.issue(&user, &form.password, &form.scope, permission) {
        Ok(token) => {
            let location = build_redirect_uri(&form.redirect_uri, &token.value)?;
            info!("Authenticated {} for {}, redirecting", user, form.scope);
            Ok(HttpResponse::Found().insert_header((header::LOCATION, location)).finish())
        }
        Err(CabinetError::Unauthorized(_)) => {
            warn!("Failed authentication attempt for {}", user);
            render_form(
                &user,
                &form.redirect_uri,
                &form.scope,
                permission,
                Some("Failed to authenticate! Please try again."),
            )
        }
        Err(e) => Err(e.into()),
    }
}

/// Revoke the presented bearer token
pub async fn revoke_token(req: HttpRequest, user: web::Path<String>, app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    app_state.token_issuer.revoke(&user, &bearer_token(&req))?;
    Ok(HttpResponse::Ok().finish())
}
