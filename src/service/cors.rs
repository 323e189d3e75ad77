//! CORS headers attached to every resource response

use actix_web::http::header::{self, HeaderValue};
use actix_web::{HttpRequest, HttpResponse};

pub const ALLOWED_METHODS: &str = "GET, PUT, DELETE";
pub const ALLOWED_HEADERS: &str = "Authorization, Content-Type, Origin";
pub const EXPOSED_HEADERS: &str = "ETag, Content-Type, Content-Length, Last-Modified";

#[derive(Debug, Clone)]
pub struct Cors {
    origin: HeaderValue,
}

impl Cors {
    /// Echo the request's `Origin` when present, wildcard otherwise
    pub fn from_request(req: &HttpRequest) -> Self {
        let origin = req
            .headers()
            .get(header::ORIGIN)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("*"));
        Self { origin }
    }

    pub fn apply(&self, response: &mut HttpResponse) {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
        headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static(EXPOSED_HEADERS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_wildcard_without_origin() {
        let req = TestRequest::default().to_http_request();
        let mut response = HttpResponse::Ok().finish();
        Cors::from_request(&req).apply(&mut response);

        let headers = response.headers();
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(), ALLOWED_METHODS);
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(), ALLOWED_HEADERS);
    }

    #[test]
    fn test_origin_is_echoed_instead_of_wildcard() {
        let req = TestRequest::default()
            .insert_header(("Origin", "https://app.example"))
            .to_http_request();
        let mut response = HttpResponse::NotFound().finish();
        Cors::from_request(&req).apply(&mut response);

        let values: Vec<_> = response.headers().get_all(header::ACCESS_CONTROL_ALLOW_ORIGIN).collect();
        assert_eq!(values, vec!["https://app.example"]);
    }
}
