//! CORS and error normalization for Lambda HTTP handlers.
//!
//! [`Cors::handle`] answers preflight requests itself, runs the wrapped
//! handler for everything else and guarantees a JSON response carrying the
//! CORS and no-cache headers, whatever the handler did.

use std::future::Future;

use lambda_http::http::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA,
};
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Request, Response};
use tracing::{error, warn};

use crate::http::ErrorBody;
use crate::Config;

const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

const FALLBACK_BODY: &str = r#"{"error":"Internal server error"}"#;

/// Wraps handlers with CORS headers and error normalization.
#[derive(Debug, Clone)]
pub struct Cors {
    allow_origin: HeaderValue,
    development: bool,
}

impl Cors {
    /// Create a wrapper allowing `allow_origin`.
    ///
    /// `development` controls whether error responses include the error chain.
    pub fn new(allow_origin: &str, development: bool) -> Self {
        let allow_origin = HeaderValue::from_str(allow_origin).unwrap_or_else(|_| {
            warn!(origin = allow_origin, "invalid CORS origin, allowing all origins");
            HeaderValue::from_static("*")
        });

        Self {
            allow_origin,
            development,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cors_origin, config.is_development())
    }

    /// Run `inner` for `event`, normalizing whatever it produces.
    ///
    /// Never returns `Err`; the `Result` only satisfies the Lambda runtime.
    pub async fn handle<F, Fut>(
        &self,
        event: Request,
        inner: F,
    ) -> Result<Response<Body>, lambda_http::Error>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = crate::Result<Option<Response<Body>>>>,
    {
        if *event.method() == Method::OPTIONS {
            return Ok(self.preflight());
        }

        let mut response = match inner(event).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                error!("handler returned no response");
                json(StatusCode::INTERNAL_SERVER_ERROR, &ErrorBody::new("Internal server error"))
            }
            Err(e) => {
                error!(error = %e, "Error in handler");
                let mut body = ErrorBody::new(e.to_string());
                if self.development {
                    body.stack = Some(format!("{:?}", e));
                }
                let status = StatusCode::from_u16(e.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                json(status, &body)
            }
        };

        let headers = response.headers_mut();
        self.insert_cors(headers);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(EXPIRES, HeaderValue::from_static("0"));

        Ok(response)
    }

    fn preflight(&self) -> Response<Body> {
        let mut response = Response::new(Body::Empty);
        self.insert_cors(response.headers_mut());
        response
    }

    fn insert_cors(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
    }
}

fn json(status: StatusCode, body: &ErrorBody) -> Response<Body> {
    let text = serde_json::to_string(body).unwrap_or_else(|_| FALLBACK_BODY.to_string());
    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::json_response;
    use crate::Error;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn request(method: &str) -> Request {
        lambda_http::http::Request::builder()
            .method(method)
            .uri("/.netlify/functions/search-flights")
            .body(Body::Empty)
            .unwrap()
    }

    fn body_json(response: &Response<Body>) -> Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_preflight_skips_handler() {
        let cors = Cors::new("*", false);
        let called = AtomicBool::new(false);

        let response = cors
            .handle(request("OPTIONS"), |_| async {
                called.store(true, Ordering::SeqCst);
                Ok(None)
            })
            .await
            .unwrap();

        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(response.status(), 200);
        assert!(response.body().is_empty());
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(
            response.headers()["access-control-allow-methods"],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
        assert_eq!(
            response.headers()["access-control-allow-headers"],
            "Content-Type, Authorization"
        );
    }

    #[tokio::test]
    async fn test_headers_added_to_handler_response() {
        let cors = Cors::new("*", false);

        let response = cors
            .handle(request("POST"), |_| async {
                let mut response = json_response(201, &serde_json::json!({ "ok": true })).unwrap();
                response
                    .headers_mut()
                    .insert("x-request-id", HeaderValue::from_static("abc"));
                response
                    .headers_mut()
                    .insert(CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
                Ok(Some(response))
            })
            .await
            .unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(body_json(&response)["ok"], true);
        let headers = response.headers();
        assert_eq!(headers["x-request-id"], "abc");
        assert_eq!(headers["cache-control"], "no-cache, no-store, must-revalidate");
        assert_eq!(headers["pragma"], "no-cache");
        assert_eq!(headers["expires"], "0");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_missing_response_becomes_500() {
        let cors = Cors::new("*", false);

        let response = cors
            .handle(request("GET"), |_| async { Ok(None) })
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        assert_eq!(
            body_json(&response),
            serde_json::json!({ "error": "Internal server error" })
        );
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_error_uses_its_status() {
        let cors = Cors::new("*", false);

        let response = cors
            .handle(request("POST"), |_| async {
                Err(Error::Validation("origin is required".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body = body_json(&response);
        assert_eq!(body["error"], "origin is required");
        assert!(body.get("stack").is_none());
    }

    #[tokio::test]
    async fn test_error_stack_only_in_development() {
        let cors = Cors::new("https://routes.example.com", true);

        let response = cors
            .handle(request("POST"), |_| async {
                Err(Error::Config("Failed to load configuration".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body = body_json(&response);
        assert_eq!(body["error"], "Configuration error: Failed to load configuration");
        assert!(body["stack"].as_str().unwrap().contains("Config"));
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://routes.example.com"
        );
    }

    #[test]
    fn test_invalid_origin_falls_back_to_wildcard() {
        let cors = Cors::new("bad\norigin", false);
        assert_eq!(cors.allow_origin, "*");
    }

    #[test]
    fn test_origin_from_config() {
        let config = Config::from_lookup(|name| {
            (name == "CORS_ORIGIN").then(|| "https://routes.example.com".to_string())
        });
        let cors = Cors::from_config(&config);
        assert_eq!(cors.allow_origin, "https://routes.example.com");
        assert!(cors.development);

        let cors = Cors::from_config(&Config::from_lookup(|_| None));
        assert_eq!(cors.allow_origin, "*");
    }
}
