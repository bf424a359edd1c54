use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use formfill_core::config_file::ConfigFile;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::handlers;
use crate::state::AppState;

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;
pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:5173", "http://127.0.0.1:5173"];
const EXTENSION_ORIGIN_PREFIX: &str = "chrome-extension://";

/// HTTP-surface settings, resolved from `[server]` and `FORMFILL_BIND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind: String,
    pub cors_origins: Vec<String>,
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

impl ServerSettings {
    pub fn resolve(file: &ConfigFile, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(server) = &file.server {
            if let Some(bind) = &server.bind {
                settings.bind = bind.clone();
            }
            if let Some(origins) = &server.cors_origins {
                settings.cors_origins = origins.clone();
            }
            if let Some(mb) = server.max_upload_mb {
                settings.max_upload_mb = mb;
            }
        }
        if let Some(bind) = lookup("FORMFILL_BIND").filter(|b| !b.trim().is_empty()) {
            settings.bind = bind;
        }
        settings
    }
}

/// Listed origins plus any browser-extension origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            allowed.contains(origin) || origin.as_bytes().starts_with(EXTENSION_ORIGIN_PREFIX.as_bytes())
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn build_router(state: Arc<AppState>, settings: &ServerSettings) -> Router {
    let body_limit = DefaultBodyLimit::max(settings.max_upload_mb * 1024 * 1024);

    Router::new()
        .route("/process", post(handlers::process::process))
        .route("/health", get(handlers::health::health))
        .layer(body_limit)
        .layer(cors_layer(&settings.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use formfill_core::oracle::mock::MockOracle;
    use formfill_core::{
        DecodeFailurePolicy, ExtractionSettings, FieldExtractor, OracleError, RetryPolicy,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const BOUNDARY: &str = "formfill-test-boundary";

    fn router(oracle: &Arc<MockOracle>, policy: DecodeFailurePolicy) -> Router {
        let settings = ExtractionSettings {
            retry: RetryPolicy::no_retries(),
            ..ExtractionSettings::default()
        };
        let state = Arc::new(AppState {
            extractor: FieldExtractor::new(oracle.clone(), settings),
            decode_failure_policy: policy,
        });
        build_router(state, &ServerSettings::default())
    }

    /// Hand-built multipart body. `file` is `(filename, bytes)`.
    fn multipart(file: Option<(&str, &[u8])>, form_fields: Option<&str>) -> Request<Body> {
        let mut body = Vec::new();
        if let Some((name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(fields) = form_fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"formFields\"\r\n\r\n{fields}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/process")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn text_upload_fills_fields() {
        let oracle = Arc::new(MockOracle::replying(
            r#"{"name": "John Smith", "email": null}"#,
        ));
        let app = router(&oracle, DecodeFailurePolicy::Reject);

        let (status, body) = send(
            app,
            multipart(
                Some(("claim.txt", b"Claimant: John Smith")),
                Some(r#"["name","email"]"#),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "success": true, "formData": { "name": "John Smith", "email": null } })
        );
        let prompt = oracle.last_request().unwrap().prompt.user;
        assert!(prompt.ends_with("Claimant: John Smith"));
    }

    #[tokio::test]
    async fn unsupported_extension_is_400_without_oracle_call() {
        let oracle = Arc::new(MockOracle::replying("{}"));
        let app = router(&oracle, DecodeFailurePolicy::Reject);

        let (status, body) = send(
            app,
            multipart(Some(("report.xyz", b"data")), Some(r#"["name"]"#)),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().contains("Unsupported file type"));
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_field_list_is_400() {
        let oracle = Arc::new(MockOracle::replying("{}"));
        let app = router(&oracle, DecodeFailurePolicy::Reject);

        let (status, body) = send(app, multipart(Some(("a.txt", b"hello")), Some("[]"))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Form fields list is empty"));
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn request_shape_errors() {
        let oracle = Arc::new(MockOracle::replying("{}"));

        let (status, body) = send(
            router(&oracle, DecodeFailurePolicy::Reject),
            multipart(None, Some(r#"["name"]"#)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("No file part"));

        let (status, body) = send(
            router(&oracle, DecodeFailurePolicy::Reject),
            multipart(Some(("", b"hello")), Some(r#"["name"]"#)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("No selected file"));

        let (status, body) = send(
            router(&oracle, DecodeFailurePolicy::Reject),
            multipart(Some(("a.txt", b"hello")), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("No form fields provided"));

        let (status, body) = send(
            router(&oracle, DecodeFailurePolicy::Reject),
            multipart(Some(("a.txt", b"hello")), Some("{not json")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid formFields JSON"));

        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn decode_failure_rejected_by_default() {
        let oracle = Arc::new(MockOracle::replying(r#"{"name": null}"#));
        let app = router(&oracle, DecodeFailurePolicy::Reject);

        let (status, body) = send(
            app,
            multipart(Some(("scan.pdf", b"not a pdf")), Some(r#"["name"]"#)),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("PDF"));
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn decode_failure_degrades_when_configured() {
        let oracle = Arc::new(MockOracle::replying(r#"{"name": null}"#));
        let app = router(&oracle, DecodeFailurePolicy::Degrade);

        let (status, body) = send(
            app,
            multipart(Some(("scan.pdf", b"not a pdf")), Some(r#"["name"]"#)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["formData"], json!({ "name": null }));
        let prompt = oracle.last_request().unwrap().prompt.user;
        assert!(prompt.contains("failed to read PDF"));
    }

    #[tokio::test]
    async fn oracle_failure_is_500() {
        let oracle = Arc::new(MockOracle::failing(OracleError::Unauthorized { status: 401 }));
        let app = router(&oracle, DecodeFailurePolicy::Reject);

        let (status, body) = send(
            app,
            multipart(Some(("a.md", b"# Claim")), Some(r#"["name"]"#)),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert!(!body["error"].as_str().unwrap().is_empty());
        assert!(body.get("formData").is_none());
    }

    #[tokio::test]
    async fn health_is_ok() {
        let oracle = Arc::new(MockOracle::replying("{}"));
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(router(&oracle, DecodeFailurePolicy::Reject), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn cors_allows_dev_server_and_extensions() {
        let oracle = Arc::new(MockOracle::replying("{}"));
        for (origin, allowed) in [
            ("http://localhost:5173", true),
            ("chrome-extension://abcdefghijklmnop", true),
            ("https://evil.example", false),
        ] {
            let request = Request::builder()
                .method("OPTIONS")
                .uri("/process")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap();
            let response = router(&oracle, DecodeFailurePolicy::Reject)
                .oneshot(request)
                .await
                .unwrap();
            let echoed = response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .map(|v| v.to_str().unwrap().to_string());
            assert_eq!(echoed.as_deref() == Some(origin), allowed, "{origin}");
        }
    }

    #[test]
    fn server_settings_env_overrides_file() {
        let file: ConfigFile =
            toml::from_str("[server]\nbind = \"127.0.0.1:9000\"\nmax_upload_mb = 10\n").unwrap();

        let from_file = ServerSettings::resolve(&file, |_| None);
        assert_eq!(from_file.bind, "127.0.0.1:9000");
        assert_eq!(from_file.max_upload_mb, 10);
        assert_eq!(from_file.cors_origins.len(), 2);

        let from_env = ServerSettings::resolve(&file, |k| {
            (k == "FORMFILL_BIND").then(|| "0.0.0.0:8080".to_string())
        });
        assert_eq!(from_env.bind, "0.0.0.0:8080");
    }
}
