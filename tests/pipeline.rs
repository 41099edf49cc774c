//! Request pipeline behaviour, driven in-process.

use std::sync::{Arc, Mutex};

use app_service::config::AppConfig;
use app_service::http::{ParsedUrl, PipelineBuilder, Senders, ServiceError};
use app_service::observability::{ProfileSample, ProfileSink};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;

mod common;

const LONG_TEXT: &str = "webida app service response body long enough to be worth compressing";

fn app_router() -> Router {
    Router::new()
        .route("/webida/api/app/hello", get(|| async { LONG_TEXT }))
        .route(
            "/webida/api/app/echo",
            get(|url: ParsedUrl, senders: Senders| async move {
                senders.ok(url.get("name").unwrap_or("nobody").to_string())
            }),
        )
        .route(
            "/webida/api/app/fs",
            get(|| async { ServiceError::connect("http://localhost:5003", "connection refused") }),
        )
        .route(
            "/webida/api/app/missing",
            get(|senders: Senders| async move {
                senders.fail(ServiceError::client(StatusCode::NOT_FOUND, "no such app"))
            }),
        )
        .route(
            "/webida/api/app/leaky",
            get(|| async {
                let mut response = "ok".into_response();
                response
                    .headers_mut()
                    .insert("x-powered-by", HeaderValue::from_static("Express"));
                response
            }),
        )
        .route("/webida/api/app/boom", get(panicking_handler))
        .fallback(|| async { (StatusCode::NOT_FOUND, LONG_TEXT) })
}

async fn panicking_handler() -> &'static str {
    panic!("handler bug")
}

fn pipeline(config: AppConfig) -> Router {
    PipelineBuilder::new(Arc::new(config)).build(app_router()).unwrap()
}

async fn send(router: Router, request: Request<Body>) -> Response {
    router.oneshot(request).await.unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn every_response_carries_frame_option_and_cookies() {
    for uri in ["/webida/api/app/hello", "/no/such/route"] {
        let response = send(pipeline(common::test_config()), get_request(uri)).await;

        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN", "{uri}");
        let cookies = cookies(&response);
        assert_eq!(cookies.len(), 11, "{uri}");
        assert!(cookies.iter().all(|c| c.contains("; Domain=webida.test;")), "{uri}");
    }
}

#[tokio::test]
async fn cookie_domain_widens_behind_reverse_proxy() {
    let mut config = common::test_config();
    config.use_reverse_proxy = true;

    let response = send(pipeline(config), get_request("/webida/api/app/hello")).await;
    assert!(cookies(&response)
        .iter()
        .all(|c| c.contains("; Domain=.webida.test;")));
}

#[tokio::test]
async fn compression_applies_whichever_stage_answered() {
    for uri in ["/webida/api/app/hello", "/no/such/route"] {
        let request = Request::builder()
            .uri(uri)
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();
        let response = send(pipeline(common::test_config()), request).await;

        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip", "{uri}");
    }
}

#[tokio::test]
async fn cors_headers_on_simple_requests() {
    for uri in ["/webida/api/app/hello", "/no/such/route"] {
        let request = Request::builder()
            .uri(uri)
            .header(header::ORIGIN, "http://ide.webida.test")
            .body(Body::empty())
            .unwrap();
        let response = send(pipeline(common::test_config()), request).await;

        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://ide.webida.test",
            "{uri}"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true", "{uri}");
    }
}

#[tokio::test]
async fn cors_preflight_advertises_policy() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/webida/api/app/hello")
        .header(header::ORIGIN, "http://ide.webida.test")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,last-event-id")
        .body(Body::empty())
        .unwrap();
    let response = send(pipeline(common::test_config()), request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();

    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    for method in ["GET", "POST", "DELETE"] {
        assert!(methods.contains(method), "{methods}");
    }
    assert!(!methods.contains("PUT"), "{methods}");

    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    for name in [
        "authorization",
        "accept",
        "accept-language",
        "content-language",
        "content-type",
        "last-event-id",
        "x-requested-with",
    ] {
        assert!(allowed.split(',').any(|h| h.trim() == name), "{name} in {allowed}");
    }

    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
}

#[tokio::test]
async fn handlers_see_parsed_url_and_senders() {
    let response = send(
        pipeline(common::test_config()),
        get_request("/webida/api/app/echo?name=web%20ida"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "result": "ok", "data": "web ida" })
    );
}

#[tokio::test]
async fn client_errors_keep_their_status() {
    let response = send(pipeline(common::test_config()), get_request("/webida/api/app/missing")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "result": "failed", "reason": "no such app" })
    );
}

#[tokio::test]
async fn connection_failures_become_uniform_503() {
    let response = send(pipeline(common::test_config()), get_request("/webida/api/app/fs")).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["retry-after"], "1");
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");

    let body = json_body(response).await;
    assert_eq!(body["result"], "failed");
    assert_eq!(
        body["reason"],
        "service unavailable: http://localhost:5003"
    );
}

#[tokio::test]
async fn rewritten_503_is_still_decorated_by_outer_stages() {
    let request = Request::builder()
        .uri("/webida/api/app/fs")
        .header(header::ORIGIN, "http://ide.webida.test")
        .body(Body::empty())
        .unwrap();
    let response = send(pipeline(common::test_config()), request).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(cookies(&response).len(), 11);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://ide.webida.test"
    );
}

#[tokio::test]
async fn handler_panic_becomes_uniform_500() {
    let response = send(pipeline(common::test_config()), get_request("/webida/api/app/boom")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert_eq!(cookies(&response).len(), 11);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "result": "failed", "reason": "internal server error" })
    );
}

#[tokio::test]
async fn framework_fingerprint_is_stripped() {
    let response = send(pipeline(common::test_config()), get_request("/webida/api/app/leaky")).await;
    assert!(response.headers().get("x-powered-by").is_none());
    assert!(response.headers().get(header::SERVER).is_none());
}

#[derive(Default)]
struct CollectSink(Mutex<Vec<ProfileSample>>);

impl ProfileSink for CollectSink {
    fn record(&self, sample: &ProfileSample) {
        self.0.lock().unwrap().push(sample.clone());
    }
}

#[tokio::test]
async fn profiler_samples_app_api_when_enabled() {
    let mut config = common::test_config();
    config.profiler.enabled = true;

    let sink = Arc::new(CollectSink::default());
    let router = PipelineBuilder::new(Arc::new(config))
        .with_profile_sink(sink.clone())
        .build(app_router())
        .unwrap();

    send(router.clone(), get_request("/webida/api/app/hello")).await;
    send(router, get_request("/webida/api/fs/list")).await;

    let samples = sink.0.lock().unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].endpoint, "/webida/api/app/hello");
    assert_eq!(&*samples[0].unit_name, "app0");
    assert_eq!(&*samples[0].svc_type, "app");
    assert_eq!(samples[0].status, StatusCode::OK);
}

#[tokio::test]
async fn profiler_absent_when_disabled() {
    let sink = Arc::new(CollectSink::default());
    let router = PipelineBuilder::new(Arc::new(common::test_config()))
        .with_profile_sink(sink.clone())
        .build(app_router())
        .unwrap();

    send(router, get_request("/webida/api/app/hello")).await;
    assert!(sink.0.lock().unwrap().is_empty());
}

#[test]
fn malformed_app_url_fails_assembly() {
    let mut config = common::test_config();
    config.hosts.app = "not a url".to_string();

    assert!(PipelineBuilder::new(Arc::new(config)).build(app_router()).is_err());
}
