// tests/router_tests.rs
//
// Drives a router with the api-response layers installed, end to end,
// without binding a socket.

use api_response::fields::FieldMarker::{AutoTrim, XssCheck};
use api_response::{
    ApiException, ApiResponse, ApiResponseConfig, ApiResponseRouterExt, ApiResult, FieldSpec,
    Path, ProblemDetail, Query, StringFields, TraceId, Validatable, ValidatedJson,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tower::ServiceExt;

#[derive(Debug, Deserialize)]
struct NoteRequest {
    title: String,
    body: String,
}

impl StringFields for NoteRequest {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("title", &[AutoTrim]),
        FieldSpec::new("body", &[AutoTrim, XssCheck]),
    ];
}

impl Validatable for NoteRequest {}

#[derive(Debug, Deserialize)]
struct Search {
    q: String,
}

async fn create_note(ValidatedJson(req): ValidatedJson<NoteRequest>) -> ApiResponse<Value> {
    ApiResponse::created(
        "Note created",
        serde_json::json!({"title": req.title, "body": req.body}),
    )
}

async fn get_note(Path(id): Path<u64>) -> ApiResult<ApiResponse<u64>> {
    if id == 0 {
        return Err(ApiException::not_found(format!("Note {id} does not exist")).into());
    }
    Ok(ApiResponse::success_with("Note found", id))
}

async fn search(Query(search): Query<Search>) -> ApiResponse<String> {
    ApiResponse::success_with("ok", search.q)
}

async fn whoami(trace_id: TraceId) -> ApiResponse<String> {
    ApiResponse::success_with("ok", trace_id.to_string())
}

async fn explode() -> ApiResponse<()> {
    let missing: Option<u8> = None;
    let _value = missing.expect("value should have been loaded");
    ApiResponse::success("unreachable")
}

fn app(config: &ApiResponseConfig) -> Router {
    Router::new()
        .route("/notes", post(create_note))
        .route("/notes/:id", get(get_note))
        .route("/search", get(search))
        .route("/whoami", get(whoami))
        .route("/explode", get(explode))
        .with_api_response(config)
}

async fn send(router: Router, request: Request<Body>) -> Response {
    router.oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn trace_header(response: &Response) -> String {
    response
        .headers()
        .get("x-trace-id")
        .expect("trace header")
        .to_str()
        .unwrap()
        .to_string()
}

// ─── Success envelope ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_created_envelope_with_trimmed_fields() {
    let response = send(
        app(&ApiResponseConfig::default()),
        post_json("/notes", r#"{"title":"  groceries  ","body":"  milk, eggs  "}"#),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["status"], 201);
    assert_eq!(body["message"], "Note created");
    assert_eq!(body["content"]["title"], "groceries");
    assert_eq!(body["content"]["body"], "milk, eggs");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_trace_id_extractor_matches_header() {
    let response = send(app(&ApiResponseConfig::default()), get_request("/whoami")).await;
    let header = trace_header(&response);
    let body = json_body(response).await;
    assert_eq!(body["content"], header);
}

#[tokio::test]
async fn test_each_request_gets_its_own_trace_id() {
    let router = app(&ApiResponseConfig::default());
    let first = send(router.clone(), get_request("/whoami")).await;
    let second = send(router, get_request("/whoami")).await;
    assert_ne!(trace_header(&first), trace_header(&second));
    assert!(TraceId::current().is_none());
}

// ─── Problem details ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_markup_rejected_without_echo() {
    let response = send(
        app(&ApiResponseConfig::default()),
        post_json("/notes", r#"{"title":"t","body":"<script>x</script>"}"#),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let header = trace_header(&response);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains("<script>"));

    let problem: ProblemDetail = serde_json::from_str(&text).unwrap();
    assert_eq!(problem.detail, "Validation Failed");
    assert!(problem.errors.unwrap().contains_key("body"));
    assert_eq!(problem.trace_id.to_string(), header);
}

#[tokio::test]
async fn test_domain_exception_keeps_its_status() {
    let response = send(app(&ApiResponseConfig::default()), get_request("/notes/0")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["detail"], "Note 0 does not exist");
    assert_eq!(body["title"], "Not Found");
}

#[tokio::test]
async fn test_path_type_mismatch() {
    let response = send(app(&ApiResponseConfig::default()), get_request("/notes/abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Invalid value 'abc' for parameter"), "{detail}");
}

#[tokio::test]
async fn test_missing_query_parameter() {
    let response = send(app(&ApiResponseConfig::default()), get_request("/search")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(
        body["detail"],
        "Required request parameter 'q' is missing from the query string."
    );
}

#[tokio::test]
async fn test_malformed_body() {
    let response = send(
        app(&ApiResponseConfig::default()),
        post_json("/notes", r#"{"title": "#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(
        body["detail"],
        "Malformed JSON request. Please check your request body format."
    );
}

#[tokio::test]
async fn test_unsupported_media_type() {
    let request = Request::builder()
        .method("POST")
        .uri("/notes")
        .header(header::CONTENT_TYPE, "application/xml")
        .body(Body::from("<note/>"))
        .unwrap();
    let response = send(app(&ApiResponseConfig::default()), request).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_unknown_route_is_problem_404() {
    let response = send(app(&ApiResponseConfig::default()), get_request("/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let header = trace_header(&response);
    let body = json_body(response).await;
    assert_eq!(body["detail"], "The requested resource '/nope' was not found.");
    assert_eq!(body["traceId"], header);
}

#[tokio::test]
async fn test_wrong_method_is_problem_405() {
    let response = send(app(&ApiResponseConfig::default()), get_request("/notes")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().contains_key(header::ALLOW));
    let body = json_body(response).await;
    let detail = body["detail"].as_str().unwrap();
    assert_eq!(
        detail,
        "Method 'GET' is not supported for this endpoint. Supported methods are: [POST]"
    );
}

#[tokio::test]
async fn test_panic_is_problem_500() {
    let response = send(app(&ApiResponseConfig::default()), get_request("/explode")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let header = trace_header(&response);
    let body = json_body(response).await;
    assert_eq!(body["detail"], "An unexpected internal failure occurred.");
    assert_eq!(body["traceId"], header);
    assert!(!body.to_string().contains("value should have been loaded"));
}

// ─── Configuration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disabled_translation_keeps_trace_header() {
    let config = ApiResponseConfig {
        enabled: false,
        ..ApiResponseConfig::default()
    };
    let response = send(app(&config), get_request("/nope")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-trace-id"));
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
}

#[tokio::test]
async fn test_trace_header_can_be_disabled() {
    let config = ApiResponseConfig {
        trace_header: None,
        ..ApiResponseConfig::default()
    };
    let response = send(app(&config), get_request("/whoami")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-trace-id").is_none());
}
