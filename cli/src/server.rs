use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use gestar_core::db::Database;
use gestar_core::error::ReportError;
use gestar_core::models::{ReportKind, ReportRequest};
use gestar_core::quick_access::QrEncoder;
use gestar_core::report::{CompiledReport, ReportCompiler, ReportConfig};

use crate::commands::DEFAULT_REPORT_DAYS;

// Report endpoints take no body.
const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    report_config: Arc<ReportConfig>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl ErrorResponse {
    fn new(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!("report generation failed: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate report".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::NotFound(_) => Self::NotFound(err.to_string()),
            ReportError::InvalidRange { .. } | ReportError::RangeTooLong { .. } => {
                Self::BadRequest(err.to_string())
            }
            ReportError::Generation(inner) => Self::Internal(inner),
        }
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "Invalid or missing API key".to_string(),
                )),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    response
}

// --- Handlers ---

fn parse_query_date(name: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest(format!("Invalid {name} '{value}'. Use YYYY-MM-DD"))
    })
}

/// Resolve the requested period. `endDate` defaults to today and `startDate`
/// to `DEFAULT_REPORT_DAYS` days before it. Order is checked by the compiler.
fn resolve_period(query: &ReportQuery) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let end = match query.end_date.as_deref() {
        Some(s) => parse_query_date("endDate", s)?,
        None => Local::now().date_naive(),
    };
    let start = match query.start_date.as_deref() {
        Some(s) => parse_query_date("startDate", s)?,
        None => end - chrono::Duration::days(DEFAULT_REPORT_DAYS - 1),
    };
    Ok((start, end))
}

async fn generate_report(
    state: AppState,
    kind: ReportKind,
    owner_id: String,
    query: &ReportQuery,
) -> Result<Response, ApiError> {
    let (start, end) = resolve_period(query)?;
    let request = ReportRequest {
        owner_id,
        start,
        end,
        kind,
    };

    let report: CompiledReport = tokio::task::spawn_blocking(move || {
        let db = state.db.lock().unwrap_or_else(PoisonError::into_inner);
        let encoder = QrEncoder;
        ReportCompiler::new(&*db, &*db, &state.report_config)
            .with_encoder(&encoder)
            .compile(&request)
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("report task failed: {e}")))??;

    let disposition = format!("attachment; filename=\"{}\"", report.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.bytes,
    )
        .into_response())
}

async fn get_doctor_report(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    generate_report(state, ReportKind::Clinician, owner_id, &query).await
}

async fn get_patient_report(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    generate_report(state, ReportKind::Patient, owner_id, &query).await
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/reports/doctor/{owner_id}", get(get_doctor_report))
        .route("/reports/patient/{owner_id}", get(get_patient_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of the key. Short keys are hidden entirely.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub async fn start_server(
    db: Database,
    report_config: ReportConfig,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    new_api_key: bool,
) -> anyhow::Result<()> {
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        report_config: Arc::new(report_config),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    match api_key {
        Some(ref key) if new_api_key => {
            eprintln!("Generated new API key: {key}");
            eprintln!("Send it as 'Authorization: Bearer <key>' (stored in the data directory).");
        }
        Some(ref key) => {
            eprintln!("API key: {} (see api_key file in data directory)", mask_key(key));
        }
        None => {
            eprintln!("Warning: Authentication disabled (--no-auth). Reports are open to anyone.");
        }
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can download reports."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!(%bind, port, "report server listening");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use chrono::NaiveTime;
    use gestar_core::models::{GlucoseCategory, NewMeasurement, NewOwner};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_owner(&NewOwner {
            id: "u1".to_string(),
            name: "Ana".to_string(),
            due_date: None,
        })
        .unwrap();
        db.insert_glucose(&NewMeasurement {
            owner_id: "u1".to_string(),
            value: 88.0,
            category: GlucoseCategory::Fasting,
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            note: None,
        })
        .unwrap();
        db
    }

    fn test_state(api_key: Option<String>) -> AppState {
        AppState {
            db: Arc::new(Mutex::new(seeded_db())),
            report_config: Arc::new(ReportConfig::default()),
            api_key,
        }
    }

    fn test_app(api_key: Option<String>) -> Router {
        build_router(test_state(api_key))
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn doctor_report_returns_pdf_attachment() {
        let response = test_app(None)
            .oneshot(get_request(
                "/reports/doctor/u1?startDate=2024-03-01&endDate=2024-03-07",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"relatorio-medico-u1-"));
        assert!(disposition.ends_with(".pdf\""));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn patient_report_uses_glycemic_filename() {
        let response = test_app(None)
            .oneshot(get_request(
                "/reports/patient/u1?startDate=2024-03-01&endDate=2024-03-07",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("relatorio-glicemia-u1-"));
    }

    #[tokio::test]
    async fn missing_dates_default_to_recent_window() {
        let response = test_app(None)
            .oneshot(get_request("/reports/patient/u1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_owner_returns_404() {
        let response = test_app(None)
            .oneshot(get_request(
                "/reports/doctor/ghost?startDate=2024-03-01&endDate=2024-03-07",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn malformed_date_returns_400() {
        let response = test_app(None)
            .oneshot(get_request("/reports/doctor/u1?startDate=03/01/2024"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("startDate"));
    }

    #[tokio::test]
    async fn inverted_range_returns_400() {
        let response = test_app(None)
            .oneshot(get_request(
                "/reports/doctor/u1?startDate=2024-03-10&endDate=2024-03-01",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn overlong_range_returns_400() {
        let response = test_app(None)
            .oneshot(get_request(
                "/reports/doctor/u1?startDate=1900-01-01&endDate=2024-12-31",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("limit of 366 days"));

        let response = test_app(None)
            .oneshot(get_request(
                "/reports/patient/u1?startDate=2024-01-01&endDate=2024-12-31",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn internal_error_hides_details() {
        let response =
            ApiError::Internal(anyhow::anyhow!("disk I/O error at /var/db")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Failed to generate report");
    }

    #[test]
    fn report_errors_map_to_api_errors() {
        assert!(matches!(
            ApiError::from(ReportError::NotFound("x".to_string())),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(ReportError::InvalidRange {
                start: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            }),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(ReportError::RangeTooLong {
                days: 400,
                max: 366
            }),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(ReportError::Generation(anyhow::anyhow!("boom"))),
            ApiError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn auth_missing_key_returns_401() {
        let response = test_app(Some("test-key-abc123".to_string()))
            .oneshot(get_request("/reports/patient/u1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["message"], "Invalid or missing API key");
    }

    #[tokio::test]
    async fn auth_wrong_key_returns_401() {
        let response = test_app(Some("test-key-abc123".to_string()))
            .oneshot(
                axum::http::Request::get("/reports/patient/u1")
                    .header("Authorization", "Bearer wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_correct_key_succeeds() {
        let response = test_app(Some("test-key-abc123".to_string()))
            .oneshot(
                axum::http::Request::get("/reports/patient/u1")
                    .header("Authorization", "Bearer test-key-abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn security_headers_on_auth_failure() {
        let response = test_app(Some("secret".to_string()))
            .oneshot(get_request("/reports/doctor/u1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
    }

    #[test]
    fn mask_key_handles_short_and_non_ascii_keys() {
        assert_eq!(mask_key("abcd1234efgh"), "abcd...efgh");
        assert_eq!(mask_key("abc"), "****");
        assert_eq!(mask_key(""), "****");
        assert_eq!(mask_key("ééééxxxxçççç"), "éééé...çççç");
    }
}
