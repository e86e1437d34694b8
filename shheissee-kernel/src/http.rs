/**
 * HTTP API - Read-only dashboard endpoints
 *
 * ROLE: Serves the dashboard cache as JSON. Handlers never touch the engine,
 * only `DashboardFeed`, so a long scan cycle does not stall requests.
 *
 * ROUTES:
 * - GET /health              -> "ok"
 * - GET /api/status          -> totals per severity
 * - GET /api/attacks?limit=N -> last N cached attacks (default 50), oldest first
 *
 * SECURITY:
 * - When an API key is configured (`SHHEISSEE_API_KEY`), every route except
 *   /health requires header `x-api-key`. Unset means open local access.
 */

use anyhow::Context;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::dashboard::DashboardFeed;
use crate::models::{Attack, Severity};

pub const API_KEY_ENV: &str = "SHHEISSEE_API_KEY";
const DEFAULT_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: DashboardFeed,
    pub api_key: Option<String>,
}

impl AppState {
    /// API key taken from `SHHEISSEE_API_KEY`; empty counts as unset
    pub fn from_env(dashboard: DashboardFeed) -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        Self { dashboard, api_key }
    }
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    if req.uri().path().starts_with("/health") {
        return Ok(next.run(req).await);
    }
    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!("Rejected API request to {} without a valid key", req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/status", get(get_status))
        .route("/api/attacks", get(get_attacks))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

pub async fn serve(port: u16, app_state: AppState) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding dashboard on {}", addr))?;
    info!("Dashboard listening on http://{}", addr);
    axum::serve(listener, build_router(app_state))
        .await
        .context("dashboard server stopped")
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusView {
    pub status: String,
    pub total_attacks: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttacksView {
    pub attacks: Vec<Attack>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
struct AttacksParams {
    limit: Option<usize>,
}

// GET /api/status
async fn get_status(State(app): State<AppState>) -> Json<StatusView> {
    let snapshot = app.dashboard.snapshot();
    let count = |severity: Severity| snapshot.attacks.iter().filter(|a| a.severity == severity).count();

    Json(StatusView {
        status: "active".into(),
        total_attacks: snapshot.total_attacks,
        high: count(Severity::High),
        medium: count(Severity::Medium),
        low: count(Severity::Low),
        timestamp: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    })
}

// GET /api/attacks?limit=N
async fn get_attacks(State(app): State<AppState>, Query(params): Query<AttacksParams>) -> Json<AttacksView> {
    let attacks = app.dashboard.recent(params.limit.unwrap_or(DEFAULT_LIMIT));
    Json(AttacksView {
        count: attacks.len(),
        attacks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttackKind;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn dashboard_with(severities: &[Severity]) -> DashboardFeed {
        let dashboard = DashboardFeed::new();
        let attacks = severities
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Attack::new(
                    AttackKind::UnknownDevice,
                    *s,
                    format!("Unknown device detected: 10.0.0.{}", i),
                    format!("10.0.0.{}", i),
                    OffsetDateTime::now_utc(),
                )
            })
            .collect();
        dashboard.replace(severities.len(), attacks);
        dashboard
    }

    fn open_state(dashboard: DashboardFeed) -> AppState {
        AppState { dashboard, api_key: None }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(router: Router, uri: &str) -> T {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = build_router(open_state(DashboardFeed::new()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_status_counts() {
        let dashboard = dashboard_with(&[Severity::High, Severity::High, Severity::Medium, Severity::Low]);
        let status: StatusView = get_json(build_router(open_state(dashboard)), "/api/status").await;

        assert_eq!(status.status, "active");
        assert_eq!(status.total_attacks, 4);
        assert_eq!((status.high, status.medium, status.low), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_attacks_limit() {
        let dashboard = dashboard_with(&[Severity::High; 60]);

        let default: AttacksView = get_json(build_router(open_state(dashboard.clone())), "/api/attacks").await;
        assert_eq!(default.count, 50);
        assert_eq!(default.attacks.last().map(|a| a.target.as_str()), Some("10.0.0.59"));

        let two: AttacksView = get_json(build_router(open_state(dashboard)), "/api/attacks?limit=2").await;
        let targets: Vec<&str> = two.attacks.iter().map(|a| a.target.as_str()).collect();
        assert_eq!(targets, vec!["10.0.0.58", "10.0.0.59"]);
    }

    #[tokio::test]
    async fn test_api_key_required_when_set() {
        let state = AppState {
            dashboard: DashboardFeed::new(),
            api_key: Some("secret".into()),
        };

        let denied = build_router(state.clone())
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .header("x-api-key", "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);

        let health = build_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
