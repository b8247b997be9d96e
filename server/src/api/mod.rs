use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::App;

mod http;
mod ws;

const BODY_LIMIT_BYTES: usize = 64 * 1024;
const SIM_RATE_PER_MINUTE: u64 = 600;
const SIM_RATE_BURST: u32 = 50;

pub struct Api {
    app: Arc<App>,
}

type IpGovernorConfig =
    tower_governor::governor::GovernorConfig<SmartIpKeyExtractor, NoOpMiddleware>;

fn default_governor_config() -> Option<IpGovernorConfig> {
    GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .finish()
}

fn parse_env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

fn parse_env_u32(var: &str) -> Option<u32> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

impl Api {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    pub fn router(&self) -> Router {
        // Browser origins: comma list in ALLOWED_HTTP_ORIGINS, "*" or
        // unset allows any. This is an overlay backend, permissive by
        // default.
        let allowed_origins: Vec<HeaderValue> = std::env::var("ALLOWED_HTTP_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty() && *origin != "*")
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Invalid origin in ALLOWED_HTTP_ORIGINS: {origin}");
                    None
                }
            })
            .collect();
        let cors = if allowed_origins.is_empty() {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            CorsLayer::new().allow_origin(AllowOrigin::list(allowed_origins))
        }
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([header::HeaderName::from_static("x-request-id")]);

        // The sim routes can mint load; keep an IP rate limit in front of
        // them even where the simulator is enabled.
        let sim_rate_per_minute =
            parse_env_u64("SIM_RATE_LIMIT_PER_MIN").unwrap_or(SIM_RATE_PER_MINUTE);
        let sim_rate_burst = parse_env_u32("SIM_RATE_LIMIT_BURST").unwrap_or(SIM_RATE_BURST);
        let sim_governor = if sim_rate_per_minute > 0 && sim_rate_burst > 0 {
            let nanos_per_request = (60_000_000_000u64 / sim_rate_per_minute).max(1);
            GovernorConfigBuilder::default()
                .period(Duration::from_nanos(nanos_per_request))
                .burst_size(sim_rate_burst)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .or_else(|| {
                    tracing::warn!("invalid sim rate-limit config; falling back to defaults");
                    default_governor_config()
                })
                .map(Arc::new)
        } else {
            None
        };
        let sim_routes = Router::new()
            .route("/api/sim/bet", post(http::sim_bet))
            .route("/api/sim/bulk", post(http::sim_bulk));
        let sim_routes = match sim_governor {
            Some(config) => sim_routes.layer(GovernorLayer { config }),
            None => sim_routes,
        };

        Router::new()
            .route("/healthz", get(http::healthz))
            .route("/api/state", get(http::state))
            .route("/api/round/current", get(http::current_round))
            .route("/api/round/result/latest", get(http::latest_result))
            .route("/api/leaderboard", get(http::leaderboard))
            .route("/api/bet", post(http::bet))
            .route("/api/metrics", get(http::metrics))
            .route("/ws", get(ws::game_ws))
            .merge(sim_routes)
            .layer(cors)
            .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
            .with_state(self.app.clone())
    }
}

async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(header::HeaderName::from_static("x-request-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let mut response = next.run(req).await;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(
            header::HeaderName::from_static("x-request-id"),
            header_value,
        );
    }
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            "http.rate_limited"
        );
    }
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "http.request"
    );
    response
}
