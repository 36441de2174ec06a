use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use mockapi_core::AccessLogConfig;
use mockapi_otel::ACCESS_LOG_TARGET;

use crate::api::mock::ServedFile;
use crate::AppState;

/// Middleware state: settings, the sampling counter and the registry whose
/// active profile is reported on each line.
#[derive(Clone, Debug)]
pub struct AccessLog {
    config: Arc<AccessLogConfig>,
    counter: Arc<AtomicU64>,
    state: AppState,
}

impl AccessLog {
    pub fn new(config: AccessLogConfig, state: AppState) -> Self {
        Self {
            config: Arc::new(config),
            counter: Arc::new(AtomicU64::new(0)),
            state,
        }
    }

    /// Whether the `n`-th request (1-based) is written out.
    fn sampled(&self, n: u64) -> bool {
        let every = self.config.sample_n.max(1);
        n % every == 0
    }

    fn remote<B>(&self, req: &Request<B>) -> Option<String> {
        let forwarded = if self.config.trust_forward_headers {
            first_forwarded_ip(req.headers())
        } else {
            None
        };
        forwarded.or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|c| c.0.ip().to_string())
        })
    }
}

fn first_forwarded_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(v) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        let ip = v.split(',').next().unwrap_or("").trim();
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }
    let forwarded = headers.get("forwarded").and_then(|h| h.to_str().ok())?;
    forwarded
        .split(';')
        .flat_map(|s| s.split(','))
        .find_map(|part| part.trim().strip_prefix("for="))
        .map(|ip| ip.trim_matches('"').to_string())
}

/// One line per request on the access-log target: method, path, status,
/// duration, the profile that was active on arrival and, for mock
/// responses, the file that was served.
pub async fn access_log_mw(
    State(log): State<AccessLog>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !log.config.enabled {
        return next.run(req).await;
    }
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let remote = log.remote(&req);
    let profile = log.state.registry().active_profile();

    let res = next.run(req).await;

    let n = log.counter.fetch_add(1, Ordering::Relaxed) + 1;
    if !log.sampled(n) {
        return res;
    }
    let file = res
        .extensions()
        .get::<ServedFile>()
        .map(|served| served.0.display().to_string());
    tracing::info!(
        target: ACCESS_LOG_TARGET,
        ts = %chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        dur_ms = started.elapsed().as_millis() as u64,
        remote = %remote.as_deref().unwrap_or("-"),
        profile = %profile.as_deref().unwrap_or("-"),
        file = %file.as_deref().unwrap_or("-"),
        "access"
    );
    res
}
