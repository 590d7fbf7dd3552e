// crates/server/src/routes/index.rs
//! Plain-text route index at `GET /`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::state::AppState;

const BACKUP_ROUTES: &[&str] = &[
    "/",
    "/backup/tables",
    "/backup/list",
    "/backup/create",
    "/backup/upload/{name}",
    "/backup/download/{name}",
    "/backup/restore/{name}",
    "/backup/delete/{where}/{name}",
    "/backup/config/default",
    "/backup/config",
    "/backup/status",
    "/backup/actions",
];

/// Paths served with the given metrics setting, one entry per route.
pub fn route_paths(enable_metrics: bool) -> Vec<&'static str> {
    let mut paths = BACKUP_ROUTES.to_vec();
    paths.push("/health");
    if enable_metrics {
        paths.push("/metrics");
    }
    paths
}

/// GET / - One path per line.
pub async fn route_index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let enable_metrics = state.config.current().api.enable_metrics;
    let mut body = String::new();
    for path in route_paths(enable_metrics) {
        body.push_str(path);
        body.push('\n');
    }
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=UTF-8"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        body,
    )
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(route_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_path_follows_setting() {
        assert!(route_paths(true).contains(&"/metrics"));
        assert!(!route_paths(false).contains(&"/metrics"));
        assert_eq!(route_paths(false).first(), Some(&"/"));
    }
}
