//! Axum router construction for the debug endpoint.

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::{
    handlers,
    middleware::{self, AccessPolicy},
    state::DebugState,
};

/// Build the debug [`Router`] with all routes and middleware attached.
///
/// The router must be served with connect info (see [`super::spawn`]) for the
/// loopback policy to see the peer address.
pub fn build(state: DebugState, policy: AccessPolicy) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/debug/version", get(handlers::version))
        .route("/debug/requests", get(handlers::requests))
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(policy, middleware::enforce_access))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::{connect_info::MockConnectInfo, ConnectInfo},
        http::{Request, StatusCode},
    };
    use common::{protocol::TraceResponse, PluginError, PluginIdentity};
    use std::net::SocketAddr;
    use tower::ServiceExt;

    fn from_peer(router: Router, peer: &str) -> Router {
        let addr: SocketAddr = peer.parse().unwrap();
        router.layer(MockConnectInfo(addr))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn healthz_from_loopback() {
        let app = from_peer(build(DebugState::default(), AccessPolicy::LoopbackOnly), "127.0.0.1:40000");
        let (status, body) = get_json(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn remote_peer_forbidden_under_loopback_policy() {
        let app = from_peer(build(DebugState::default(), AccessPolicy::LoopbackOnly), "10.1.2.3:40000");
        let (status, body) = get_json(app, "/debug/requests").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");
    }

    #[tokio::test]
    async fn remote_peer_allowed_under_any_policy() {
        let app = from_peer(build(DebugState::default(), AccessPolicy::Any), "10.1.2.3:40000");
        let (status, _) = get_json(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_peer_info_is_forbidden() {
        let app = build(DebugState::default(), AccessPolicy::LoopbackOnly);
        let (status, _) = get_json(app, "/healthz").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn served_connect_info_is_honoured() {
        let app = build(DebugState::default(), AccessPolicy::LoopbackOnly);
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let mut req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn version_reports_identity() {
        let state = DebugState::new(
            std::sync::Arc::new(PluginIdentity::new("v9", "test-runtime", "1.2.3")),
            Default::default(),
        );
        let app = from_peer(build(state, AccessPolicy::LoopbackOnly), "127.0.0.1:1");
        let (status, body) = get_json(app, "/debug/version").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "v9");
        assert_eq!(body["runtime_name"], "test-runtime");
    }

    #[tokio::test]
    async fn requests_lists_recorded_calls() {
        let state = DebugState::default();
        state.requests.finish(
            state.requests.begin("Encrypt"),
            Some(&PluginError::Config("providerKeyVersion is required".into())),
        );
        let app = from_peer(build(state, AccessPolicy::LoopbackOnly), "127.0.0.1:1");
        let (status, body) = get_json(app, "/debug/requests").await;
        assert_eq!(status, StatusCode::OK);
        let parsed: TraceResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.requests.len(), 1);
        assert_eq!(parsed.requests[0].error_kind.as_deref(), Some("config_error"));
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = from_peer(build(DebugState::default(), AccessPolicy::LoopbackOnly), "127.0.0.1:1");
        let (status, body) = get_json(app, "/debug/pprof").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }
}
