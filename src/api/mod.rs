//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Fleet endpoints are mounted under `/api/v1`. Handlers only read the fleet
//! snapshot or forward intents to the fleet event loop; they hold no state.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for the REST endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "fleet-monitor", description = "Live fleet view and pause/resume control"),
    paths(
        handlers::machine::list_machines,
        handlers::machine::get_machine,
        handlers::machine::add_machine,
        handlers::machine::toggle_pause,
        handlers::machine::remove_machine,
        handlers::connection::list_connections,
        handlers::connection::close_connection,
        handlers::connection::unmount,
        handlers::system::health_handler,
    ),
    tags(
        (name = "Machines", description = "Fleet view and operator commands"),
        (name = "Connections", description = "Push connection lifecycle"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

/// Builds the REST router (without state).
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Builds the complete presentation bridge: REST, `/ws`, tracing and CORS.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::MonitorConfig;
    use crate::connection::test_support::RecordingTransport;
    use crate::connection::{ConnectionState, Transport, TransportEvent};
    use crate::domain::{EventBus, FleetEvent, MachineId};
    use crate::service::FleetService;

    struct Bridge {
        app: Router,
        transport: Arc<RecordingTransport>,
        state: AppState,
    }

    fn bridge() -> Bridge {
        let transport = Arc::new(RecordingTransport::default());
        let (service, handle) = FleetService::new(
            &MonitorConfig::default(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            EventBus::new(64),
        );
        tokio::spawn(service.run());
        let state = AppState::new(handle);
        Bridge {
            app: build_app(state.clone()),
            transport,
            state,
        }
    }

    async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty());
        let Ok(request) = request else {
            panic!("bad request");
        };
        let response = app
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn empty_fleet_lists_nothing() {
        let b = bridge();
        let (status, body) = call(&b.app, Method::GET, "/api/v1/machines").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn unknown_machine_is_404() {
        let b = bridge();
        let (status, body) = call(&b.app, Method::GET, "/api/v1/machines/9").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 2001);
    }

    #[tokio::test]
    async fn remove_is_501() {
        let b = bridge();
        let (status, body) = call(&b.app, Method::DELETE, "/api/v1/machines/1").await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body["error"]["code"], 4002);
    }

    #[tokio::test]
    async fn add_then_toggle_flow() {
        let b = bridge();
        let (status, body) = call(&b.app, Method::POST, "/api/v1/machines").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["state"], "connecting");
        assert_eq!(body["scope"], "detached");

        let Some(id) = b.transport.opened().first().copied() else {
            panic!("no connection opened");
        };

        // Not bound yet: toggling is a lookup failure.
        let (status, _) = call(&b.app, Method::POST, "/api/v1/machines/7/toggle-pause").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        b.transport.emit(id, TransportEvent::Opened);
        b.transport.emit(
            id,
            TransportEvent::Message(
                r#"{"id":7,"location":{"lat":47.1,"lon":-122.1,"alt":10},"fuel_level":55.5,"is_paused":false}"#
                    .to_string(),
            ),
        );
        let mut rx = b.state.fleet.watch();
        let waited = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.contains_key(&MachineId::new(7))),
        )
        .await;
        assert!(matches!(waited, Ok(Ok(_))));

        let (status, body) = call(&b.app, Method::GET, "/api/v1/machines/7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fuel_level"], 55.5);

        let (status, body) = call(&b.app, Method::POST, "/api/v1/machines/7/toggle-pause").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["command"]["type"], "pause");
        assert_eq!(body["command"]["id"], 7);

        let mut events = b.state.event_bus.subscribe();
        b.transport.emit(id, TransportEvent::Closed);
        let closed = tokio::time::timeout(Duration::from_secs(2), async {
            while let Ok(event) = events.recv().await {
                if let FleetEvent::ConnectionStateChanged {
                    to: ConnectionState::Closed,
                    ..
                } = event
                {
                    return true;
                }
            }
            false
        })
        .await;
        assert!(matches!(closed, Ok(true)));

        let (status, body) = call(&b.app, Method::GET, "/api/v1/connections").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["state"], "closed");

        let (status, body) = call(&b.app, Method::POST, "/api/v1/machines/7/toggle-pause").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], 2003);
    }

    #[tokio::test]
    async fn close_unknown_connection_is_404() {
        let b = bridge();
        let uri = format!("/api/v1/connections/{}/close", uuid::Uuid::new_v4());
        let (status, _) = call(&b.app, Method::POST, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_machine_count() {
        let b = bridge();
        let (status, body) = call(&b.app, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["machines"], 0);
    }

    #[test]
    fn openapi_lists_fleet_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/machines"));
        assert!(doc.paths.paths.contains_key("/api/v1/machines/{id}/toggle-pause"));
    }
}
