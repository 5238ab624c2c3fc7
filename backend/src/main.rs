//! Selene - GraphQL API for the Greenbone Management Protocol
//!
//! This is the main entry point of the service.
//! All operations are exposed via GraphQL at /graphql.

#![recursion_limit = "256"]

mod api;
mod config;
mod gmp;
mod graphql;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::Router;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::gmp::{Connector, SocketConnector};
use crate::graphql::{AuthUser, JwtSecret, SeleneSchema, build_schema, verify_token};
use crate::services::SessionStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub schema: SeleneSchema,
    pub sessions: Arc<SessionStore>,
    pub connector: Arc<dyn Connector>,
    pub secret: JwtSecret,
}

impl AppState {
    pub fn new(connector: Arc<dyn Connector>, sessions: Arc<SessionStore>, secret: JwtSecret) -> Self {
        let schema = build_schema(connector.clone(), sessions.clone(), secret.clone());
        Self {
            schema,
            sessions,
            connector,
            secret,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "selene=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Selene");
    tracing::info!(
        socket = %config.gvmd_socket_path.display(),
        timeout_secs = config.gmp_timeout.as_secs(),
        "Configuration loaded"
    );

    let connector: Arc<dyn Connector> = Arc::new(SocketConnector::new(
        config.gvmd_socket_path.clone(),
        config.gmp_timeout,
    ));
    let sessions = Arc::new(SessionStore::new(config.session_timeout));
    let state = AppState::new(connector, sessions, JwtSecret::new(config.jwt_secret.clone()));

    let app = app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid HOST/PORT")?;
    tracing::info!("Listening on {}", addr);
    tracing::info!("GraphQL playground: http://localhost:{}/graphql", config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        // Health endpoints (no auth required)
        .merge(api::health::router())
        // GraphQL endpoint (handles all queries and mutations)
        .route("/graphql", get(graphiql).post(graphql_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Extract bearer token from Authorization header
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// GraphQL query/mutation handler with session context
///
/// A valid token for a live session puts the user and a GMP client
/// authenticated with the session's credentials into the request data.
async fn graphql_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();

    if let Some(token) = extract_token(&headers)
        && let Ok(session_id) = verify_token(&state.secret, &token)
        && let Some(session) = state.sessions.touch(session_id)
    {
        let client = state.connector.connect(Some(session.credentials.clone()));
        request = request
            .data(AuthUser {
                session_id: session.id,
                username: session.username().to_string(),
                expires_at: session.expires_at,
            })
            .data(client);
    }

    state.schema.execute(request).await.into()
}

/// GraphiQL interactive playground (only for browsers)
async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    // Check if this is a browser request (accepts HTML)
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        axum::response::Html(GraphiQLSource::build().endpoint("/graphql").finish()).into_response()
    } else {
        (
            axum::http::StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::gmp::Credentials;
    use crate::graphql::auth::issue_token;
    use crate::graphql::test_support::{FakeConnector, FakeTransport};

    fn state() -> (AppState, Arc<FakeConnector>) {
        let connector = FakeConnector::new(FakeTransport::new());
        let sessions = Arc::new(SessionStore::new(TimeDelta::minutes(30)));
        let state = AppState::new(connector.clone(), sessions, JwtSecret::new("test-secret"));
        (state, connector)
    }

    async fn post_graphql(app: Router, token: Option<&str>, query: &str) -> Value {
        let mut request = Request::post("/graphql").header("content-type", "application/json");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = serde_json::to_vec(&json!({ "query": query })).unwrap();
        let response = app
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(extract_token(&headers), None);
        headers.insert(AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));
    }

    #[tokio::test]
    async fn test_session_token_authenticates_request() {
        let (state, connector) = state();
        let session = state.sessions.create(Credentials::new("admin", "admin"));
        let token = issue_token(&state.secret, session.id, "admin").unwrap();

        let body = post_graphql(app(state), Some(&token), "{ currentUser { username } }").await;
        assert_eq!(body["data"], json!({ "currentUser": { "username": "admin" } }));
        assert_eq!(*connector.connections.lock(), vec![Some("admin".to_string())]);
    }

    #[tokio::test]
    async fn test_unknown_session_is_anonymous() {
        let (state, connector) = state();
        let token = issue_token(&state.secret, uuid::Uuid::new_v4(), "admin").unwrap();

        let body = post_graphql(app(state), Some(&token), "{ currentUser { username } }").await;
        assert_eq!(body["errors"][0]["message"], json!("Authentication required"));
        assert_eq!(body["errors"][0]["extensions"]["code"], json!("UNAUTHORIZED"));
        assert!(connector.connections.lock().is_empty());
    }

    #[tokio::test]
    async fn test_active_session_outlives_first_timeout_window() {
        let connector = FakeConnector::new(FakeTransport::new());
        let sessions = Arc::new(SessionStore::new(TimeDelta::milliseconds(400)));
        let state = AppState::new(connector, sessions, JwtSecret::new("test-secret"));
        let session = state.sessions.create(Credentials::new("admin", "admin"));
        let token = issue_token(&state.secret, session.id, "admin").unwrap();
        let query = "{ currentUser { username } }";

        for _ in 0..3 {
            tokio::time::sleep(std::time::Duration::from_millis(250)).await;
            let body = post_graphql(app(state.clone()), Some(&token), query).await;
            assert_eq!(body["data"], json!({ "currentUser": { "username": "admin" } }));
        }

        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        let body = post_graphql(app(state), Some(&token), query).await;
        assert_eq!(body["errors"][0]["extensions"]["code"], json!("UNAUTHORIZED"));
    }

    #[tokio::test]
    async fn test_graphiql_only_for_browsers() {
        let (state, _) = state();
        let response = app(state.clone())
            .oneshot(Request::get("/graphql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = app(state)
            .oneshot(
                Request::get("/graphql")
                    .header("accept", "text/html")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
