pub mod auth;
mod dashboard;
pub mod error;
pub mod metrics;
pub mod rate_limit;
mod sales;
mod scope;
mod ticker;
mod users;
pub(crate) mod validation;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Session management, needs a valid token
    let session_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    // Public auth routes on the strict rate limit tier
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ))
        .merge(session_routes);

    // Protected API routes
    let api_routes = Router::new()
        // Sales
        .route("/sales", get(sales::list_sales).post(sales::create_sale))
        .route("/sales/:id", delete(sales::delete_sale))
        // Board
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/ticker", get(ticker::get_ticker))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{init_in_memory, User, UserRole};
    use crate::engine::FALLBACK_MESSAGE;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use tower::ServiceExt;

    async fn test_app() -> (Router, Arc<AppState>) {
        let db = init_in_memory().await.unwrap();
        let state = Arc::new(AppState::new(Config::default(), db));
        (create_router(state.clone()), state)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": username, "password": "password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(app: &Router, state: &AppState) -> String {
        let hash = auth::hash_password("adminpass1").unwrap();
        User::create(&state.db, "boss", &hash, UserRole::Admin)
            .await
            .unwrap();

        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "boss", "password": "adminpass1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn record(app: &Router, token: &str, value: f64) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/sales",
            Some(token),
            Some(json!({
                "sale_date": crate::utils::today().format("%Y-%m-%d").to_string(),
                "client": "Acme",
                "product": "loan",
                "value": value,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app().await;
        let (status, _) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (app, _) = test_app().await;

        let (status, body) = send(&app, Method::GET, "/api/sales", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let (status, _) = send(&app, Method::GET, "/api/dashboard", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let (app, state) = test_app().await;
        admin_token(&app, &state).await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "boss", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let (app, _) = test_app().await;
        register(&app, "alice").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "alice", "password": "password123" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "conflict");
    }

    #[tokio::test]
    async fn test_registered_user_is_operator() {
        let (app, _) = test_app().await;
        let token = register(&app, "alice").await;

        let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
        assert_eq!(body["role"], "operator");

        let (status, _) = send(&app, Method::GET, "/api/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_non_positive_sale_value_is_rejected() {
        let (app, _) = test_app().await;
        let token = register(&app, "alice").await;

        for value in [0.0, -10.0] {
            let (status, body) = send(
                &app,
                Method::POST,
                "/api/sales",
                Some(&token),
                Some(json!({
                    "sale_date": "2024-03-01",
                    "client": "Acme",
                    "product": "benefit",
                    "value": value,
                })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["code"], "validation_error");
            assert!(body["error"]["details"]["value"].is_array());
        }
    }

    #[tokio::test]
    async fn test_dashboard_celebrates_once_per_session() {
        let (app, _) = test_app().await;
        let token = register(&app, "alice").await;

        record(&app, &token, 52_000.0).await;

        let (status, body) = send(&app, Method::GET, "/api/dashboard", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["own_view"], true);
        assert_eq!(body["status"]["tier"], "silver");
        assert_eq!(body["status"]["target"], 80_000.0);
        assert_eq!(body["sales_count"], 1);
        assert_eq!(body["streak"], 1);
        assert_eq!(body["celebration"]["threshold"], 50_000.0);

        let (_, body) = send(&app, Method::GET, "/api/dashboard", Some(&token), None).await;
        assert!(body.get("celebration").is_none());

        // A fresh login is a fresh session
        let (_, login) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "password123" })),
        )
        .await;
        let second = login["token"].as_str().unwrap();
        let (_, body) = send(&app, Method::GET, "/api/dashboard", Some(second), None).await;
        assert_eq!(body["celebration"]["tier"], "silver");
    }

    #[tokio::test]
    async fn test_operator_scope_is_restricted() {
        let (app, state) = test_app().await;
        let alice = register(&app, "alice").await;
        register(&app, "bob").await;

        let (status, _) = send(&app, Method::GET, "/api/sales?user=bob", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            send(&app, Method::GET, "/api/dashboard?user=all", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = admin_token(&app, &state).await;
        let (status, body) =
            send(&app, Method::GET, "/api/dashboard?user=all", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scope"], "all");
        assert_eq!(body["own_view"], false);
        assert!(body.get("celebration").is_none());
    }

    #[tokio::test]
    async fn test_sale_listing_filters() {
        let (app, _) = test_app().await;
        let token = register(&app, "alice").await;
        record(&app, &token, 1_000.0).await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({
                "sale_date": "2024-01-15",
                "client": "Globex",
                "agreement": "INSS",
                "product": "credit_card",
                "value": 2_500.0,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = send(&app, Method::GET, "/api/sales", Some(&token), None).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["total"], 3_500.0);

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/sales?product=credit_card",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["sales"][0]["product_label"], "Credit card");

        let (_, body) = send(&app, Method::GET, "/api/sales?search=ins", Some(&token), None).await;
        assert_eq!(body["count"], 1);

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/sales?from=2024-01-01&to=2024-01-31",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["count"], 1);

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/sales?from=2024-02-01&to=2024-01-01",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_permissions() {
        let (app, state) = test_app().await;
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;

        let sale = record(&app, &alice, 700.0).await;
        let uri = format!("/api/sales/{}", sale["id"].as_str().unwrap());

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = admin_token(&app, &state).await;
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ticker_modes() {
        let (app, _) = test_app().await;
        let alice = register(&app, "alice").await;

        let (status, body) = send(&app, Method::GET, "/api/ticker", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "leaderboard");
        assert_eq!(body["messages"], json!([FALLBACK_MESSAGE]));

        record(&app, &alice, 52_000.0).await;

        let (_, body) = send(&app, Method::GET, "/api/ticker", Some(&alice), None).await;
        assert_eq!(body["messages"], json!(["🥈 ALICE HIT THE 50K TARGET!"]));

        let (_, body) =
            send(&app, Method::GET, "/api/ticker?mode=recent", Some(&alice), None).await;
        assert_eq!(body["mode"], "recent");
        assert_eq!(body["messages"], json!(["⚡ ALICE CLOSED R$ 52,000.00 IN LOAN"]));
    }

    #[tokio::test]
    async fn test_admin_creates_users() {
        let (app, state) = test_app().await;
        let admin = admin_token(&app, &state).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({ "username": "carla", "password": "password123", "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["role"], "admin");

        let (_, body) = send(&app, Method::GET, "/api/users", Some(&admin), None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (app, state) = test_app().await;
        let token = register(&app, "alice").await;
        send(&app, Method::GET, "/api/dashboard", Some(&token), None).await;
        assert_eq!(state.celebrations.len(), 1);

        let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.celebrations.is_empty());

        let (status, _) = send(&app, Method::GET, "/api/dashboard", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_viewing_other_user_keeps_own_celebration() {
        let (app, state) = test_app().await;
        let admin = admin_token(&app, &state).await;
        record(&app, &admin, 60_000.0).await;

        let bob = register(&app, "bob").await;
        record(&app, &bob, 52_000.0).await;

        let (status, body) =
            send(&app, Method::GET, "/api/dashboard?user=bob", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["own_view"], false);
        assert_eq!(body["status"]["tier"], "silver");
        assert!(body.get("celebration").is_none());
        assert!(state.celebrations.is_empty());

        let (_, body) = send(&app, Method::GET, "/api/dashboard", Some(&admin), None).await;
        assert_eq!(body["own_view"], true);
        assert_eq!(body["celebration"]["threshold"], 50_000.0);
    }

    #[tokio::test]
    async fn test_metrics_requires_admin() {
        let db = init_in_memory().await.unwrap();
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let state = Arc::new(AppState::new(Config::default(), db).with_metrics(handle));
        let app = create_router(state.clone());

        let (status, _) = send(&app, Method::GET, "/metrics", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let operator = register(&app, "alice").await;
        let (status, _) = send(&app, Method::GET, "/metrics", Some(&operator), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = admin_token(&app, &state).await;
        let (status, _) = send(&app, Method::GET, "/metrics", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    async fn login_from(app: &Router, peer: &str, forwarded_for: Option<&str>) -> StatusCode {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header("Content-Type", "application/json");
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut request = builder
            .body(Body::from(
                json!({ "username": "nobody", "password": "password123" }).to_string(),
            ))
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));

        app.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_rate_limit_buckets_by_peer_address() {
        let db = init_in_memory().await.unwrap();
        let mut config = Config::default();
        config.rate_limit.auth_requests_per_window = 2;
        let app = create_router(Arc::new(AppState::new(config, db)));

        let first = "203.0.113.10:40000";
        let second = "203.0.113.20:40000";

        assert_eq!(login_from(&app, first, None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(login_from(&app, first, None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            login_from(&app, first, None).await,
            StatusCode::TOO_MANY_REQUESTS
        );

        // Forwarding headers are ignored unless trusted
        assert_eq!(
            login_from(&app, first, Some("198.51.100.7")).await,
            StatusCode::TOO_MANY_REQUESTS
        );

        assert_eq!(login_from(&app, second, None).await, StatusCode::UNAUTHORIZED);
    }
}
