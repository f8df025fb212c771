// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::Path;

use axum::{
    routing::{get, patch, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi, ToSchema,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::LedgerEntry,
    events::{LedgerNotice, PortalEvent},
    state::AppState,
    storage::{Audited, Page},
};

pub mod auth;
pub mod blockchain;
pub mod cases;
pub mod dashboard;
pub mod departments;
pub mod exports;
pub mod health;
pub mod extract;
pub mod news;
pub mod patterns;
pub mod stats;
pub mod str_reports;
pub mod timeline;
pub mod transactions;
pub mod users;
pub mod wallets;
pub mod ws;

/// One page of a list endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    /// Matching rows before pagination.
    pub total: usize,
}

impl<T> From<Page<T>> for ListResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items: page.items,
            total: page.total,
        }
    }
}

/// A mutated record and the audit row written with it.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditedResponse<T> {
    pub record: T,
    pub audit: LedgerEntry,
}

/// Announce the new audit row and shape the response body.
pub(crate) fn audited_response<T>(state: &AppState, audited: Audited<T>) -> AuditedResponse<T> {
    state
        .events
        .publish(PortalEvent::LedgerRecorded(LedgerNotice::from(&audited.ledger)));
    AuditedResponse {
        record: audited.record,
        audit: audited.ledger,
    }
}

pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/users/me", get(users::get_current_user))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", patch(users::update_user))
        .route("/cases", get(cases::list_cases).post(cases::create_case))
        .route("/cases/{id}", get(cases::get_case).patch(cases::update_case))
        .route("/cases/{id}/timeline", get(cases::case_timeline))
        .route("/cases/{id}/audit", get(cases::case_audit_trail))
        .route("/cases/{id}/patterns/detect", post(cases::detect_case_patterns))
        .route(
            "/cases/{id}/exports",
            get(cases::list_case_exports).post(cases::create_case_export),
        )
        .route("/exports/{id}", get(exports::get_export))
        .route("/exports/{id}/download", get(exports::download_export))
        .route("/wallets", get(wallets::list_wallets).post(wallets::create_wallet))
        .route(
            "/wallets/{id}",
            get(wallets::get_wallet).patch(wallets::update_wallet),
        )
        .route("/wallets/{id}/transactions", get(wallets::wallet_transactions))
        .route(
            "/wallets/{id}/kyc",
            get(wallets::list_wallet_kyc).post(wallets::create_wallet_kyc),
        )
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route(
            "/transactions/{id}",
            get(transactions::get_transaction).patch(transactions::update_transaction),
        )
        .route(
            "/patterns",
            get(patterns::list_patterns).post(patterns::create_pattern),
        )
        .route(
            "/patterns/{id}",
            get(patterns::get_pattern).patch(patterns::update_pattern),
        )
        .route(
            "/str-reports",
            get(str_reports::list_str_reports).post(str_reports::create_str_report),
        )
        .route(
            "/str-reports/{id}",
            get(str_reports::get_str_report).patch(str_reports::update_str_report),
        )
        .route("/str-reports/{id}/document", get(str_reports::str_document))
        .route(
            "/timeline",
            get(timeline::list_timeline).post(timeline::create_timeline_event),
        )
        .route("/stats/states", get(stats::list_state_stats))
        .route(
            "/stats/states/{code}",
            get(stats::get_state_stats).put(stats::put_state_stats),
        )
        .route("/departments", get(departments::list_departments))
        .route("/news", get(news::list_news).post(news::create_news))
        .route("/dashboard", get(dashboard::dashboard))
        .route(
            "/blockchain/nodes",
            get(blockchain::list_nodes).post(blockchain::create_node),
        )
        .route("/blockchain/nodes/{id}", patch(blockchain::update_node))
        .route("/blockchain/transactions", get(blockchain::list_ledger))
        .route(
            "/blockchain/transactions/{id}",
            get(blockchain::get_ledger_entry),
        )
        .route("/blockchain/verify", get(blockchain::verify));

    let mut app = Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));

    // Single-page app: unknown paths fall back to index.html.
    if let Some(dir) = static_dir {
        let index = dir.join("index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::login,
        users::get_current_user,
        users::list_users,
        users::create_user,
        users::update_user,
        cases::list_cases,
        cases::create_case,
        cases::get_case,
        cases::update_case,
        cases::case_timeline,
        cases::case_audit_trail,
        cases::detect_case_patterns,
        cases::list_case_exports,
        cases::create_case_export,
        exports::get_export,
        exports::download_export,
        wallets::list_wallets,
        wallets::create_wallet,
        wallets::get_wallet,
        wallets::update_wallet,
        wallets::wallet_transactions,
        wallets::list_wallet_kyc,
        wallets::create_wallet_kyc,
        transactions::list_transactions,
        transactions::create_transaction,
        transactions::get_transaction,
        transactions::update_transaction,
        patterns::list_patterns,
        patterns::create_pattern,
        patterns::get_pattern,
        patterns::update_pattern,
        str_reports::list_str_reports,
        str_reports::create_str_report,
        str_reports::get_str_report,
        str_reports::update_str_report,
        str_reports::str_document,
        timeline::list_timeline,
        timeline::create_timeline_event,
        stats::list_state_stats,
        stats::get_state_stats,
        stats::put_state_stats,
        departments::list_departments,
        news::list_news,
        news::create_news,
        dashboard::dashboard,
        blockchain::list_nodes,
        blockchain::create_node,
        blockchain::update_node,
        blockchain::list_ledger,
        blockchain::get_ledger_entry,
        blockchain::verify
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Auth", description = "Login and token issuance"),
        (name = "Users", description = "Officer accounts"),
        (name = "Cases", description = "Fraud cases, timelines and audit trails"),
        (name = "Exports", description = "Court evidence exports"),
        (name = "Wallets", description = "Watched wallets and KYC"),
        (name = "Transactions", description = "Traced on-chain transactions"),
        (name = "Patterns", description = "Suspicious patterns"),
        (name = "STR", description = "Suspicious transaction reports"),
        (name = "Timeline", description = "Case timeline notes"),
        (name = "Statistics", description = "Fraud statistics by state"),
        (name = "Departments", description = "Law enforcement agencies"),
        (name = "News", description = "Fraud news and advisories"),
        (name = "Dashboard", description = "Aggregate counts"),
        (name = "Blockchain", description = "Audit ledger and confirmation nodes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{issue_token, Role};
    use crate::storage::repository::users::tests::new_user;
    use crate::storage::{User, UserRepository};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (AppState, Router) {
        let state = AppState::for_tests();
        let router = router(state.clone(), None);
        (state, router)
    }

    fn user_with_token(state: &AppState, username: &str, role: Role) -> (User, String) {
        let user = UserRepository::new(&state.db)
            .create(new_user(username, role))
            .unwrap();
        let token = issue_token(&state.auth_config, &user, Utc::now()).unwrap().token;
        (user, token)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn case_body() -> Value {
        json!({
            "title": "Fake exchange",
            "description": "Victim deposited USDT into a cloned exchange",
            "fraud_type": "investment_scam",
            "state_code": "MH",
            "complainant": { "name": "Ravi Shah" },
            "amount_lost": 120000.0
        })
    }

    #[tokio::test]
    async fn liveness_is_public() {
        let (_, app) = app();
        let response = app.oneshot(request("GET", "/health/live", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn health_reports_database() {
        let (_, app) = app();
        let response = app.oneshot(request("GET", "/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["checks"]["database"], "ok");
        assert_eq!(body["checks"]["auth_mode"], "development");
    }

    #[tokio::test]
    async fn login_issues_usable_token() {
        let (state, app) = app();
        UserRepository::new(&state.db)
            .create(new_user("si.mehta", Role::Investigator))
            .unwrap();

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": "si.mehta", "password": "s3cret-password" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["token_type"], "Bearer");
        assert!(body["user"].get("password_hash").is_none());

        let token = body["token"].as_str().unwrap().to_string();
        let me = app
            .oneshot(request("GET", "/api/users/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(json_body(me).await["username"], "si.mehta");
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let (state, app) = app();
        UserRepository::new(&state.db)
            .create(new_user("si.mehta", Role::Investigator))
            .unwrap();
        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": "si.mehta", "password": "wrong" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_user_gets_same_rejection_as_wrong_password() {
        let (state, app) = app();
        UserRepository::new(&state.db)
            .create(new_user("si.mehta", Role::Investigator))
            .unwrap();
        let login = |username: &str| {
            request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": "wrong-password" })),
            )
        };

        let unknown = app.clone().oneshot(login("nobody.here")).await.unwrap();
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        let unknown = json_body(unknown).await;

        let wrong = app.oneshot(login("si.mehta")).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(wrong).await, unknown);
    }

    #[tokio::test]
    async fn admin_creates_user_and_resets_password() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "admin.root", Role::Admin);
        let created = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/users",
                Some(&token),
                Some(json!({
                    "username": "si.rao",
                    "password": "first-password",
                    "full_name": "S. Rao",
                    "department": "cbi",
                    "role": "investigator"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let id = json_body(created).await["id"].as_str().unwrap().to_string();

        let patched = app
            .clone()
            .oneshot(request(
                "PATCH",
                &format!("/api/users/{id}"),
                Some(&token),
                Some(json!({ "password": "second-password" })),
            ))
            .await
            .unwrap();
        assert_eq!(patched.status(), StatusCode::OK);

        let login = |password: &str| {
            request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "username": "si.rao", "password": password })),
            )
        };
        let old = app.clone().oneshot(login("first-password")).await.unwrap();
        assert_eq!(old.status(), StatusCode::UNAUTHORIZED);
        let new = app.oneshot(login("second-password")).await.unwrap();
        assert_eq!(new.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_requires_token() {
        let (_, app) = app();
        let response = app.oneshot(request("GET", "/api/cases", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auditor_cannot_create_case() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "auditor.one", Role::Auditor);
        let response = app
            .oneshot(request("POST", "/api/cases", Some(&token), Some(case_body())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn investigator_cannot_manage_users() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "si.kaur", Role::Investigator);
        let response = app
            .oneshot(request("GET", "/api/users", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn case_creation_returns_audit_row_and_publishes() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "si.kaur", Role::Investigator);
        let mut events = state.events.subscribe();

        let response = app
            .clone()
            .oneshot(request("POST", "/api/cases", Some(&token), Some(case_body())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        let case_id = body["record"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["record"]["status"], "open");
        assert_eq!(body["audit"]["entity_id"], case_id.as_str());
        assert_eq!(body["audit"]["status"], "pending");

        match events.try_recv().unwrap() {
            PortalEvent::LedgerRecorded(notice) => assert_eq!(notice.entity_id, case_id),
            other => panic!("unexpected event {other:?}"),
        }

        let trail = app
            .oneshot(request(
                "GET",
                &format!("/api/cases/{case_id}/audit"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(trail.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_case_is_bad_request() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "si.kaur", Role::Investigator);
        let mut body = case_body();
        body["title"] = json!("   ");
        let response = app
            .oneshot(request("POST", "/api/cases", Some(&token), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn case_without_title_is_json_bad_request() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "si.kaur", Role::Investigator);
        let mut body = case_body();
        body.as_object_mut().unwrap().remove("title");
        let response = app
            .oneshot(request("POST", "/api/cases", Some(&token), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = json_body(response).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("title"), "{error}");
    }

    #[tokio::test]
    async fn malformed_query_is_json_bad_request() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "si.kaur", Role::Analyst);
        let response = app
            .oneshot(request("GET", "/api/cases?limit=abc", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn missing_case_is_not_found() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "si.kaur", Role::Analyst);
        let response = app
            .oneshot(request("GET", "/api/cases/does-not-exist", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_chain_verifies() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "auditor.one", Role::Auditor);
        let response = app
            .oneshot(request("GET", "/api/blockchain/verify", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["valid"], true);
    }

    #[tokio::test]
    async fn departments_are_listed() {
        let (state, app) = app();
        let (_, token) = user_with_token(&state, "auditor.one", Role::Auditor);
        let response = app
            .oneshot(request("GET", "/api/departments", Some(&token), None))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body.as_array().unwrap().len(), crate::models::Department::ALL.len());
        assert_eq!(body[0]["id"], "cyber_crime_cell");
    }

    #[test]
    fn openapi_declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/cases/{id}/exports"));
    }
}
