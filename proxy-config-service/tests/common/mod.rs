//! Common test utilities for proxy-config-service integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use proxy_config_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, GithubConfig, SecurityConfig, ServiceConfig, SessionConfig,
    },
    models::ExternalIdentity,
    services::{InMemoryStore, MockIdentityProvider, Principal, SecurityAuditService},
    AppState,
};
use secrecy::Secret;
use tower::ServiceExt;
use uuid::Uuid;

/// Fixed key so ciphertexts are stable within a test run.
pub const TEST_SECRET_KEY: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub const TEST_OAUTH_CODE: &str = "test-code";
pub const TEST_PROXY_HOST: &str = "proxy.test";

pub fn test_identity(provider_id: i64, name: &str) -> ExternalIdentity {
    ExternalIdentity {
        provider_id,
        display_name: name.to_string(),
        avatar_url: None,
    }
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "proxy-config-service".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
            timeout_seconds: 1,
        },
        security: SecurityConfig {
            secret_key: Secret::new(TEST_SECRET_KEY.to_string()),
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        session: SessionConfig {
            secure_cookies: false,
            max_age_days: 7,
        },
        github: GithubConfig {
            client_id: "test-client".to_string(),
            client_secret: Secret::new("test-secret".to_string()),
            redirect_uri: "http://localhost:8080/auth/github/callback".to_string(),
        },
        proxy_host: TEST_PROXY_HOST.to_string(),
    }
}

/// A logged-in user: session cookie plus the principal behind it.
pub struct TestUser {
    pub principal: Principal,
    pub session_token: String,
}

impl TestUser {
    pub fn cookie(&self) -> String {
        format!("session={}", self.session_token)
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).expect("Response body is not UTF-8")
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All `Set-Cookie` values.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub audit: SecurityAuditService,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let audit = SecurityAuditService::recording();
        let identity = MockIdentityProvider::new(TEST_OAUTH_CODE, test_identity(4242, "Grace"));

        let state = AppState::new(test_config(), store.clone(), Arc::new(identity), audit.clone())
            .expect("Failed to build app state");
        let router = build_router(state.clone()).expect("Failed to build router");

        Self {
            router,
            state,
            store,
            audit,
        }
    }

    /// Open a session without going through the identity provider.
    pub async fn login(&self, provider_id: i64, name: &str) -> TestUser {
        let (user, session) = self
            .state
            .sessions
            .start_session(&test_identity(provider_id, name))
            .await
            .expect("Failed to start session");

        TestUser {
            principal: Principal::new(user.user_id),
            session_token: session.session_id.to_string(),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, user: Option<&TestUser>) -> TestResponse {
        self.send(request(Method::GET, uri, user, None)).await
    }

    pub async fn delete(&self, uri: &str, user: Option<&TestUser>) -> TestResponse {
        self.send(request(Method::DELETE, uri, user, None)).await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        user: Option<&TestUser>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        self.send(request(Method::POST, uri, user, Some(fields)))
            .await
    }

    /// Create a project over HTTP and return its id.
    pub async fn create_project(&self, user: &TestUser, name: &str) -> Uuid {
        let res = self
            .post_form("/projects", Some(user), &[("name", name)])
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text());
        parse_id(&res.json()["project_id"])
    }

    /// Create a config with one header over HTTP and return (config_id, header_id).
    pub async fn create_config(
        &self,
        user: &TestUser,
        project_id: Uuid,
        header_value: &str,
    ) -> (Uuid, Uuid) {
        let res = self
            .post_form(
                &format!("/projects/{}/configs", project_id),
                Some(user),
                &config_fields("api", "Authorization", header_value),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text());
        let body = res.json();
        (
            parse_id(&body["config_id"]),
            parse_id(&body["headers"][0]["header_id"]),
        )
    }
}

pub fn config_fields<'a>(
    name: &'a str,
    header_name: &'a str,
    header_value: &'a str,
) -> [(&'a str, &'a str); 5] {
    [
        ("name", name),
        ("num-of-requests", "100"),
        ("requests-per", "minute"),
        ("header-name", header_name),
        ("header-value", header_value),
    ]
}

pub fn parse_id(value: &serde_json::Value) -> Uuid {
    value
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("Expected a UUID string")
}

pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn request(
    method: Method,
    uri: &str,
    user: Option<&TestUser>,
    form: Option<&[(&str, &str)]>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::COOKIE, user.cookie());
    }

    let body = match form {
        Some(fields) => {
            builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            Body::from(encode_form(fields))
        }
        None => Body::empty(),
    };

    builder.body(body).expect("Failed to build request")
}
