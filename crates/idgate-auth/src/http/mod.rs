//! HTTP handlers.
//!
//! # Routes
//!
//! - `GET /oauth/authorize` - [`authorize_handler`]
//! - `GET /auth/{provider}/login` - [`login_handler`]
//! - `GET /auth/{provider}/callback` - [`callback_handler`]
//! - `GET /health`
//!
//! # Example
//!
//! ```ignore
//! let app = idgate_auth::http::auth_router(state)
//!     .layer(tower_http::trace::TraceLayer::new_for_http());
//! ```

pub mod authorize;
pub mod error;
pub mod federation;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Query;
use axum::extract::rejection::QueryRejection;
use axum::routing::get;
use serde_json::{Value, json};

use crate::AuthResult;
use crate::error::AuthError;
use crate::federation::FederationService;
use crate::identity::UserAuthenticator;
use crate::oauth::AuthorizationService;

pub use authorize::authorize_handler;
pub use federation::{callback_handler, login_handler};

/// Shared state for the auth routes.
#[derive(Clone)]
pub struct AuthState {
    /// Issues authorization codes.
    pub authorization: Arc<AuthorizationService>,
    /// Configured identity providers.
    pub federation: Arc<FederationService>,
    /// Resolves the user behind an authorization request.
    pub authenticator: Arc<dyn UserAuthenticator>,
    /// Revoke the provider access token once the callback has the identity.
    pub revoke_provider_tokens: bool,
}

impl AuthState {
    /// Creates the state.
    #[must_use]
    pub fn new(
        authorization: Arc<AuthorizationService>,
        federation: Arc<FederationService>,
        authenticator: Arc<dyn UserAuthenticator>,
    ) -> Self {
        Self {
            authorization,
            federation,
            authenticator,
            revoke_provider_tokens: false,
        }
    }

    /// Enables revocation of provider tokens after a federated login.
    #[must_use]
    pub fn with_revoke_provider_tokens(mut self, revoke: bool) -> Self {
        self.revoke_provider_tokens = revoke;
        self
    }
}

/// Builds the router for every auth route.
pub fn auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/oauth/authorize", get(authorize_handler))
        .route("/auth/{provider}/login", get(login_handler))
        .route("/auth/{provider}/callback", get(callback_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Unwraps query parameters, turning extractor rejections into
/// `InvalidRequest` so they render as JSON.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> AuthResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AuthError::invalid_request(rejection.body_text()))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::{GithubProvider, IdentityProvider, ProviderConfig, ProviderEndpoints, ProviderOptions};
    use crate::identity::TrustedHeaderAuthenticator;
    use crate::storage::{InMemoryClientStorage, InMemoryCodeStorage};
    use crate::types::RegisteredClient;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use tower::ServiceExt;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USER_HEADER: &str = "x-authenticated-user";

    fn router_with(providers: Vec<Arc<dyn IdentityProvider>>) -> Router {
        let clients = InMemoryClientStorage::from_clients([
            RegisteredClient::new("abc").with_redirect_uri("https://app.example/cb")
        ]);
        let authorization = AuthorizationService::new(
            Arc::new(clients),
            Arc::new(InMemoryCodeStorage::new()),
        );
        let state = AuthState::new(
            Arc::new(authorization),
            Arc::new(FederationService::with_providers(providers)),
            Arc::new(TrustedHeaderAuthenticator::new(USER_HEADER).unwrap()),
        );
        auth_router(state)
    }

    fn router() -> Router {
        router_with(Vec::new())
    }

    async fn get(app: Router, uri: &str, user: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(user) = user {
            request = request.header(USER_HEADER, user);
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn location(response: &Response) -> Url {
        Url::parse(
            response.headers()[header::LOCATION]
                .to_str()
                .unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_authorize_redirects_with_code_and_state() {
        let response = get(
            router(),
            "/oauth/authorize?client_id=abc&redirect_uri=https://app.example/cb&response_type=code&state=xyz",
            Some("user-1"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let url = location(&response);
        assert_eq!(url.origin().ascii_serialization(), "https://app.example");
        assert_eq!(url.path(), "/cb");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "code");
        assert_eq!(pairs[0].1.len(), 43);
        assert_eq!(pairs[1], ("state".to_string(), "xyz".to_string()));
    }

    #[tokio::test]
    async fn test_authorize_missing_redirect_uri() {
        let response = get(
            router(),
            "/oauth/authorize?client_id=abc&response_type=code&state=xyz",
            Some("user-1"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Invalid request parameters"})
        );
    }

    #[tokio::test]
    async fn test_authorize_unknown_client() {
        let response = get(
            router(),
            "/oauth/authorize?client_id=evil&redirect_uri=https://app.example/cb&response_type=code",
            Some("user-1"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await, json!({"error": "Invalid client_id"}));
    }

    #[tokio::test]
    async fn test_authorize_requires_user() {
        let response = get(
            router(),
            "/oauth/authorize?client_id=abc&redirect_uri=https://app.example/cb&response_type=code",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Authentication required"})
        );
    }

    #[tokio::test]
    async fn test_authorize_rejects_non_utf8_state() {
        let response = get(
            router(),
            "/oauth/authorize?client_id=abc&redirect_uri=https://app.example/cb&response_type=code&state=%FF%FE",
            Some("user-1"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::LOCATION).is_none());
        assert_eq!(
            json_body(response).await,
            json!({"error": "Invalid request parameters"})
        );
    }

    #[tokio::test]
    async fn test_authorize_echoes_state_bytes() {
        let response = get(
            router(),
            "/oauth/authorize?client_id=abc&redirect_uri=https://app.example/cb&response_type=code&state=%C3%A9t%C3%A9",
            Some("user-1"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.ends_with("&state=%C3%A9t%C3%A9"));
    }

    #[tokio::test]
    async fn test_authorize_duplicate_parameter() {
        let response = get(
            router(),
            "/oauth/authorize?client_id=abc&client_id=abc&redirect_uri=https://app.example/cb&response_type=code",
            Some("user-1"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "application/json"
        );
        assert_eq!(
            json_body(response).await,
            json!({"error": "Invalid request parameters"})
        );
    }

    #[tokio::test]
    async fn test_health() {
        let response = get(router(), "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_login_unknown_provider() {
        let response = get(router(), "/auth/okta/login?state=s1", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Unsupported provider: okta"})
        );
    }

    fn github(server: &MockServer) -> Arc<dyn IdentityProvider> {
        let base = server.uri();
        let url = |p: &str| Some(Url::parse(&format!("{base}{p}")).unwrap());
        let endpoints = ProviderEndpoints {
            token: url("/login/oauth/access_token"),
            userinfo: url("/user"),
            emails: url("/user/emails"),
            ..ProviderEndpoints::default()
        };
        let config = ProviderConfig::new("Iv1.abc", "shh", "https://idgate.example/auth/github/callback")
            .with_options(
                ProviderOptions::default()
                    .with_endpoints(endpoints)
                    .with_allow_insecure_http(true),
            );
        Arc::new(GithubProvider::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_login_redirects_to_provider() {
        let server = MockServer::start().await;
        let response = get(router_with(vec![github(&server)]), "/auth/github/login?state=s1", None).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let url = location(&response);
        assert_eq!(url.host_str(), Some("github.com"));
        assert!(url.query_pairs().any(|(k, v)| k == "state" && v == "s1"));
    }

    #[tokio::test]
    async fn test_callback_returns_user_info() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_test", "token_type": "bearer", "scope": "read:user,user:email"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 9, "login": "octo", "name": "Octo Cat"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"email": "octo@example.com", "primary": true, "verified": true}
            ])))
            .mount(&server)
            .await;

        let response = get(
            router_with(vec![github(&server)]),
            "/auth/github/callback?code=c0de&state=s1",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], "9");
        assert_eq!(body["email"], "octo@example.com");
        assert_eq!(body["emailVerified"], true);
        assert_eq!(body["provider"], "github");
    }

    #[tokio::test]
    async fn test_callback_with_provider_error() {
        let server = MockServer::start().await;
        let response = get(
            router_with(vec![github(&server)]),
            "/auth/github/callback?error=access_denied&state=s1",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Invalid request parameters"})
        );
    }

    #[tokio::test]
    async fn test_callback_duplicate_code() {
        let server = MockServer::start().await;
        let response = get(
            router_with(vec![github(&server)]),
            "/auth/github/callback?code=a&code=b",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Invalid request parameters"})
        );
    }

    #[tokio::test]
    async fn test_callback_missing_code() {
        let server = MockServer::start().await;
        let response = get(router_with(vec![github(&server)]), "/auth/github/callback", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
